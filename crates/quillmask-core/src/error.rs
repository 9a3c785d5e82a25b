use thiserror::Error;

#[derive(Error, Debug)]
pub enum QmError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profile Serialization Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Profile Error: {0}")]
    Profile(String),

    #[error("Dictionary Error: {0}")]
    Dictionary(String),
}

pub type QmResult<T> = Result<T, QmError>;
