use std::sync::Arc;

use md5::{Digest, Md5};

use quillmask_search::StateDigest;

/// Edit-log length after which a [`DiffString`] collapses its history
/// into a fresh source string.
pub const EDIT_LOG_THRESHOLD: usize = 150;

/// A single text edit: delete `delete` bytes at `pos`, then insert
/// `insert` at the same position. Positions refer to the string produced
/// by all preceding edits in the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub pos: u32,
    pub delete: u8,
    pub insert: Vec<u8>,
}

/// A byte string stored as a shared immutable source plus an ordered edit
/// log, instead of a full private copy, to keep per-state memory small.
/// A 128-bit digest of the current logical string is maintained eagerly.
#[derive(Debug, Clone)]
pub struct DiffString {
    source: Arc<Vec<u8>>,
    edits: Vec<Edit>,
    digest: StateDigest,
}

fn digest_of(text: &[u8]) -> StateDigest {
    let mut hasher = Md5::new();
    hasher.update(text);
    hasher.finalize().into()
}

impl DiffString {
    pub fn new(source: Arc<Vec<u8>>) -> Self {
        let digest = digest_of(&source);
        Self {
            source,
            edits: Vec::new(),
            digest,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(Arc::new(bytes.to_vec()))
    }

    /// Digest of the current logical string.
    pub fn hash_value(&self) -> StateDigest {
        self.digest
    }

    pub fn source(&self) -> &Arc<Vec<u8>> {
        &self.source
    }

    pub fn log_size(&self) -> usize {
        self.edits.len()
    }

    /// Materialize the current logical string by replaying the edit log
    /// over the source.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = (*self.source).clone();
        for edit in &self.edits {
            let pos = edit.pos as usize;
            let del = edit.delete as usize;
            assert!(
                pos <= out.len() && pos + del <= out.len(),
                "edit out of range"
            );
            out.splice(pos..pos + del, edit.insert.iter().copied());
        }
        out
    }

    /// Forget all edits and replace the source string.
    pub fn reset(&mut self, source: Arc<Vec<u8>>) {
        self.digest = digest_of(&source);
        self.source = source;
        self.edits.clear();
    }

    /// Append an edit and rehash. This materializes a full temporary copy
    /// of the text to compute the digest, which is expensive; callers that
    /// already hold the edited text should use
    /// [`DiffString::edit_with_text`].
    pub fn edit(&mut self, edit: Edit) {
        self.edits.push(edit);
        self.digest = digest_of(&self.bytes());
    }

    /// Append an edit and rehash from `text`, the already-materialized
    /// result of applying the edit. No consistency check is performed
    /// between `edit` and `text`.
    pub fn edit_with_text(&mut self, edit: Edit, text: &[u8]) {
        self.edits.push(edit);
        self.digest = digest_of(text);
    }

    /// Replay the edit log into a fresh source string and clear the log,
    /// trading a one-time copy for cheaper materialization later.
    pub fn apply(&mut self) {
        if self.edits.is_empty() {
            return;
        }
        self.source = Arc::new(self.bytes());
        self.edits.clear();
    }
}

impl PartialEq for DiffString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

impl Eq for DiffString {}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(pos: u32, delete: u8, insert: &[u8]) -> Edit {
        Edit {
            pos,
            delete,
            insert: insert.to_vec(),
        }
    }

    #[test]
    fn hash_is_a_function_of_the_logical_bytes() {
        let a = DiffString::from_bytes(b"hello world");
        let b = DiffString::from_bytes(b"hello world");
        assert_eq!(a.hash_value(), b.hash_value());
        assert_eq!(a, b);

        let c = DiffString::from_bytes(b"hello worle");
        assert_ne!(a.hash_value(), c.hash_value());
    }

    #[test]
    fn equal_logical_strings_compare_equal_across_representations() {
        let mut edited = DiffString::from_bytes(b"hello world");
        edited.edit(edit(0, 5, b"howdy"));

        let direct = DiffString::from_bytes(b"howdy world");
        assert_eq!(edited, direct);
        assert_eq!(edited.hash_value(), direct.hash_value());
    }

    #[test]
    fn edits_apply_left_to_right_in_log_order() {
        let mut s = DiffString::from_bytes(b"abcdef");
        s.edit(edit(0, 2, b"x"));
        assert_eq!(s.bytes(), b"xcdef");
        s.edit(edit(4, 1, b"!!"));
        assert_eq!(s.bytes(), b"xcde!!");
    }

    #[test]
    fn edit_at_start_end_and_full_span() {
        let mut start = DiffString::from_bytes(b"abc");
        start.edit(edit(0, 1, b"z"));
        assert_eq!(start.bytes(), b"zbc");

        let mut end = DiffString::from_bytes(b"abc");
        end.edit(edit(3, 0, b"z"));
        assert_eq!(end.bytes(), b"abcz");

        let mut full = DiffString::from_bytes(b"abc");
        full.edit(edit(0, 3, b"qr"));
        assert_eq!(full.bytes(), b"qr");
    }

    #[test]
    fn fast_path_matches_slow_path() {
        let source = b"the quick brown fox";
        let edits = [edit(4, 5, b"slow"), edit(0, 3, b"a"), edit(2, 4, b"")];

        let mut slow = DiffString::from_bytes(source);
        for e in &edits {
            slow.edit(e.clone());
        }

        let mut fast = DiffString::from_bytes(source);
        for e in &edits {
            let mut preview = fast.bytes();
            let pos = e.pos as usize;
            preview.splice(pos..pos + e.delete as usize, e.insert.iter().copied());
            fast.edit_with_text(e.clone(), &preview);
        }

        assert_eq!(slow.bytes(), fast.bytes());
        assert_eq!(slow.hash_value(), fast.hash_value());
    }

    #[test]
    fn apply_preserves_bytes_and_hash() {
        let mut s = DiffString::from_bytes(b"hello world");
        s.edit(edit(5, 1, b"_"));
        s.edit(edit(0, 1, b"H"));
        let bytes = s.bytes();
        let digest = s.hash_value();

        s.apply();
        assert_eq!(s.log_size(), 0);
        assert_eq!(s.bytes(), bytes);
        assert_eq!(s.hash_value(), digest);
        assert_eq!(&**s.source(), &bytes);
    }

    #[test]
    fn reset_discards_the_log() {
        let mut s = DiffString::from_bytes(b"abc");
        s.edit(edit(0, 1, b"z"));
        s.reset(Arc::new(b"fresh".to_vec()));
        assert_eq!(s.bytes(), b"fresh");
        assert_eq!(s.log_size(), 0);
        assert_eq!(s.hash_value(), DiffString::from_bytes(b"fresh").hash_value());
    }
}
