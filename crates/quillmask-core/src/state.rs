use std::sync::{Arc, Mutex};

use quillmask_search::StateDigest;

use crate::error::QmResult;
use crate::profile::NgramProfile;
use crate::text::DiffString;

/// Mutable per-state metadata, written during cost evaluation.
#[derive(Debug, Clone, Default)]
pub struct StateMeta {
    /// Jensen-Shannon divergence of this state against the target
    /// profile, cached by the heuristic.
    pub jsd: Option<f64>,
}

/// One point in the search space: the edited text plus its n-gram profile,
/// kept incrementally consistent with the text.
///
/// States compare equal iff their texts compare equal (bytewise on the
/// logical form); the state digest is the text digest. The profile and the
/// text's source string are shared between a state and its descendants.
#[derive(Clone, Debug)]
pub struct TextState {
    text: DiffString,
    profile: Arc<NgramProfile>,
    meta: Arc<Mutex<StateMeta>>,
}

impl TextState {
    /// Build the initial state for a run: profile generated from `bytes`.
    pub fn from_text_bytes(bytes: Vec<u8>) -> QmResult<Self> {
        let profile = NgramProfile::generate_from_bytes(&bytes)?;
        Ok(Self {
            text: DiffString::new(Arc::new(bytes)),
            profile: Arc::new(profile),
            meta: Arc::new(Mutex::new(StateMeta::default())),
        })
    }

    /// Assemble a state from an already-consistent text/profile pair.
    pub fn from_parts(text: DiffString, profile: Arc<NgramProfile>, meta: StateMeta) -> Self {
        Self {
            text,
            profile,
            meta: Arc::new(Mutex::new(meta)),
        }
    }

    pub fn hash_value(&self) -> StateDigest {
        self.text.hash_value()
    }

    pub fn text(&self) -> &DiffString {
        &self.text
    }

    pub fn profile(&self) -> &Arc<NgramProfile> {
        &self.profile
    }

    pub fn meta(&self) -> &Arc<Mutex<StateMeta>> {
        &self.meta
    }

    /// Copy of the current metadata, used to seed successor states.
    pub fn meta_snapshot(&self) -> StateMeta {
        self.meta.lock().expect("state meta poisoned").clone()
    }

    pub fn cached_jsd(&self) -> Option<f64> {
        self.meta.lock().expect("state meta poisoned").jsd
    }

    pub fn set_cached_jsd(&self, jsd: f64) {
        self.meta.lock().expect("state meta poisoned").jsd = Some(jsd);
    }
}

impl PartialEq for TextState {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for TextState {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_follows_the_text() {
        let a = TextState::from_text_bytes(b"the cat sat".to_vec()).unwrap();
        let b = TextState::from_text_bytes(b"the cat sat".to_vec()).unwrap();
        let c = TextState::from_text_bytes(b"the cat sit".to_vec()).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.hash_value(), b.hash_value());
        assert_ne!(a, c);
    }

    #[test]
    fn initial_profile_covers_the_text() {
        let s = TextState::from_text_bytes(b"abcabc".to_vec()).unwrap();
        assert_eq!(s.profile().n(), 4);
    }

    #[test]
    fn meta_snapshot_detaches_from_the_parent() {
        let s = TextState::from_text_bytes(b"abcabc".to_vec()).unwrap();
        s.set_cached_jsd(0.25);

        let snapshot = s.meta_snapshot();
        let child = TextState::from_parts(s.text().clone(), Arc::clone(s.profile()), snapshot);
        child.set_cached_jsd(0.5);

        assert_eq!(s.cached_jsd(), Some(0.25));
        assert_eq!(child.cached_jsd(), Some(0.5));
    }
}
