use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::error::{QmError, QmResult};

/// N-gram order. For orders up to 4 the packed [`Ngram`] key holds the
/// bytes verbatim.
pub const ORDER: usize = 3;

/// A character n-gram packed into a fixed-width integer key, little-endian,
/// unused high bytes zero. Newlines are folded to spaces so that line
/// breaks and spaces count as the same separator.
pub type Ngram = u32;

/// Number of pending updates after which a profile folds them into a fresh
/// base map.
pub const PENDING_FLATTEN_THRESHOLD: usize = 150;

pub fn ngram_from_bytes(window: &[u8]) -> Ngram {
    debug_assert_eq!(window.len(), ORDER);
    let mut key = [0u8; 4];
    for (dst, &b) in key.iter_mut().zip(window) {
        *dst = if b == b'\n' { b' ' } else { b };
    }
    u32::from_le_bytes(key)
}

pub fn ngram_to_bytes(ngram: Ngram) -> [u8; ORDER] {
    let bytes = ngram.to_le_bytes();
    let mut out = [0u8; ORDER];
    out.copy_from_slice(&bytes[..ORDER]);
    out
}

/// All n-grams of a byte window, in text order. Empty when the window is
/// shorter than [`ORDER`].
pub fn ngrams_in(window: &[u8]) -> impl Iterator<Item = Ngram> + '_ {
    window.windows(ORDER).map(ngram_from_bytes)
}

#[derive(Serialize, Deserialize)]
struct ProfileRecord {
    n: u64,
    ngrams: BTreeMap<Ngram, u64>,
}

/// Character n-gram counts over a text, with a total-occurrence scalar `n`.
///
/// The counts live in two layers: a shared immutable `base` map and a
/// private `pending` map holding the absolute counts of keys touched since
/// the last flatten. Clones share the base, so states derived from a
/// common ancestor pay only for their own edits. [`NgramProfile::apply`]
/// folds pending into a fresh base; it runs automatically once pending
/// grows past [`PENDING_FLATTEN_THRESHOLD`].
#[derive(Debug, Clone, Default)]
pub struct NgramProfile {
    n: u64,
    size: usize,
    base: Arc<BTreeMap<Ngram, u64>>,
    pending: BTreeMap<Ngram, u64>,
}

impl NgramProfile {
    /// Build a profile by counting every n-gram of `text`.
    pub fn generate_from_bytes(text: &[u8]) -> QmResult<Self> {
        if text.len() < ORDER {
            return Err(QmError::Profile(format!(
                "text of {} bytes is shorter than the n-gram order {}",
                text.len(),
                ORDER
            )));
        }

        let mut base = BTreeMap::new();
        let mut n = 0u64;
        for ngram in ngrams_in(text) {
            *base.entry(ngram).or_insert(0) += 1;
            n += 1;
        }

        Ok(Self {
            n,
            size: base.len(),
            base: Arc::new(base),
            pending: BTreeMap::new(),
        })
    }

    /// Build a profile from explicit counts. Zero counts are dropped.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (Ngram, u64)>,
    {
        let base: BTreeMap<Ngram, u64> = counts.into_iter().filter(|&(_, c)| c > 0).collect();
        Self {
            n: base.values().sum(),
            size: base.len(),
            base: Arc::new(base),
            pending: BTreeMap::new(),
        }
    }

    /// Total number of n-gram occurrences.
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Number of distinct n-grams with a non-zero count.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current pending-update count.
    pub fn log_size(&self) -> usize {
        self.pending.len()
    }

    /// Absolute occurrence count for `ngram`.
    pub fn freq(&self, ngram: Ngram) -> u64 {
        if let Some(&count) = self.pending.get(&ngram) {
            return count;
        }
        self.base.get(&ngram).copied().unwrap_or(0)
    }

    /// Occurrence count normalized by `n`.
    pub fn norm_freq(&self, ngram: Ngram) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.freq(ngram) as f64 / self.n as f64
    }

    /// Apply a series of signed count deltas. A key absent from the
    /// profile is created on a positive delta. Counts must never go
    /// negative; a violation is a programmer error.
    pub fn update(&mut self, updates: &[(Ngram, i64)]) {
        for &(ngram, delta) in updates {
            let seed = self.base.get(&ngram).copied().unwrap_or(0);
            let entry = self.pending.entry(ngram).or_insert(seed);
            let prev = *entry;
            let next = prev as i64 + delta;
            assert!(next >= 0, "n-gram count underflow");
            *entry = next as u64;

            if prev == 0 && next != 0 {
                self.size += 1;
            } else if prev != 0 && next == 0 {
                debug_assert!(self.size > 0);
                self.size -= 1;
            }

            let n = self.n as i64 + delta;
            assert!(n >= 0, "total n-gram count underflow");
            self.n = n as u64;
        }

        if self.pending.len() > PENDING_FLATTEN_THRESHOLD {
            self.apply();
        }
    }

    /// Update the distribution from a window of the unmodified text and
    /// the same window on the modified text: old-window n-grams are
    /// decremented, new-window n-grams incremented. Callers must size the
    /// windows to cover the full ORDER-wide context around the edit.
    pub fn update_from_windows(&mut self, old_window: &[u8], new_window: &[u8]) {
        let mut updates = Vec::with_capacity(old_window.len() + new_window.len());
        updates.extend(ngrams_in(old_window).map(|g| (g, -1i64)));
        updates.extend(ngrams_in(new_window).map(|g| (g, 1i64)));
        self.update(&updates);
    }

    /// Fold pending updates into a fresh private base map. Semantically a
    /// no-op: iteration yields the same sequence before and after.
    pub fn apply(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let mut merged = (*self.base).clone();
        for (&ngram, &count) in &self.pending {
            if count == 0 {
                merged.remove(&ngram);
            } else {
                merged.insert(ngram, count);
            }
        }
        self.base = Arc::new(merged);
        self.pending.clear();
    }

    /// Ordered iteration over the merged view of base and pending. Each
    /// key appears exactly once; pending wins over base; keys whose merged
    /// count is zero are skipped.
    pub fn iter(&self) -> impl Iterator<Item = (Ngram, u64)> + '_ {
        self.base
            .iter()
            .merge_join_by(self.pending.iter(), |a, b| a.0.cmp(b.0))
            .filter_map(|merged| match merged {
                EitherOrBoth::Left((&ngram, &count)) => Some((ngram, count)),
                EitherOrBoth::Right((&ngram, &count))
                | EitherOrBoth::Both(_, (&ngram, &count)) => {
                    (count != 0).then_some((ngram, count))
                }
            })
    }

    /// Serialize as `(n, sorted map)`. Pending updates are flattened into
    /// the written map; the in-memory profile is left untouched.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> QmResult<()> {
        let mut flat = self.clone();
        flat.apply();
        let record = ProfileRecord {
            n: flat.n,
            ngrams: (*flat.base).clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &record)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> QmResult<Self> {
        let reader = BufReader::new(File::open(path)?);
        let record: ProfileRecord = serde_json::from_reader(reader)?;
        Ok(Self {
            n: record.n,
            size: record.ngrams.len(),
            base: Arc::new(record.ngrams),
            pending: BTreeMap::new(),
        })
    }
}
