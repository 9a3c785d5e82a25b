//! Word-bound parsing shared by the word-based operators, plus TSV
//! dictionary loading.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::context::Context;
use crate::error::{QmError, QmResult};
use crate::ops::FocusPoint;

/// Maps a lowercased word to its alternatives.
pub type Dictionary = HashMap<String, Vec<String>>;

/// Half-open byte range of one word.
pub type WordBounds = (usize, usize);

pub fn is_word_boundary(b: u8) -> bool {
    b.is_ascii_whitespace() || b.is_ascii_punctuation()
}

/// Offset of the beginning of the word at `pos`. When `pos` sits on a
/// boundary character the beginning of the next word is returned, or the
/// original position if no word follows.
pub fn word_start(text: &[u8], pos: usize) -> usize {
    if pos == 0 || pos >= text.len() {
        return pos;
    }

    let original = pos;
    let mut pos = pos;

    if is_word_boundary(text[pos]) {
        loop {
            pos += 1;
            if pos >= text.len() {
                return original;
            }
            if !is_word_boundary(text[pos]) {
                return pos;
            }
        }
    }

    while pos > 0 {
        pos -= 1;
        if is_word_boundary(text[pos]) {
            return pos + 1;
        }
    }
    pos
}

/// Offset one past the end of the word at `pos`. When `pos` sits on a
/// boundary character the end of the previous word is returned, or the
/// original position if no word precedes.
pub fn word_end(text: &[u8], pos: usize) -> usize {
    if pos == 0 || pos >= text.len() {
        return pos;
    }

    let original = pos;
    let mut pos = pos;

    if is_word_boundary(text[pos]) {
        loop {
            pos -= 1;
            if pos == 0 {
                return original;
            }
            if !is_word_boundary(text[pos]) {
                return pos + 1;
            }
        }
    }

    while pos < text.len() {
        pos += 1;
        if pos >= text.len() || is_word_boundary(text[pos]) {
            break;
        }
    }
    pos
}

/// Bounds of the `words_before` words preceding the focus and of the
/// focus word itself plus up to `words_after` following words. The first
/// element of the second vector is always the word under the focus. The
/// result is cached per (text, offset, before, after).
pub fn parse_word_bounds(
    focus: &FocusPoint<'_>,
    words_before: usize,
    words_after: usize,
    context: &Context,
) -> (Vec<WordBounds>, Vec<WordBounds>) {
    let text = focus.text;
    let key = (
        text.as_ptr() as usize,
        focus.offset,
        words_before,
        words_after,
    );

    {
        let mut cache = context
            .caches
            .word_bounds
            .lock()
            .expect("bounds cache poisoned");
        if let Some(cached) = cache.get(&key) {
            return cached.clone();
        }
    }

    let mut start = word_start(text, focus.offset);
    let mut end = word_end(text, start);

    let mut after = Vec::with_capacity(words_after + 1);
    after.push((start, end));

    let mut remaining = words_after;
    while remaining > 0 && end < text.len() {
        let next_start = word_start(text, (end + 1).min(text.len()));
        let next_end = word_end(text, next_start);
        if next_end <= next_start || start == next_start {
            break;
        }
        start = next_start;
        end = next_end;
        after.push((start, end));
        remaining -= 1;
    }

    let mut before = Vec::with_capacity(words_before);
    let mut start = after[0].0;
    let mut remaining = words_before;
    while remaining > 0 && start > 0 {
        let prev_end = word_end(text, start - 1);
        let prev_start = word_start(text, prev_end.saturating_sub(1));
        if prev_end <= prev_start || start == prev_start {
            break;
        }
        start = prev_start;
        before.push((prev_start, prev_end));
        remaining -= 1;
    }
    before.reverse();

    let result = (before, after);
    let mut cache = context
        .caches
        .word_bounds
        .lock()
        .expect("bounds cache poisoned");
    cache.put(key, result.clone());
    result
}

/// Load a tab-separated dictionary: the lowercased first column becomes
/// the key, the remaining columns its alternatives. Rows with fewer than
/// two columns are skipped.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> QmResult<Arc<Dictionary>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        QmError::Dictionary(format!("could not open '{}': {e}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut dict = Dictionary::new();
    for record in reader.records().flatten() {
        if record.len() < 2 {
            continue;
        }
        let key = record[0].to_lowercase();
        let alternatives: Vec<String> = record.iter().skip(1).map(str::to_string).collect();
        dict.insert(key, alternatives);
    }

    debug!(entries = dict.len(), path = %path.display(), "loaded dictionary");
    Ok(Arc::new(dict))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_start_walks_back_to_the_boundary() {
        let text = b"the cat sat";
        assert_eq!(word_start(text, 5), 4); // inside "cat"
        assert_eq!(word_start(text, 4), 4); // at "cat"
        assert_eq!(word_start(text, 0), 0);
    }

    #[test]
    fn word_start_on_a_boundary_finds_the_next_word() {
        let text = b"the  cat";
        assert_eq!(word_start(text, 3), 5);
        // No word after the trailing boundary: position is unchanged.
        let text = b"the ";
        assert_eq!(word_start(text, 3), 3);
    }

    #[test]
    fn word_end_walks_forward_to_the_boundary() {
        let text = b"the cat sat";
        assert_eq!(word_end(text, 5), 7); // inside "cat" -> end of "cat"
        assert_eq!(word_end(text, 8), 11); // inside "sat" -> text end
    }

    #[test]
    fn word_end_on_a_boundary_finds_the_previous_word() {
        let text = b"the cat";
        // Position 3 is the space: the end of "the" is returned.
        assert_eq!(word_end(text, 3), 3);
    }

    #[test]
    fn bounds_at_text_edges() {
        let text = b"cat";
        assert_eq!(word_start(text, 0), 0);
        assert_eq!(word_end(text, 1), 3);
        assert_eq!(word_start(text, 2), 0);
    }
}
