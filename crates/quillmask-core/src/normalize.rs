use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

fn quote_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("(?:''|``|\"|„|“|”|‘|’|«|»)").expect("valid pattern"))
}

fn dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:[‒–—―]+|-{2,})").expect("valid pattern"))
}

fn ellipsis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:…|\.{3,})").expect("valid pattern"))
}

/// Canonicalize a text before n-gram generation: Unicode NFC, BOM
/// stripping, quote/dash/ellipsis folding, and CRLF to LF.
pub fn normalize_text(text: &str) -> String {
    let text: String = text.nfc().collect();
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let text = quote_re().replace_all(text, "'");
    let text = dash_re().replace_all(&text, "--");
    let text = ellipsis_re().replace_all(&text, "...");
    text.replace("\r\n", "\n")
}

// Tagger-output cleanup. The annotations take the form `word/TAG`, with
// special tags for quotes, brackets, and punctuation. The regex crate has
// no lookaround, so the patterns capture the surrounding whitespace and
// re-insert it.

fn word_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/[\w$*+-]+(\s|$)").expect("valid pattern"))
}

fn open_quote_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\s)(.{1,2})/``\s").expect("valid pattern"))
}

fn close_quote_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s(.{1,2})/''(\s|$)").expect("valid pattern"))
}

fn open_bracket_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\s)(.)/\((?:-\w\w)?\s").expect("valid pattern"))
}

fn close_bracket_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s(.)/\)(?:-\w\w)?(\s|$)").expect("valid pattern"))
}

fn punct_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s(.)/[.,:'](?:-\w\w)?(\s|$)").expect("valid pattern"))
}

/// Strip part-of-speech annotations of the form `token/TAG` from a text.
pub fn strip_pos_annotations(text: &str) -> String {
    let text = word_tag_re().replace_all(text, "$1");
    let text = open_quote_tag_re().replace_all(&text, "$1$2");
    let text = close_quote_tag_re().replace_all(&text, "$1$2");
    let text = open_bracket_tag_re().replace_all(&text, "$1$2");
    let text = close_bracket_tag_re().replace_all(&text, "$1$2");
    punct_tag_re().replace_all(&text, "$1$2").into_owned()
}
