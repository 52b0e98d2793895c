//! Name canonicalization
//!
//! Photo file names and free-text memorial titles refer to the same marker
//! with different conventions ("St_Mary's_Chapel.JPG" vs "St Marys Chapel").
//! `canonicalize` folds both into one matching key.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref IMAGE_EXTENSION: Regex = Regex::new(r"(?i)\.(jpe?g|png|webp|heic)$").unwrap();
    static ref SEPARATOR_RUN: Regex = Regex::new(r"[_-]+").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref TRAILING_PUNCTUATION: Regex = Regex::new(r"[.,;:]+$").unwrap();
}

/// Options for key canonicalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalizeOptions {
    /// Keep apostrophes and backticks in the key. When false, "St Mary's"
    /// and "St Marys" produce the same key.
    pub keep_separator_punctuation: bool,
}

impl CanonicalizeOptions {
    pub fn keep_apostrophes() -> Self {
        Self {
            keep_separator_punctuation: true,
        }
    }

    pub fn canonicalize(&self, raw: &str) -> String {
        canonicalize(raw, self.keep_separator_punctuation)
    }
}

/// Canonicalize a display string into a matching key.
///
/// Total: never fails, empty input gives an empty key. The result is a fixed
/// point, so canonicalizing a key again returns it unchanged.
pub fn canonicalize(raw: &str, keep_separator_punctuation: bool) -> String {
    // Passes after the first only delete characters, so this terminates.
    let mut current = canonicalize_pass(raw, keep_separator_punctuation);
    loop {
        let next = canonicalize_pass(&current, keep_separator_punctuation);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn canonicalize_pass(raw: &str, keep_separator_punctuation: bool) -> String {
    // 1. compatibility normalization
    let s: String = raw.nfkc().collect();

    // 2. image extension
    let s = IMAGE_EXTENSION.replace(s.trim(), "").into_owned();

    // 3. typographic quotes and dashes
    let s: String = s.chars().map(unify_typographic).collect();

    // 4. underscore / hyphen runs
    let s = SEPARATOR_RUN.replace_all(&s, " ");

    // 5. enclosing quotes and whitespace
    let s = s.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace());

    // 6. internal whitespace
    let s = WHITESPACE_RUN.replace_all(s, " ");

    // 7. apostrophes
    let s = if keep_separator_punctuation {
        s.into_owned()
    } else {
        s.chars().filter(|c| *c != '\'' && *c != '`').collect()
    };

    // 8. trailing sentence punctuation
    let s = TRAILING_PUNCTUATION.replace(&s, "");

    // 9. case
    s.to_lowercase()
}

fn unify_typographic(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' | '\u{00AB}'
        | '\u{00BB}' => '"',
        '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
        other => other,
    }
}
