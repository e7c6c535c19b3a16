//! Comment text canonicalization.
//!
//! Produces the form the classifier is trained and scored on:
//! lowercase, leetspeak folded back to letters, everything outside the
//! Latin/Cyrillic alphabets, digits and whitespace turned into spaces,
//! and whitespace runs collapsed. The output is a fixed point of
//! `normalize`, so feeding already normalized text back in is harmless.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static SHARED: LazyLock<TextNormalizer> = LazyLock::new(TextNormalizer::new);

/// Normalize with the process-wide normalizer. Absent input yields `""`.
pub fn normalize(text: Option<&str>) -> String {
    SHARED.normalize(text)
}

pub struct TextNormalizer {
    disallowed_regex: Regex,
    whitespace_regex: Regex,
    leet_map: HashMap<char, char>,
}

impl TextNormalizer {
    pub fn new() -> Self {
        let mut leet_map = HashMap::new();
        leet_map.insert('0', 'o');
        leet_map.insert('1', 'i');
        leet_map.insert('3', 'e');
        leet_map.insert('4', 'a');
        leet_map.insert('5', 's');
        leet_map.insert('7', 't');
        leet_map.insert('@', 'a');
        leet_map.insert('$', 's');

        Self {
            // ё sits outside the а-я range and has to be listed on its own
            disallowed_regex: Regex::new(r"[^0-9a-zа-яё\s]").expect("static pattern"),
            whitespace_regex: Regex::new(r"\s+").expect("static pattern"),
            leet_map,
        }
    }

    pub fn normalize(&self, text: Option<&str>) -> String {
        let Some(text) = text else {
            return String::new();
        };

        let substituted: String = text
            .to_lowercase()
            .chars()
            .map(|c| self.leet_map.get(&c).copied().unwrap_or(c))
            .collect();

        let filtered = self.disallowed_regex.replace_all(&substituted, " ");
        self.whitespace_regex
            .replace_all(&filtered, " ")
            .trim()
            .to_string()
    }

    /// Convenience for callers holding a plain `&str`.
    pub fn normalize_str(&self, text: &str) -> String {
        self.normalize(Some(text))
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
