//! Text normalization shared by caption matching and deduplication.

use std::collections::HashMap;

use crate::types::config::NormalizeConfig;

/// Normalizes names and captions so both sides of a comparison agree.
///
/// Steps: trim, fold letter variants, collapse whitespace, case-fold, then
/// strip one leading honorific prefix. A prefix is only stripped when it is
/// a whole word and something remains after it.
#[derive(Debug, Clone)]
pub struct Normalizer {
    folds: HashMap<char, char>,
    /// Folded prefixes, longest first.
    prefixes: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizeConfig::default())
    }
}

impl Normalizer {
    pub fn new(config: &NormalizeConfig) -> Self {
        let folds: HashMap<char, char> = config.letter_folds.iter().copied().collect();
        let mut normalizer = Self {
            folds,
            prefixes: Vec::new(),
        };

        let mut prefixes: Vec<String> = config
            .honorific_prefixes
            .iter()
            .map(|p| normalizer.fold(p))
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
        prefixes.dedup();
        normalizer.prefixes = prefixes;
        normalizer
    }

    /// Trim, fold letters, collapse whitespace and lowercase. No prefix
    /// stripping.
    pub fn fold(&self, text: &str) -> String {
        let folded: String = text
            .chars()
            .map(|c| self.folds.get(&c).copied().unwrap_or(c))
            .collect();
        collapse_whitespace(&folded).to_lowercase()
    }

    /// Full normalization for comparison.
    pub fn normalize(&self, text: &str) -> String {
        let folded = self.fold(text);
        self.strip_prefix(&folded).to_string()
    }

    /// True if the text starts with an honorific prefix.
    pub fn has_honorific(&self, text: &str) -> bool {
        let folded = self.fold(text);
        self.matching_prefix(&folded).is_some()
    }

    fn strip_prefix<'a>(&self, folded: &'a str) -> &'a str {
        match self.matching_prefix(folded) {
            Some(prefix) => {
                let rest = folded[prefix.len()..].trim_start();
                if rest.is_empty() {
                    folded
                } else {
                    rest
                }
            }
            None => folded,
        }
    }

    fn matching_prefix(&self, folded: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|prefix| {
                folded.strip_prefix(prefix.as_str()).is_some_and(|rest| {
                    rest.is_empty() || rest.starts_with(char::is_whitespace)
                })
            })
            .map(String::as_str)
    }

    /// Permissive caption match: after normalization, either text contains
    /// the other. Empty texts never match.
    pub fn captions_match(&self, entity_name: &str, caption: &str) -> bool {
        let name = self.normalize(entity_name);
        let caption = self.normalize(caption);
        if name.is_empty() || caption.is_empty() {
            return false;
        }
        caption.contains(&name) || name.contains(&caption)
    }
}

/// Key used to compare category names: trimmed, whitespace-collapsed,
/// case-folded.
pub fn category_key(category: &str) -> String {
    collapse_whitespace(category).to_lowercase()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
