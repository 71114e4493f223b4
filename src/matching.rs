//! Customer-name matching against free-form question text.
//!
//! The matcher is a pluggable seam so the substring heuristic can later be
//! swapped for a proper fuzzy-matching or entity-linking backend without
//! touching the answering engine.

/// Finds which known customer names a question mentions.
pub trait CustomerMatcher: Send + Sync {
    /// Returns the subset of `known_names` mentioned by `question`, each
    /// name at most once, in the order of `known_names`.
    fn matches(&self, question: &str, known_names: &[String]) -> Vec<String>;
}

/// Case-insensitive substring matcher.
///
/// A customer name matches when either rule fires, first rule wins:
/// 1. the full lowercased name appears as a substring of the question;
/// 2. any punctuation-stripped word of the name longer than
///    `min_word_len` characters appears as a substring of the question.
///
/// The word-length floor keeps short tokens like `"Inc"` or `"SA"` from
/// matching half the questions that come in.
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    min_word_len: usize,
}

impl SubstringMatcher {
    pub fn new(min_word_len: usize) -> Self {
        Self { min_word_len }
    }
}

impl Default for SubstringMatcher {
    fn default() -> Self {
        Self::new(3)
    }
}

impl CustomerMatcher for SubstringMatcher {
    fn matches(&self, question: &str, known_names: &[String]) -> Vec<String> {
        let question_lower = question.to_lowercase();
        let mut mentioned = Vec::new();

        for name in known_names {
            let name_lower = name.to_lowercase();

            let full_match = question_lower.contains(&name_lower);
            let word_match = || {
                name_lower.split_whitespace().any(|word| {
                    let stripped: String =
                        word.chars().filter(|c| c.is_alphanumeric()).collect();
                    stripped.chars().count() > self.min_word_len
                        && question_lower.contains(&stripped)
                })
            };

            if full_match || word_match() {
                mentioned.push(name.clone());
            }
        }

        mentioned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_name_substring_matches() {
        let matcher = SubstringMatcher::default();
        let known = names(&["Alpha Systems"]);
        let found = matcher.matches("cuánto compró Alpha Systems este mes?", &known);
        assert_eq!(found, vec!["Alpha Systems"]);
    }

    #[test]
    fn test_long_word_matches() {
        let matcher = SubstringMatcher::default();
        let known = names(&["Alpha Systems"]);
        assert_eq!(
            matcher.matches("ventas de alpha", &known),
            vec!["Alpha Systems"]
        );
        assert_eq!(
            matcher.matches("ventas de systems", &known),
            vec!["Alpha Systems"]
        );
    }

    #[test]
    fn test_short_word_does_not_match() {
        // "abc" is exactly 3 characters, below the "longer than 3" floor.
        let matcher = SubstringMatcher::default();
        let known = names(&["ABC Inc"]);
        assert!(matcher.matches("qué compró abc?", &known).is_empty());
        assert!(matcher.matches("facturas de inc", &known).is_empty());
    }

    #[test]
    fn test_full_name_matches_regardless_of_word_length() {
        let matcher = SubstringMatcher::default();
        let known = names(&["ABC Inc"]);
        assert_eq!(
            matcher.matches("estado de cuenta de abc inc", &known),
            vec!["ABC Inc"]
        );
    }

    #[test]
    fn test_punctuation_is_stripped_from_words() {
        let matcher = SubstringMatcher::default();
        let known = names(&["Gómez, López & Asociados"]);
        assert_eq!(
            matcher.matches("el contrato con asociados sigue vigente", &known),
            vec!["Gómez, López & Asociados"]
        );
    }

    #[test]
    fn test_name_reported_once_even_if_both_rules_fire() {
        let matcher = SubstringMatcher::default();
        let known = names(&["Alpha Systems"]);
        let found = matcher.matches("alpha systems y también alpha", &known);
        assert_eq!(found, vec!["Alpha Systems"]);
    }

    #[test]
    fn test_multiple_customers_matched() {
        let matcher = SubstringMatcher::default();
        let known = names(&["Alpha Systems", "Beta Corp", "ABC Inc"]);
        let found = matcher.matches("compara alpha contra beta", &known);
        assert_eq!(found, vec!["Alpha Systems", "Beta Corp"]);
    }

    #[test]
    fn test_no_names_no_matches() {
        let matcher = SubstringMatcher::default();
        assert!(matcher.matches("hola", &[]).is_empty());
    }
}
