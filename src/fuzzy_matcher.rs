use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strsim::{jaro_winkler, normalized_levenshtein, sorensen_dice};

/// String similarity used for approximate key matching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityMetric {
    /// 1 - edit distance / longer length
    #[default]
    Levenshtein,
    /// Prefix-weighted; lenient with long shared prefixes
    JaroWinkler,
    /// Bigram overlap
    SorensenDice,
}

impl SimilarityMetric {
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Self::Levenshtein => normalized_levenshtein(a, b),
            Self::JaroWinkler => jaro_winkler(a, b),
            Self::SorensenDice => sorensen_dice(a, b),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Levenshtein => "levenshtein",
            Self::JaroWinkler => "jaro-winkler",
            Self::SorensenDice => "sorensen-dice",
        };
        f.write_str(name)
    }
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "levenshtein" => Ok(Self::Levenshtein),
            "jaro-winkler" | "jaro_winkler" => Ok(Self::JaroWinkler),
            "sorensen-dice" | "sorensen_dice" | "dice" => Ok(Self::SorensenDice),
            other => Err(format!("unknown similarity metric: {}", other)),
        }
    }
}

/// Fuzzy matcher for canonical keys
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    /// Similarity threshold (0.0-1.0) for considering two keys a match
    pub similarity_threshold: f64,
    pub metric: SimilarityMetric,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            metric: SimilarityMetric::default(),
        }
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            similarity_threshold: threshold,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Similarity between two keys, 0.0..=1.0 (higher = more similar).
    /// Keys are expected to be canonicalized already.
    pub fn similarity(&self, s1: &str, s2: &str) -> f64 {
        if s1.is_empty() || s2.is_empty() {
            return 0.0;
        }
        self.metric.score(s1, s2)
    }

    pub fn is_match(&self, s1: &str, s2: &str) -> bool {
        self.similarity(s1, s2) >= self.similarity_threshold
    }

    /// Find the best matching key among `candidates`.
    ///
    /// Returns `(position, similarity)` of the highest scoring key at or
    /// above the threshold. Equal scores keep the earliest candidate.
    pub fn find_best_match<S: AsRef<str>>(
        &self,
        target: &str,
        candidates: &[S],
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (pos, candidate) in candidates.iter().enumerate() {
            let score = self.similarity(target, candidate.as_ref());
            if score < self.similarity_threshold {
                continue;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((pos, score));
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity() {
        let matcher = FuzzyMatcher::default();
        assert_eq!(matcher.similarity("abcde12345", "abcde12345"), 1.0);
        assert!((matcher.similarity("abcde12345", "abcde123xy") - 0.8).abs() < 1e-12);
        assert_eq!(matcher.similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_is_match() {
        let matcher = FuzzyMatcher::new(0.85);
        assert!(matcher.is_match("st marys chapel", "st. marys chapel"));
        assert!(!matcher.is_match("royal navy memorial", "merchant navy memorial"));
    }

    #[test]
    fn test_find_best_match_respects_threshold() {
        let keys = vec!["abcde12345".to_string(), "zzzzzzzzzz".to_string()];
        assert_eq!(FuzzyMatcher::new(0.85).find_best_match("abcde123xy", &keys), None);
        let (pos, score) = FuzzyMatcher::new(0.75)
            .find_best_match("abcde123xy", &keys)
            .unwrap();
        assert_eq!(pos, 0);
        assert!((score - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_find_best_match_tie_keeps_first() {
        let keys = ["abcx", "abcy", "abcd"];
        let (pos, _) = FuzzyMatcher::new(0.5).find_best_match("abcd", &keys).unwrap();
        assert_eq!(pos, 2);
        let (pos, _) = FuzzyMatcher::new(0.5).find_best_match("abcz", &keys).unwrap();
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("jaro-winkler".parse::<SimilarityMetric>(), Ok(SimilarityMetric::JaroWinkler));
        assert_eq!("Levenshtein".parse::<SimilarityMetric>(), Ok(SimilarityMetric::Levenshtein));
        assert!("cosine".parse::<SimilarityMetric>().is_err());
        assert_eq!(SimilarityMetric::SorensenDice.to_string(), "sorensen-dice");
    }
}
