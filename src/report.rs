use crate::index::KeyCollision;
use serde::Serialize;
use std::fmt;

/// An approximate match accepted during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyMatchSample {
    pub display_key: String,
    pub matched_name: String,
    pub similarity: f64,
}

/// Outcome of one reconciliation run.
///
/// Counters are exact; the sample lists are capped at `sample_limit` so a
/// large unmatched batch does not flood the terminal.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub processed: usize,
    pub matched_exact: usize,
    pub matched_fuzzy: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub created: usize,
    pub unmatched: usize,
    pub skipped_placeholder: usize,
    pub skipped_empty_key: usize,
    pub skipped_invalid_coordinate: usize,
    pub collisions: Vec<KeyCollision>,
    /// Canonical records whose name has no usable key.
    pub unindexed: usize,
    pub unmatched_sample: Vec<String>,
    pub fuzzy_sample: Vec<FuzzyMatchSample>,
    /// Positions of records changed or created, in processing order.
    pub touched_positions: Vec<usize>,
    pub sample_limit: usize,
}

impl ReconcileReport {
    pub fn new(sample_limit: usize) -> Self {
        Self {
            sample_limit,
            ..Default::default()
        }
    }

    pub fn matched(&self) -> usize {
        self.matched_exact + self.matched_fuzzy
    }

    pub fn skipped(&self) -> usize {
        self.skipped_placeholder + self.skipped_empty_key + self.skipped_invalid_coordinate
    }

    /// True when the run changed the record set.
    pub fn has_changes(&self) -> bool {
        self.updated > 0 || self.created > 0
    }

    pub(crate) fn record_unmatched(&mut self, display_key: &str) {
        self.unmatched += 1;
        if self.unmatched_sample.len() < self.sample_limit {
            self.unmatched_sample.push(display_key.to_string());
        }
    }

    pub(crate) fn record_fuzzy(&mut self, display_key: &str, matched_name: &str, similarity: f64) {
        self.matched_fuzzy += 1;
        if self.fuzzy_sample.len() < self.sample_limit {
            self.fuzzy_sample.push(FuzzyMatchSample {
                display_key: display_key.to_string(),
                matched_name: matched_name.to_string(),
                similarity,
            });
        }
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed: {}", self.processed)?;
        writeln!(
            f,
            "Matched: {} (exact: {}, fuzzy: {})",
            self.matched(),
            self.matched_exact,
            self.matched_fuzzy
        )?;
        writeln!(f, "Updated: {}", self.updated)?;
        writeln!(f, "Unchanged: {}", self.unchanged)?;
        writeln!(f, "Created: {}", self.created)?;
        writeln!(f, "Unmatched: {}", self.unmatched)?;
        writeln!(
            f,
            "Skipped: {} (placeholder: {}, empty key: {}, invalid coordinate: {})",
            self.skipped(),
            self.skipped_placeholder,
            self.skipped_empty_key,
            self.skipped_invalid_coordinate
        )?;

        if !self.collisions.is_empty() {
            writeln!(f, "Duplicate canonical keys: {}", self.collisions.len())?;
            for c in self.collisions.iter().take(self.sample_limit) {
                writeln!(f, "  - '{}' shadowed by '{}' ({})", c.duplicate_name, c.kept_name, c.key)?;
            }
        }

        if self.unindexed > 0 {
            writeln!(f, "Records without a usable name: {}", self.unindexed)?;
        }

        if !self.fuzzy_sample.is_empty() {
            writeln!(f, "Fuzzy matches:")?;
            for m in &self.fuzzy_sample {
                writeln!(f, "  - '{}' -> '{}' ({:.3})", m.display_key, m.matched_name, m.similarity)?;
            }
        }

        if !self.unmatched_sample.is_empty() {
            let more = if self.unmatched > self.unmatched_sample.len() { " ..." } else { "" };
            writeln!(f, "Sample unmatched: {}{}", self.unmatched_sample.join("; "), more)?;
        }

        if !self.touched_positions.is_empty() {
            let shown: Vec<String> = self
                .touched_positions
                .iter()
                .take(self.sample_limit)
                .map(|p| p.to_string())
                .collect();
            let more = if self.touched_positions.len() > shown.len() { ", ..." } else { "" };
            writeln!(f, "Records touched (positions): [{}{}]", shown.join(", "), more)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_bounded() {
        let mut report = ReconcileReport::new(2);
        for key in ["a", "b", "c"] {
            report.record_unmatched(key);
        }
        assert_eq!(report.unmatched, 3);
        assert_eq!(report.unmatched_sample, vec!["a", "b"]);
        assert!(report.to_string().contains("Sample unmatched: a; b ..."));
    }

    #[test]
    fn test_display_summary() {
        let mut report = ReconcileReport::new(10);
        report.processed = 4;
        report.matched_exact = 2;
        report.record_fuzzy("st_marys.jpg", "St. Mary's", 0.93);
        report.updated = 3;
        report.touched_positions = vec![0, 4, 7];
        let text = report.to_string();
        assert!(text.contains("Matched: 3 (exact: 2, fuzzy: 1)"));
        assert!(text.contains("'st_marys.jpg' -> 'St. Mary's' (0.930)"));
        assert!(text.contains("Records touched (positions): [0, 4, 7]"));
        assert!(report.has_changes());
    }
}
