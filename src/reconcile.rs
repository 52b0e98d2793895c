//! Reconciler: decides which canonical record each candidate row updates.
//!
//! Two entry points with different treatment of unmatched rows:
//! - [`Reconciler::merge_coordinates`] reports unmatched rows and skips them.
//! - [`Reconciler::ingest_records`] creates a canonical record for them.
//!
//! Both build the index once, before touching any record, so no decision
//! within a run sees a half-updated index.

use crate::config::{LocationPolicy, ReconcileConfig};
use crate::error::Result;
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::index::CanonicalIndex;
use crate::model::{CandidateCoordinate, CandidateRecord, CanonicalRecord};
use crate::report::ReconcileReport;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnmatchedPolicy {
    Skip,
    Create,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Resolution {
    Exact(usize),
    Fuzzy(usize, f64),
    Unmatched,
}

pub struct Reconciler {
    config: ReconcileConfig,
    matcher: FuzzyMatcher,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Result<Self> {
        config.validate()?;
        let matcher = config.matcher();
        Ok(Self { config, matcher })
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Build the index this reconciler would use for `records`.
    pub fn build_index(&self, records: &[CanonicalRecord]) -> CanonicalIndex {
        CanonicalIndex::build(records, self.config.canonicalize)
    }

    /// Merge candidate rows into existing records; never creates records.
    pub fn merge_coordinates(
        &self,
        records: &mut Vec<CanonicalRecord>,
        candidates: &[CandidateRecord],
    ) -> ReconcileReport {
        self.run(records, candidates, UnmatchedPolicy::Skip)
    }

    /// Merge candidate rows, creating a record for each unmatched one.
    pub fn ingest_records(
        &self,
        records: &mut Vec<CanonicalRecord>,
        candidates: &[CandidateRecord],
    ) -> ReconcileReport {
        self.run(records, candidates, UnmatchedPolicy::Create)
    }

    fn run(
        &self,
        records: &mut Vec<CanonicalRecord>,
        candidates: &[CandidateRecord],
        policy: UnmatchedPolicy,
    ) -> ReconcileReport {
        let index = self.build_index(records.as_slice());
        let mut report = ReconcileReport::new(self.config.sample_limit);
        report.collisions = index.collisions().to_vec();
        report.unindexed = index.unindexed().len();

        let fuzzy_enabled = !self.config.exact_only
            && (policy == UnmatchedPolicy::Skip || self.config.fuzzy_before_create);
        // Records created in this run, reachable by exact key only.
        let mut created: HashMap<String, usize> = HashMap::new();

        for candidate in candidates {
            report.processed += 1;
            let row = RowLabel(candidate.source_row);
            let display_key = candidate.display_key.trim();

            if display_key.is_empty() {
                debug!("{}: empty display key, skipped", row);
                report.skipped_empty_key += 1;
                continue;
            }
            if self.config.is_placeholder(display_key) {
                debug!("{}: placeholder name '{}', skipped", row, display_key);
                report.skipped_placeholder += 1;
                continue;
            }
            if let CandidateCoordinate::Invalid(raw) = &candidate.coordinate {
                debug!("{}: invalid lat/lng '{}' for '{}'", row, raw, display_key);
                report.skipped_invalid_coordinate += 1;
                continue;
            }

            let key = self.config.canonicalize.canonicalize(display_key);
            if key.is_empty() {
                debug!("{}: '{}' has no usable key, skipped", row, display_key);
                report.skipped_empty_key += 1;
                continue;
            }

            let resolution = match index.get(&key) {
                Some(pos) => Resolution::Exact(pos),
                None => match created.get(&key) {
                    Some(&pos) => Resolution::Exact(pos),
                    None if fuzzy_enabled => self.fuzzy_lookup(&index, &key),
                    None => Resolution::Unmatched,
                },
            };

            let pos = match resolution {
                Resolution::Exact(pos) => {
                    report.matched_exact += 1;
                    pos
                }
                Resolution::Fuzzy(pos, score) => {
                    debug!(
                        "{}: fuzzy '{}' -> '{}' ({:.3})",
                        row, display_key, records[pos].name, score
                    );
                    report.record_fuzzy(display_key, &records[pos].name, score);
                    pos
                }
                Resolution::Unmatched => {
                    match policy {
                        UnmatchedPolicy::Skip => {
                            debug!("{}: NO MATCH -> '{}' (norm='{}')", row, display_key, key);
                            report.record_unmatched(display_key);
                        }
                        UnmatchedPolicy::Create => {
                            records.push(new_record(display_key, candidate));
                            let pos = records.len() - 1;
                            debug!("{}: created '{}' at position {}", row, display_key, pos);
                            created.insert(key, pos);
                            report.created += 1;
                            report.touched_positions.push(pos);
                        }
                    }
                    continue;
                }
            };

            if self.merge(&mut records[pos], candidate, row) {
                report.updated += 1;
                report.touched_positions.push(pos);
            } else {
                debug!("{}: unchanged '{}'", row, display_key);
                report.unchanged += 1;
            }
        }

        info!(
            "Reconciled {} candidates: {} matched ({} fuzzy), {} updated, {} unchanged, {} created, {} unmatched",
            report.processed,
            report.matched(),
            report.matched_fuzzy,
            report.updated,
            report.unchanged,
            report.created,
            report.unmatched
        );
        report
    }

    fn fuzzy_lookup(&self, index: &CanonicalIndex, key: &str) -> Resolution {
        match self.matcher.find_best_match(key, index.keys()) {
            Some((key_pos, score)) => {
                let matched_key = &index.keys()[key_pos];
                match index.get(matched_key) {
                    Some(pos) => Resolution::Fuzzy(pos, score),
                    None => Resolution::Unmatched,
                }
            }
            None => Resolution::Unmatched,
        }
    }

    /// Apply candidate fields to a matched record. Returns true on change.
    fn merge(&self, record: &mut CanonicalRecord, candidate: &CandidateRecord, row: RowLabel) -> bool {
        let mut changed = false;

        if let Some(zone) = non_blank(&candidate.zone) {
            if !record.has_zone() {
                record.zone = Some(zone.to_string());
                changed = true;
            }
        }
        if let Some(description) = non_blank(&candidate.description) {
            if !record.has_description() {
                record.description = Some(description.to_string());
                changed = true;
            }
        }

        if let Some(incoming) = candidate.coordinate.valid() {
            let write = match (self.config.location_policy, &record.location) {
                (_, None) => true,
                (LocationPolicy::Overwrite, Some(stored)) => !stored.bit_identical(&incoming),
                (LocationPolicy::FillIfEmpty, Some(_)) => false,
            };
            if write {
                debug!(
                    "{}: updated '{}' {:?} -> ({}, {})",
                    row,
                    record.name,
                    record.location.map(|l| (l.lat, l.lng)),
                    incoming.lat,
                    incoming.lng
                );
                record.location = Some(incoming);
                changed = true;
            }
        }

        changed
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn new_record(display_key: &str, candidate: &CandidateRecord) -> CanonicalRecord {
    let mut record = CanonicalRecord::new(display_key)
        .with_zone(non_blank(&candidate.zone).unwrap_or_default())
        .with_description(non_blank(&candidate.description).unwrap_or_default());
    record.map = Some(Value::String(String::new()));
    record.location = candidate.coordinate.valid();
    record
}

#[derive(Debug, Clone, Copy)]
struct RowLabel(Option<usize>);

impl std::fmt::Display for RowLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(row) => write!(f, "Row {}", row),
            None => f.write_str("Row ?"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoCoordinate;
    use crate::normalize::CanonicalizeOptions;

    fn reconciler() -> Reconciler {
        Reconciler::new(ReconcileConfig::default()).unwrap()
    }

    #[test]
    fn test_exact_match_sets_location() {
        let mut records = vec![CanonicalRecord::new("St Mary's Chapel")];
        let candidates = vec![CandidateRecord::new("St_Marys_Chapel.JPG").with_location(51.5, -0.125)];
        let report = reconciler().merge_coordinates(&mut records, &candidates);
        assert_eq!(report.matched_exact, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(records[0].location, GeoCoordinate::new(51.5, -0.125));
        assert_eq!(report.touched_positions, vec![0]);
    }

    #[test]
    fn test_location_update_then_unchanged() {
        let mut records = vec![CanonicalRecord::new("X")];
        let candidates = vec![CandidateRecord::new("X").with_location(1.0, 2.0)];
        let r = reconciler();
        let first = r.merge_coordinates(&mut records, &candidates);
        let second = r.merge_coordinates(&mut records, &candidates);
        assert_eq!((first.updated, first.unchanged), (1, 0));
        assert_eq!((second.updated, second.unchanged), (0, 1));
    }

    #[test]
    fn test_overwrite_policy_replaces_changed_location() {
        let mut records = vec![CanonicalRecord::new("X").with_location(GeoCoordinate { lat: 1.0, lng: 2.0 })];
        let candidates = vec![CandidateRecord::new("X").with_location(3.0, 4.0)];
        let report = reconciler().merge_coordinates(&mut records, &candidates);
        assert_eq!(report.updated, 1);
        assert_eq!(records[0].location, GeoCoordinate::new(3.0, 4.0));
    }

    #[test]
    fn test_fill_if_empty_location_policy() {
        let config = ReconcileConfig::default().with_location_policy(LocationPolicy::FillIfEmpty);
        let r = Reconciler::new(config).unwrap();
        let mut records = vec![
            CanonicalRecord::new("X").with_location(GeoCoordinate { lat: 1.0, lng: 2.0 }),
            CanonicalRecord::new("Y"),
        ];
        let candidates = vec![
            CandidateRecord::new("X").with_location(3.0, 4.0),
            CandidateRecord::new("Y").with_location(5.0, 6.0),
        ];
        let report = r.merge_coordinates(&mut records, &candidates);
        assert_eq!((report.updated, report.unchanged), (1, 1));
        assert_eq!(records[0].location, GeoCoordinate::new(1.0, 2.0));
        assert_eq!(records[1].location, GeoCoordinate::new(5.0, 6.0));
    }

    #[test]
    fn test_fill_if_empty_keeps_populated_zone() {
        let mut records = vec![CanonicalRecord::new("X").with_zone("A")];
        let candidates = vec![CandidateRecord::new("X").with_zone("B").with_description("New text")];
        let report = reconciler().ingest_records(&mut records, &candidates);
        assert_eq!(records[0].zone.as_deref(), Some("A"));
        assert_eq!(records[0].description.as_deref(), Some("New text"));
        assert_eq!(report.updated, 1);
        assert_eq!(report.created, 0);
    }

    #[test]
    fn test_blank_zone_is_filled() {
        let mut records = vec![CanonicalRecord::new("X").with_zone("  ")];
        let candidates = vec![CandidateRecord::new("x").with_zone("Zone 2")];
        let report = reconciler().ingest_records(&mut records, &candidates);
        assert_eq!(report.updated, 1);
        assert_eq!(records[0].zone.as_deref(), Some("Zone 2"));
    }

    #[test]
    fn test_fuzzy_cutoff() {
        let candidates = vec![CandidateRecord::new("abcde123xy").with_location(1.0, 1.0)];

        let mut records = vec![CanonicalRecord::new("abcde12345")];
        let strict = Reconciler::new(ReconcileConfig::default().with_cutoff(0.85)).unwrap();
        let report = strict.merge_coordinates(&mut records, &candidates);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.unmatched_sample, vec!["abcde123xy"]);
        assert_eq!(records[0].location, None);

        let lenient = Reconciler::new(ReconcileConfig::default().with_cutoff(0.75)).unwrap();
        let report = lenient.merge_coordinates(&mut records, &candidates);
        assert_eq!(report.matched_fuzzy, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.fuzzy_sample[0].matched_name, "abcde12345");
        assert!(records[0].location.is_some());
    }

    #[test]
    fn test_exact_only_disables_fuzzy() {
        let config = ReconcileConfig::default().with_cutoff(0.5).with_exact_only(true);
        let mut records = vec![CanonicalRecord::new("abcde12345")];
        let candidates = vec![CandidateRecord::new("abcde123xy").with_location(1.0, 1.0)];
        let report = Reconciler::new(config).unwrap().merge_coordinates(&mut records, &candidates);
        assert_eq!(report.unmatched, 1);
    }

    #[test]
    fn test_unmatched_never_created_in_coordinate_mode() {
        let mut records = vec![CanonicalRecord::new("Cenotaph")];
        let candidates = vec![CandidateRecord::new("Lighthouse.jpg").with_location(1.0, 1.0)];
        let report = reconciler().merge_coordinates(&mut records, &candidates);
        assert_eq!(records.len(), 1);
        assert_eq!((report.unmatched, report.created), (1, 0));
    }

    #[test]
    fn test_create_mode_appends_record() {
        let mut records = vec![CanonicalRecord::new("Cenotaph")];
        let candidates = vec![
            CandidateRecord::new("Lighthouse").with_zone("Zone 3").with_description("Keeper"),
            CandidateRecord::new("lighthouse").with_zone("Zone 9"),
        ];
        let report = reconciler().ingest_records(&mut records, &candidates);
        assert_eq!(records.len(), 2);
        assert_eq!(report.created, 1);
        // the repeat merges into the record created above
        assert_eq!(report.matched_exact, 1);
        assert_eq!(report.unchanged, 1);
        assert_eq!(records[1].name, "Lighthouse");
        assert_eq!(records[1].zone.as_deref(), Some("Zone 3"));
        assert_eq!(records[1].map, Some(Value::String(String::new())));
        assert_eq!(records[1].location, None);
    }

    #[test]
    fn test_fuzzy_before_create_switch() {
        let candidates = vec![CandidateRecord::new("abcde123xy").with_zone("Z")];

        let mut records = vec![CanonicalRecord::new("abcde12345")];
        let fuzzy = Reconciler::new(ReconcileConfig::default().with_cutoff(0.75)).unwrap();
        let report = fuzzy.ingest_records(&mut records, &candidates);
        assert_eq!((report.matched_fuzzy, report.created), (1, 0));

        let mut records = vec![CanonicalRecord::new("abcde12345")];
        let exact = Reconciler::new(
            ReconcileConfig::default()
                .with_cutoff(0.75)
                .with_fuzzy_before_create(false),
        )
        .unwrap();
        let report = exact.ingest_records(&mut records, &candidates);
        assert_eq!((report.matched_fuzzy, report.created), (0, 1));
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_row_level_skips() {
        let mut records = vec![CanonicalRecord::new("X")];
        let candidates = vec![
            CandidateRecord::new("IMG_0042.HEIC").with_location(1.0, 1.0),
            CandidateRecord::new("   "),
            CandidateRecord::new(".jpg"),
            CandidateRecord::new("X").with_coordinate(CandidateCoordinate::Invalid("n/a, 1".into())),
            CandidateRecord::new("X").with_location(1.0, 1.0),
        ];
        let report = reconciler().merge_coordinates(&mut records, &candidates);
        assert_eq!(report.processed, 5);
        assert_eq!(report.skipped_placeholder, 1);
        assert_eq!(report.skipped_empty_key, 2);
        assert_eq!(report.skipped_invalid_coordinate, 1);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn test_collision_reported_and_records_kept() {
        let mut records = vec![
            CanonicalRecord::new("War Memorial"),
            CanonicalRecord::new("War_Memorial"),
        ];
        let candidates = vec![CandidateRecord::new("war memorial.jpg").with_location(1.0, 1.0)];
        let report = reconciler().merge_coordinates(&mut records, &candidates);
        assert_eq!(records.len(), 2);
        assert_eq!(report.collisions.len(), 1);
        assert_eq!(report.touched_positions, vec![0]);
        assert!(records[0].location.is_some());
        assert!(records[1].location.is_none());
    }

    #[test]
    fn test_keep_apostrophes_option() {
        let config = ReconcileConfig::default()
            .with_canonicalize(CanonicalizeOptions::keep_apostrophes())
            .with_exact_only(true);
        let mut records = vec![CanonicalRecord::new("Mary's Well")];
        let candidates = vec![CandidateRecord::new("Marys Well").with_location(1.0, 1.0)];
        let report = Reconciler::new(config).unwrap().merge_coordinates(&mut records, &candidates);
        assert_eq!(report.unmatched, 1);
    }

    #[test]
    fn test_invalid_cutoff_rejected() {
        assert!(Reconciler::new(ReconcileConfig::default().with_cutoff(0.0)).is_err());
    }
}
