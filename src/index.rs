//! Canonical index: canonical key -> position in the record set.
//!
//! First write wins. A later record whose name folds to an existing key stays
//! in the record set but is not reachable through the index; the collision is
//! recorded so the operator can rename one of the two.

use crate::model::CanonicalRecord;
use crate::normalize::CanonicalizeOptions;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyCollision {
    pub key: String,
    pub kept_name: String,
    pub kept_position: usize,
    pub duplicate_name: String,
    pub duplicate_position: usize,
}

#[derive(Debug, Clone)]
pub struct CanonicalIndex {
    options: CanonicalizeOptions,
    /// Keys in insertion order; fuzzy ties resolve to the earliest.
    keys: Vec<String>,
    positions: HashMap<String, usize>,
    collisions: Vec<KeyCollision>,
    /// Positions of records whose name folds to an empty key.
    unindexed: Vec<usize>,
}

impl CanonicalIndex {
    pub fn build(records: &[CanonicalRecord], options: CanonicalizeOptions) -> Self {
        let mut index = Self {
            options,
            keys: Vec::with_capacity(records.len()),
            positions: HashMap::with_capacity(records.len()),
            collisions: Vec::new(),
            unindexed: Vec::new(),
        };

        for (pos, record) in records.iter().enumerate() {
            let key = options.canonicalize(&record.name);
            if key.is_empty() {
                warn!("Record at position {} has no usable name: {:?}", pos, record.name);
                index.unindexed.push(pos);
                continue;
            }
            match index.positions.get(&key).copied() {
                Some(kept) => {
                    warn!(
                        "Duplicate canonical key '{}': '{}' collides with '{}'",
                        key, record.name, records[kept].name
                    );
                    index.collisions.push(KeyCollision {
                        key,
                        kept_name: records[kept].name.clone(),
                        kept_position: kept,
                        duplicate_name: record.name.clone(),
                        duplicate_position: pos,
                    });
                }
                None => {
                    index.positions.insert(key.clone(), pos);
                    index.keys.push(key);
                }
            }
        }

        index
    }

    pub fn options(&self) -> CanonicalizeOptions {
        self.options
    }

    /// Position of the record owning `key`, if any.
    pub fn get(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn collisions(&self) -> &[KeyCollision] {
        &self.collisions
    }

    pub fn unindexed(&self) -> &[usize] {
        &self.unindexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_lookup() {
        let records = vec![
            CanonicalRecord::new("St Mary's Chapel"),
            CanonicalRecord::new("Old_Bridge"),
        ];
        let index = CanonicalIndex::build(&records, CanonicalizeOptions::default());
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("st marys chapel"), Some(0));
        assert_eq!(index.get("old bridge"), Some(1));
        assert_eq!(index.get("missing"), None);
        assert!(index.collisions().is_empty());
    }

    #[test]
    fn test_collision_first_write_wins() {
        let records = vec![
            CanonicalRecord::new("War Memorial"),
            CanonicalRecord::new("war-memorial."),
            CanonicalRecord::new("Other"),
        ];
        let index = CanonicalIndex::build(&records, CanonicalizeOptions::default());
        assert_eq!(index.get("war memorial"), Some(0));
        assert_eq!(index.keys(), &["war memorial".to_string(), "other".to_string()]);
        let collisions = index.collisions();
        assert_eq!(collisions.len(), 1);
        assert_eq!(collisions[0].kept_name, "War Memorial");
        assert_eq!(collisions[0].duplicate_name, "war-memorial.");
        assert_eq!(collisions[0].duplicate_position, 1);
    }

    #[test]
    fn test_apostrophe_option_changes_keys() {
        let records = vec![
            CanonicalRecord::new("St Mary's"),
            CanonicalRecord::new("St Marys"),
        ];
        let stripped = CanonicalIndex::build(&records, CanonicalizeOptions::default());
        assert_eq!(stripped.collisions().len(), 1);
        let kept = CanonicalIndex::build(&records, CanonicalizeOptions::keep_apostrophes());
        assert!(kept.collisions().is_empty());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_empty_names_not_indexed() {
        let records = vec![CanonicalRecord::new(""), CanonicalRecord::new("  .jpg ")];
        let index = CanonicalIndex::build(&records, CanonicalizeOptions::default());
        assert!(index.is_empty());
        assert_eq!(index.unindexed(), &[0, 1]);
    }
}
