//! Canonical store persistence
//!
//! The store is a pretty-printed JSON array of memorial objects. Loading
//! validates the whole document before anything is mutated; saving backs up
//! the previous file and swaps the new content in with a rename.

use crate::error::{ReconcileError, Result};
use crate::model::CanonicalRecord;
use chrono::Local;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level keys older tooling wrote next to `location`.
pub const LEGACY_COORDINATE_KEYS: [&str; 2] = ["latitude", "longitude"];

/// Fail early when a required input file is missing.
pub fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ReconcileError::MissingInput(path.to_path_buf()))
    }
}

/// Parse a canonical store document.
///
/// The root must be an array and every element an object with the expected
/// field types; otherwise the whole document is rejected.
pub fn parse_store(text: &str) -> Result<Vec<CanonicalRecord>> {
    let root: Value = serde_json::from_str(text)?;
    let items = match root {
        Value::Array(items) => items,
        other => {
            return Err(ReconcileError::Store(format!(
                "root is not a list (found {})",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(pos, item)| {
            if !item.is_object() {
                return Err(ReconcileError::Store(format!(
                    "entry {} is not an object (found {})",
                    pos,
                    json_kind(&item)
                )));
            }
            serde_json::from_value(item)
                .map_err(|e| ReconcileError::Store(format!("entry {}: {}", pos, e)))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn load_store(path: &Path) -> Result<Vec<CanonicalRecord>> {
    require_file(path)?;
    let text = fs::read_to_string(path)?;
    let records = parse_store(&text)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

pub fn render_store(records: &[CanonicalRecord]) -> Result<String> {
    let mut text = serde_json::to_string_pretty(records)?;
    text.push('\n');
    Ok(text)
}

/// Default backup suffix: `.bak.<YYYYmmddHHMMSS>`.
pub fn timestamp_backup_suffix() -> String {
    format!(".bak.{}", Local::now().format("%Y%m%d%H%M%S"))
}

/// Backup location for `path`: the suffix is appended to the full file name,
/// so `memorials.json` + `.bak.1` gives `memorials.json.bak.1`.
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Where and how a store is written back.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub backup_suffix: String,
    pub dry_run: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            backup_suffix: timestamp_backup_suffix(),
            dry_run: false,
        }
    }
}

/// Result of a write-back attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Written { backup: Option<PathBuf> },
    DryRun,
}

/// Back up the current file (if any) and replace it with `records`.
pub fn save_store(path: &Path, records: &[CanonicalRecord], options: &StoreOptions) -> Result<SaveOutcome> {
    if options.dry_run {
        info!("Dry run: {} not written", path.display());
        return Ok(SaveOutcome::DryRun);
    }

    let text = render_store(records)?;

    let backup = if path.exists() {
        let backup = backup_path(path, &options.backup_suffix);
        fs::copy(path, &backup)?;
        info!("Backup written: {}", backup.display());
        Some(backup)
    } else {
        None
    };

    let tmp = backup_path(path, ".tmp");
    fs::write(&tmp, text)?;
    if let Err(e) = fs::rename(&tmp, path) {
        warn!("Failed to move {} into place: {}", tmp.display(), e);
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    info!("Wrote {} records to {}", records.len(), path.display());

    Ok(SaveOutcome::Written { backup })
}

/// Drop legacy top-level coordinate keys. Returns how many records changed.
pub fn prune_legacy_fields(records: &mut [CanonicalRecord]) -> usize {
    records
        .iter_mut()
        .map(|record| {
            let before = record.extra.len();
            for key in LEGACY_COORDINATE_KEYS {
                record.extra.remove(key);
            }
            usize::from(record.extra.len() != before)
        })
        .sum()
}
