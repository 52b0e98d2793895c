//! Descriptive source - the curated memorial table (name, zone, text)

use super::csv_table::{cell, optional_cell, CsvTable};
use super::CandidateSource;
use crate::error::Result;
use crate::model::CandidateRecord;
use std::path::Path;

pub const NAME_COLUMNS: [&str; 2] = ["Memorial", "memorial"];
pub const ZONE_COLUMNS: [&str; 2] = ["Zone", "zone"];
pub const TEXT_COLUMNS: [&str; 2] = ["Text", "text"];

pub struct DescriptiveCsvSource {
    source_id: String,
    table: CsvTable,
}

impl DescriptiveCsvSource {
    pub fn new(source_id: String, csv_text: &str) -> Result<Self> {
        Ok(Self {
            source_id,
            table: CsvTable::parse(csv_text)?,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self {
            source_id: path.display().to_string(),
            table: CsvTable::from_path(path)?,
        })
    }
}

impl CandidateSource for DescriptiveCsvSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn source_type(&self) -> &str {
        "descriptive-csv"
    }

    fn candidates(&self) -> Result<Vec<CandidateRecord>> {
        let name_idx = self.table.require_column(&NAME_COLUMNS)?;
        let zone_idx = self.table.column(&ZONE_COLUMNS);
        let text_idx = self.table.column(&TEXT_COLUMNS);

        Ok(self
            .table
            .rows()
            .map(|(line, row)| CandidateRecord {
                display_key: cell(row, name_idx).to_string(),
                zone: optional_cell(row, zone_idx),
                description: optional_cell(row, text_idx),
                source_row: Some(line),
                ..Default::default()
            })
            .collect())
    }
}
