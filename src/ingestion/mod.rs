//! Ingestion Module - turns tabular exports into candidate records
//!
//! Sources:
//! - descriptive CSV (memorial name, zone, text)
//! - geodetic CSV (photo file name, decimal lat/lng)
//! - raw image metadata tables (GPSInfo blobs or exiftool DMS text)

pub mod csv_table;
pub mod descriptive;
pub mod geodetic;
pub mod metadata_table;

pub use csv_table::CsvTable;
pub use descriptive::DescriptiveCsvSource;
pub use geodetic::{GeodeticColumns, GeodeticCsvSource};
pub use metadata_table::{write_coordinates_csv, DecodedPhoto, MetadataFormat, MetadataTableSource};

use crate::error::Result;
use crate::model::CandidateRecord;

/// A source of candidate records for one reconciliation run
pub trait CandidateSource {
    /// Read every candidate row. Structural problems (missing columns) are
    /// errors; bad individual rows come back as candidates for the
    /// reconciler to count and skip.
    fn candidates(&self) -> Result<Vec<CandidateRecord>>;

    /// Source identifier (usually the file path)
    fn source_id(&self) -> &str;

    fn source_type(&self) -> &str;
}
