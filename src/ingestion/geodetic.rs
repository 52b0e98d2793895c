//! Geodetic source - photo file names with decimal-degree coordinates

use super::csv_table::{cell, CsvTable};
use super::CandidateSource;
use crate::error::Result;
use crate::model::{CandidateCoordinate, CandidateRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

const NAME_ALIASES: [&str; 2] = ["Name", "name"];
const LAT_ALIASES: [&str; 3] = ["Latitude", "latitude", "Lat"];
const LNG_ALIASES: [&str; 4] = ["Longitude", "longitude", "Lon", "Lng"];

/// Column names for the geodetic table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeodeticColumns {
    pub file: String,
    pub lat: String,
    pub lng: String,
}

impl Default for GeodeticColumns {
    fn default() -> Self {
        Self {
            file: "Filename".to_string(),
            lat: "DecimalLat".to_string(),
            lng: "DecimalLng".to_string(),
        }
    }
}

pub struct GeodeticCsvSource {
    source_id: String,
    table: CsvTable,
    columns: GeodeticColumns,
}

impl GeodeticCsvSource {
    pub fn new(source_id: String, csv_text: &str, columns: GeodeticColumns) -> Result<Self> {
        Ok(Self {
            source_id,
            table: CsvTable::parse(csv_text)?,
            columns,
        })
    }

    pub fn from_path(path: &Path, columns: GeodeticColumns) -> Result<Self> {
        Ok(Self {
            source_id: path.display().to_string(),
            table: CsvTable::from_path(path)?,
            columns,
        })
    }

    /// Resolve a configured column, falling back to the known aliases.
    fn resolve(&self, configured: &str, aliases: &[&str]) -> Result<usize> {
        if let Some(idx) = self.table.column(&[configured]) {
            return Ok(idx);
        }
        let idx = self.table.require_column(aliases)?;
        warn!(
            "Column '{}' not found in {}, using '{}'",
            configured,
            self.source_id,
            self.table.headers()[idx]
        );
        Ok(idx)
    }
}

impl CandidateSource for GeodeticCsvSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn source_type(&self) -> &str {
        "geodetic-csv"
    }

    fn candidates(&self) -> Result<Vec<CandidateRecord>> {
        let file_idx = self.resolve(&self.columns.file, &NAME_ALIASES)?;
        let lat_idx = self.resolve(&self.columns.lat, &LAT_ALIASES)?;
        let lng_idx = self.resolve(&self.columns.lng, &LNG_ALIASES)?;
        info!(
            "Using file={} lat={} lng={}",
            self.table.headers()[file_idx],
            self.table.headers()[lat_idx],
            self.table.headers()[lng_idx]
        );

        Ok(self
            .table
            .rows()
            .map(|(line, row)| {
                // a row without coordinates cannot update anything
                let coordinate = match CandidateCoordinate::from_decimal_cells(
                    cell(row, lat_idx),
                    cell(row, lng_idx),
                ) {
                    CandidateCoordinate::Absent => CandidateCoordinate::Invalid(String::new()),
                    other => other,
                };
                CandidateRecord::new(cell(row, file_idx))
                    .with_coordinate(coordinate)
                    .at_row(line)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use crate::geo::GeoCoordinate;

    #[test]
    fn test_default_columns() {
        let csv = "Filename,DecimalLat,DecimalLng\nCenotaph.jpg,51.5,-0.125\nBridge.jpg,,\nGate.jpg,abc,1\n";
        let source = GeodeticCsvSource::new("t".into(), csv, GeodeticColumns::default()).unwrap();
        let candidates = source.candidates().unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(
            candidates[0].coordinate.valid(),
            Some(GeoCoordinate { lat: 51.5, lng: -0.125 })
        );
        assert!(matches!(candidates[1].coordinate, CandidateCoordinate::Invalid(_)));
        assert!(matches!(candidates[2].coordinate, CandidateCoordinate::Invalid(_)));
        assert_eq!(candidates[2].source_row, Some(4));
    }

    #[test]
    fn test_alias_fallback() {
        let csv = "Name,Latitude,Longitude\nCenotaph.HEIC,10,20\n";
        let source = GeodeticCsvSource::new("t".into(), csv, GeodeticColumns::default()).unwrap();
        let candidates = source.candidates().unwrap();
        assert_eq!(candidates[0].display_key, "Cenotaph.HEIC");
        assert_eq!(candidates[0].coordinate.valid(), GeoCoordinate::new(10.0, 20.0));
    }

    #[test]
    fn test_custom_columns() {
        let csv = "photo,y,x\nA.jpg,1,2\n";
        let columns = GeodeticColumns {
            file: "photo".into(),
            lat: "y".into(),
            lng: "x".into(),
        };
        let source = GeodeticCsvSource::new("t".into(), csv, columns).unwrap();
        assert_eq!(
            source.candidates().unwrap()[0].coordinate.valid(),
            GeoCoordinate::new(1.0, 2.0)
        );
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let csv = "Filename,DecimalLat\nA.jpg,1\n";
        let source = GeodeticCsvSource::new("t".into(), csv, GeodeticColumns::default()).unwrap();
        assert!(matches!(source.candidates(), Err(ReconcileError::Column(_))));
    }
}
