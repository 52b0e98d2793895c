//! Metadata tables - raw image metadata exports decoded into coordinates
//!
//! Two export shapes are understood:
//! - a `Filename` + `GPSInfo` table, where `GPSInfo` holds a serialized EXIF
//!   mapping (possibly spilled across cells by a naive CSV writer)
//! - an exiftool table with `SourceFile`, `GPSLatitude`, `GPSLatitudeRef`,
//!   `GPSLongitude` and `GPSLongitudeRef` text columns

use super::csv_table::{cell, CsvTable};
use super::geodetic::GeodeticColumns;
use super::CandidateSource;
use crate::error::{ReconcileError, Result};
use crate::geo::{parse_dms_text, parse_gps_info, stitch_gps_cells, GeoCoordinate};
use crate::model::{CandidateCoordinate, CandidateRecord};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataFormat {
    GpsInfo,
    Exiftool,
}

impl MetadataFormat {
    /// Guess the export shape from the header row.
    pub fn detect(table: &CsvTable) -> Result<Self> {
        if table.column(&["GPSInfo"]).is_some() {
            Ok(Self::GpsInfo)
        } else if table.column(&["GPSLatitude"]).is_some() {
            Ok(Self::Exiftool)
        } else {
            Err(ReconcileError::Column(format!(
                "neither GPSInfo nor GPSLatitude found in header {:?}",
                table.headers()
            )))
        }
    }
}

impl fmt::Display for MetadataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GpsInfo => f.write_str("gps-info"),
            Self::Exiftool => f.write_str("exiftool"),
        }
    }
}

impl FromStr for MetadataFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gps-info" | "gpsinfo" => Ok(Self::GpsInfo),
            "exiftool" => Ok(Self::Exiftool),
            other => Err(format!("unknown metadata format: {}", other)),
        }
    }
}

/// One photo with its decoded position, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPhoto {
    pub filename: String,
    pub coordinate: Option<GeoCoordinate>,
    pub source_row: usize,
}

pub struct MetadataTableSource {
    source_id: String,
    table: CsvTable,
    format: MetadataFormat,
}

impl MetadataTableSource {
    pub fn new(source_id: String, csv_text: &str, format: Option<MetadataFormat>) -> Result<Self> {
        Self::with_table(source_id, CsvTable::parse(csv_text)?, format)
    }

    pub fn from_path(path: &Path, format: Option<MetadataFormat>) -> Result<Self> {
        Self::with_table(path.display().to_string(), CsvTable::from_path(path)?, format)
    }

    fn with_table(source_id: String, table: CsvTable, format: Option<MetadataFormat>) -> Result<Self> {
        let format = match format {
            Some(format) => format,
            None => MetadataFormat::detect(&table)?,
        };
        Ok(Self {
            source_id,
            table,
            format,
        })
    }

    pub fn format(&self) -> MetadataFormat {
        self.format
    }

    /// Decode every row. Rows too short to hold the name and GPS columns are
    /// dropped; undecodable GPS data yields `coordinate: None`.
    pub fn decode(&self) -> Result<Vec<DecodedPhoto>> {
        match self.format {
            MetadataFormat::GpsInfo => self.decode_gps_info(),
            MetadataFormat::Exiftool => self.decode_exiftool(),
        }
    }

    fn decode_gps_info(&self) -> Result<Vec<DecodedPhoto>> {
        let file_idx = self.table.require_column(&["Filename"])?;
        let gps_idx = self.table.require_column(&["GPSInfo"])?;

        let mut photos = Vec::new();
        for (line, row) in self.table.rows() {
            if row.len() <= file_idx.max(gps_idx) {
                continue;
            }
            let cells: Vec<&str> = row.iter().collect();
            let blob = stitch_gps_cells(&cells, gps_idx);
            let coordinate = parse_gps_info(&blob);
            if coordinate.is_none() && !blob.trim().is_empty() {
                debug!("Row {}: GPSInfo not decodable: {}", line, blob);
            }
            photos.push(DecodedPhoto {
                filename: cell(row, file_idx).to_string(),
                coordinate,
                source_row: line,
            });
        }
        Ok(photos)
    }

    fn decode_exiftool(&self) -> Result<Vec<DecodedPhoto>> {
        let file_idx = self.table.require_column(&["SourceFile", "Filename"])?;
        let lat_idx = self.table.require_column(&["GPSLatitude"])?;
        let lat_ref_idx = self.table.require_column(&["GPSLatitudeRef"])?;
        let lng_idx = self.table.require_column(&["GPSLongitude"])?;
        let lng_ref_idx = self.table.require_column(&["GPSLongitudeRef"])?;

        Ok(self
            .table
            .rows()
            .map(|(line, row)| {
                let lat = parse_dms_text(cell(row, lat_idx), cell(row, lat_ref_idx));
                let lng = parse_dms_text(cell(row, lng_idx), cell(row, lng_ref_idx));
                let coordinate = lat
                    .zip(lng)
                    .and_then(|(lat, lng)| GeoCoordinate::new(lat, lng));
                DecodedPhoto {
                    filename: cell(row, file_idx).to_string(),
                    coordinate,
                    source_row: line,
                }
            })
            .collect())
    }
}

impl CandidateSource for MetadataTableSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn source_type(&self) -> &str {
        match self.format {
            MetadataFormat::GpsInfo => "gps-info-table",
            MetadataFormat::Exiftool => "exiftool-table",
        }
    }

    fn candidates(&self) -> Result<Vec<CandidateRecord>> {
        Ok(self
            .decode()?
            .into_iter()
            .map(|photo| {
                let coordinate = match photo.coordinate {
                    Some(coord) => CandidateCoordinate::Valid(coord),
                    None => CandidateCoordinate::Invalid(String::new()),
                };
                CandidateRecord::new(photo.filename)
                    .with_coordinate(coordinate)
                    .at_row(photo.source_row)
            })
            .collect())
    }
}

/// Write decoded photos as a geodetic CSV (blank cells where undecodable).
/// Returns the number of rows that carry a coordinate.
pub fn write_coordinates_csv(path: &Path, photos: &[DecodedPhoto], columns: &GeodeticColumns) -> Result<usize> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([&columns.file, &columns.lat, &columns.lng])?;

    let mut decoded = 0;
    for photo in photos {
        let (lat, lng) = match photo.coordinate {
            Some(coord) => {
                decoded += 1;
                (coord.lat.to_string(), coord.lng.to_string())
            }
            None => (String::new(), String::new()),
        };
        writer.write_record([photo.filename.as_str(), lat.as_str(), lng.as_str()])?;
    }
    writer.flush()?;

    info!("Wrote {} (decoded {} rows)", path.display(), decoded);
    Ok(decoded)
}
