//! CSV Table - flexible reader shared by every tabular source

use crate::error::{ReconcileError, Result};
use crate::store::require_file;
use csv::{ReaderBuilder, StringRecord};
use std::fs;
use std::path::Path;
use tracing::debug;

/// A parsed CSV document: trimmed headers plus data rows with their line
/// numbers. Rows may be ragged; metadata exports are not always rectangular.
#[derive(Debug, Clone)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<(usize, StringRecord)>,
}

impl CsvTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        require_file(path)?;
        let bytes = fs::read(path)?;
        // exports from some tools are not clean UTF-8
        let text = String::from_utf8_lossy(&bytes);
        Self::parse(&text)
    }

    pub fn parse(csv_text: &str) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_text.as_bytes());

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect::<Vec<_>>();
        debug!("CSV columns: {:?}", headers);

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
            rows.push((line, record));
        }

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = (usize, &StringRecord)> {
        self.rows.iter().map(|(line, record)| (*line, record))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header matching any of `names` (exact, in order).
    pub fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.headers.iter().position(|h| h == name))
    }

    pub fn require_column(&self, names: &[&str]) -> Result<usize> {
        self.column(names).ok_or_else(|| {
            ReconcileError::Column(format!(
                "none of {:?} found in header {:?}",
                names, self.headers
            ))
        })
    }
}

/// Trimmed cell value; missing trailing cells read as empty.
pub fn cell<'a>(record: &'a StringRecord, idx: usize) -> &'a str {
    record.get(idx).unwrap_or("").trim()
}

/// Like [`cell`] but `None` for a blank or absent column.
pub fn optional_cell(record: &StringRecord, idx: Option<usize>) -> Option<String> {
    let value = cell(record, idx?);
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_trimmed_and_bom_stripped() {
        let table = CsvTable::parse("\u{feff}Memorial , Zone\nA,1\n").unwrap();
        assert_eq!(table.headers(), &["Memorial".to_string(), "Zone".to_string()]);
        assert_eq!(table.column(&["memorial", "Memorial"]), Some(0));
    }

    #[test]
    fn test_ragged_and_blank_rows() {
        let table = CsvTable::parse("a,b\n1\n,\n2,3,4\n").unwrap();
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, 2);
        assert_eq!(cell(rows[0].1, 1), "");
        assert_eq!(rows[1].0, 4);
        assert_eq!(cell(rows[1].1, 2), "4");
    }

    #[test]
    fn test_require_column_error() {
        let table = CsvTable::parse("a,b\n").unwrap();
        assert!(table.is_empty());
        assert!(matches!(
            table.require_column(&["Filename"]),
            Err(ReconcileError::Column(_))
        ));
    }

    #[test]
    fn test_optional_cell() {
        let table = CsvTable::parse("a,b\n x ,  \n").unwrap();
        let (_, row) = table.rows().next().unwrap();
        assert_eq!(optional_cell(row, Some(0)), Some("x".to_string()));
        assert_eq!(optional_cell(row, Some(1)), None);
        assert_eq!(optional_cell(row, None), None);
    }
}
