//! Geodetic coordinate decoding
//!
//! Two encodings reach us from image metadata exports:
//! - exiftool style text: `51 deg 30' 12.34"` with a separate `N`/`S` ref
//! - a serialized EXIF GPSInfo mapping, e.g.
//!   `{1: 'N', 2: (51.0, 30.0, 12.34), 3: 'W', 4: (0/1, 7/1, 3000/100)}`
//!
//! Every decoder returns `None` on malformed input. A corrupt tag must never
//! turn into a plausible-looking coordinate such as (0, 0).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Decimal places kept when decoding rational (EXIF) components.
pub const RATIONAL_DECIMAL_PLACES: i32 = 8;

/// Tag marking the longitude DMS entry, the last one a split blob needs.
const GPS_DONE_MARKER: &str = "4:";

lazy_static! {
    static ref DMS_TEXT: Regex =
        Regex::new(r#"^\s*([\d.]+)\s*deg\s*([\d.]+)'\s*([\d.]+)"\s*([NSEWnsew])?\s*$"#).unwrap();
    static ref LAT_REF: Regex = Regex::new(r#"(?i)[{,]\s*1:\s*['"]?([NS])['"]?"#).unwrap();
    static ref LAT_DMS: Regex = Regex::new(r"[{,]\s*2:\s*\(([^)]+)\)").unwrap();
    static ref LON_REF: Regex = Regex::new(r#"(?i)[{,]\s*3:\s*['"]?([EW])['"]?"#).unwrap();
    static ref LON_DMS: Regex = Regex::new(r"[{,]\s*4:\s*\(([^)]+)\)").unwrap();
}

/// A decimal-degree position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub lat: f64,
    pub lng: f64,
}

impl GeoCoordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        Some(Self { lat, lng })
    }

    /// True when both components have the same bit pattern as `other`.
    pub fn bit_identical(&self, other: &GeoCoordinate) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

/// Hemisphere sign from a reference such as `N`, `south`, `W`.
///
/// Only the first character is looked at. Anything that is not one of the
/// four compass letters is rejected.
fn hemisphere_sign(hemisphere_ref: &str) -> Option<f64> {
    match hemisphere_ref.trim().chars().next()?.to_ascii_uppercase() {
        'N' | 'E' => Some(1.0),
        'S' | 'W' => Some(-1.0),
        _ => None,
    }
}

/// Combine degree/minute/second components into signed decimal degrees.
///
/// Missing trailing components count as zero; at least the degree must be
/// present. Components beyond the third are ignored.
pub fn dms_to_decimal(components: &[f64], hemisphere_ref: &str) -> Option<f64> {
    if components.is_empty() || components.iter().any(|c| !c.is_finite()) {
        return None;
    }
    let sign = hemisphere_sign(hemisphere_ref)?;
    let degrees = components[0];
    let minutes = components.get(1).copied().unwrap_or(0.0);
    let seconds = components.get(2).copied().unwrap_or(0.0);
    let decimal = degrees + minutes / 60.0 + seconds / 3600.0;
    decimal.is_finite().then_some(sign * decimal)
}

/// Decode exiftool-style text such as `51 deg 30' 0.00"`, optionally followed
/// by a hemisphere letter that is used when `hemisphere_ref` is blank.
pub fn parse_dms_text(text: &str, hemisphere_ref: &str) -> Option<f64> {
    let caps = DMS_TEXT.captures(text)?;
    let mut components = [0.0f64; 3];
    for (slot, idx) in components.iter_mut().zip(1..=3) {
        *slot = caps.get(idx)?.as_str().parse().ok()?;
    }
    // exiftool may append the hemisphere letter; the ref column still wins
    let hemisphere_ref = match (hemisphere_ref.trim(), caps.get(4)) {
        ("", Some(inline)) => inline.as_str(),
        (column, _) => column,
    };
    dms_to_decimal(&components, hemisphere_ref)
}

/// Parse a single EXIF component: a plain number or a rational `a/b`.
fn parse_rational(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    match token.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            Some(num / den)
        }
        None => token.parse().ok(),
    }
}

/// Decode a comma-separated DMS triple of numbers or rationals, as found
/// inside a GPSInfo tuple (`51/1, 30/1, 1234/100`).
///
/// The result is rounded to [`RATIONAL_DECIMAL_PLACES`] so repeated runs
/// compare equal.
pub fn parse_rational_dms(tuple: &str, hemisphere_ref: &str) -> Option<f64> {
    let components = tuple
        .split(',')
        .take(3)
        .map(parse_rational)
        .collect::<Option<Vec<f64>>>()?;
    dms_to_decimal(&components, hemisphere_ref).map(|v| round_to(v, RATIONAL_DECIMAL_PLACES))
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Decode a serialized GPSInfo mapping into a coordinate.
///
/// All four tags (1..=4) must be present and decodable, otherwise the blob
/// carries no coordinate.
pub fn parse_gps_info(blob: &str) -> Option<GeoCoordinate> {
    if blob.trim().is_empty() {
        return None;
    }
    let lat_ref = LAT_REF.captures(blob)?.get(1)?.as_str();
    let lat_dms = LAT_DMS.captures(blob)?.get(1)?.as_str();
    let lon_ref = LON_REF.captures(blob)?.get(1)?.as_str();
    let lon_dms = LON_DMS.captures(blob)?.get(1)?.as_str();

    let lat = parse_rational_dms(lat_dms, lat_ref)?;
    let lng = parse_rational_dms(lon_dms, lon_ref)?;
    GeoCoordinate::new(lat, lng)
}

/// Rebuild a GPSInfo blob that a naive CSV export spread over several cells.
///
/// Starting at `gps_idx`, cells are appended (comma-joined) until the
/// accumulated text contains the longitude tag. If no later cell supplies it
/// the original cell is returned unchanged.
pub fn stitch_gps_cells<S: AsRef<str>>(cells: &[S], gps_idx: usize) -> String {
    let Some(first) = cells.get(gps_idx).map(|c| c.as_ref()) else {
        return String::new();
    };
    let looks_split = !first.is_empty()
        && (first.contains('{') || first.contains("1:"))
        && !first.contains(GPS_DONE_MARKER);
    if !looks_split {
        return first.to_string();
    }

    let mut accumulated = first.to_string();
    for extra in &cells[gps_idx + 1..] {
        accumulated.push(',');
        accumulated.push_str(extra.as_ref());
        if accumulated.contains(GPS_DONE_MARKER) {
            return accumulated;
        }
    }
    first.to_string()
}
