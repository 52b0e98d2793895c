use crate::geo::GeoCoordinate;
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A memorial as persisted in the canonical store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Opaque reference used by the display app; never touched here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<Value>,
    #[serde(
        default,
        deserialize_with = "deserialize_location",
        serialize_with = "serialize_location"
    )]
    pub location: Option<GeoCoordinate>,
    /// Keys this crate does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanonicalRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone: None,
            description: None,
            map: None,
            location: None,
            extra: Map::new(),
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_location(mut self, location: GeoCoordinate) -> Self {
        self.location = Some(location);
        self
    }

    pub fn has_zone(&self) -> bool {
        is_populated(&self.zone)
    }

    pub fn has_description(&self) -> bool {
        is_populated(&self.description)
    }
}

fn is_populated(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Accepts `{"lat": 1.0, "lng": 2.0}`, numeric strings, and the placeholder
/// shapes left by earlier tooling (`{}`, `{"lat": "", "lng": ""}`, `null`).
/// Anything placeholder-like or out of range reads as no location.
///
/// The location is normalized on write: only `lat` and `lng` are kept.
fn deserialize_location<'de, D>(deserializer: D) -> Result<Option<GeoCoordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::Object(obj)) = raw else {
        return Ok(None);
    };
    let lat = obj.get("lat").and_then(coordinate_component);
    let lng = obj.get("lng").and_then(coordinate_component);
    Ok(match (lat, lng) {
        (Some(lat), Some(lng)) => GeoCoordinate::new(lat, lng),
        _ => None,
    })
}

fn coordinate_component(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn serialize_location<S>(location: &Option<GeoCoordinate>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match location {
        Some(coord) => coord.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Coordinate slot of a candidate row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CandidateCoordinate {
    #[default]
    Absent,
    Valid(GeoCoordinate),
    /// Present in the source but not decodable; the raw text is kept for logs.
    Invalid(String),
}

impl CandidateCoordinate {
    /// Parse a pair of decimal-degree cells. Two blank cells mean absent.
    pub fn from_decimal_cells(lat: &str, lng: &str) -> Self {
        let (lat, lng) = (lat.trim(), lng.trim());
        if lat.is_empty() && lng.is_empty() {
            return Self::Absent;
        }
        let parsed = lat
            .parse::<f64>()
            .ok()
            .zip(lng.parse::<f64>().ok())
            .and_then(|(lat, lng)| GeoCoordinate::new(lat, lng));
        match parsed {
            Some(coord) => Self::Valid(coord),
            None => Self::Invalid(format!("{}, {}", lat, lng)),
        }
    }

    pub fn valid(&self) -> Option<GeoCoordinate> {
        match self {
            Self::Valid(coord) => Some(*coord),
            _ => None,
        }
    }
}

/// One row from an ingestion source, alive for a single run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidateRecord {
    /// File name or memorial title as it appears in the source.
    pub display_key: String,
    pub zone: Option<String>,
    pub description: Option<String>,
    pub coordinate: CandidateCoordinate,
    /// 1-based source line (header is line 1), for tracing.
    pub source_row: Option<usize>,
}

impl CandidateRecord {
    pub fn new(display_key: impl Into<String>) -> Self {
        Self {
            display_key: display_key.into(),
            ..Default::default()
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_coordinate(mut self, coordinate: CandidateCoordinate) -> Self {
        self.coordinate = coordinate;
        self
    }

    pub fn with_location(self, lat: f64, lng: f64) -> Self {
        let coordinate = match GeoCoordinate::new(lat, lng) {
            Some(coord) => CandidateCoordinate::Valid(coord),
            None => CandidateCoordinate::Invalid(format!("{}, {}", lat, lng)),
        };
        self.with_coordinate(coordinate)
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.source_row = Some(row);
        self
    }
}
