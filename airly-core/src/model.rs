use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::error::{Error, Result};

/// A point on the map, latitude first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::Config(format!(
                "latitude {latitude} is out of range [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::Config(format!(
                "longitude {longitude} is out of range [-180, 180]"
            )));
        }
        Ok(Self { latitude, longitude })
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Parsed response of the point-measurement endpoint.
///
/// The documented shape is an array of measurement sets; the live v2
/// endpoint answers with a single set object. Both parse to the same
/// sequence.
#[derive(Debug, Clone, Default)]
pub struct MeasurementPayload {
    pub sets: Vec<MeasurementSet>,
}

// Only a JSON object takes the single-set path; a malformed array must fail
// instead of being read as one empty set.
impl<'de> Deserialize<'de> for MeasurementPayload {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sets = match serde_json::Value::deserialize(deserializer)? {
            value @ serde_json::Value::Array(_) => {
                serde_json::from_value::<Vec<MeasurementSet>>(value)
            }
            value @ serde_json::Value::Object(_) => {
                serde_json::from_value::<MeasurementSet>(value).map(|set| vec![set])
            }
            _ => return Err(D::Error::custom("expected an array or object of measurement sets")),
        }
        .map_err(D::Error::custom)?;

        Ok(Self { sets })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementSet {
    pub current: Snapshot,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub from_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub till_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub indexes: Vec<AirIndex>,
    #[serde(default)]
    pub values: Vec<NamedValue>,
}

/// A composite air-quality score such as CAQI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AirIndex {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub advice: Option<String>,
}

/// A single physical measurement, e.g. `PM10`.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedValue {
    pub name: String,
    #[serde(default)]
    pub value: Option<f64>,
}

impl MeasurementPayload {
    /// The `current` snapshot of the first measurement set.
    pub fn current(&self) -> Option<&Snapshot> {
        self.sets.first().map(|set| &set.current)
    }

    /// First index of the first measurement set.
    pub fn primary_index(&self) -> Result<&AirIndex> {
        self.current()
            .and_then(|current| current.indexes.first())
            .ok_or_else(|| Error::MissingField("indexes".to_string()))
    }

    /// Value of the first entry in `current.values` whose name is `name`.
    pub fn value(&self, name: &str) -> Result<f64> {
        self.current()
            .and_then(|current| current.values.iter().find(|v| v.name == name))
            .and_then(|v| v.value)
            .ok_or_else(|| Error::MissingField(name.to_string()))
    }
}

/// Auxiliary readings exposed next to the CAQI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Pressure,
    Humidity,
    Temperature,
    Pm25,
    Pm10,
}

impl Attribute {
    pub const fn all() -> &'static [Attribute] {
        &[
            Attribute::Pressure,
            Attribute::Humidity,
            Attribute::Temperature,
            Attribute::Pm25,
            Attribute::Pm10,
        ]
    }

    /// Key under which the attribute is exposed.
    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Pressure => "pressure",
            Attribute::Humidity => "humidity",
            Attribute::Temperature => "temperature",
            Attribute::Pm25 => "pm_2_5",
            Attribute::Pm10 => "pm_10",
        }
    }

    /// Name the provider uses in `current.values`.
    pub fn provider_name(&self) -> &'static str {
        match self {
            Attribute::Pressure => "PRESSURE",
            Attribute::Humidity => "HUMIDITY",
            Attribute::Temperature => "TEMPERATURE",
            Attribute::Pm25 => "PM25",
            Attribute::Pm10 => "PM10",
        }
    }
}

/// Display-ready view of the last successful refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorReading {
    pub state: Option<f64>,
    pub attributes: BTreeMap<&'static str, f64>,
    pub level: Option<String>,
    pub description: Option<String>,
    pub advice: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}
