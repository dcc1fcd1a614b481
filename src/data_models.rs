use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed input timestamp format (ISO 8601 without zone). Not auto-detected.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Measured quantities of a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Voltage,
    Current,
    Temperature,
    Power,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Voltage => "voltage",
            Field::Current => "current",
            Field::Temperature => "temperature",
            Field::Power => "power",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record's power value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerSource {
    /// Read from the `power` column.
    Measured,
    /// Computed as `voltage * current` because no power value was supplied.
    Derived,
}

/// One successfully parsed sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    /// 1-based data row number in the source file (header excluded).
    pub row: usize,
    pub timestamp: NaiveDateTime,
    pub voltage: f64,   // V
    pub current: f64,   // A
    pub temperature: f64, // °C
    pub power: f64,     // W
    pub power_source: PowerSource,
}

impl SensorRecord {
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::Voltage => self.voltage,
            Field::Current => self.current,
            Field::Temperature => self.temperature,
            Field::Power => self.power,
        }
    }
}
