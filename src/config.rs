use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::data_models::Field;
use crate::errors::ConfigError;

/// Largest `precision` accepted; f64 carries about 15 significant decimal digits.
pub const MAX_PRECISION: u32 = 15;

/// Closed interval `[min, max]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    fn check(&self, field: Field) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ConfigError::InvalidBounds {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Physical plausibility ranges used by the validator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ValidationBounds {
    pub voltage: Range,     // V
    pub current: Range,     // A
    pub temperature: Range, // °C
    pub power: Range,       // W, applies to measured power
}

impl Default for ValidationBounds {
    fn default() -> Self {
        Self {
            voltage: Range::new(0.0, 50.0),
            current: Range::new(0.0, 15.0),
            temperature: Range::new(-20.0, 80.0),
            power: Range::new(0.0, 500.0),
        }
    }
}

impl ValidationBounds {
    pub fn range(&self, field: Field) -> Range {
        match field {
            Field::Voltage => self.voltage,
            Field::Current => self.current,
            Field::Temperature => self.temperature,
            Field::Power => self.power,
        }
    }

    /// Range a derived (`voltage * current`) power can legitimately take.
    pub fn derived_power(&self) -> Range {
        let corners = [
            self.voltage.min * self.current.min,
            self.voltage.min * self.current.max,
            self.voltage.max * self.current.min,
            self.voltage.max * self.current.max,
        ];
        let min = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let max = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Range::new(min, max)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for field in [Field::Voltage, Field::Current, Field::Temperature, Field::Power] {
            self.range(field).check(field)?;
        }
        Ok(())
    }
}

/// Source column names in the input CSV.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ColumnNames {
    pub timestamp: String,
    pub voltage: String,
    pub current: String,
    pub temperature: String,
    /// Optional column; power is derived when it is absent or empty.
    pub power: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_string(),
            voltage: "voltage".to_string(),
            current: "current".to_string(),
            temperature: "temperature".to_string(),
            power: "power".to_string(),
        }
    }
}

impl ColumnNames {
    /// Columns every row must carry.
    pub fn required(&self) -> [&str; 4] {
        [
            self.timestamp.as_str(),
            self.voltage.as_str(),
            self.current.as_str(),
            self.temperature.as_str(),
        ]
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    pub delimiter: String,
    /// Cell values treated as missing, compared after trimming.
    pub null_markers: Vec<String>,
    pub columns: ColumnNames,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            null_markers: vec!["NA".to_string(), "null".to_string()],
            columns: ColumnNames::default(),
        }
    }
}

impl ParserConfig {
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(c as u8),
            _ => Err(ConfigError::InvalidDelimiter(self.delimiter.clone())),
        }
    }
}

/// Top-level pipeline configuration. Every field has a default, so an empty
/// JSON object is a valid config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub recursive: bool,
    /// Batch worker threads; `None` uses one per CPU.
    pub workers: Option<usize>,
    /// Decimal places for `avg`, `std` and `total_energy_kwh` in reports.
    pub precision: Option<u32>,
    pub bounds: ValidationBounds,
    pub parser: ParserConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/incoming"),
            output_dir: PathBuf::from("data/processed"),
            recursive: false,
            workers: None,
            precision: None,
            bounds: ValidationBounds::default(),
            parser: ParserConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bounds.validate()?;
        self.parser.delimiter_byte()?;
        if let Some(precision) = self.precision {
            if precision > MAX_PRECISION {
                return Err(ConfigError::InvalidPrecision {
                    precision,
                    max: MAX_PRECISION,
                });
            }
        }
        Ok(())
    }
}

/// Load the pipeline configuration from a JSON file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    let reader = BufReader::new(file);

    let config: PipelineConfig =
        serde_json::from_reader(reader).map_err(|e| ConfigError::JsonParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

    config.validate()?;
    Ok(config)
}
