use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::{ColumnNames, ParserConfig};
use crate::data_models::{PowerSource, SensorRecord, TIMESTAMP_FORMAT};
use crate::errors::{ParseError, PipelineError};

/// Anything that can look up a raw cell value by column name.
pub trait RowSource {
    fn field(&self, column: &str) -> Option<&str>;
}

impl RowSource for HashMap<String, String> {
    fn field(&self, column: &str) -> Option<&str> {
        self.get(column).map(String::as_str)
    }
}

impl RowSource for HashMap<&str, &str> {
    fn field(&self, column: &str) -> Option<&str> {
        self.get(column).copied()
    }
}

/// Header name -> column position.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut positions = HashMap::new();
        for (index, header) in headers.iter().enumerate() {
            // First occurrence wins on duplicate headers
            positions.entry(header.trim().to_string()).or_insert(index);
        }
        Self { positions }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.keys().all(|name| name.is_empty())
    }
}

/// A CSV data row viewed through its file's header.
pub struct HeaderedRow<'a> {
    index: &'a ColumnIndex,
    record: &'a StringRecord,
}

impl<'a> HeaderedRow<'a> {
    pub fn new(index: &'a ColumnIndex, record: &'a StringRecord) -> Self {
        Self { index, record }
    }
}

impl RowSource for HeaderedRow<'_> {
    fn field(&self, column: &str) -> Option<&str> {
        self.index
            .position(column)
            .and_then(|position| self.record.get(position))
    }
}

/// Turns raw rows into typed sensor records.
#[derive(Debug, Clone)]
pub struct RecordParser {
    columns: ColumnNames,
    null_markers: Vec<String>,
}

impl RecordParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            columns: config.columns.clone(),
            null_markers: config.null_markers.clone(),
        }
    }

    pub fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    /// Parse one row. `row_number` is the 1-based data row, kept for diagnostics.
    pub fn parse_row<R: RowSource + ?Sized>(
        &self,
        row: &R,
        row_number: usize,
    ) -> Result<SensorRecord, ParseError> {
        let timestamp = self.parse_timestamp(self.required(row, &self.columns.timestamp)?)?;
        let voltage = self.parse_number(&self.columns.voltage, self.required(row, &self.columns.voltage)?)?;
        let current = self.parse_number(&self.columns.current, self.required(row, &self.columns.current)?)?;
        let temperature = self.parse_number(
            &self.columns.temperature,
            self.required(row, &self.columns.temperature)?,
        )?;

        let (power, power_source) = match self.optional(row, &self.columns.power) {
            Some(raw) => (self.parse_number(&self.columns.power, raw)?, PowerSource::Measured),
            None => (voltage * current, PowerSource::Derived),
        };

        Ok(SensorRecord {
            row: row_number,
            timestamp,
            voltage,
            current,
            temperature,
            power,
            power_source,
        })
    }

    fn is_null(&self, value: &str) -> bool {
        value.is_empty() || self.null_markers.iter().any(|marker| marker == value)
    }

    fn required<'r, R: RowSource + ?Sized>(
        &self,
        row: &'r R,
        column: &str,
    ) -> Result<&'r str, ParseError> {
        let raw = row.field(column).ok_or_else(|| ParseError::MissingColumn {
            column: column.to_string(),
        })?;
        let trimmed = raw.trim();
        if self.is_null(trimmed) {
            return Err(ParseError::EmptyValue {
                column: column.to_string(),
            });
        }
        Ok(trimmed)
    }

    fn optional<'r, R: RowSource + ?Sized>(&self, row: &'r R, column: &str) -> Option<&'r str> {
        row.field(column)
            .map(str::trim)
            .filter(|value| !self.is_null(value))
    }

    fn parse_number(&self, column: &str, value: &str) -> Result<f64, ParseError> {
        value.parse::<f64>().map_err(|_| ParseError::NonNumeric {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    fn parse_timestamp(&self, value: &str) -> Result<NaiveDateTime, ParseError> {
        NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
            ParseError::BadTimestamp {
                value: value.to_string(),
                format: TIMESTAMP_FORMAT.to_string(),
                message: e.to_string(),
            }
        })
    }
}

/// Streaming CSV input with its header already read and checked.
pub struct CsvSource<R: Read> {
    path: PathBuf,
    reader: csv::Reader<R>,
    index: ColumnIndex,
}

impl CsvSource<File> {
    pub fn open(path: &Path, config: &ParserConfig) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| PipelineError::OpenInput {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_reader(file, path, config)
    }
}

impl<R: Read> CsvSource<R> {
    /// Wrap a reader and read its header. Fails when the header is absent, undecodable,
    /// or shares no column with the required set (data without a header row).
    pub fn from_reader(rdr: R, path: &Path, config: &ParserConfig) -> Result<Self, PipelineError> {
        let delimiter = config.delimiter_byte()?;
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(rdr);

        let headers = reader
            .headers()
            .map_err(|e| csv_error(path, e))?
            .clone();
        let index = ColumnIndex::from_headers(&headers);

        if index.is_empty() {
            return Err(PipelineError::MissingHeader {
                path: path.to_path_buf(),
            });
        }

        let required = config.columns.required();
        if !required.iter().any(|column| index.contains(column)) {
            return Err(PipelineError::MissingHeader {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            index,
        })
    }

    pub fn index(&self) -> &ColumnIndex {
        &self.index
    }

    /// Required columns absent from the header. Rows then fail individually.
    pub fn missing_columns(&self, columns: &ColumnNames) -> Vec<String> {
        columns
            .required()
            .iter()
            .filter(|column| !self.index.contains(column))
            .map(|column| column.to_string())
            .collect()
    }

    /// Read the next data row into `record`. Returns `Ok(false)` at end of input.
    pub fn next_record(&mut self, record: &mut StringRecord) -> Result<bool, PipelineError> {
        self.reader
            .read_record(record)
            .map_err(|e| csv_error(&self.path, e))
    }
}

fn csv_error(path: &Path, err: csv::Error) -> PipelineError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    match err.into_kind() {
        csv::ErrorKind::Io(source) => PipelineError::ReadInput {
            path: path.to_path_buf(),
            source,
        },
        csv::ErrorKind::Utf8 { err, .. } => PipelineError::Undecodable {
            path: path.to_path_buf(),
            line,
            message: err.to_string(),
        },
        other => PipelineError::Undecodable {
            path: path.to_path_buf(),
            line,
            message: format!("{:?}", other),
        },
    }
}
