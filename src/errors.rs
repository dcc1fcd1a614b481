use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::data_models::Field;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config file {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse JSON configuration in {path}: {source}")]
    JsonParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Configuration file not found at {path}")]
    NotFound { path: PathBuf },
    #[error("Invalid bounds for '{field}': [{min}, {max}]")]
    InvalidBounds { field: Field, min: f64, max: f64 },
    #[error("Invalid delimiter '{0}': must be a single ASCII character")]
    InvalidDelimiter(String),
    #[error("Invalid precision {precision}: at most {max} decimal places are supported")]
    InvalidPrecision { precision: u32, max: u32 },
}

/// Coarse classification of file-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    FileUnreadable,
    OutputWriteFailure,
    Configuration,
}

/// File-level failures. Any of these ends processing of the file it occurred in.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot open input file {path}: {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Input file {path} has no header row")]
    MissingHeader { path: PathBuf },
    #[error("Input file {path} has a header but no data rows")]
    NoDataRows { path: PathBuf },
    #[error("Input file {path} is not valid UTF-8 (line {line}): {message}")]
    Undecodable {
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("IO error reading data file {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Output directory {path} is not writable: {source}")]
    OutputDirUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write report {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to serialize report for {path}: {source}")]
    SerializeReport {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Report {target} is already claimed by {claimed_by}; not processing {path}")]
    DuplicateOutput {
        path: PathBuf,
        target: PathBuf,
        claimed_by: PathBuf,
    },
    #[error("Cannot scan input directory {path}: {source}")]
    InputDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::OpenInput { .. }
            | PipelineError::MissingHeader { .. }
            | PipelineError::NoDataRows { .. }
            | PipelineError::Undecodable { .. }
            | PipelineError::ReadInput { .. }
            | PipelineError::InputDir { .. } => ErrorKind::FileUnreadable,
            PipelineError::OutputDirUnwritable { .. }
            | PipelineError::OutputWrite { .. }
            | PipelineError::DuplicateOutput { .. }
            | PipelineError::SerializeReport { .. } => ErrorKind::OutputWriteFailure,
            PipelineError::Config(_) => ErrorKind::Configuration,
        }
    }

    /// True when the condition applies to every file of a batch, not just the current one.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::OutputDirUnwritable { .. }
                | PipelineError::InputDir { .. }
                | PipelineError::Config(_)
        )
    }
}

/// Row-level parse failures. Counted as invalid rows, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("missing column '{column}'")]
    MissingColumn { column: String },
    #[error("empty value in column '{column}'")]
    EmptyValue { column: String },
    #[error("non-numeric value '{value}' in column '{column}'")]
    NonNumeric { column: String, value: String },
    #[error("unparseable timestamp '{value}' (expected format '{format}'): {message}")]
    BadTimestamp {
        value: String,
        format: String,
        message: String,
    },
}

/// Row-level plausibility failures. Counted as invalid rows, never fatal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} value {value} is not finite")]
    NonFinite { field: Field, value: f64 },
    #[error("{field} value {value} out of range ({min} to {max})")]
    OutOfRange {
        field: Field,
        value: f64,
        min: f64,
        max: f64,
    },
}

impl ValidationError {
    pub fn field(&self) -> Field {
        match self {
            ValidationError::NonFinite { field, .. } | ValidationError::OutOfRange { field, .. } => {
                *field
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dir_is_batch_fatal() {
        let err = PipelineError::OutputDirUnwritable {
            path: PathBuf::from("/nope"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_batch_fatal());
        assert_eq!(err.kind(), ErrorKind::OutputWriteFailure);
    }

    #[test]
    fn test_unreadable_file_is_not_batch_fatal() {
        let err = PipelineError::NoDataRows {
            path: PathBuf::from("empty.csv"),
        };
        assert!(!err.is_batch_fatal());
        assert_eq!(err.kind(), ErrorKind::FileUnreadable);
    }

    #[test]
    fn test_duplicate_output_is_file_level() {
        let err = PipelineError::DuplicateOutput {
            path: PathBuf::from("in/site_b/day.csv"),
            target: PathBuf::from("out/day.json"),
            claimed_by: PathBuf::from("in/day.csv"),
        };
        assert!(!err.is_batch_fatal());
        assert_eq!(err.kind(), ErrorKind::OutputWriteFailure);
        assert!(err.to_string().contains("in/day.csv"));
    }

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::OutOfRange {
            field: Field::Voltage,
            value: 999.0,
            min: 0.0,
            max: 50.0,
        };
        assert_eq!(err.field(), Field::Voltage);
        assert!(err.to_string().contains("voltage"));
    }
}
