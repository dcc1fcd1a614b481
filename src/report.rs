use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::errors::PipelineError;
use crate::metrics::MetricsSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Partial,
    Failed,
}

impl ReportStatus {
    /// Status of a file that was read to the end.
    pub fn for_counts(records_invalid: usize) -> Self {
        if records_invalid == 0 {
            ReportStatus::Success
        } else {
            ReportStatus::Partial
        }
    }
}

/// Per-file processing report. Field order here is the key order of the JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub input_file: String,
    pub processed_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub records_processed: usize,
    pub records_invalid: usize,
    pub metrics: Option<MetricsSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingReport {
    pub fn completed(
        input_file: String,
        processed_at: DateTime<Utc>,
        records_processed: usize,
        records_invalid: usize,
        metrics: Option<MetricsSummary>,
    ) -> Self {
        Self {
            input_file,
            processed_at,
            status: ReportStatus::for_counts(records_invalid),
            records_processed,
            records_invalid,
            metrics,
            error: None,
        }
    }

    pub fn failed(input_file: String, processed_at: DateTime<Utc>, error: &PipelineError) -> Self {
        Self {
            input_file,
            processed_at,
            status: ReportStatus::Failed,
            records_processed: 0,
            records_invalid: 0,
            metrics: None,
            error: Some(error.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Name recorded as `input_file` in a report.
pub fn input_file_name(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string())
}

/// Writes reports into one output directory, one JSON file per input.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<input stem>.json`
    pub fn report_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        self.output_dir.join(format!("{}.json", stem))
    }

    /// Create the output directory if needed and prove it accepts new files.
    pub fn ensure_writable(&self) -> Result<(), PipelineError> {
        let unwritable = |source| PipelineError::OutputDirUnwritable {
            path: self.output_dir.clone(),
            source,
        };
        fs::create_dir_all(&self.output_dir).map_err(unwritable)?;
        NamedTempFile::new_in(&self.output_dir).map_err(unwritable)?;
        Ok(())
    }

    /// Persist `report` for `input`. The JSON is written to a temporary file in the
    /// output directory and renamed into place, so readers never see a partial file.
    pub fn write(&self, report: &ProcessingReport, input: &Path) -> Result<PathBuf, PipelineError> {
        let path = self.report_path(input);
        let json = report.to_json().map_err(|e| PipelineError::SerializeReport {
            path: path.clone(),
            source: e,
        })?;

        let unwritable = |source| PipelineError::OutputDirUnwritable {
            path: self.output_dir.clone(),
            source,
        };
        fs::create_dir_all(&self.output_dir).map_err(unwritable)?;
        let mut tmp = NamedTempFile::new_in(&self.output_dir).map_err(unwritable)?;
        let write_err = |source| PipelineError::OutputWrite {
            path: path.clone(),
            source,
        };
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.write_all(b"\n").map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        debug!("Wrote report {}", path.display());
        Ok(path)
    }
}
