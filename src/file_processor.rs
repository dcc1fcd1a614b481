use chrono::Utc;
use csv::StringRecord;
use log::{debug, error, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

use crate::config::{ParserConfig, PipelineConfig};
use crate::data_models::SensorRecord;
use crate::errors::{ParseError, PipelineError, ValidationError};
use crate::metrics::MetricsCalculator;
use crate::parsers::{CsvSource, HeaderedRow, RecordParser};
use crate::report::{input_file_name, ProcessingReport, ReportWriter};
use crate::validation::Validator;

/// Processing stages of a single file, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Reading,
    Parsing,
    Validating,
    Aggregating,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Reading => "reading",
            Stage::Parsing => "parsing",
            Stage::Validating => "validating",
            Stage::Aggregating => "aggregating",
            Stage::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Why a single row was excluded from aggregation.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRejection {
    Parse(ParseError),
    Validation(ValidationError),
}

/// Row-level results of reading one file.
#[derive(Debug, Default)]
pub struct RowTally {
    pub valid: Vec<SensorRecord>,
    pub parse_failures: usize,
    pub validation_failures: usize,
}

impl RowTally {
    pub fn rows(&self) -> usize {
        self.valid.len() + self.invalid()
    }

    pub fn invalid(&self) -> usize {
        self.parse_failures + self.validation_failures
    }

    fn reject(&mut self, row: usize, rejection: RowRejection) {
        match &rejection {
            RowRejection::Parse(_) => self.parse_failures += 1,
            RowRejection::Validation(_) => self.validation_failures += 1,
        }
        debug!("Row {} rejected: {:?}", row, rejection);
    }
}

/// A file that was read, aggregated and persisted.
#[derive(Debug)]
pub struct ProcessedFile {
    pub report: ProcessingReport,
    pub output_path: PathBuf,
    pub parse_failures: usize,
    pub validation_failures: usize,
}

/// A file that could not be processed. `report` is the `failed` report; it is not persisted.
#[derive(Error, Debug)]
#[error("{input} failed while {stage}: {error}", input = .report.input_file)]
pub struct FileFailure {
    pub report: ProcessingReport,
    pub stage: Stage,
    #[source]
    pub error: PipelineError,
}

/// Runs one input file through reading, parsing, validation, aggregation and reporting.
#[derive(Debug, Clone)]
pub struct FileProcessor {
    parser_config: ParserConfig,
    parser: RecordParser,
    validator: Validator,
    calculator: MetricsCalculator,
    writer: ReportWriter,
    precision: Option<u32>,
}

impl FileProcessor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            parser_config: config.parser.clone(),
            parser: RecordParser::new(&config.parser),
            validator: Validator::new(config.bounds),
            calculator: MetricsCalculator::new(),
            writer: ReportWriter::new(&config.output_dir),
            precision: config.precision,
        }
    }

    pub fn writer(&self) -> &ReportWriter {
        &self.writer
    }

    /// Process `input` and always hand back a report, `failed` or not.
    pub fn process(&self, input: &Path) -> ProcessingReport {
        match self.try_process(input) {
            Ok(processed) => processed.report,
            Err(failure) => failure.report,
        }
    }

    /// Process `input`, surfacing file-level failures with the stage they happened in.
    pub fn try_process(&self, input: &Path) -> Result<ProcessedFile, FileFailure> {
        let start = Instant::now();
        let input_file = input_file_name(input);
        let processed_at = Utc::now();
        info!("Processing file: {}", input.display());

        let fail = |stage: Stage, error: PipelineError| {
            error!("Failed to process {} ({}): {}", input.display(), stage, error);
            FileFailure {
                report: ProcessingReport::failed(input_file.clone(), processed_at, &error),
                stage,
                error,
            }
        };

        let tally = self.read_rows(input).map_err(|e| fail(Stage::Reading, e))?;

        debug!("{}: {} -> {}", input_file, Stage::Validating, Stage::Aggregating);
        let metrics = self
            .calculator
            .calculate(&tally.valid)
            .map(|m| match self.precision {
                Some(decimals) => m.rounded(decimals),
                None => m,
            });

        debug!("{}: {} -> {}", input_file, Stage::Aggregating, Stage::Reporting);
        let report = ProcessingReport::completed(
            input_file.clone(),
            processed_at,
            tally.valid.len(),
            tally.invalid(),
            metrics,
        );
        let output_path = self
            .writer
            .write(&report, input)
            .map_err(|e| fail(Stage::Reporting, e))?;

        if tally.invalid() > 0 {
            warn!(
                "{}: dropped {} of {} rows ({} unparseable, {} out of range)",
                input_file,
                tally.invalid(),
                tally.rows(),
                tally.parse_failures,
                tally.validation_failures
            );
        }
        info!(
            "Processed {} valid records from {} in {}ms (status: {:?})",
            report.records_processed,
            input_file,
            start.elapsed().as_millis(),
            report.status
        );

        Ok(ProcessedFile {
            report,
            output_path,
            parse_failures: tally.parse_failures,
            validation_failures: tally.validation_failures,
        })
    }

    /// Stream the file, parsing and validating each row. Row failures are tallied;
    /// only file-level conditions return an error.
    pub fn read_rows(&self, input: &Path) -> Result<RowTally, PipelineError> {
        let mut source = CsvSource::open(input, &self.parser_config)?;

        let missing = source.missing_columns(self.parser.columns());
        if !missing.is_empty() {
            warn!(
                "{}: header lacks required columns {:?}; every row will be rejected",
                input.display(),
                missing
            );
        }

        debug!("{}: {} -> {}", input.display(), Stage::Reading, Stage::Parsing);
        let mut tally = RowTally::default();
        let mut record = StringRecord::new();
        let mut row = 0usize;

        while source.next_record(&mut record)? {
            row += 1;
            let view = HeaderedRow::new(source.index(), &record);
            let parsed = match self.parser.parse_row(&view, row) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tally.reject(row, RowRejection::Parse(e));
                    continue;
                }
            };
            match self.validator.validate(&parsed) {
                Ok(()) => tally.valid.push(parsed),
                Err(e) => tally.reject(row, RowRejection::Validation(e)),
            }
        }

        if row == 0 {
            return Err(PipelineError::NoDataRows {
                path: input.to_path_buf(),
            });
        }
        Ok(tally)
    }
}
