use chrono::Utc;
use crossbeam_channel::unbounded;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use walkdir::WalkDir;

use crate::errors::PipelineError;
use crate::file_processor::FileProcessor;
use crate::report::{input_file_name, ProcessingReport, ReportStatus};

/// Aggregate result of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    /// Files never started because the batch was aborted.
    pub skipped: usize,
    /// Reports ordered by input path.
    pub reports: Vec<ProcessingReport>,
    /// Set when a batch-fatal error stopped scheduling.
    pub aborted: Option<String>,
}

impl BatchSummary {
    pub fn total_files(&self) -> usize {
        self.succeeded + self.partial + self.failed + self.skipped
    }

    pub fn count(&self, status: ReportStatus) -> usize {
        match status {
            ReportStatus::Success => self.succeeded,
            ReportStatus::Partial => self.partial,
            ReportStatus::Failed => self.failed,
        }
    }

    fn record(&mut self, report: ProcessingReport) {
        match report.status {
            ReportStatus::Success => self.succeeded += 1,
            ReportStatus::Partial => self.partial += 1,
            ReportStatus::Failed => self.failed += 1,
        }
        self.reports.push(report);
    }

    pub fn print_summary(&self) {
        println!("\n========== Batch Summary ==========");
        println!("Files Found: {}", self.total_files());
        println!("Success: {}", self.succeeded);
        println!("Partial: {}", self.partial);
        println!("Failed: {}", self.failed);
        if self.skipped > 0 {
            println!("Skipped: {}", self.skipped);
        }
        for report in &self.reports {
            match &report.error {
                Some(err) => println!("  {:<32} {:?}: {}", report.input_file, report.status, err),
                None => println!(
                    "  {:<32} {:?}: {} valid, {} invalid",
                    report.input_file, report.status, report.records_processed, report.records_invalid
                ),
            }
        }
        if let Some(reason) = &self.aborted {
            println!("Aborted: {}", reason);
        }
        println!("===================================\n");
    }
}

/// Worker -> collector messages.
enum BatchEvent {
    Done(usize, ProcessingReport),
    Fatal(usize, ProcessingReport, PipelineError),
    Skipped,
}

/// Runs a [`FileProcessor`] over every CSV file in a directory.
pub struct BatchRunner {
    processor: FileProcessor,
    num_workers: usize,
    recursive: bool,
    show_progress: bool,
}

impl BatchRunner {
    pub fn new(processor: FileProcessor) -> Self {
        let num_workers = num_cpus::get();
        info!("Initializing BatchRunner with {} workers", num_workers);
        Self {
            processor,
            num_workers,
            recursive: false,
            show_progress: true,
        }
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        info!("Using {} custom workers", num_workers);
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// `*.csv` files under `dir` (one level unless recursive), sorted by path.
    pub fn discover(&self, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
            let entry = entry.map_err(|e| PipelineError::InputDir {
                path: dir.to_path_buf(),
                source: e,
            })?;
            let is_csv = entry
                .path()
                .extension()
                .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
            if entry.file_type().is_file() && is_csv {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Discover and process every file in `dir`. Only batch-fatal errors are returned;
    /// per-file failures are folded into the summary.
    pub fn run_dir(&self, dir: &Path) -> Result<BatchSummary, PipelineError> {
        let files = self.discover(dir)?;
        if files.is_empty() {
            warn!("No CSV files found in {}", dir.display());
        }
        self.run(&files)
    }

    /// Process `files` in parallel. Each file's failure stays with that file; an
    /// unwritable output directory stops scheduling of the remaining files.
    pub fn run(&self, files: &[PathBuf]) -> Result<BatchSummary, PipelineError> {
        self.processor.writer().ensure_writable()?;
        Ok(self.schedule(files))
    }

    /// Files whose report path was already claimed by an earlier file, keyed by index.
    fn output_conflicts(&self, files: &[PathBuf]) -> HashMap<usize, PipelineError> {
        let writer = self.processor.writer();
        let mut claimed: HashMap<PathBuf, &Path> = HashMap::new();
        let mut conflicts = HashMap::new();

        for (index, path) in files.iter().enumerate() {
            let target = writer.report_path(path);
            match claimed.get(&target) {
                Some(first) => {
                    warn!(
                        "{} and {} both map to {}; only the first is processed",
                        first.display(),
                        path.display(),
                        target.display()
                    );
                    conflicts.insert(
                        index,
                        PipelineError::DuplicateOutput {
                            path: path.clone(),
                            target,
                            claimed_by: first.to_path_buf(),
                        },
                    );
                }
                None => {
                    claimed.insert(target, path.as_path());
                }
            }
        }
        conflicts
    }

    /// Process `files` without the writability preflight.
    pub(crate) fn schedule(&self, files: &[PathBuf]) -> BatchSummary {
        let start = Instant::now();
        info!("Starting batch processing of {} files", files.len());

        let progress = if self.show_progress {
            let bar = ProgressBar::new(files.len() as u64);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
            bar.set_style(style);
            bar
        } else {
            ProgressBar::hidden()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_workers)
            .build()
            .ok();

        let conflicts = self.output_conflicts(files);
        let cancelled = AtomicBool::new(false);
        let (sender, receiver) = unbounded::<BatchEvent>();
        let mut by_index: BTreeMap<usize, ProcessingReport> = BTreeMap::new();
        let mut skipped = 0usize;
        let mut aborted = None;

        std::thread::scope(|scope| {
            let cancelled = &cancelled;
            let conflicts = &conflicts;
            scope.spawn(move || {
                let work = move || {
                    files.par_iter().enumerate().for_each_with(sender, |tx, (index, path)| {
                        let event = if cancelled.load(Ordering::Relaxed) {
                            BatchEvent::Skipped
                        } else if let Some(conflict) = conflicts.get(&index) {
                            error!("Failed to process {}: {}", path.display(), conflict);
                            let report =
                                ProcessingReport::failed(input_file_name(path), Utc::now(), conflict);
                            BatchEvent::Done(index, report)
                        } else {
                            match self.processor.try_process(path) {
                                Ok(processed) => BatchEvent::Done(index, processed.report),
                                Err(failure) if failure.error.is_batch_fatal() => {
                                    cancelled.store(true, Ordering::Relaxed);
                                    BatchEvent::Fatal(index, failure.report, failure.error)
                                }
                                Err(failure) => BatchEvent::Done(index, failure.report),
                            }
                        };
                        // Receiver outlives every worker in this scope
                        let _ = tx.send(event);
                    });
                };
                match &pool {
                    Some(pool) => pool.install(work),
                    None => work(),
                }
            });

            for event in receiver.iter() {
                match event {
                    BatchEvent::Done(index, report) => {
                        by_index.insert(index, report);
                    }
                    BatchEvent::Fatal(index, report, err) => {
                        error!("Aborting batch: {}", err);
                        if aborted.is_none() {
                            aborted = Some(err.to_string());
                        }
                        by_index.insert(index, report);
                    }
                    BatchEvent::Skipped => skipped += 1,
                }
                progress.inc(1);
            }
        });

        progress.finish_with_message("Batch processing completed");

        let mut summary = BatchSummary {
            skipped,
            aborted,
            ..BatchSummary::default()
        };
        for report in by_index.into_values() {
            summary.record(report);
        }

        info!(
            "Batch finished in {:.2?}: {} success, {} partial, {} failed, {} skipped",
            start.elapsed(),
            summary.succeeded,
            summary.partial,
            summary.failed,
            summary.skipped
        );
        summary
    }
}
