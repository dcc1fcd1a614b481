use std::fs;
use std::path::{Path, PathBuf};

use crate::config::PipelineConfig;
use crate::file_processor::FileProcessor;

pub const HEADER: &str = "timestamp,voltage,current,temperature,power";

/// Write `rows` under the standard header into `dir/name`.
pub fn write_csv(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    write_raw(dir, name, &format!("{}\n{}", HEADER, join_rows(rows)))
}

pub fn write_raw(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write test csv");
    path
}

fn join_rows(rows: &[&str]) -> String {
    rows.iter().map(|r| format!("{}\n", r)).collect()
}

/// Five readings five minutes apart, all within default bounds.
pub fn good_rows() -> Vec<&'static str> {
    vec![
        "2024-06-01T10:00:00,24.0,5.0,30.0,120.0",
        "2024-06-01T10:05:00,24.5,5.2,31.0,127.4",
        "2024-06-01T10:10:00,25.0,5.4,31.5,135.0",
        "2024-06-01T10:15:00,24.8,5.1,32.0,126.5",
        "2024-06-01T10:20:00,24.2,4.9,32.5,118.6",
    ]
}

pub fn config_for(output_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: output_dir.to_path_buf(),
        ..PipelineConfig::default()
    }
}

pub fn processor_for(output_dir: &Path) -> FileProcessor {
    FileProcessor::new(&config_for(output_dir))
}

/// Report JSON with the run-dependent `processed_at` removed.
pub fn stable_json(path: &Path) -> serde_json::Value {
    let mut value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).expect("read report")).expect("parse report");
    if let Some(obj) = value.as_object_mut() {
        obj.remove("processed_at");
    }
    value
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
