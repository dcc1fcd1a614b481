pub mod config;
pub mod data_models;
pub mod errors;
pub mod file_processor;
pub mod metrics;
pub mod parallel;
pub mod parsers;
pub mod report;
pub mod validation;

#[cfg(test)]
mod tests;
