// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

pub mod aggregator;
mod progress;
pub mod report;
pub mod sample;

pub use aggregator::{MonthlyTotal, ProgressAggregator, Snapshot, StageCount};
pub use progress::{ProgressTracker, RunStats};
pub use report::{ProgressReport, ReportRunner, TableReport, sites_from_directory};
