// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod error;
pub mod exporter;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod utils;

pub use config::{
    CatalogConfig, Config, MissingSourcePolicy, NormalizeConfig, ReportConfig, SiteConfig,
};
pub use error::{ProgressError, Result};
pub use exporter::{CsvExporter, ExportManifest, ExportedTable, JsonExporter};
pub use models::{
    CombinedTable, Month, Orientation, ProgressTable, RawTable, SiteDataset, SourceIdentity,
    Stage, StageCatalog,
};
pub use parser::{
    NormalizeOptions, RawTableReader, StageDataNormalizer, UnknownStagePolicy, normalize,
};
pub use pipeline::{
    MonthlyTotal, ProgressAggregator, ProgressReport, ProgressTracker, ReportRunner, RunStats,
    Snapshot, StageCount, TableReport,
};
pub use utils::Validator;
