// file: src/exporter/mod.rs
// description: report export module exports
// reference: internal module structure

pub mod csv;
pub mod json;

pub use self::csv::CsvExporter;
pub use self::json::{ExportManifest, ExportedTable, JsonExporter};
