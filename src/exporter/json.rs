// file: src/exporter/json.rs
// description: json export of normalized tables, derived series and an export manifest

use crate::error::Result;
use crate::models::Month;
use crate::pipeline::{ProgressReport, RunStats, Snapshot, TableReport};
use crate::utils::Validator;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct JsonExporter {
    output_dir: PathBuf,
    pretty: bool,
}

#[derive(Debug, Serialize)]
pub struct ExportedStage {
    pub name: String,
    pub excluded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub counts: Vec<u64>,
}

/// `included` is the chart's `N=` annotation, `excluded` its `n=`.
#[derive(Debug, Serialize)]
pub struct ExportedTotal {
    pub month: Month,
    pub label: String,
    pub included: u64,
    pub excluded: u64,
}

#[derive(Debug, Serialize)]
pub struct ExportedTable {
    pub name: String,
    pub source: String,
    pub used_sample_data: bool,
    pub catalog_fingerprint: String,
    pub months: Vec<Month>,
    pub month_labels: Vec<String>,
    pub stages: Vec<ExportedStage>,
    pub totals: Vec<ExportedTotal>,
    pub latest: Option<Snapshot>,
}

impl ExportedTable {
    pub fn from_report(report: &TableReport) -> Self {
        let table = &report.table;

        let stages = table
            .rows()
            .map(|(stage, counts)| ExportedStage {
                name: stage.name.clone(),
                excluded: stage.excluded,
                color: stage.color.clone(),
                counts: counts.to_vec(),
            })
            .collect();

        let totals = report
            .totals
            .iter()
            .map(|(month, total)| ExportedTotal {
                month: *month,
                label: month.label(),
                included: total.included,
                excluded: total.excluded,
            })
            .collect();

        Self {
            name: report.name.clone(),
            source: report.source.clone(),
            used_sample_data: report.used_sample_data,
            catalog_fingerprint: table.catalog().fingerprint().to_string(),
            months: table.months().to_vec(),
            month_labels: table.months().iter().map(|m| m.label()).collect(),
            stages,
            totals,
            latest: report.latest.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub generated_at: String,
    pub catalog_fingerprint: String,
    pub used_sample_data: bool,
    pub total_tables: usize,
    pub files: Vec<String>,
    pub stats: RunStats,
}

impl JsonExporter {
    pub fn new(output_dir: impl Into<PathBuf>, pretty: bool) -> Result<Self> {
        let output_dir = output_dir.into();
        Validator::validate_output_dir(&output_dir)?;
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir, pretty })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn export_report(&self, report: &ProgressReport) -> Result<ExportManifest> {
        info!("Starting JSON export to {:?}", self.output_dir);

        let mut files = Vec::with_capacity(report.sites.len() + 1);
        for table in report.sites.iter().chain(std::iter::once(&report.combined)) {
            let path = self.export_table(table)?;
            files.push(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            );
        }

        let manifest = ExportManifest {
            exported_at: chrono::Utc::now().to_rfc3339(),
            generated_at: report.generated_at.to_rfc3339(),
            catalog_fingerprint: report.catalog_fingerprint.clone(),
            used_sample_data: report.used_sample_data(),
            total_tables: files.len(),
            files,
            stats: report.stats.clone(),
        };
        self.write_json(&self.output_dir.join("manifest.json"), &manifest)?;

        info!("Export complete: {} tables exported", manifest.total_tables);
        Ok(manifest)
    }

    pub fn export_table(&self, report: &TableReport) -> Result<PathBuf> {
        let path = self.output_dir.join(format!(
            "{}_progress.json",
            Validator::sanitize_file_stem(&report.name)
        ));
        self.write_json(&path, &ExportedTable::from_report(report))?;
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let body = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(path, body)?;
        Ok(())
    }
}
