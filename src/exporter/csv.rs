// file: src/exporter/csv.rs
// description: canonical wide csv and monthly totals csv output
// reference: https://docs.rs/csv

use crate::error::{ProgressError, Result};
use crate::models::{Month, ProgressTable};
use crate::pipeline::{MonthlyTotal, ProgressReport, TableReport};
use crate::utils::Validator;
use csv::Writer as CsvWriter;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        Validator::validate_output_dir(&output_dir)?;
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Writes `<name>_progress.csv` and `<name>_totals.csv` for every site and
    /// for the combined table.
    pub fn export_report(&self, report: &ProgressReport) -> Result<Vec<PathBuf>> {
        info!("Starting CSV export to {:?}", self.output_dir);

        let mut written = Vec::new();
        for table in report.sites.iter().chain(std::iter::once(&report.combined)) {
            written.extend(self.export_table(table)?);
        }

        info!("Export complete: {} CSV files written", written.len());
        Ok(written)
    }

    pub fn export_table(&self, report: &TableReport) -> Result<[PathBuf; 2]> {
        let stem = Validator::sanitize_file_stem(&report.name);
        let table_path = self.output_dir.join(format!("{}_progress.csv", stem));
        let totals_path = self.output_dir.join(format!("{}_totals.csv", stem));

        write_table(&report.table, create(&table_path)?)?;
        write_totals(&report.totals, create(&totals_path)?)?;

        Ok([table_path, totals_path])
    }
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|source| ProgressError::FileOperation {
        path: path.to_path_buf(),
        source,
    })
}

/// Wide layout: `Stage` then one `YYYY-MM` column per month, catalog order.
pub fn write_table<W: Write>(table: &ProgressTable, writer: W) -> Result<()> {
    let raw = table.to_raw();
    let mut csv_writer = CsvWriter::from_writer(writer);

    csv_writer.write_record(raw.headers())?;
    for row in raw.rows() {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// `Month,N,n` rows: in-progress total and excluded count.
pub fn write_totals<W: Write>(totals: &BTreeMap<Month, MonthlyTotal>, writer: W) -> Result<()> {
    let mut csv_writer = CsvWriter::from_writer(writer);

    csv_writer.write_record(["Month", "N", "n"])?;
    for (month, total) in totals {
        csv_writer.write_record([
            month.to_string(),
            total.included.to_string(),
            total.excluded.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}
