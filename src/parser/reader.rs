// file: src/parser/reader.rs
// description: delimited-text reader producing raw tables, plus site file discovery
// reference: https://docs.rs/csv, https://docs.rs/walkdir

use crate::error::{ProgressError, Result};
use crate::models::RawTable;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const BOM: char = '\u{feff}';

/// `.tsv` files are tab-delimited; every other source is comma-delimited.
#[derive(Debug, Clone, Default)]
pub struct RawTableReader;

impl RawTableReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_path(&self, path: &Path) -> Result<RawTable> {
        let file = File::open(path).map_err(|source| ProgressError::FileOperation {
            path: path.to_path_buf(),
            source,
        })?;

        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
            _ => b',',
        };

        let table = Self::read_with(file, delimiter)?;
        debug!(
            "Read {} rows x {} columns from {}",
            table.row_count(),
            table.column_count(),
            path.display()
        );
        Ok(table)
    }

    pub fn read_from<R: Read>(&self, reader: R) -> Result<RawTable> {
        Self::read_with(reader, b',')
    }

    pub fn read_str(&self, text: &str) -> Result<RawTable> {
        self.read_from(text.as_bytes())
    }

    fn read_with<R: Read>(reader: R, delimiter: u8) -> Result<RawTable> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(index, header)| {
                if index == 0 {
                    header.trim_start_matches(BOM).to_string()
                } else {
                    header.to_string()
                }
            })
            .collect();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(record.iter().map(|cell| cell.to_string()).collect());
        }

        Ok(RawTable::new(headers, rows))
    }
}

/// Lists `.csv`/`.tsv` files below `root`, sorted by path.
pub fn discover_sources(root: &Path) -> Result<Vec<PathBuf>> {
    info!("Scanning directory for site tables: {}", root.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let is_table = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv"));

        if is_table {
            files.push(path.to_path_buf());
        } else {
            debug!("Skipping non-table file: {}", path.display());
        }
    }

    files.sort();
    info!("Found {} site tables", files.len());
    Ok(files)
}
