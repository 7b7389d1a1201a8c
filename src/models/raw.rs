// file: src/models/raw.rs
// description: raw labelled 2-D table as delivered by spreadsheet or delimited-text readers
// reference: internal data structures

use crate::error::{ProgressError, Result};
use crate::models::stage::normalize_label;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Layout of a raw table.
///
/// `Wide`: one row per stage, one column per period.
/// `Long`: one row per period (or per period/stage pair), stages as columns
/// or as a category column next to a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Wide,
    Long,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Wide => "wide",
            Orientation::Long => "long",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Orientation {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wide" => Ok(Orientation::Wide),
            "long" => Ok(Orientation::Long),
            other => Err(ProgressError::Validation(format!(
                "unknown orientation '{}' (expected 'wide' or 'long')",
                other
            ))),
        }
    }
}

/// Header row plus string cells. Rows may be ragged; missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.as_str())
            .unwrap_or("")
    }

    /// Index of the first header matching `name` after label normalization.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let key = normalize_label(name);
        self.headers.iter().position(|h| normalize_label(h) == key)
    }

    /// Index of the first header matching any of `candidates`, tried in order.
    pub fn find_column(&self, candidates: &[&str]) -> Option<usize> {
        candidates.iter().find_map(|c| self.column_index(c))
    }

    pub fn column_is_blank(&self, column: usize) -> bool {
        (0..self.rows.len()).all(|row| self.cell(row, column).trim().is_empty())
    }
}
