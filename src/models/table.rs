// file: src/models/table.rs
// description: canonical stage x month count matrix and the site datasets that own them
// reference: internal data structures

use crate::error::{ProgressError, Result};
use crate::models::month::Month;
use crate::models::raw::RawTable;
use crate::models::stage::{Stage, StageCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Canonical progress table.
///
/// Holds one row per catalog stage (catalog order) and one column per month
/// (ascending, unique). Every cell is present; absent data is zero.
/// The sum of all cells fits in a `u64`, so every row, column and
/// monthly total does too.
#[derive(Debug, Clone)]
pub struct ProgressTable {
    catalog: Arc<StageCatalog>,
    months: Vec<Month>,
    // counts[stage][month]
    counts: Vec<Vec<u64>>,
    total: u64,
}

impl ProgressTable {
    /// Builds a table from a dense matrix, checking its shape.
    pub fn from_counts(
        catalog: Arc<StageCatalog>,
        months: Vec<Month>,
        counts: Vec<Vec<u64>>,
    ) -> Result<Self> {
        if months.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ProgressError::Schema(
                "months must be unique and in ascending order".to_string(),
            ));
        }

        if counts.len() != catalog.len() {
            return Err(ProgressError::Schema(format!(
                "expected {} stage rows, got {}",
                catalog.len(),
                counts.len()
            )));
        }

        if let Some((index, row)) = counts
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != months.len())
        {
            return Err(ProgressError::Schema(format!(
                "stage row {} has {} cells for {} months",
                index,
                row.len(),
                months.len()
            )));
        }

        let mut total: u64 = 0;
        for (stage_index, row) in counts.iter().enumerate() {
            for (month_index, count) in row.iter().enumerate() {
                total = total.checked_add(*count).ok_or_else(|| ProgressError::CountOverflow {
                    stage: catalog.stages()[stage_index].name.clone(),
                    period: months[month_index].to_string(),
                })?;
            }
        }

        Ok(Self {
            catalog,
            months,
            counts,
            total,
        })
    }

    /// All-zero table over the given months (sorted and deduplicated).
    pub fn zeroed(catalog: Arc<StageCatalog>, months: impl IntoIterator<Item = Month>) -> Self {
        let mut months: Vec<Month> = months.into_iter().collect();
        months.sort();
        months.dedup();

        let counts = vec![vec![0; months.len()]; catalog.len()];
        Self {
            catalog,
            months,
            counts,
            total: 0,
        }
    }

    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }

    pub fn shared_catalog(&self) -> &Arc<StageCatalog> {
        &self.catalog
    }

    pub fn months(&self) -> &[Month] {
        &self.months
    }

    pub fn month_count(&self) -> usize {
        self.months.len()
    }

    pub fn stage_count(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    pub fn month_index(&self, month: Month) -> Option<usize> {
        self.months.binary_search(&month).ok()
    }

    /// Count for a stage (name or alias) in a month.
    pub fn get(&self, stage: &str, month: Month) -> Option<u64> {
        let row = self.catalog.index_of(stage)?;
        let column = self.month_index(month)?;
        Some(self.counts[row][column])
    }

    pub fn count_at(&self, stage_index: usize, month_index: usize) -> u64 {
        self.counts[stage_index][month_index]
    }

    pub fn stage_series(&self, stage_index: usize) -> &[u64] {
        &self.counts[stage_index]
    }

    /// Stage counts for one month in catalog order.
    pub fn column(&self, month_index: usize) -> Vec<u64> {
        self.counts.iter().map(|row| row[month_index]).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Stage, &[u64])> {
        self.catalog
            .stages()
            .iter()
            .zip(self.counts.iter().map(|row| row.as_slice()))
    }

    pub fn grand_total(&self) -> u64 {
        self.total
    }

    /// Adds to one cell, failing instead of wrapping when the table total
    /// would leave the `u64` range.
    pub(crate) fn add_at(
        &mut self,
        stage_index: usize,
        month_index: usize,
        value: u64,
    ) -> Result<()> {
        self.total = self
            .total
            .checked_add(value)
            .ok_or_else(|| ProgressError::CountOverflow {
                stage: self.catalog.stages()[stage_index].name.clone(),
                period: self.months[month_index].to_string(),
            })?;
        self.counts[stage_index][month_index] += value;
        Ok(())
    }

    /// The `last_n` most recent months. A sub-table of a valid table,
    /// so its total cannot overflow.
    pub fn last_months(&self, last_n: usize) -> ProgressTable {
        let skip = self.months.len().saturating_sub(last_n);
        let counts: Vec<Vec<u64>> = self.counts.iter().map(|row| row[skip..].to_vec()).collect();
        let total = counts.iter().flatten().sum();

        Self {
            catalog: Arc::clone(&self.catalog),
            months: self.months[skip..].to_vec(),
            counts,
            total,
        }
    }

    /// Renders the table back into a wide raw table (`Stage` + `YYYY-MM` headers).
    pub fn to_raw(&self) -> RawTable {
        let mut headers = Vec::with_capacity(self.months.len() + 1);
        headers.push("Stage".to_string());
        headers.extend(self.months.iter().map(|m| m.to_string()));

        let rows = self
            .rows()
            .map(|(stage, counts)| {
                std::iter::once(stage.name.clone())
                    .chain(counts.iter().map(|c| c.to_string()))
                    .collect()
            })
            .collect();

        RawTable::new(headers, rows)
    }
}

impl PartialEq for ProgressTable {
    fn eq(&self, other: &Self) -> bool {
        self.catalog == other.catalog && self.months == other.months && self.counts == other.counts
    }
}

impl Eq for ProgressTable {}

/// Where a site's data came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SourceIdentity {
    File(PathBuf),
    /// Built-in demonstration data, only ever chosen by explicit policy.
    Sample,
}

impl SourceIdentity {
    pub fn is_sample(&self) -> bool {
        matches!(self, SourceIdentity::Sample)
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceIdentity::File(path) => write!(f, "{}", path.display()),
            SourceIdentity::Sample => f.write_str("built-in sample data"),
        }
    }
}

/// One site's normalized table. Read-only once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteDataset {
    name: String,
    source: SourceIdentity,
    table: ProgressTable,
}

impl SiteDataset {
    pub fn new(name: impl Into<String>, source: SourceIdentity, table: ProgressTable) -> Self {
        Self {
            name: name.into(),
            source,
            table,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SourceIdentity {
        &self.source
    }

    pub fn table(&self) -> &ProgressTable {
        &self.table
    }
}

/// Cell-wise sum of several site tables.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedTable {
    sites: Vec<String>,
    table: ProgressTable,
}

impl CombinedTable {
    pub fn new(sites: Vec<String>, table: ProgressTable) -> Self {
        Self { sites, table }
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    pub fn table(&self) -> &ProgressTable {
        &self.table
    }
}
