// file: src/parser/normalizer.rs
// description: stage data normalization from raw wide/long tables into canonical progress tables
// reference: pandas-style pivot/reindex semantics

use crate::error::{ProgressError, Result};
use crate::models::stage::{is_reserved_label, normalize_label};
use crate::models::{Month, Orientation, ProgressTable, RawTable, StageCatalog};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

const STAGE_HEADERS: &[&str] = &["Stage", "Category"];
const PERIOD_HEADERS: &[&str] = &["Month", "Period", "Date"];
const VALUE_HEADERS: &[&str] = &["Value", "Count", "Studies"];
const MISSING_MARKERS: &[&str] = &["nan", "na", "n/a", "-", "none", "null"];

/// What to do with a stage label that matches no catalog name or alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStagePolicy {
    /// Fail with `UnknownStage`.
    Strict,
    /// Count it under the catalog's fallback stage.
    #[default]
    Lenient,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub orientation: Orientation,
    pub unknown_stages: UnknownStagePolicy,
    pub stage_column: Option<String>,
    pub period_column: Option<String>,
    pub value_column: Option<String>,
}

impl NormalizeOptions {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            ..Self::default()
        }
    }

    pub fn wide() -> Self {
        Self::new(Orientation::Wide)
    }

    pub fn long() -> Self {
        Self::new(Orientation::Long)
    }

    pub fn strict(mut self) -> Self {
        self.unknown_stages = UnknownStagePolicy::Strict;
        self
    }

    pub fn with_stage_column(mut self, name: impl Into<String>) -> Self {
        self.stage_column = Some(name.into());
        self
    }

    pub fn with_period_column(mut self, name: impl Into<String>) -> Self {
        self.period_column = Some(name.into());
        self
    }

    pub fn with_value_column(mut self, name: impl Into<String>) -> Self {
        self.value_column = Some(name.into());
        self
    }
}

/// Normalizes `raw` against `catalog`. Pure; see [`StageDataNormalizer`].
pub fn normalize(
    raw: &RawTable,
    catalog: &Arc<StageCatalog>,
    options: &NormalizeOptions,
) -> Result<ProgressTable> {
    StageDataNormalizer::new(Arc::clone(catalog), options.clone()).normalize(raw)
}

/// Converts raw tables into canonical [`ProgressTable`]s.
///
/// Duplicate (stage, month) observations keep the maximum value. Distinct
/// unknown labels folded into the fallback stage are summed. Rows, columns
/// and periods labelled `Total` are dropped.
pub struct StageDataNormalizer {
    catalog: Arc<StageCatalog>,
    options: NormalizeOptions,
}

struct Observation {
    label: String,
    month: Month,
    value: u64,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum CellKey {
    Stage(usize),
    Fallback(String),
}

impl StageDataNormalizer {
    pub fn new(catalog: Arc<StageCatalog>, options: NormalizeOptions) -> Self {
        Self { catalog, options }
    }

    pub fn catalog(&self) -> &Arc<StageCatalog> {
        &self.catalog
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    pub fn normalize(&self, raw: &RawTable) -> Result<ProgressTable> {
        let mut months = BTreeSet::new();
        let observations = match self.options.orientation {
            Orientation::Wide => self.read_wide(raw, &mut months)?,
            Orientation::Long => self.read_long(raw, &mut months)?,
        };

        let mut cells: HashMap<(CellKey, Month), u64> = HashMap::new();
        for obs in observations {
            let key = self.resolve(&obs.label)?;
            let cell = cells.entry((key, obs.month)).or_insert(0);
            *cell = (*cell).max(obs.value);
        }

        let mut table = ProgressTable::zeroed(Arc::clone(&self.catalog), months);
        for ((key, month), value) in cells {
            let stage_index = match key {
                CellKey::Stage(index) => index,
                CellKey::Fallback(_) => match self.catalog.fallback_index() {
                    Some(index) => index,
                    None => continue,
                },
            };
            if let Some(month_index) = table.month_index(month) {
                table.add_at(stage_index, month_index, value)?;
            }
        }

        Ok(table)
    }

    fn resolve(&self, label: &str) -> Result<CellKey> {
        if let Some(index) = self.catalog.index_of(label) {
            return Ok(CellKey::Stage(index));
        }

        match (self.options.unknown_stages, self.catalog.fallback_index()) {
            (UnknownStagePolicy::Lenient, Some(_)) => Ok(CellKey::Fallback(normalize_label(label))),
            _ => Err(ProgressError::UnknownStage {
                stage: label.trim().to_string(),
            }),
        }
    }

    fn read_wide(&self, raw: &RawTable, months: &mut BTreeSet<Month>) -> Result<Vec<Observation>> {
        let stage_column = self.wide_stage_column(raw)?;

        let mut period_columns = Vec::new();
        for (column, header) in raw.headers().iter().enumerate() {
            if column == stage_column || is_reserved_label(header) {
                continue;
            }
            match Month::parse(header) {
                Some(month) => period_columns.push((column, month)),
                None if raw.column_is_blank(column) => {}
                None => {
                    return Err(ProgressError::Schema(format!(
                        "column '{}' is neither a period nor the stage column",
                        header.trim()
                    )));
                }
            }
        }

        if period_columns.is_empty() {
            return Err(ProgressError::Schema(
                "no period columns found in wide table".to_string(),
            ));
        }
        months.extend(period_columns.iter().map(|(_, month)| *month));

        let mut observations = Vec::new();
        for row in 0..raw.row_count() {
            let label = raw.cell(row, stage_column).trim();

            if label.is_empty() {
                if period_columns
                    .iter()
                    .all(|(column, _)| raw.cell(row, *column).trim().is_empty())
                {
                    continue;
                }
                return Err(ProgressError::Schema(format!(
                    "row {} has counts but no stage label",
                    row + 1
                )));
            }

            if is_reserved_label(label) {
                continue;
            }

            for (column, month) in &period_columns {
                let value = parse_count(raw.cell(row, *column), label, &raw.headers()[*column])?;
                observations.push(Observation {
                    label: label.to_string(),
                    month: *month,
                    value,
                });
            }
        }

        Ok(observations)
    }

    fn wide_stage_column(&self, raw: &RawTable) -> Result<usize> {
        if let Some(name) = &self.options.stage_column {
            return raw.column_index(name).ok_or_else(|| {
                ProgressError::Schema(format!("configured stage column '{}' not found", name))
            });
        }

        if let Some(column) = raw.find_column(STAGE_HEADERS) {
            return Ok(column);
        }

        match raw.headers().first() {
            Some(header) if Month::parse(header).is_none() && !is_reserved_label(header) => Ok(0),
            _ => Err(ProgressError::Schema(
                "no stage column found in wide table".to_string(),
            )),
        }
    }

    fn read_long(&self, raw: &RawTable, months: &mut BTreeSet<Month>) -> Result<Vec<Observation>> {
        let options = &self.options;
        let period_column = locate(raw, options.period_column.as_deref(), PERIOD_HEADERS, "period")?
            .ok_or_else(|| {
                ProgressError::Schema("no period column found in long table".to_string())
            })?;
        let category_column =
            locate(raw, options.stage_column.as_deref(), STAGE_HEADERS, "stage")?;
        let value_column = locate(raw, options.value_column.as_deref(), VALUE_HEADERS, "value")?;

        match (category_column, value_column) {
            (Some(category), Some(value)) => {
                self.read_long_triples(raw, period_column, category, value, months)
            }
            (None, None) => self.read_long_columns(raw, period_column, months),
            (Some(_), None) => Err(ProgressError::Schema(
                "long table has a stage column but no value column".to_string(),
            )),
            (None, Some(_)) => Err(ProgressError::Schema(
                "long table has a value column but no stage column".to_string(),
            )),
        }
    }

    /// One row per (period, stage, value).
    fn read_long_triples(
        &self,
        raw: &RawTable,
        period_column: usize,
        category_column: usize,
        value_column: usize,
        months: &mut BTreeSet<Month>,
    ) -> Result<Vec<Observation>> {
        let mut observations = Vec::new();

        for row in 0..raw.row_count() {
            let period = raw.cell(row, period_column);
            let label = raw.cell(row, category_column).trim();
            let value = raw.cell(row, value_column);

            if period.trim().is_empty() && label.is_empty() && value.trim().is_empty() {
                continue;
            }
            if is_reserved_label(period) {
                continue;
            }

            let month = parse_period(period, row)?;
            months.insert(month);

            if is_reserved_label(label) {
                continue;
            }
            if label.is_empty() {
                if value.trim().is_empty() {
                    continue;
                }
                return Err(ProgressError::Schema(format!(
                    "row {} has a value but no stage label",
                    row + 1
                )));
            }

            observations.push(Observation {
                label: label.to_string(),
                month,
                value: parse_count(value, label, period)?,
            });
        }

        Ok(observations)
    }

    /// One row per period, one column per stage.
    fn read_long_columns(
        &self,
        raw: &RawTable,
        period_column: usize,
        months: &mut BTreeSet<Month>,
    ) -> Result<Vec<Observation>> {
        let mut stage_columns = Vec::new();
        for (column, header) in raw.headers().iter().enumerate() {
            if column == period_column || is_reserved_label(header) {
                continue;
            }
            if header.trim().is_empty() {
                if raw.column_is_blank(column) {
                    continue;
                }
                return Err(ProgressError::Schema(format!(
                    "column {} has counts but no stage header",
                    column + 1
                )));
            }
            stage_columns.push(column);
        }

        if stage_columns.is_empty() {
            return Err(ProgressError::Schema(
                "no stage columns found in long table".to_string(),
            ));
        }

        let mut observations = Vec::new();
        for row in 0..raw.row_count() {
            let period = raw.cell(row, period_column);

            if period.trim().is_empty()
                && stage_columns
                    .iter()
                    .all(|column| raw.cell(row, *column).trim().is_empty())
            {
                continue;
            }
            if is_reserved_label(period) {
                continue;
            }

            let month = parse_period(period, row)?;
            months.insert(month);

            for column in &stage_columns {
                let label = raw.headers()[*column].trim();
                observations.push(Observation {
                    label: label.to_string(),
                    month,
                    value: parse_count(raw.cell(row, *column), label, period)?,
                });
            }
        }

        Ok(observations)
    }
}

fn locate(
    raw: &RawTable,
    configured: Option<&str>,
    candidates: &[&str],
    role: &str,
) -> Result<Option<usize>> {
    match configured {
        Some(name) => raw.column_index(name).map(Some).ok_or_else(|| {
            ProgressError::Schema(format!("configured {} column '{}' not found", role, name))
        }),
        None => Ok(raw.find_column(candidates)),
    }
}

fn parse_period(text: &str, row: usize) -> Result<Month> {
    Month::parse(text).ok_or_else(|| {
        ProgressError::Schema(format!(
            "unrecognized period '{}' in row {}",
            text.trim(),
            row + 1
        ))
    })
}

/// Reads a count cell. Missing markers are zero; integral floats such as
/// `7.0` (spreadsheet exports) are accepted; negatives and fractions are not.
fn parse_count(text: &str, stage: &str, period: &str) -> Result<u64> {
    let trimmed = text.trim();
    if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed.to_lowercase().as_str()) {
        return Ok(0);
    }

    if let Ok(value) = trimmed.parse::<u64>() {
        return Ok(value);
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 => {
            Ok(value as u64)
        }
        _ => Err(ProgressError::InvalidValue {
            stage: stage.to_string(),
            period: period.trim().to_string(),
            value: trimmed.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stage;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn catalog() -> Arc<StageCatalog> {
        Arc::new(
            StageCatalog::new(vec![
                Stage::new("Invited"),
                Stage::new("InProgress"),
                Stage::new("Completed").with_alias("Done"),
                Stage::excluded("Declined"),
            ])
            .unwrap(),
        )
    }

    fn catalog_with_fallback() -> Arc<StageCatalog> {
        Arc::new(
            StageCatalog::builder()
                .stage(Stage::new("Invited"))
                .stage(Stage::new("Completed"))
                .stage(Stage::excluded("Declined"))
                .fallback("Other")
                .build()
                .unwrap(),
        )
    }

    fn month(text: &str) -> Month {
        text.parse().unwrap()
    }

    fn column_of(table: &ProgressTable, text: &str) -> Vec<u64> {
        table.column(table.month_index(month(text)).unwrap())
    }

    #[test]
    fn test_long_triples_zero_fill_missing_stages() {
        let raw = RawTable::from_strs(
            &["month", "stage", "value"],
            &[&["2024-07", "Invited", "7"], &["2024-07", "Completed", "3"]],
        );

        let table = normalize(&raw, &catalog(), &NormalizeOptions::long()).unwrap();

        assert_eq!(table.months(), &[month("2024-07")]);
        assert_eq!(table.stage_count(), 4);
        assert_eq!(column_of(&table, "2024-07"), vec![7, 0, 3, 0]);
    }

    #[test]
    fn test_wide_drops_total_row_and_column() {
        let raw = RawTable::from_strs(
            &["Stage", "Aug 2024", "Jul 2024", "Total"],
            &[
                &["Invited", "5", "7", "12"],
                &["Declined", "1", "", "1"],
                &["Total", "6", "7", "13"],
            ],
        );

        let table = normalize(&raw, &catalog(), &NormalizeOptions::wide()).unwrap();

        assert_eq!(table.months(), &[month("2024-07"), month("2024-08")]);
        assert_eq!(table.stage_series(0), &[7, 5]);
        assert_eq!(table.stage_series(3), &[0, 1]);
        assert!(table.catalog().names().all(|name| name != "Total"));
        assert_eq!(table.grand_total(), 13);
    }

    #[test]
    fn test_wide_reorders_to_catalog_and_applies_aliases() {
        let raw = RawTable::from_strs(
            &["Stage", "2024-07"],
            &[
                &["Declined", "2"],
                &["done", "4"],
                &["Invited", "9"],
            ],
        );

        let table = normalize(&raw, &catalog(), &NormalizeOptions::wide()).unwrap();

        let names: Vec<&str> = table.catalog().names().collect();
        assert_eq!(names, vec!["Invited", "InProgress", "Completed", "Declined"]);
        assert_eq!(column_of(&table, "2024-07"), vec![9, 0, 4, 2]);
    }

    #[test]
    fn test_wide_first_column_used_when_no_stage_header() {
        let raw = RawTable::from_strs(&["Step", "2024-07"], &[&["Invited", "3"]]);

        let table = normalize(&raw, &catalog(), &NormalizeOptions::wide()).unwrap();
        assert_eq!(table.get("Invited", month("2024-07")), Some(3));
    }

    #[test]
    fn test_missing_cells_become_zero() {
        let raw = RawTable::from_strs(
            &["Stage", "2024-07", "2024-08"],
            &[&["Invited", "NaN", "7.0"], &["Completed", "-"]],
        );

        let table = normalize(&raw, &catalog(), &NormalizeOptions::wide()).unwrap();
        assert_eq!(table.stage_series(0), &[0, 7]);
        assert_eq!(table.stage_series(2), &[0, 0]);
    }

    #[test]
    fn test_duplicates_keep_maximum() {
        let raw = RawTable::from_strs(
            &["Month", "Stage", "Count"],
            &[
                &["2024-07", "Invited", "9"],
                &["2024-07", "Invited", "4"],
                &["Jul 2024", "invited", "6"],
            ],
        );
        let table = normalize(&raw, &catalog(), &NormalizeOptions::long()).unwrap();
        assert_eq!(table.get("Invited", month("2024-07")), Some(9));

        let wide = RawTable::from_strs(
            &["Stage", "2024-07"],
            &[&["Completed", "2"], &["Done", "5"], &["Completed", "3"]],
        );
        let table = normalize(&wide, &catalog(), &NormalizeOptions::wide()).unwrap();
        assert_eq!(table.get("Completed", month("2024-07")), Some(5));
    }

    #[test]
    fn test_long_column_form() {
        let raw = RawTable::from_strs(
            &["Month", "Invited", "Completed", "Total"],
            &[
                &["Jan 2024", "7", "3", "10"],
                &["Nov 2023", "9", "1", "10"],
                &["Total", "16", "4", "20"],
            ],
        );

        let table = normalize(&raw, &catalog(), &NormalizeOptions::long()).unwrap();

        assert_eq!(table.months(), &[month("2023-11"), month("2024-01")]);
        assert_eq!(table.stage_series(0), &[9, 7]);
        assert_eq!(table.stage_series(2), &[1, 3]);
        assert_eq!(table.grand_total(), 20);
    }

    #[test]
    fn test_configured_columns() {
        let raw = RawTable::from_strs(
            &["when", "what", "n"],
            &[&["2024-09", "InProgress", "11"]],
        );
        let options = NormalizeOptions::long()
            .with_period_column("when")
            .with_stage_column("what")
            .with_value_column("n");

        let table = normalize(&raw, &catalog(), &options).unwrap();
        assert_eq!(table.get("InProgress", month("2024-09")), Some(11));

        let missing = NormalizeOptions::long().with_period_column("period");
        assert!(matches!(
            normalize(&raw, &catalog(), &missing),
            Err(ProgressError::Schema(_))
        ));
    }

    #[test]
    fn test_strict_mode_rejects_unknown_stage() {
        let raw = RawTable::from_strs(&["Stage", "2024-07"], &[&["Mystery", "1"]]);

        let err = normalize(&raw, &catalog(), &NormalizeOptions::wide().strict()).unwrap_err();
        match err {
            ProgressError::UnknownStage { stage } => assert_eq!(stage, "Mystery"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_lenient_mode_sums_unknowns_into_fallback() {
        let raw = RawTable::from_strs(
            &["Stage", "2024-07"],
            &[
                &["Invited", "2"],
                &["Mystery", "1"],
                &["Enigma", "4"],
                &["Enigma", "3"],
            ],
        );

        let table = normalize(&raw, &catalog_with_fallback(), &NormalizeOptions::wide()).unwrap();
        assert_eq!(table.get("Other", month("2024-07")), Some(5));
        assert_eq!(table.stage_count(), 4);
    }

    #[test]
    fn test_fallback_stage_row_adds_to_unknowns() {
        let raw = RawTable::from_strs(
            &["Stage", "2024-07"],
            &[&["Other", "3"], &["Mystery", "1"], &["Enigma", "4"]],
        );

        let table = normalize(&raw, &catalog_with_fallback(), &NormalizeOptions::wide()).unwrap();
        assert_eq!(table.get("Other", month("2024-07")), Some(8));
        assert_eq!(table.grand_total(), 8);
    }

    #[test]
    fn test_huge_unknown_counts_overflow_cleanly() {
        let raw = RawTable::from_strs(
            &["Stage", "2024-07"],
            &[&["Mystery", "9223372036854775808"], &["Enigma", "9223372036854775808"]],
        );

        assert!(matches!(
            normalize(&raw, &catalog_with_fallback(), &NormalizeOptions::wide()),
            Err(ProgressError::CountOverflow { .. })
        ));
    }

    #[test]
    fn test_lenient_mode_without_fallback_fails() {
        let raw = RawTable::from_strs(&["Stage", "2024-07"], &[&["Mystery", "1"]]);
        assert!(matches!(
            normalize(&raw, &catalog(), &NormalizeOptions::wide()),
            Err(ProgressError::UnknownStage { .. })
        ));
    }

    #[test]
    fn test_schema_errors() {
        let no_periods = RawTable::from_strs(&["Stage", "Notes"], &[&["Invited", "call back"]]);
        assert!(matches!(
            normalize(&no_periods, &catalog(), &NormalizeOptions::wide()),
            Err(ProgressError::Schema(_))
        ));

        let only_stage = RawTable::from_strs(&["Stage"], &[&["Invited"]]);
        assert!(matches!(
            normalize(&only_stage, &catalog(), &NormalizeOptions::wide()),
            Err(ProgressError::Schema(_))
        ));

        let no_period_column = RawTable::from_strs(&["Stage", "Value"], &[&["Invited", "1"]]);
        assert!(matches!(
            normalize(&no_period_column, &catalog(), &NormalizeOptions::long()),
            Err(ProgressError::Schema(_))
        ));

        let bad_period = RawTable::from_strs(&["Month", "Invited"], &[&["soon", "1"]]);
        assert!(matches!(
            normalize(&bad_period, &catalog(), &NormalizeOptions::long()),
            Err(ProgressError::Schema(_))
        ));

        let empty = RawTable::default();
        assert!(normalize(&empty, &catalog(), &NormalizeOptions::wide()).is_err());
    }

    #[test]
    fn test_invalid_counts_rejected() {
        for bad in ["-3", "2.5", "lots"] {
            let raw = RawTable::from_strs(&["Stage", "2024-07"], &[&["Invited", bad]]);
            assert!(
                matches!(
                    normalize(&raw, &catalog(), &NormalizeOptions::wide()),
                    Err(ProgressError::InvalidValue { .. })
                ),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_blank_rows_and_columns_ignored() {
        let raw = RawTable::from_strs(
            &["Stage", "2024-07", ""],
            &[&["Invited", "1", ""], &["", "", ""]],
        );

        let table = normalize(&raw, &catalog(), &NormalizeOptions::wide()).unwrap();
        assert_eq!(table.month_count(), 1);
        assert_eq!(table.get("Invited", month("2024-07")), Some(1));
    }

    #[test]
    fn test_normalizing_canonical_output_is_identity() {
        let raw = RawTable::from_strs(
            &["Month", "Stage", "Value"],
            &[
                &["2024-08", "Declined", "2"],
                &["2024-07", "Invited", "7"],
                &["2024-07", "Done", "3"],
            ],
        );
        let once = normalize(&raw, &catalog(), &NormalizeOptions::long()).unwrap();
        let twice = normalize(&once.to_raw(), &catalog(), &NormalizeOptions::wide()).unwrap();

        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn prop_normalize_shape_and_idempotence(
            cells in prop::collection::vec((0usize..4, 0u32..12, 0u64..500), 1..40),
        ) {
            let names = ["Invited", "InProgress", "Completed", "Declined"];
            let rows: Vec<Vec<String>> = cells
                .iter()
                .map(|(stage, m, value)| {
                    vec![
                        format!("2024-{:02}", m + 1),
                        names[*stage].to_string(),
                        value.to_string(),
                    ]
                })
                .collect();
            let raw = RawTable::new(
                vec!["Month".to_string(), "Stage".to_string(), "Value".to_string()],
                rows,
            );

            let table = normalize(&raw, &catalog(), &NormalizeOptions::long()).unwrap();

            let distinct: BTreeSet<u32> = cells.iter().map(|(_, m, _)| *m).collect();
            prop_assert_eq!(table.stage_count(), 4);
            prop_assert_eq!(table.month_count(), distinct.len());

            let again = normalize(&table.to_raw(), &catalog(), &NormalizeOptions::wide()).unwrap();
            prop_assert_eq!(again, table);
        }
    }
}
