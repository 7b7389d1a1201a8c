// file: src/pipeline/aggregator.rs
// description: derived series over progress tables: monthly totals, combination, snapshots
// reference: internal aggregation rules

use crate::error::{ProgressError, Result};
use crate::models::{CombinedTable, Month, ProgressTable, SiteDataset, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-progress total (`N`) and excluded count (`n`) for one month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub included: u64,
    pub excluded: u64,
}

impl MonthlyTotal {
    pub fn total(&self) -> u64 {
        self.included + self.excluded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: String,
    pub count: u64,
    pub excluded: bool,
}

/// One month of a table, stages in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub month: Month,
    pub counts: Vec<StageCount>,
    pub total: u64,
    pub included: u64,
    pub excluded: u64,
}

impl Snapshot {
    pub fn count(&self, stage: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|c| c.stage == stage)
            .map(|c| c.count)
    }
}

pub struct ProgressAggregator;

impl ProgressAggregator {
    /// Exclusion predicate that follows the catalog's `excluded` flags.
    pub fn catalog_exclusions(stage: &Stage) -> bool {
        stage.is_excluded()
    }

    /// Per-month split into counts of non-excluded and excluded stages.
    /// `included + excluded` always equals the month's column sum.
    pub fn monthly_totals<F>(table: &ProgressTable, exclude: F) -> BTreeMap<Month, MonthlyTotal>
    where
        F: Fn(&Stage) -> bool,
    {
        let flags: Vec<bool> = table.catalog().stages().iter().map(&exclude).collect();

        table
            .months()
            .iter()
            .enumerate()
            .map(|(month_index, month)| {
                let mut totals = MonthlyTotal::default();
                for (stage_index, excluded) in flags.iter().enumerate() {
                    let count = table.count_at(stage_index, month_index);
                    if *excluded {
                        totals.excluded += count;
                    } else {
                        totals.included += count;
                    }
                }
                (*month, totals)
            })
            .collect()
    }

    /// Cell-wise sum over tables built against the same catalog. Months
    /// missing from a table count as zero for it; input order is irrelevant.
    pub fn combine(tables: &[&ProgressTable]) -> Result<ProgressTable> {
        let first = tables.first().ok_or(ProgressError::NothingToCombine)?;
        let catalog = Arc::clone(first.shared_catalog());

        for table in &tables[1..] {
            if table.catalog() != catalog.as_ref() {
                return Err(ProgressError::CatalogMismatch {
                    expected: catalog.short_fingerprint().to_string(),
                    found: table.catalog().short_fingerprint().to_string(),
                });
            }
        }

        let months = tables.iter().flat_map(|t| t.months().iter().copied());
        let mut combined = ProgressTable::zeroed(catalog, months);

        for table in tables {
            for (month_index, month) in table.months().iter().enumerate() {
                let Some(target) = combined.month_index(*month) else {
                    continue;
                };
                for stage_index in 0..table.stage_count() {
                    combined.add_at(stage_index, target, table.count_at(stage_index, month_index))?;
                }
            }
        }

        Ok(combined)
    }

    pub fn combine_sites(sites: &[SiteDataset]) -> Result<CombinedTable> {
        let tables: Vec<&ProgressTable> = sites.iter().map(|s| s.table()).collect();
        let table = Self::combine(&tables)?;
        let names = sites.iter().map(|s| s.name().to_string()).collect();
        Ok(CombinedTable::new(names, table))
    }

    /// Snapshot of the most recent month.
    pub fn latest_snapshot(table: &ProgressTable) -> Result<Snapshot> {
        let last = table.months().len().checked_sub(1).ok_or_else(|| {
            ProgressError::EmptyTable("table has no months to snapshot".to_string())
        })?;
        Ok(Self::snapshot_index(table, last))
    }

    pub fn snapshot_at(table: &ProgressTable, month: Month) -> Result<Snapshot> {
        let index = table.month_index(month).ok_or_else(|| {
            ProgressError::EmptyTable(format!("table has no data for {}", month))
        })?;
        Ok(Self::snapshot_index(table, index))
    }

    fn snapshot_index(table: &ProgressTable, month_index: usize) -> Snapshot {
        let counts: Vec<StageCount> = table
            .catalog()
            .stages()
            .iter()
            .enumerate()
            .map(|(stage_index, stage)| StageCount {
                stage: stage.name.clone(),
                count: table.count_at(stage_index, month_index),
                excluded: stage.is_excluded(),
            })
            .collect();

        let excluded: u64 = counts.iter().filter(|c| c.excluded).map(|c| c.count).sum();
        let total: u64 = counts.iter().map(|c| c.count).sum();

        Snapshot {
            month: table.months()[month_index],
            counts,
            total,
            included: total - excluded,
            excluded,
        }
    }

    /// Keeps only the `last_n` most recent months.
    pub fn window(table: &ProgressTable, last_n: usize) -> ProgressTable {
        table.last_months(last_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceIdentity, StageCatalog};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn catalog() -> Arc<StageCatalog> {
        Arc::new(
            StageCatalog::new(vec![
                Stage::new("Invited"),
                Stage::new("InProgress"),
                Stage::new("Completed"),
                Stage::excluded("Declined"),
            ])
            .unwrap(),
        )
    }

    fn month(text: &str) -> Month {
        text.parse().unwrap()
    }

    fn table(cells: &[(&str, &str, u64)]) -> ProgressTable {
        table_with(catalog(), cells)
    }

    fn table_with(catalog: Arc<StageCatalog>, cells: &[(&str, &str, u64)]) -> ProgressTable {
        let mut table =
            ProgressTable::zeroed(Arc::clone(&catalog), cells.iter().map(|(_, m, _)| month(m)));
        for (stage, m, value) in cells {
            let stage_index = catalog.index_of(stage).unwrap();
            let month_index = table.month_index(month(m)).unwrap();
            table.add_at(stage_index, month_index, *value).unwrap();
        }
        table
    }

    #[test]
    fn test_monthly_totals_split_excluded() {
        let t = table(&[
            ("Invited", "2024-07", 7),
            ("Completed", "2024-07", 3),
            ("Declined", "2024-08", 4),
            ("InProgress", "2024-08", 6),
        ]);

        let totals = ProgressAggregator::monthly_totals(&t, ProgressAggregator::catalog_exclusions);

        assert_eq!(
            totals.get(&month("2024-07")),
            Some(&MonthlyTotal {
                included: 10,
                excluded: 0
            })
        );
        assert_eq!(
            totals.get(&month("2024-08")),
            Some(&MonthlyTotal {
                included: 6,
                excluded: 4
            })
        );
    }

    #[test]
    fn test_monthly_totals_custom_predicate() {
        let t = table(&[("Invited", "2024-07", 7), ("Completed", "2024-07", 3)]);

        let totals = ProgressAggregator::monthly_totals(&t, |s| s.name == "Invited");
        assert_eq!(totals[&month("2024-07")].included, 3);
        assert_eq!(totals[&month("2024-07")].excluded, 7);
    }

    #[test]
    fn test_combine_sums_matching_cells() {
        let a = table(&[("Completed", "2024-08", 5)]);
        let b = table(&[("Completed", "2024-08", 5), ("Invited", "2024-09", 2)]);

        let combined = ProgressAggregator::combine(&[&a, &b]).unwrap();

        assert_eq!(combined.get("Completed", month("2024-08")), Some(10));
        assert_eq!(combined.get("Invited", month("2024-09")), Some(2));
        assert_eq!(combined.get("Completed", month("2024-09")), Some(0));
        assert_eq!(combined.months(), &[month("2024-08"), month("2024-09")]);
    }

    #[test]
    fn test_combine_rejects_catalog_mismatch() {
        let other = Arc::new(StageCatalog::new(vec![Stage::new("Completed")]).unwrap());
        let a = table(&[("Completed", "2024-08", 5)]);
        let b = table_with(other, &[("Completed", "2024-08", 5)]);

        assert!(matches!(
            ProgressAggregator::combine(&[&a, &b]),
            Err(ProgressError::CatalogMismatch { .. })
        ));
    }

    #[test]
    fn test_combine_reports_overflow() {
        let a = table(&[("Completed", "2024-08", u64::MAX)]);
        let b = table(&[("Invited", "2024-09", 1)]);

        assert!(matches!(
            ProgressAggregator::combine(&[&a, &b]),
            Err(ProgressError::CountOverflow { .. })
        ));
    }

    #[test]
    fn test_combine_requires_input() {
        assert!(matches!(
            ProgressAggregator::combine(&[]),
            Err(ProgressError::NothingToCombine)
        ));
    }

    #[test]
    fn test_combine_sites_records_names() {
        let sites = vec![
            SiteDataset::new(
                "RP1",
                SourceIdentity::File("data/rp1.csv".into()),
                table(&[("Invited", "2024-07", 1)]),
            ),
            SiteDataset::new(
                "Abidjan",
                SourceIdentity::Sample,
                table(&[("Invited", "2024-07", 2)]),
            ),
        ];

        let combined = ProgressAggregator::combine_sites(&sites).unwrap();
        assert_eq!(combined.sites(), &["RP1".to_string(), "Abidjan".to_string()]);
        assert_eq!(combined.table().get("Invited", month("2024-07")), Some(3));
    }

    #[test]
    fn test_latest_snapshot() {
        let t = table(&[
            ("Invited", "2024-08", 1),
            ("Invited", "2024-07", 9),
            ("Completed", "2024-08", 4),
            ("Declined", "2024-08", 2),
        ]);

        let snapshot = ProgressAggregator::latest_snapshot(&t).unwrap();

        assert_eq!(snapshot.month, month("2024-08"));
        assert_eq!(snapshot.count("Invited"), Some(1));
        assert_eq!(snapshot.count("InProgress"), Some(0));
        assert_eq!(snapshot.total, 7);
        assert_eq!(snapshot.included, 5);
        assert_eq!(snapshot.excluded, 2);
        let order: Vec<&str> = snapshot.counts.iter().map(|c| c.stage.as_str()).collect();
        assert_eq!(order, vec!["Invited", "InProgress", "Completed", "Declined"]);
    }

    #[test]
    fn test_snapshot_of_empty_table_fails() {
        let empty = ProgressTable::zeroed(catalog(), Vec::new());
        assert!(matches!(
            ProgressAggregator::latest_snapshot(&empty),
            Err(ProgressError::EmptyTable(_))
        ));
    }

    #[test]
    fn test_snapshot_at_specific_month() {
        let t = table(&[("Invited", "2024-07", 9), ("Invited", "2024-08", 1)]);

        let snapshot = ProgressAggregator::snapshot_at(&t, month("2024-07")).unwrap();
        assert_eq!(snapshot.count("Invited"), Some(9));
        assert!(ProgressAggregator::snapshot_at(&t, month("2023-01")).is_err());
    }

    #[test]
    fn test_window_keeps_most_recent_months() {
        let t = table(&[
            ("Invited", "2024-06", 1),
            ("Invited", "2024-07", 2),
            ("Invited", "2024-08", 3),
        ]);

        let last_two = ProgressAggregator::window(&t, 2);
        assert_eq!(last_two.months(), &[month("2024-07"), month("2024-08")]);
        assert_eq!(last_two.stage_series(0), &[2, 3]);

        assert_eq!(ProgressAggregator::window(&t, 10), t);
        assert!(ProgressAggregator::window(&t, 0).is_empty());
    }

    fn arb_table() -> impl Strategy<Value = ProgressTable> {
        prop::collection::vec((0usize..4, 0u32..6, 0u64..1000), 0..24).prop_map(|cells| {
            let catalog = catalog();
            let mut t = ProgressTable::zeroed(
                Arc::clone(&catalog),
                cells.iter().map(|(_, m, _)| Month::new(2024, m + 1).unwrap()),
            );
            for (stage, m, value) in cells {
                let month_index = t.month_index(Month::new(2024, m + 1).unwrap()).unwrap();
                t.add_at(stage, month_index, value).unwrap();
            }
            t
        })
    }

    proptest! {
        #[test]
        fn prop_accounting_is_closed(t in arb_table()) {
            let totals = ProgressAggregator::monthly_totals(&t, ProgressAggregator::catalog_exclusions);
            prop_assert_eq!(totals.len(), t.month_count());
            for (month_index, month) in t.months().iter().enumerate() {
                let column_sum: u64 = t.column(month_index).iter().sum();
                prop_assert_eq!(totals[month].total(), column_sum);
            }
        }

        #[test]
        fn prop_combine_is_commutative(a in arb_table(), b in arb_table()) {
            let ab = ProgressAggregator::combine(&[&a, &b]).unwrap();
            let ba = ProgressAggregator::combine(&[&b, &a]).unwrap();
            prop_assert_eq!(ab, ba);
        }

        #[test]
        fn prop_combine_is_associative(a in arb_table(), b in arb_table(), c in arb_table()) {
            let flat = ProgressAggregator::combine(&[&a, &b, &c]).unwrap();
            let ab = ProgressAggregator::combine(&[&a, &b]).unwrap();
            let nested = ProgressAggregator::combine(&[&ab, &c]).unwrap();
            prop_assert_eq!(flat, nested);
        }

        #[test]
        fn prop_combine_preserves_grand_total(a in arb_table(), b in arb_table()) {
            let ab = ProgressAggregator::combine(&[&a, &b]).unwrap();
            prop_assert_eq!(ab.grand_total(), a.grand_total() + b.grand_total());
        }
    }
}
