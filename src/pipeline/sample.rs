// file: src/pipeline/sample.rs
// description: built-in demonstration table, used only under the explicit sample fallback policy

use crate::config::EXCLUDED_STAGE;
use crate::models::RawTable;

const MONTHS: [&str; 7] = [
    "Jul 2024", "Aug 2024", "Sep 2024", "Oct 2024", "Nov 2024", "Dec 2024", "Jan 2025",
];

const ROWS: [(&str, [u64; 7]); 8] = [
    ("1st or 2nd invites", [7, 5, 3, 2, 1, 0, 0]),
    ("3rd or more invites", [10, 8, 6, 4, 2, 0, 0]),
    ("Data sharing discussions and eligibility check", [29, 25, 22, 18, 15, 12, 10]),
    ("DTA in progress", [36, 38, 40, 42, 44, 46, 48]),
    ("DTA completed", [36, 40, 45, 48, 50, 52, 54]),
    ("Data sets in hand", [64, 68, 72, 75, 78, 80, 82]),
    ("Databases harmonised", [20, 25, 30, 35, 40, 45, 50]),
    (EXCLUDED_STAGE, [40, 35, 32, 30, 28, 25, 22]),
];

/// Wide sample table over Jul 2024 - Jan 2025.
pub fn sample_raw_table() -> RawTable {
    let headers = std::iter::once("Stage".to_string())
        .chain(MONTHS.iter().map(|m| m.to_string()))
        .collect();

    let rows = ROWS
        .iter()
        .map(|(stage, counts)| {
            std::iter::once(stage.to_string())
                .chain(counts.iter().map(|c| c.to_string()))
                .collect()
        })
        .collect();

    RawTable::new(headers, rows)
}
