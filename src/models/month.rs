// file: src/models/month.rs
// description: calendar month identifier used as the period axis of progress tables
// reference: https://docs.rs/chrono

use crate::error::{ProgressError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month. Ordering is chronological (year first, then month).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ProgressError::InvalidMonth(format!(
                "month number {} out of range for year {}",
                month, year
            )));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Parses the period spellings found in spreadsheet exports:
    /// `2024-07`, `2024-07-01`, `2024-07-01 00:00:00`, `Jul 2024`,
    /// `July 2024` and `07/2024`. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let date = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
            .or_else(|_| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date())
            })
            .or_else(|_| NaiveDate::parse_from_str(&format!("01 {}", text), "%d %B %Y"))
            .or_else(|_| NaiveDate::parse_from_str(&format!("01/{}", text), "%d/%m/%Y"))
            .ok()?;

        Some(Self {
            year: date.year(),
            month: date.month(),
        })
    }

    /// Axis label in the `Jul 2024` form.
    pub fn label(&self) -> String {
        match NaiveDate::from_ymd_opt(self.year, self.month, 1) {
            Some(date) => date.format("%b %Y").to_string(),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| ProgressError::InvalidMonth(s.to_string()))
    }
}

impl TryFrom<String> for Month {
    type Error = ProgressError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(month: Month) -> Self {
        month.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spreadsheet_spellings() {
        let expected = Month::new(2024, 7).unwrap();

        for text in [
            "2024-07",
            "2024-07-01",
            "2024-07-01 00:00:00",
            "Jul 2024",
            "July 2024",
            "07/2024",
            "  Jul 2024 ",
        ] {
            assert_eq!(Month::parse(text), Some(expected), "failed on {:?}", text);
        }
    }

    #[test]
    fn test_parse_rejects_non_periods() {
        assert_eq!(Month::parse("Stage"), None);
        assert_eq!(Month::parse("Total"), None);
        assert_eq!(Month::parse(""), None);
        assert_eq!(Month::parse("2024-13"), None);
    }

    #[test]
    fn test_chronological_order() {
        let dec = Month::new(2024, 12).unwrap();
        let jan = Month::new(2025, 1).unwrap();
        let jul = Month::new(2024, 7).unwrap();

        let mut months = vec![jan, jul, dec];
        months.sort();
        assert_eq!(months, vec![jul, dec, jan]);
    }

    #[test]
    fn test_display_and_label() {
        let month = Month::new(2025, 1).unwrap();
        assert_eq!(month.to_string(), "2025-01");
        assert_eq!(month.label(), "Jan 2025");
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(Month::new(2024, 0).is_err());
        assert!(Month::new(2024, 13).is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let month = Month::new(2024, 8).unwrap();
        let json = serde_json::to_string(&month).unwrap();
        assert_eq!(json, "\"2024-08\"");

        let back: Month = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month);
    }
}
