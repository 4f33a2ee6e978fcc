//! Tax reporting over stored receipts.

mod ustva;

pub use ustva::{generate_ustva, UstvaLineItem, UstvaReport, UNKNOWN_RATE};

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use crate::error::BelegError;

/// A calendar quarter, written `2024-Q1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quarter {
    year: i32,
    quarter: u32,
}

impl Quarter {
    /// `quarter` must be 1 to 4.
    pub fn new(year: i32, quarter: u32) -> Option<Self> {
        if !(1..=4).contains(&quarter) {
            return None;
        }
        // Both bounds must be representable.
        let q = Self { year, quarter };
        q.try_bounds().map(|_| q)
    }

    /// The quarter a date falls into.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: (date.month() - 1) / 3 + 1,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn quarter(&self) -> u32 {
        self.quarter
    }

    /// First day of the quarter.
    pub fn start(&self) -> NaiveDate {
        self.bounds().0
    }

    /// Last day of the quarter, inclusive.
    pub fn end(&self) -> NaiveDate {
        self.bounds().1
    }

    fn bounds(&self) -> (NaiveDate, NaiveDate) {
        // Checked in `new`; `containing` starts from a valid date.
        self.try_bounds().unwrap_or((NaiveDate::MIN, NaiveDate::MAX))
    }

    fn try_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first_month = (self.quarter - 1) * 3 + 1;
        let start = NaiveDate::from_ymd_opt(self.year, first_month, 1)?;
        let end = if self.quarter == 4 {
            NaiveDate::from_ymd_opt(self.year, 12, 31)?
        } else {
            NaiveDate::from_ymd_opt(self.year, first_month + 3, 1)?.pred_opt()?
        };
        Some((start, end))
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-Q{}", self.year, self.quarter)
    }
}

impl FromStr for Quarter {
    type Err = BelegError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BelegError::Config(format!("invalid quarter '{}', expected e.g. 2024-Q1", s));

        let (year, quarter) = s.trim().split_once(['-', ' ']).ok_or_else(invalid)?;
        let quarter = quarter.trim().strip_prefix(['Q', 'q']).ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let quarter: u32 = quarter.parse().map_err(|_| invalid())?;

        Self::new(year, quarter).ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_quarter_bounds() {
        let q1: Quarter = "2024-Q1".parse().unwrap();
        assert_eq!(q1.start(), date(2024, 1, 1));
        assert_eq!(q1.end(), date(2024, 3, 31));

        let q4: Quarter = "2023-q4".parse().unwrap();
        assert_eq!(q4.start(), date(2023, 10, 1));
        assert_eq!(q4.end(), date(2023, 12, 31));

        assert_eq!(Quarter::new(2024, 2).unwrap().end(), date(2024, 6, 30));
    }

    #[test]
    fn test_quarter_parse_errors() {
        assert!("2024-Q5".parse::<Quarter>().is_err());
        assert!("2024".parse::<Quarter>().is_err());
        assert!("Q1-2024".parse::<Quarter>().is_err());
    }

    #[test]
    fn test_containing() {
        let q = Quarter::containing(date(2024, 8, 15));
        assert_eq!(q.to_string(), "2024-Q3");
        assert_eq!(q.start(), date(2024, 7, 1));
    }
}
