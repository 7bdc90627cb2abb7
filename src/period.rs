use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

/// Default KBA download location for the monthly FZ10 series
pub const DEFAULT_BASE_URL: &str =
    "https://www.kba.de/SharedDocs/Downloads/DE/Statistik/Fahrzeuge/FZ10/";

// Years the publisher is accepted to cover
const MIN_YEAR: i32 = 2000;
const MAX_YEAR: i32 = 2100;

#[derive(Error, Debug)]
pub enum PeriodError {
    #[error("invalid month {0}: must be between 1 and 12")]
    MonthOutOfRange(u32),

    #[error("year {0} is outside the published range 2000-2100")]
    YearOutOfRange(i32),
}

/// One (year, month) publication cycle of the FZ10 registration report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReportPeriod {
    year: i32,
    month: u32,
}

impl ReportPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(PeriodError::YearOutOfRange(year));
        }
        Ok(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Filename of the published workbook, also used as the cache key
    /// Example: 2025-06 maps to fz10_2025_06.xlsx
    pub fn cache_key(&self) -> String {
        format!("fz10_{}_{:02}.xlsx", self.year, self.month)
    }

    /// Fully qualified download URL under `base_url`
    pub fn download_url(&self, base_url: &str) -> String {
        format!(
            "{}{}?__blob=publicationFile&v=3",
            base_url,
            self.cache_key()
        )
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// All periods of `today`'s year up to and including last month, ascending.
/// Empty in January: nothing of the current year has been published yet.
pub fn periods_through_previous_month(today: NaiveDate) -> Vec<ReportPeriod> {
    let year = today.year();
    (1..today.month())
        .map(|month| ReportPeriod { year, month })
        .collect()
}
