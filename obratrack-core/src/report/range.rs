//! Report date range validation.

use std::sync::OnceLock;

use chrono::{DateTime, Days, NaiveDate, Utc};
use regex::Regex;

use crate::error::{Error, Result};

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date regex"))
}

/// Inclusive `[from, to]` range of calendar days (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl ReportRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// Parse `YYYY-MM-DD` inputs.
    ///
    /// Both values must match the pattern exactly and name a real day, and
    /// `from` may not come after `to`.
    pub fn parse(from: &str, to: &str) -> Result<Self> {
        let from = parse_date(from, "fromDate")?;
        let to = parse_date(to, "toDate")?;
        if from > to {
            return Err(Error::InvalidDate(format!(
                "fromDate {} is after toDate {}",
                from, to
            )));
        }
        Ok(Self::new(from, to))
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    /// Midnight UTC at the start of `from`
    pub fn start(&self) -> DateTime<Utc> {
        self.from.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Midnight UTC after `to` (exclusive bound)
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        self.to
            .checked_add_days(Days::new(1))
            .map(|next| next.and_time(chrono::NaiveTime::MIN).and_utc())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start() <= ts && ts < self.end_exclusive()
    }
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    if !date_pattern().is_match(value) {
        return Err(Error::InvalidDate(format!(
            "{} must be YYYY-MM-DD, got {:?}",
            field, value
        )));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| Error::InvalidDate(format!("{} {:?}: {}", field, value, e)))
}
