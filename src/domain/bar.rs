//! Intraday price bar representation.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use super::error::WhatifError;

/// Regular trading hours in the cache's Pacific wall-clock time,
/// 06:30 up to (not including) 13:00.
pub const RTH_OPEN_MINUTE: u16 = 6 * 60 + 30;
pub const RTH_CLOSE_MINUTE: u16 = 13 * 60;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub date: NaiveDate,
    pub minute_of_day: u16,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn is_regular_hours(&self) -> bool {
        (RTH_OPEN_MINUTE..RTH_CLOSE_MINUTE).contains(&self.minute_of_day)
    }
}

/// Parse a bar timestamp into its date key and minute-of-day.
///
/// The cache writes `M/D/YYYY H:MM`; ISO `YYYY-MM-DD HH:MM` is accepted too.
/// Anything else is a data-quality defect and fails with the literal.
pub fn parse_bar_datetime(raw: &str) -> Result<(NaiveDate, u16), WhatifError> {
    let s = raw.trim();
    let parsed = NaiveDateTime::parse_from_str(s, "%m/%d/%Y %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M"))
        .map_err(|_| WhatifError::date(raw))?;

    let time = parsed.time();
    let minute_of_day = (time.hour() * 60 + time.minute()) as u16;
    Ok((parsed.date(), minute_of_day))
}
