//! CSV bar cache adapter.
//!
//! Reads one `<SYMBOL>.csv` per symbol from a cache directory. Extra
//! columns (vwap, transactions, ...) are ignored.

use crate::domain::bar::{Bar, parse_bar_datetime};
use crate::domain::error::WhatifError;
use crate::domain::parse::parse_number;
use crate::ports::bar_port::BarSource;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct BarRow {
    datetime: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: String,
}

pub struct CsvBarAdapter {
    base_path: PathBuf,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    rth_only: bool,
}

impl CsvBarAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            start_date: None,
            end_date: None,
            rth_only: false,
        }
    }

    /// Keep only bars whose date falls in `[start, end]`; `None` leaves that side open.
    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn with_rth_only(mut self, rth_only: bool) -> Self {
        self.rth_only = rth_only;
        self
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn in_range(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|s| date >= s) && self.end_date.is_none_or(|e| date <= e)
    }

    fn parse_row(row: &BarRow) -> Result<Bar, WhatifError> {
        let (date, minute_of_day) = parse_bar_datetime(&row.datetime)?;
        let volume = if row.volume.trim().is_empty() {
            0.0
        } else {
            parse_number("volume", &row.volume)?
        };
        Ok(Bar {
            date,
            minute_of_day,
            open: parse_number("open", &row.open)?,
            high: parse_number("high", &row.high)?,
            low: parse_number("low", &row.low)?,
            close: parse_number("close", &row.close)?,
            volume,
        })
    }
}

impl BarSource for CsvBarAdapter {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, WhatifError> {
        let path = self.csv_path(symbol);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WhatifError::NoData {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => return Err(WhatifError::Io(e)),
        };

        let source_name = path.display().to_string();
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
        let mut bars = Vec::new();

        for result in rdr.deserialize::<BarRow>() {
            let row = result.map_err(|e| WhatifError::Csv {
                source_name: source_name.clone(),
                reason: e.to_string(),
            })?;
            let bar = Self::parse_row(&row)?;
            if !self.in_range(bar.date) || (self.rth_only && !bar.is_regular_hours()) {
                continue;
            }
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(WhatifError::NoData {
                symbol: symbol.to_string(),
            });
        }

        bars.sort_by_key(|b| (b.date, b.minute_of_day));
        Ok(bars)
    }
}
