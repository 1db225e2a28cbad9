//! Per-symbol bar series with a date-keyed contiguous-range day index.
//!
//! A [`BarSeries`] is built once at load time and never mutated. Its day
//! index doubles as the symbol's trading-day calendar: the sorted set of
//! dates that actually have bars.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;

use super::bar::Bar;
use super::error::WhatifError;
use crate::ports::bar_port::BarSource;

/// Inclusive range of series positions belonging to one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: usize,
    pub end: usize,
}

impl DayRange {
    pub fn bar_count(&self) -> usize {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    pub symbol: String,
    bars: Vec<Bar>,
    days: Vec<(NaiveDate, DayRange)>,
}

impl BarSeries {
    /// Build the series and its day index in one pass over the bars.
    ///
    /// Bars are stably sorted by `(date, minute_of_day)` first, so a
    /// source that is already ordered is left untouched.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| (b.date, b.minute_of_day));

        let mut days: Vec<(NaiveDate, DayRange)> = Vec::new();
        let mut start = 0usize;
        for i in 1..=bars.len() {
            if i == bars.len() || bars[i].date != bars[start].date {
                days.push((bars[start].date, DayRange { start, end: i - 1 }));
                start = i;
            }
        }

        Self {
            symbol: symbol.into(),
            bars,
            days,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// `None` means a non-trading day or a gap in the cached source.
    pub fn day_range(&self, date: NaiveDate) -> Option<DayRange> {
        self.day_position(date).map(|i| self.days[i].1)
    }

    /// Position of `date` in the trading-day calendar.
    pub fn day_position(&self, date: NaiveDate) -> Option<usize> {
        self.days.binary_search_by_key(&date, |(d, _)| *d).ok()
    }

    /// Calendar position of the last trading day on or before `date`.
    pub fn last_day_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        let after = self.days.partition_point(|(d, _)| *d <= date);
        after.checked_sub(1)
    }

    pub fn day_at(&self, position: usize) -> Option<(NaiveDate, DayRange)> {
        self.days.get(position).copied()
    }

    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    pub fn day_ranges(&self) -> &[(NaiveDate, DayRange)] {
        &self.days
    }

    pub fn bars_in(&self, range: DayRange) -> &[Bar] {
        &self.bars[range.start..=range.end]
    }

    /// All bars strictly before `date`.
    pub fn bars_before(&self, date: NaiveDate) -> &[Bar] {
        let cut = self.bars.partition_point(|b| b.date < date);
        &self.bars[..cut]
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.last().map(|(d, _)| *d)
    }

    /// Inclusive count of trading days from `from` to `to` on this calendar.
    pub fn trading_days_between(&self, from: NaiveDate, to: NaiveDate) -> Option<usize> {
        let start = self.day_position(from)?;
        let end = self.day_position(to)?;
        (end >= start).then(|| end - start + 1)
    }
}

/// All loaded series, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct BarStore {
    series: HashMap<String, BarSeries>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every symbol through `source`.
    ///
    /// A symbol with no cached data gets an empty series so downstream pairs
    /// degrade to NO_BARS; any other source error aborts the load.
    pub fn load(
        symbols: &[String],
        source: &(dyn BarSource + Sync),
        parallel: bool,
    ) -> Result<Self, WhatifError> {
        let fetch = |symbol: &String| -> Result<BarSeries, WhatifError> {
            match source.fetch_bars(symbol) {
                Ok(bars) => {
                    tracing::debug!(symbol = %symbol, bars = bars.len(), "loaded bars");
                    Ok(BarSeries::new(symbol.clone(), bars))
                }
                Err(WhatifError::NoData { .. }) => {
                    tracing::warn!(symbol = %symbol, "no cached bars, positions will report NO_BARS");
                    Ok(BarSeries::empty(symbol.clone()))
                }
                Err(e) => Err(e),
            }
        };

        let loaded: Vec<BarSeries> = if parallel {
            symbols.par_iter().map(fetch).collect::<Result<Vec<_>, _>>()?
        } else {
            symbols.iter().map(fetch).collect::<Result<Vec<_>, _>>()?
        };

        let mut store = Self::new();
        for series in loaded {
            store.insert(series);
        }
        Ok(store)
    }

    pub fn insert(&mut self, series: BarSeries) {
        self.series.insert(series.symbol.clone(), series);
    }

    pub fn get(&self, symbol: &str) -> Option<&BarSeries> {
        self.series.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn total_bars(&self) -> usize {
        self.series.values().map(BarSeries::bar_count).sum()
    }

    /// Maximum last-bar date across all series; the default as-of horizon.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.series.values().filter_map(BarSeries::last_date).max()
    }
}
