//! Run configuration.

use chrono::NaiveDate;
use std::path::PathBuf;

pub const TIMESPANS: &[&str] = &["minute", "hour", "day", "week", "month"];

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub orders_path: PathBuf,
    pub buckets_path: PathBuf,
    pub scenarios_path: PathBuf,

    pub bars_cache_dir: PathBuf,
    pub bars_start_date: Option<NaiveDate>,
    pub bars_end_date: Option<NaiveDate>,
    pub rth_only: bool,
    pub bars_multiplier: i64,
    pub bars_timespan: String,

    /// Simulation horizon; `None` falls back to the latest loaded bar date.
    pub as_of_date: Option<NaiveDate>,
    pub parallel: bool,

    pub positions_out: PathBuf,
    pub results_out: PathBuf,
}

impl RunConfig {
    /// Explicit as-of date if configured, else `latest_bar_date`.
    pub fn resolve_as_of(&self, latest_bar_date: Option<NaiveDate>) -> Option<NaiveDate> {
        self.as_of_date.or(latest_bar_date)
    }
}
