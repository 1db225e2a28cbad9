#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
pub use whatif::domain::bar::Bar;
use whatif::domain::error::WhatifError;
use whatif::domain::order::RawOrder;
use whatif::domain::position::Position;
use whatif::domain::reconstruct::BucketRecord;
use whatif::domain::run_config::RunConfig;
use whatif::domain::scenario::ScenarioRecord;
use whatif::domain::simulate::SimulationResult;
use whatif::ports::bar_port::BarSource;
use whatif::ports::record_port::RecordSource;
use whatif::ports::report_port::ReportPort;

pub struct MockBarSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.entry(symbol.to_string()).or_default().extend(bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl BarSource for MockBarSource {
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, WhatifError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(WhatifError::Csv {
                source_name: format!("{symbol}.csv"),
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(WhatifError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }
}

#[derive(Default)]
pub struct MemoryRecords {
    pub orders: Vec<RawOrder>,
    pub buckets: Vec<BucketRecord>,
    pub scenarios: Vec<ScenarioRecord>,
}

impl RecordSource for MemoryRecords {
    fn read_orders(&self) -> Result<Vec<RawOrder>, WhatifError> {
        Ok(self.orders.clone())
    }

    fn read_buckets(&self) -> Result<Vec<BucketRecord>, WhatifError> {
        Ok(self.buckets.clone())
    }

    fn read_scenarios(&self) -> Result<Vec<ScenarioRecord>, WhatifError> {
        Ok(self.scenarios.clone())
    }
}

#[derive(Default)]
pub struct MemoryReport {
    pub positions: RefCell<Vec<Position>>,
    pub results: RefCell<Vec<SimulationResult>>,
}

impl ReportPort for MemoryReport {
    fn write_positions(&self, positions: &[Position]) -> Result<(), WhatifError> {
        *self.positions.borrow_mut() = positions.to_vec();
        Ok(())
    }

    fn write_results(&self, results: &[SimulationResult]) -> Result<(), WhatifError> {
        *self.results.borrow_mut() = results.to_vec();
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date: NaiveDate, minute_of_day: u16, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        date,
        minute_of_day,
        open: close,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// One 30-minute bar per `(high, low, close)` triple starting at 09:30.
pub fn day_bars(date: NaiveDate, bars: &[(f64, f64, f64)]) -> Vec<Bar> {
    bars.iter()
        .enumerate()
        .map(|(i, &(high, low, close))| make_bar(date, 570 + 30 * i as u16, high, low, close))
        .collect()
}

pub fn raw_order(date: &str, order_id: u64, side: &str, qty: f64, symbol: &str, price: f64) -> RawOrder {
    RawOrder {
        date: date.to_string(),
        order_id: order_id.to_string(),
        asset_type: "Stock".to_string(),
        side: side.to_string(),
        quantity: qty.to_string(),
        symbol: symbol.to_string(),
        price_type: "Market".to_string(),
        term: "Day".to_string(),
        order_price: String::new(),
        execution_price: price.to_string(),
        status: "Executed".to_string(),
    }
}

pub fn bucket(symbol: &str, bucket: &str) -> BucketRecord {
    BucketRecord {
        symbol: symbol.to_string(),
        bucket: bucket.to_string(),
    }
}

pub fn fixed_scenario(id: &str, bucket: &str, target_pct: f64, shtf_pct: f64) -> ScenarioRecord {
    ScenarioRecord {
        scenario_id: id.to_string(),
        bucket: bucket.to_string(),
        dip_model: String::new(),
        pullback_pct: "0.05".to_string(),
        reclaim_pct: "0.02".to_string(),
        target_model: "fixed".to_string(),
        target_pct: target_pct.to_string(),
        k: String::new(),
        shtf_pct: shtf_pct.to_string(),
        time_stop_days: String::new(),
    }
}

pub fn sample_run_config(dir: &Path) -> RunConfig {
    RunConfig {
        orders_path: dir.join("orders.csv"),
        buckets_path: dir.join("ticker_buckets.csv"),
        scenarios_path: dir.join("scenarios.csv"),
        bars_cache_dir: dir.join("bars"),
        bars_start_date: None,
        bars_end_date: None,
        rth_only: false,
        bars_multiplier: 30,
        bars_timespan: "minute".to_string(),
        as_of_date: None,
        parallel: false,
        positions_out: dir.join("out/positions_reconstructed.csv"),
        results_out: dir.join("out/sim_trades.csv"),
    }
}
