//! CSV input and output tables.

use crate::domain::error::WhatifError;
use crate::domain::order::RawOrder;
use crate::domain::parse::round4;
use crate::domain::position::Position;
use crate::domain::reconstruct::BucketRecord;
use crate::domain::run_config::RunConfig;
use crate::domain::scenario::ScenarioRecord;
use crate::domain::simulate::SimulationResult;
use crate::ports::record_port::RecordSource;
use crate::ports::report_port::ReportPort;
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TablePaths {
    pub orders: PathBuf,
    pub buckets: PathBuf,
    pub scenarios: PathBuf,
    pub positions_out: PathBuf,
    pub results_out: PathBuf,
}

impl From<&RunConfig> for TablePaths {
    fn from(config: &RunConfig) -> Self {
        TablePaths {
            orders: config.orders_path.clone(),
            buckets: config.buckets_path.clone(),
            scenarios: config.scenarios_path.clone(),
            positions_out: config.positions_out.clone(),
            results_out: config.results_out.clone(),
        }
    }
}

pub struct CsvTableAdapter {
    paths: TablePaths,
}

impl CsvTableAdapter {
    pub fn new(paths: TablePaths) -> Self {
        Self { paths }
    }

    fn csv_error(path: &Path, e: csv::Error) -> WhatifError {
        WhatifError::Csv {
            source_name: path.display().to_string(),
            reason: e.to_string(),
        }
    }

    fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, WhatifError> {
        let file = File::open(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(file);
        rdr.deserialize()
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| Self::csv_error(path, e))
    }

    fn write_table<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<(), WhatifError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut wtr = csv::Writer::from_path(path).map_err(|e| Self::csv_error(path, e))?;
        for row in rows {
            wtr.serialize(row).map_err(|e| Self::csv_error(path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl RecordSource for CsvTableAdapter {
    fn read_orders(&self) -> Result<Vec<RawOrder>, WhatifError> {
        Self::read_table(&self.paths.orders)
    }

    fn read_buckets(&self) -> Result<Vec<BucketRecord>, WhatifError> {
        Self::read_table(&self.paths.buckets)
    }

    fn read_scenarios(&self) -> Result<Vec<ScenarioRecord>, WhatifError> {
        Self::read_table(&self.paths.scenarios)
    }
}

fn iso(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn r4(x: Option<f64>) -> Option<f64> {
    x.map(round4)
}

#[derive(Debug, Serialize)]
struct PositionRow<'a> {
    position_id: &'a str,
    symbol: &'a str,
    bucket: &'a str,
    status_real: &'static str,
    open_date: String,
    real_exit_date: Option<String>,
    real_exit_price: Option<f64>,
    entry_orders: u64,
    add_orders: String,
    exit_order: Option<u64>,
    avg_cost_real: f64,
    shares_open: f64,
    as_of_date: Option<String>,
}

impl<'a> From<&'a Position> for PositionRow<'a> {
    fn from(p: &'a Position) -> Self {
        PositionRow {
            position_id: &p.position_id,
            symbol: &p.symbol,
            bucket: &p.bucket,
            status_real: p.status.as_str(),
            open_date: p.open_date.format("%Y-%m-%d").to_string(),
            real_exit_date: iso(p.real_exit_date),
            real_exit_price: r4(p.real_exit_price),
            entry_orders: p.entry_order_id,
            add_orders: p
                .add_order_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(";"),
            exit_order: p.exit_order_id,
            avg_cost_real: round4(p.avg_cost),
            shares_open: p.shares_open,
            as_of_date: iso(p.as_of_date),
        }
    }
}

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    scenario_id: &'a str,
    position_id: &'a str,
    symbol: &'a str,
    bucket: &'a str,
    status_real: &'static str,
    open_date: String,
    real_exit_date: Option<String>,
    real_exit_price: Option<f64>,
    status_sim: &'static str,
    sim_exit_date: Option<String>,
    sim_exit_price: Option<f64>,
    exit_reason: &'static str,
    target_model: &'static str,
    target_pct: Option<f64>,
    k: Option<f64>,
    shtf_pct: f64,
    time_stop_days: Option<u32>,
    avg_cost_start: Option<f64>,
    avg_cost_final: Option<f64>,
    qty_final: Option<f64>,
    target_price: Option<f64>,
    shtf_price: Option<f64>,
    hold_days: Option<usize>,
    return_pct: Option<f64>,
    mfe_pct: Option<f64>,
    mae_pct: Option<f64>,
    dip_anchor_peak: Option<f64>,
    dip_pct_at_initial_entry: Option<f64>,
    as_of_date: Option<String>,
    as_of_price: Option<f64>,
}

impl<'a> From<&'a SimulationResult> for ResultRow<'a> {
    fn from(r: &'a SimulationResult) -> Self {
        ResultRow {
            scenario_id: &r.scenario_id,
            position_id: &r.position_id,
            symbol: &r.symbol,
            bucket: &r.bucket,
            status_real: r.status_real.as_str(),
            open_date: r.open_date.format("%Y-%m-%d").to_string(),
            real_exit_date: iso(r.real_exit_date),
            real_exit_price: r4(r.real_exit_price),
            status_sim: r.status_sim.as_str(),
            sim_exit_date: iso(r.sim_exit_date),
            sim_exit_price: r4(r.sim_exit_price),
            exit_reason: r.exit_reason.as_str(),
            target_model: r.target_model,
            target_pct: r.target_pct,
            k: r.k,
            shtf_pct: r.shtf_pct,
            time_stop_days: r.time_stop_days,
            avg_cost_start: r4(r.avg_cost_start),
            avg_cost_final: r4(r.avg_cost_final),
            qty_final: r.qty_final,
            target_price: r4(r.target_price),
            shtf_price: r4(r.shtf_price),
            hold_days: r.hold_days,
            return_pct: r4(r.return_pct),
            mfe_pct: r4(r.mfe_pct),
            mae_pct: r4(r.mae_pct),
            dip_anchor_peak: r4(r.dip_anchor_peak),
            dip_pct_at_initial_entry: r4(r.dip_pct_at_initial_entry),
            as_of_date: iso(r.as_of_date),
            as_of_price: r4(r.as_of_price),
        }
    }
}

impl ReportPort for CsvTableAdapter {
    fn write_positions(&self, positions: &[Position]) -> Result<(), WhatifError> {
        Self::write_table(&self.paths.positions_out, positions.iter().map(PositionRow::from))
    }

    fn write_results(&self, results: &[SimulationResult]) -> Result<(), WhatifError> {
        Self::write_table(&self.paths.results_out, results.iter().map(ResultRow::from))
    }
}
