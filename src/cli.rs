//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvBarAdapter;
use crate::adapters::csv_table_adapter::{CsvTableAdapter, TablePaths};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::bar_store::BarStore;
use crate::domain::config_validation::{parse_optional_date, validate_run_config};
use crate::domain::error::WhatifError;
use crate::domain::order::{distinct_symbols, normalize_orders};
use crate::domain::position::Position;
use crate::domain::reconstruct::{BucketMap, reconstruct_positions};
use crate::domain::run_config::RunConfig;
use crate::domain::scenario::{Scenario, ScenarioError, parse_scenarios};
use crate::domain::simulate::{ExitReason, SimulationResult, run_simulations};
use crate::domain::summary::ScenarioSummary;
use crate::ports::bar_port::BarSource;
use crate::ports::config_port::ConfigPort;
use crate::ports::record_port::RecordSource;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "whatif", about = "What-if exit rule simulator for executed orders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconstruct positions and simulate every scenario
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [run] as_of_date (YYYY-MM-DD)
        #[arg(long)]
        as_of: Option<NaiveDate>,
        /// Disable parallel bar loading and pair evaluation
        #[arg(long)]
        sequential: bool,
    },
    /// Reconstruct positions only
    Positions {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate configuration and scenarios without running
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            as_of,
            sequential,
        } => run_simulate(&config, as_of, sequential),
        Command::Positions { config } => run_positions(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Load, validate and build the typed run configuration.
fn load_run_config(path: &Path) -> Result<RunConfig, ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    validate_run_config(&adapter)
        .and_then(|()| build_run_config(&adapter))
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })
}

fn required_path(adapter: &dyn ConfigPort, section: &str, key: &str) -> Result<PathBuf, WhatifError> {
    adapter
        .get_non_empty(section, key)
        .map(PathBuf::from)
        .ok_or_else(|| WhatifError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })
}

pub fn build_run_config(adapter: &dyn ConfigPort) -> Result<RunConfig, WhatifError> {
    Ok(RunConfig {
        orders_path: required_path(adapter, "inputs", "orders")?,
        buckets_path: required_path(adapter, "inputs", "buckets")?,
        scenarios_path: required_path(adapter, "inputs", "scenarios")?,
        bars_cache_dir: required_path(adapter, "bars", "cache_dir")?,
        bars_start_date: parse_optional_date(adapter, "bars", "start_date")?,
        bars_end_date: parse_optional_date(adapter, "bars", "end_date")?,
        rth_only: adapter.get_bool("bars", "rth_only", false),
        bars_multiplier: adapter.get_int("bars", "multiplier", 30),
        bars_timespan: adapter
            .get_non_empty("bars", "timespan")
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| "minute".to_string()),
        as_of_date: parse_optional_date(adapter, "run", "as_of_date")?,
        parallel: adapter.get_bool("run", "parallel", true),
        positions_out: adapter
            .get_non_empty("outputs", "positions")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("outputs/positions_reconstructed.csv")),
        results_out: adapter
            .get_non_empty("outputs", "results")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("outputs/sim_trades.csv")),
    })
}

pub fn bar_source_for(config: &RunConfig) -> CsvBarAdapter {
    CsvBarAdapter::new(config.bars_cache_dir.clone())
        .with_date_range(config.bars_start_date, config.bars_end_date)
        .with_rth_only(config.rth_only)
}

/// Everything a full run produced, for printing and inspection.
#[derive(Debug)]
pub struct RunOutcome {
    pub as_of_date: Option<NaiveDate>,
    pub symbols: usize,
    pub total_bars: usize,
    pub positions: Vec<Position>,
    pub scenarios: Vec<Scenario>,
    pub rejected: Vec<ScenarioError>,
    pub results: Vec<SimulationResult>,
    pub summaries: Vec<ScenarioSummary>,
}

/// Read inputs, reconstruct positions, simulate every scenario and write
/// both output tables.
pub fn run_pipeline(
    records: &dyn RecordSource,
    bars: &(dyn BarSource + Sync),
    report: &dyn ReportPort,
    config: &RunConfig,
) -> Result<RunOutcome, WhatifError> {
    let orders = normalize_orders(&records.read_orders()?)?;
    let buckets = BucketMap::from_records(&records.read_buckets()?);
    let (scenarios, rejected) = parse_scenarios(&records.read_scenarios()?);
    for err in &rejected {
        tracing::warn!("skipping scenario: {err}");
    }
    tracing::info!(
        orders = orders.len(),
        buckets = buckets.len(),
        scenarios = scenarios.len(),
        rejected = rejected.len(),
        "inputs loaded"
    );

    let symbols = distinct_symbols(&orders);
    let store = BarStore::load(&symbols, bars, config.parallel)?;
    tracing::info!(
        symbols = store.len(),
        bars = store.total_bars(),
        "bar cache loaded"
    );

    let as_of_date = config.resolve_as_of(store.latest_date());
    let positions = reconstruct_positions(&orders, &buckets, as_of_date);
    report.write_positions(&positions)?;

    let results = run_simulations(&positions, &scenarios, &store, as_of_date, config.parallel)?;
    report.write_results(&results)?;

    let summaries = ScenarioSummary::compute_per_scenario(&results);
    Ok(RunOutcome {
        as_of_date,
        symbols: store.len(),
        total_bars: store.total_bars(),
        positions,
        scenarios,
        rejected,
        results,
        summaries,
    })
}

/// Reconstruct and write positions without touching the bar cache.
///
/// Without a configured as-of date, open positions are stamped with the
/// last executed order date.
pub fn run_positions_pipeline(
    records: &dyn RecordSource,
    report: &dyn ReportPort,
    config: &RunConfig,
) -> Result<Vec<Position>, WhatifError> {
    let orders = normalize_orders(&records.read_orders()?)?;
    let buckets = BucketMap::from_records(&records.read_buckets()?);
    let as_of_date = config.resolve_as_of(orders.last().map(|o| o.date));
    let positions = reconstruct_positions(&orders, &buckets, as_of_date);
    report.write_positions(&positions)?;
    Ok(positions)
}

fn run_simulate(config_path: &Path, as_of: Option<NaiveDate>, sequential: bool) -> ExitCode {
    // Stage 1: Load and validate config
    let mut config = match load_run_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if as_of.is_some() {
        config.as_of_date = as_of;
    }
    if sequential {
        config.parallel = false;
    }

    // Stage 2: Run the pipeline
    let tables = CsvTableAdapter::new(TablePaths::from(&config));
    let bars = bar_source_for(&config);
    eprintln!(
        "Loading bars from {} ({} {}, rth_only={})",
        config.bars_cache_dir.display(),
        config.bars_multiplier,
        config.bars_timespan,
        config.rth_only
    );
    let outcome = match run_pipeline(&tables, &bars, &tables, &config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stage 3: Print console summary to stderr
    print_summary(&outcome);
    eprintln!("\nPositions written to: {}", config.positions_out.display());
    eprintln!("Results written to:   {}", config.results_out.display());
    ExitCode::SUCCESS
}

fn print_summary(outcome: &RunOutcome) {
    let open = outcome.positions.iter().filter(|p| p.is_open()).count();
    eprintln!("\n=== Run Summary ===");
    match outcome.as_of_date {
        Some(d) => eprintln!("As of:            {d}"),
        None => eprintln!("As of:            (no bar data)"),
    }
    eprintln!(
        "Bars:             {} across {} symbols",
        outcome.total_bars, outcome.symbols
    );
    eprintln!(
        "Positions:        {} ({} open, {} closed)",
        outcome.positions.len(),
        open,
        outcome.positions.len() - open
    );
    eprintln!(
        "Scenarios:        {} ({} rejected)",
        outcome.scenarios.len(),
        outcome.rejected.len()
    );
    eprintln!("Simulated pairs:  {}", outcome.results.len());

    if !outcome.summaries.is_empty() {
        eprintln!("\n=== Per-Scenario Summary ===");
        for s in &outcome.summaries {
            eprintln!(
                "  {}:  {} pairs, {} closed (TARGET {}, SHTF {}, TIME_STOP {}), \
                 {} open, {} no bars, {:.1}% win rate, avg {:+.2}%, {:.1} days",
                s.scenario_id,
                s.pairs,
                s.closed,
                s.exit_count(ExitReason::Target),
                s.exit_count(ExitReason::Shtf),
                s.exit_count(ExitReason::TimeStop),
                s.exit_count(ExitReason::NoExitAsOf),
                s.exit_count(ExitReason::NoBars),
                s.win_rate * 100.0,
                s.avg_return * 100.0,
                s.avg_hold_days,
            );
        }
    }
}

fn run_positions(config_path: &Path) -> ExitCode {
    let config = match load_run_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let tables = CsvTableAdapter::new(TablePaths::from(&config));
    match run_positions_pipeline(&tables, &tables, &config) {
        Ok(positions) => {
            let open = positions.iter().filter(|p| p.is_open()).count();
            eprintln!(
                "Reconstructed {} positions ({} open, {} closed)",
                positions.len(),
                open,
                positions.len() - open
            );
            eprintln!("Positions written to: {}", config.positions_out.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let config = match load_run_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    let tables = CsvTableAdapter::new(TablePaths::from(&config));
    let records = match tables.read_scenarios() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let (scenarios, rejected) = parse_scenarios(&records);

    eprintln!("\n=== Run Plan ===");
    eprintln!("Orders:      {}", config.orders_path.display());
    eprintln!("Buckets:     {}", config.buckets_path.display());
    eprintln!("Scenarios:   {}", config.scenarios_path.display());
    eprintln!(
        "Bars:        {} ({} {}, rth_only={})",
        config.bars_cache_dir.display(),
        config.bars_multiplier,
        config.bars_timespan,
        config.rth_only
    );
    match config.as_of_date {
        Some(d) => eprintln!("As of:       {d}"),
        None => eprintln!("As of:       latest bar date"),
    }
    eprintln!("Parallel:    {}", config.parallel);

    eprintln!("\n=== Scenarios ===");
    for s in &scenarios {
        let time_stop = s
            .time_stop_days
            .map(|d| format!("{d} days"))
            .unwrap_or_else(|| "none".to_string());
        eprintln!(
            "  {} [{}]: pullback {:.1}%, reclaim {:.1}%, target {}, shtf {:.1}%, time stop {}",
            s.scenario_id,
            s.bucket,
            s.pullback_pct * 100.0,
            s.reclaim_pct * 100.0,
            s.target.name(),
            s.shtf_pct * 100.0,
            time_stop,
        );
    }
    for err in &rejected {
        eprintln!("  warning: {err}");
    }

    ExitCode::SUCCESS
}
