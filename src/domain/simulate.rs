//! Scenario simulation.
//!
//! Every (position, scenario) pair whose bucket filter matches is replayed
//! day by day over the symbol's own trading calendar, starting at the
//! position's open date:
//!
//! 1. buy fills dated on or before the day are applied before the day's
//!    price action, and the target/stop levels are re-derived from the new
//!    average cost;
//! 2. the day's bars are scanned in order, tracking excursions; within a
//!    bar the stop is checked before the target;
//! 3. with no bar trigger, a configured time stop exits at the day's close.
//!
//! A pair that never exits is reported as an open snapshot at the as-of
//! horizon. A position whose open date has no bars yields a NO_BARS row
//! instead of failing the batch.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::iter::Peekable;
use std::vec::IntoIter;

use super::bar::Bar;
use super::bar_store::{BarSeries, BarStore};
use super::error::WhatifError;
use super::peak_tracker::TrackerState;
use super::position::{BuyFill, Position, PositionStatus};
use super::scenario::Scenario;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    Closed,
    OpenAsOf,
}

impl SimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimStatus::Closed => "CLOSED",
            SimStatus::OpenAsOf => "OPEN_ASOF",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    Target,
    Shtf,
    TimeStop,
    NoExitAsOf,
    NoBars,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Target => "TARGET",
            ExitReason::Shtf => "SHTF",
            ExitReason::TimeStop => "TIME_STOP",
            ExitReason::NoExitAsOf => "NO_EXIT_ASOF",
            ExitReason::NoBars => "NO_BARS",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One simulated outcome, realized fields alongside simulated ones.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub scenario_id: String,
    pub position_id: String,
    pub symbol: String,
    pub bucket: String,

    pub status_real: PositionStatus,
    pub open_date: NaiveDate,
    pub real_exit_date: Option<NaiveDate>,
    pub real_exit_price: Option<f64>,

    pub status_sim: SimStatus,
    pub sim_exit_date: Option<NaiveDate>,
    pub sim_exit_price: Option<f64>,
    pub exit_reason: ExitReason,

    pub target_model: &'static str,
    pub target_pct: Option<f64>,
    pub k: Option<f64>,
    pub shtf_pct: f64,
    pub time_stop_days: Option<u32>,

    pub avg_cost_start: Option<f64>,
    pub avg_cost_final: Option<f64>,
    pub qty_final: Option<f64>,
    pub target_price: Option<f64>,
    pub shtf_price: Option<f64>,

    pub hold_days: Option<usize>,
    pub return_pct: Option<f64>,
    pub mfe_pct: Option<f64>,
    pub mae_pct: Option<f64>,

    pub dip_anchor_peak: Option<f64>,
    pub dip_pct_at_initial_entry: Option<f64>,

    pub as_of_date: Option<NaiveDate>,
    pub as_of_price: Option<f64>,
}

impl SimulationResult {
    /// Row with every financial field blank.
    fn no_bars(position: &Position, scenario: &Scenario, as_of_date: Option<NaiveDate>) -> Self {
        SimulationResult {
            scenario_id: scenario.scenario_id.clone(),
            position_id: position.position_id.clone(),
            symbol: position.symbol.clone(),
            bucket: position.bucket.clone(),
            status_real: position.status,
            open_date: position.open_date,
            real_exit_date: position.real_exit_date,
            real_exit_price: position.real_exit_price,
            status_sim: SimStatus::OpenAsOf,
            sim_exit_date: as_of_date,
            sim_exit_price: None,
            exit_reason: ExitReason::NoBars,
            target_model: scenario.target.name(),
            target_pct: scenario.target_pct,
            k: scenario.k,
            shtf_pct: scenario.shtf_pct,
            time_stop_days: scenario.time_stop_days,
            avg_cost_start: None,
            avg_cost_final: None,
            qty_final: None,
            target_price: None,
            shtf_price: None,
            hold_days: None,
            return_pct: None,
            mfe_pct: None,
            mae_pct: None,
            dip_anchor_peak: None,
            dip_pct_at_initial_entry: None,
            as_of_date,
            as_of_price: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status_sim == SimStatus::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedExit {
    pub date: NaiveDate,
    pub price: f64,
    pub reason: ExitReason,
}

/// Result of scanning one trading day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayOutcome {
    Triggered(SimulatedExit),
    NoTrigger,
}

/// Simulated holding: quantity and running average cost.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Book {
    quantity: f64,
    avg_cost: f64,
}

impl Book {
    fn add(&mut self, fill: &BuyFill) {
        let total = self.quantity + fill.quantity;
        if total > 0.0 {
            self.avg_cost = (self.avg_cost * self.quantity + fill.price * fill.quantity) / total;
        }
        self.quantity = total;
    }
}

/// Running max favorable / min adverse excursion relative to average cost.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Excursion {
    mfe: f64,
    mae: f64,
}

impl Excursion {
    fn new() -> Self {
        Excursion {
            mfe: f64::NEG_INFINITY,
            mae: f64::INFINITY,
        }
    }

    fn observe(&mut self, bar: &Bar, avg_cost: f64) {
        if avg_cost <= 0.0 {
            return;
        }
        self.mfe = self.mfe.max((bar.high - avg_cost) / avg_cost);
        self.mae = self.mae.min((bar.low - avg_cost) / avg_cost);
    }

    fn mfe(&self) -> Option<f64> {
        self.mfe.is_finite().then_some(self.mfe)
    }

    fn mae(&self) -> Option<f64> {
        self.mae.is_finite().then_some(self.mae)
    }
}

/// Mutable state of one pair's day walk.
struct Walk<'a> {
    scenario: &'a Scenario,
    target_pct: f64,
    pending: Peekable<IntoIter<&'a BuyFill>>,
    book: Book,
    excursion: Excursion,
    target_price: f64,
    stop_price: f64,
}

impl<'a> Walk<'a> {
    fn new(scenario: &'a Scenario, target_pct: f64, fills: Vec<&'a BuyFill>) -> Self {
        Walk {
            scenario,
            target_pct,
            pending: fills.into_iter().peekable(),
            book: Book::default(),
            excursion: Excursion::new(),
            target_price: 0.0,
            stop_price: 0.0,
        }
    }

    /// Apply every pending fill dated on or before `date`, then re-derive
    /// the exit levels from the new average cost.
    fn start_day(&mut self, date: NaiveDate) {
        while let Some(fill) = self.pending.next_if(|f| f.date <= date) {
            self.book.add(fill);
        }
        self.target_price = self.book.avg_cost * (1.0 + self.target_pct);
        self.stop_price = self.scenario.stop_price(self.book.avg_cost);
    }

    fn scan_day(&mut self, date: NaiveDate, bars: &[Bar]) -> DayOutcome {
        if self.book.quantity <= 0.0 || self.book.avg_cost <= 0.0 {
            return DayOutcome::NoTrigger;
        }
        for bar in bars {
            self.excursion.observe(bar, self.book.avg_cost);

            if bar.low <= self.stop_price {
                return DayOutcome::Triggered(SimulatedExit {
                    date,
                    price: self.stop_price,
                    reason: ExitReason::Shtf,
                });
            }
            if bar.high >= self.target_price {
                return DayOutcome::Triggered(SimulatedExit {
                    date,
                    price: self.target_price,
                    reason: ExitReason::Target,
                });
            }
        }
        DayOutcome::NoTrigger
    }

    /// Walk calendar positions `first..=last`; `None` if nothing fired.
    fn run(&mut self, series: &BarSeries, first: usize, last: usize) -> Option<SimulatedExit> {
        for pos in first..=last {
            let (date, range) = series.day_at(pos)?;
            self.start_day(date);

            let bars = series.bars_in(range);
            if let DayOutcome::Triggered(exit) = self.scan_day(date, bars) {
                return Some(exit);
            }

            let held = pos - first + 1;
            if self
                .scenario
                .time_stop_days
                .is_some_and(|limit| held >= limit as usize)
            {
                let close = bars.last().map(|b| b.close)?;
                return Some(SimulatedExit {
                    date,
                    price: close,
                    reason: ExitReason::TimeStop,
                });
            }
        }
        None
    }
}

/// Dip depth of `entry_price` below `anchor`, zero if the anchor is unusable.
pub fn dip_pct(anchor: f64, entry_price: f64) -> f64 {
    if anchor > 0.0 {
        (anchor - entry_price) / anchor
    } else {
        0.0
    }
}

fn last_close(series: &BarSeries, day_pos: usize) -> Option<f64> {
    let (_, range) = series.day_at(day_pos)?;
    series.bars_in(range).last().map(|b| b.close)
}

/// Simulate one (position, scenario) pair.
///
/// `series` is the position's symbol series, if one was loaded. `as_of_date`
/// bounds the walk; `None` runs to the series' last trading day.
pub fn simulate_one(
    position: &Position,
    scenario: &Scenario,
    series: Option<&BarSeries>,
    as_of_date: Option<NaiveDate>,
) -> Result<SimulationResult, WhatifError> {
    let mut fills: Vec<&BuyFill> = position.buy_fills.iter().collect();
    fills.sort_by_key(|f| (f.date, f.order_id));
    let first_fill = *fills
        .first()
        .ok_or_else(|| WhatifError::PositionWithoutFills {
            position_id: position.position_id.clone(),
        })?;

    let open_date = position.open_date;
    let Some((series, open_pos)) =
        series.and_then(|s| s.day_position(open_date).map(|pos| (s, pos)))
    else {
        return Ok(SimulationResult::no_bars(position, scenario, as_of_date));
    };
    let Some((_, open_range)) = series.day_at(open_pos) else {
        return Ok(SimulationResult::no_bars(position, scenario, as_of_date));
    };

    // Pre-entry context: anchor from all bars strictly before the open day.
    let tracker = TrackerState::run(series.bars_before(open_date), &scenario.tracker_params());
    let dip_anchor_peak = tracker
        .anchor_peak()
        .unwrap_or_else(|| series.bars_in(open_range)[0].high);
    let dip_pct_at_initial_entry = dip_pct(dip_anchor_peak, first_fill.price);
    let target_pct = scenario.target.target_pct(dip_pct_at_initial_entry);

    let horizon_pos = match as_of_date {
        Some(d) => series.last_day_on_or_before(d),
        None => series.day_count().checked_sub(1),
    };

    let mut walk = Walk::new(scenario, target_pct, fills);
    walk.start_day(open_date);
    let avg_cost_start = walk.book.avg_cost;

    let exit = match horizon_pos {
        Some(last) if last >= open_pos => walk.run(series, open_pos, last),
        _ => None,
    };

    // A horizon before the open day has no price for this position.
    let walked_horizon = horizon_pos.filter(|&last| last >= open_pos);
    let as_of_price = walked_horizon.and_then(|pos| last_close(series, pos));
    let horizon_date = horizon_pos.and_then(|pos| series.day_at(pos)).map(|(d, _)| d);

    let (status_sim, exit_reason, sim_exit_date, sim_exit_price, hold_days) = match exit {
        Some(exit) => (
            SimStatus::Closed,
            exit.reason,
            Some(exit.date),
            Some(exit.price),
            series.trading_days_between(open_date, exit.date),
        ),
        None => (
            SimStatus::OpenAsOf,
            ExitReason::NoExitAsOf,
            as_of_date.or(horizon_date),
            as_of_price,
            walked_horizon.map(|last| last - open_pos + 1),
        ),
    };

    let avg_cost = walk.book.avg_cost;
    let return_pct = sim_exit_price
        .filter(|_| avg_cost > 0.0)
        .map(|price| (price - avg_cost) / avg_cost);

    Ok(SimulationResult {
        scenario_id: scenario.scenario_id.clone(),
        position_id: position.position_id.clone(),
        symbol: position.symbol.clone(),
        bucket: position.bucket.clone(),
        status_real: position.status,
        open_date,
        real_exit_date: position.real_exit_date,
        real_exit_price: position.real_exit_price,
        status_sim,
        sim_exit_date,
        sim_exit_price,
        exit_reason,
        target_model: scenario.target.name(),
        target_pct: scenario.target_pct,
        k: scenario.k,
        shtf_pct: scenario.shtf_pct,
        time_stop_days: scenario.time_stop_days,
        avg_cost_start: Some(avg_cost_start),
        avg_cost_final: Some(avg_cost),
        qty_final: Some(walk.book.quantity),
        target_price: Some(walk.target_price),
        shtf_price: Some(walk.stop_price),
        hold_days,
        return_pct,
        mfe_pct: walk.excursion.mfe(),
        mae_pct: walk.excursion.mae(),
        dip_anchor_peak: Some(dip_anchor_peak),
        dip_pct_at_initial_entry: Some(dip_pct_at_initial_entry),
        as_of_date,
        as_of_price,
    })
}

/// Simulate every matching (position, scenario) pair.
///
/// Output order is positions in input order, then scenarios in input order,
/// regardless of `parallel`.
pub fn run_simulations(
    positions: &[Position],
    scenarios: &[Scenario],
    store: &BarStore,
    as_of_date: Option<NaiveDate>,
    parallel: bool,
) -> Result<Vec<SimulationResult>, WhatifError> {
    let pairs: Vec<(&Position, &Scenario)> = positions
        .iter()
        .flat_map(|p| {
            scenarios
                .iter()
                .filter(move |s| s.applies_to(&p.bucket))
                .map(move |s| (p, s))
        })
        .collect();

    let evaluate = |&(position, scenario): &(&Position, &Scenario)| {
        simulate_one(position, scenario, store.get(&position.symbol), as_of_date)
    };

    let results: Vec<SimulationResult> = if parallel {
        pairs.par_iter().map(evaluate).collect::<Result<Vec<_>, _>>()?
    } else {
        pairs.iter().map(evaluate).collect::<Result<Vec<_>, _>>()?
    };

    let no_bars = results
        .iter()
        .filter(|r| r.exit_reason == ExitReason::NoBars)
        .count();
    tracing::info!(pairs = results.len(), no_bars, "simulated scenarios");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::position_id;
    use crate::domain::scenario::TargetModel;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn bar(d: u32, minute_of_day: u16, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            date: day(d),
            minute_of_day,
            open: close,
            high,
            low,
            close,
            volume: 1_000.0,
        }
    }

    fn fill(d: u32, order_id: u64, quantity: f64, price: f64) -> BuyFill {
        BuyFill {
            date: day(d),
            order_id,
            quantity,
            price,
        }
    }

    fn position(open: u32, fills: Vec<BuyFill>) -> Position {
        Position {
            position_id: position_id("TEST", 1),
            symbol: "TEST".into(),
            bucket: "TECH".into(),
            status: PositionStatus::Open,
            open_date: day(open),
            entry_order_id: fills.first().map_or(0, |f| f.order_id),
            add_order_ids: fills.iter().skip(1).map(|f| f.order_id).collect(),
            exit_order_id: None,
            real_exit_date: None,
            real_exit_price: None,
            avg_cost: 100.0,
            quantity: 10.0,
            shares_open: 10.0,
            as_of_date: None,
            buy_fills: fills,
        }
    }

    fn fixed(target_pct: f64, shtf_pct: f64, time_stop_days: Option<u32>) -> Scenario {
        Scenario {
            scenario_id: "S1".into(),
            bucket: "ALL".into(),
            dip_model: "rally_peak".into(),
            pullback_pct: 0.05,
            reclaim_pct: 0.02,
            target: TargetModel::Fixed { target_pct },
            target_pct: Some(target_pct),
            k: None,
            shtf_pct,
            time_stop_days,
        }
    }

    #[test]
    fn stop_wins_over_target_within_a_bar() {
        let series = BarSeries::new(
            "TEST",
            vec![bar(2, 570, 104.0, 96.0, 100.0), bar(3, 570, 110.0, 94.0, 100.0)],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), Some(day(3))).unwrap();

        assert_eq!(r.exit_reason, ExitReason::Shtf);
        assert_eq!(r.status_sim, SimStatus::Closed);
        assert_eq!(r.sim_exit_date, Some(day(3)));
        assert_relative_eq!(r.sim_exit_price.unwrap(), 95.0, epsilon = 1e-9);
        assert_relative_eq!(r.return_pct.unwrap(), -0.05, epsilon = 1e-9);
        assert_eq!(r.hold_days, Some(2));
    }

    #[test]
    fn target_hit_exits_at_target_price() {
        let series = BarSeries::new(
            "TEST",
            vec![
                bar(2, 570, 101.0, 99.0, 100.0),
                bar(2, 600, 103.0, 99.5, 102.0),
                bar(3, 570, 106.0, 101.0, 105.5),
            ],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), None).unwrap();

        assert_eq!(r.exit_reason, ExitReason::Target);
        assert_relative_eq!(r.sim_exit_price.unwrap(), 105.0, epsilon = 1e-9);
        assert_relative_eq!(r.mfe_pct.unwrap(), 0.06, epsilon = 1e-9);
        assert_relative_eq!(r.mae_pct.unwrap(), -0.01, epsilon = 1e-9);
    }

    #[test]
    fn first_triggering_bar_ends_walk() {
        let series = BarSeries::new(
            "TEST",
            vec![
                bar(2, 570, 106.0, 99.0, 105.0),
                bar(2, 600, 101.0, 90.0, 91.0),
            ],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), None).unwrap();
        assert_eq!(r.exit_reason, ExitReason::Target);
        // The later bar is never observed.
        assert_relative_eq!(r.mae_pct.unwrap(), -0.01, epsilon = 1e-9);
    }

    #[test]
    fn time_stop_exits_at_close_on_limit_day() {
        let series = BarSeries::new(
            "TEST",
            vec![
                bar(2, 570, 101.0, 99.0, 100.0),
                bar(3, 570, 101.0, 99.0, 100.5),
                bar(4, 570, 101.0, 99.0, 100.2),
                bar(4, 600, 101.0, 99.0, 100.8),
                bar(5, 570, 101.0, 99.0, 100.0),
            ],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.5, 0.5, Some(3)), Some(&series), None).unwrap();

        assert_eq!(r.exit_reason, ExitReason::TimeStop);
        assert_eq!(r.sim_exit_date, Some(day(4)));
        assert_relative_eq!(r.sim_exit_price.unwrap(), 100.8, epsilon = 1e-9);
        assert_eq!(r.hold_days, Some(3));
    }

    #[test]
    fn no_trigger_reports_open_as_of_close() {
        let series = BarSeries::new(
            "TEST",
            vec![
                bar(2, 570, 101.0, 99.0, 100.0),
                bar(3, 570, 102.0, 98.0, 101.0),
                bar(5, 570, 103.0, 99.0, 102.0),
            ],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.5, 0.5, None), Some(&series), Some(day(4))).unwrap();

        assert_eq!(r.status_sim, SimStatus::OpenAsOf);
        assert_eq!(r.exit_reason, ExitReason::NoExitAsOf);
        assert_eq!(r.sim_exit_date, Some(day(4)));
        // As-of day 4 has no bars; day 3 is the horizon.
        assert_relative_eq!(r.sim_exit_price.unwrap(), 101.0, epsilon = 1e-9);
        assert_relative_eq!(r.as_of_price.unwrap(), 101.0, epsilon = 1e-9);
        assert_eq!(r.hold_days, Some(2));
        assert_relative_eq!(r.return_pct.unwrap(), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn add_fills_rebase_levels_before_that_days_bars() {
        let series = BarSeries::new(
            "TEST",
            vec![
                bar(2, 570, 101.0, 96.0, 97.0),
                bar(3, 570, 90.0, 86.0, 88.0),
                bar(4, 570, 92.0, 88.0, 91.0),
            ],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0), fill(3, 2, 10.0, 80.0)]);
        // avg 100 → stop 85; after day-3 add avg 90 → stop 76.5, target 94.5.
        let r = simulate_one(&pos, &fixed(0.05, 0.15, None), Some(&series), None).unwrap();

        assert_eq!(r.exit_reason, ExitReason::NoExitAsOf);
        assert_relative_eq!(r.avg_cost_start.unwrap(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(r.avg_cost_final.unwrap(), 90.0, epsilon = 1e-9);
        assert_relative_eq!(r.qty_final.unwrap(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(r.shtf_price.unwrap(), 76.5, epsilon = 1e-9);
        assert_relative_eq!(r.target_price.unwrap(), 94.5, epsilon = 1e-9);
    }

    #[test]
    fn fill_on_non_trading_day_applies_next_session() {
        let series = BarSeries::new(
            "TEST",
            vec![bar(2, 570, 101.0, 99.0, 100.0), bar(4, 570, 101.0, 99.0, 100.0)],
        );
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0), fill(3, 2, 10.0, 90.0)]);
        let r = simulate_one(&pos, &fixed(0.5, 0.5, None), Some(&series), None).unwrap();
        assert_relative_eq!(r.avg_cost_final.unwrap(), 95.0, epsilon = 1e-9);
        assert_relative_eq!(r.qty_final.unwrap(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn dip_scaled_target_uses_pre_entry_anchor() {
        let series = BarSeries::new(
            "TEST",
            vec![
                bar(2, 570, 120.0, 118.0, 119.0),
                bar(3, 570, 110.0, 100.0, 101.0),
                bar(4, 570, 101.0, 99.0, 100.0),
            ],
        );
        let pos = position(4, vec![fill(4, 1, 10.0, 96.0)]);
        let scenario = Scenario {
            target: TargetModel::DipScaled { k: 0.5 },
            target_pct: None,
            k: Some(0.5),
            ..fixed(0.0, 0.5, None)
        };
        let r = simulate_one(&pos, &scenario, Some(&series), None).unwrap();

        assert_relative_eq!(r.dip_anchor_peak.unwrap(), 120.0, epsilon = 1e-9);
        assert_relative_eq!(r.dip_pct_at_initial_entry.unwrap(), 0.2, epsilon = 1e-9);
        // target_pct = 0.5 * 0.2 = 0.1 over avg 96.
        assert_relative_eq!(r.target_price.unwrap(), 105.6, epsilon = 1e-9);
        assert_eq!(r.target_model, "dip_scaled");
    }

    #[test]
    fn anchor_falls_back_to_open_day_high_without_history() {
        let series = BarSeries::new("TEST", vec![bar(2, 570, 104.0, 99.0, 100.0)]);
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.5, 0.5, None), Some(&series), None).unwrap();
        assert_relative_eq!(r.dip_anchor_peak.unwrap(), 104.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_open_day_yields_no_bars_row() {
        let series = BarSeries::new("TEST", vec![bar(3, 570, 101.0, 99.0, 100.0)]);
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), Some(day(3))).unwrap();

        assert_eq!(r.exit_reason, ExitReason::NoBars);
        assert_eq!(r.status_sim, SimStatus::OpenAsOf);
        assert_eq!(r.sim_exit_date, Some(day(3)));
        assert_eq!(r.sim_exit_price, None);
        assert_eq!(r.return_pct, None);
        assert_eq!(r.avg_cost_final, None);
        assert_eq!(r.mfe_pct, None);
    }

    #[test]
    fn missing_series_yields_no_bars_row() {
        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), None, None).unwrap();
        assert_eq!(r.exit_reason, ExitReason::NoBars);
    }

    #[test]
    fn position_without_fills_is_fatal() {
        let series = BarSeries::new("TEST", vec![bar(2, 570, 101.0, 99.0, 100.0)]);
        let pos = position(2, vec![]);
        let err = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), None).unwrap_err();
        assert!(matches!(err, WhatifError::PositionWithoutFills { .. }));
    }

    #[test]
    fn as_of_before_open_skips_walk() {
        let series = BarSeries::new(
            "TEST",
            vec![bar(2, 570, 101.0, 99.0, 100.0), bar(3, 570, 130.0, 50.0, 100.0)],
        );
        let pos = position(3, vec![fill(3, 1, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), Some(day(2))).unwrap();
        assert_eq!(r.exit_reason, ExitReason::NoExitAsOf);
        assert_eq!(r.hold_days, None);
        assert_eq!(r.mfe_pct, None);
        assert_eq!(r.as_of_price, None);
        assert_eq!(r.sim_exit_price, None);
        assert_eq!(r.return_pct, None);
    }

    #[test]
    fn empty_book_never_triggers_exits() {
        let series = BarSeries::new(
            "TEST",
            vec![bar(5, 570, 101.0, 99.0, 100.0), bar(6, 570, 104.0, 96.0, 100.0)],
        );
        let pos = position(5, vec![fill(5, 1, 0.0, 100.0), fill(6, 2, 10.0, 100.0)]);
        let r = simulate_one(&pos, &fixed(0.05, 0.05, None), Some(&series), None).unwrap();
        assert_eq!(r.exit_reason, ExitReason::NoExitAsOf);
        assert_eq!(r.sim_exit_date, Some(day(6)));
        assert_relative_eq!(r.avg_cost_final.unwrap(), 100.0, epsilon = 1e-9);
        assert_relative_eq!(r.return_pct.unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn run_simulations_filters_buckets_and_keeps_order() {
        let mut store = BarStore::new();
        store.insert(BarSeries::new("TEST", vec![bar(2, 570, 101.0, 99.0, 100.0)]));

        let pos = position(2, vec![fill(2, 1, 10.0, 100.0)]);
        let mut energy = fixed(0.05, 0.05, None);
        energy.scenario_id = "ENERGY_ONLY".into();
        energy.bucket = "ENERGY".into();
        let mut tech = fixed(0.05, 0.05, None);
        tech.scenario_id = "TECH_ONLY".into();
        tech.bucket = "TECH".into();
        let scenarios = vec![fixed(0.05, 0.05, None), energy, tech];

        for parallel in [false, true] {
            let results =
                run_simulations(&[pos.clone()], &scenarios, &store, None, parallel).unwrap();
            let ids: Vec<&str> = results.iter().map(|r| r.scenario_id.as_str()).collect();
            assert_eq!(ids, vec!["S1", "TECH_ONLY"]);
        }
    }
}
