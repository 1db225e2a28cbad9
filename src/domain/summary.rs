//! Per-scenario rollup of simulation results.

use std::collections::BTreeMap;

use super::simulate::{ExitReason, SimulationResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSummary {
    pub scenario_id: String,
    pub pairs: usize,
    pub closed: usize,
    pub exits: BTreeMap<ExitReason, usize>,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub avg_hold_days: f64,
    pub avg_mfe: f64,
    pub avg_mae: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl ScenarioSummary {
    fn compute(scenario_id: &str, results: &[&SimulationResult]) -> Self {
        let mut exits = BTreeMap::new();
        for r in results {
            *exits.entry(r.exit_reason).or_insert(0) += 1;
        }

        let returns: Vec<f64> = results.iter().filter_map(|r| r.return_pct).collect();
        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        let losses = returns.iter().filter(|&&r| r < 0.0).count();
        let win_rate = if returns.is_empty() {
            0.0
        } else {
            wins as f64 / returns.len() as f64
        };

        let hold_days: Vec<f64> = results
            .iter()
            .filter_map(|r| r.hold_days)
            .map(|d| d as f64)
            .collect();
        let mfe: Vec<f64> = results.iter().filter_map(|r| r.mfe_pct).collect();
        let mae: Vec<f64> = results.iter().filter_map(|r| r.mae_pct).collect();

        ScenarioSummary {
            scenario_id: scenario_id.to_string(),
            pairs: results.len(),
            closed: results.iter().filter(|r| r.is_closed()).count(),
            exits,
            wins,
            losses,
            win_rate,
            avg_return: mean(&returns),
            avg_hold_days: mean(&hold_days),
            avg_mfe: mean(&mfe),
            avg_mae: mean(&mae),
        }
    }

    /// One summary per scenario, sorted by scenario id.
    pub fn compute_per_scenario(results: &[SimulationResult]) -> Vec<ScenarioSummary> {
        let mut grouped: BTreeMap<&str, Vec<&SimulationResult>> = BTreeMap::new();
        for r in results {
            grouped.entry(r.scenario_id.as_str()).or_default().push(r);
        }
        grouped
            .into_iter()
            .map(|(id, rows)| ScenarioSummary::compute(id, &rows))
            .collect()
    }

    pub fn exit_count(&self, reason: ExitReason) -> usize {
        self.exits.get(&reason).copied().unwrap_or(0)
    }
}
