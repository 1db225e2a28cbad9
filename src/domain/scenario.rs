//! What-if exit scenarios.
//!
//! Scenario rows are parsed individually: a bad row is rejected with a
//! [`ScenarioError`] and the remaining scenarios still run.

use serde::Deserialize;

use super::parse::parse_optional_number;
use super::peak_tracker::TrackerParams;

pub const ALL_BUCKETS: &str = "ALL";
pub const DEFAULT_DIP_MODEL: &str = "rally_peak";

/// One row of the scenarios table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScenarioRecord {
    pub scenario_id: String,
    pub bucket: String,
    pub dip_model: String,
    pub pullback_pct: String,
    pub reclaim_pct: String,
    pub target_model: String,
    pub target_pct: String,
    pub k: String,
    pub shtf_pct: String,
    pub time_stop_days: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScenarioError {
    #[error("scenario row {row} has no scenario_id")]
    MissingId { row: usize },

    #[error("scenario {scenario_id}: unknown target_model \"{model}\"")]
    UnknownTargetModel { scenario_id: String, model: String },

    #[error("scenario {scenario_id}: target_model {model} requires {field}")]
    MissingTargetParam {
        scenario_id: String,
        model: String,
        field: String,
    },

    #[error("scenario {scenario_id}: invalid {field} \"{literal}\"")]
    InvalidNumber {
        scenario_id: String,
        field: String,
        literal: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetModel {
    /// Take profit at a fixed fraction above average cost.
    Fixed { target_pct: f64 },
    /// Take profit at `k` times the dip depth at initial entry.
    DipScaled { k: f64 },
}

impl TargetModel {
    pub fn name(&self) -> &'static str {
        match self {
            TargetModel::Fixed { .. } => "fixed",
            TargetModel::DipScaled { .. } => "dip_scaled",
        }
    }

    /// Resolve the take-profit fraction for a given entry dip.
    pub fn target_pct(&self, dip_pct_at_entry: f64) -> f64 {
        match *self {
            TargetModel::Fixed { target_pct } => target_pct,
            TargetModel::DipScaled { k } => k * dip_pct_at_entry,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub scenario_id: String,
    pub bucket: String,
    pub dip_model: String,
    pub pullback_pct: f64,
    pub reclaim_pct: f64,
    pub target: TargetModel,
    /// Raw configured values, echoed on result rows.
    pub target_pct: Option<f64>,
    pub k: Option<f64>,
    pub shtf_pct: f64,
    pub time_stop_days: Option<u32>,
}

impl Scenario {
    pub fn applies_to(&self, bucket: &str) -> bool {
        self.bucket == ALL_BUCKETS || self.bucket == bucket
    }

    pub fn tracker_params(&self) -> TrackerParams {
        TrackerParams {
            pullback_pct: self.pullback_pct,
            reclaim_pct: self.reclaim_pct,
        }
    }

    /// Stop price for a given average cost.
    pub fn stop_price(&self, avg_cost: f64) -> f64 {
        avg_cost * (1.0 - self.shtf_pct)
    }
}

fn number(
    scenario_id: &str,
    field: &str,
    raw: &str,
) -> Result<Option<f64>, ScenarioError> {
    parse_optional_number(field, raw).map_err(|_| ScenarioError::InvalidNumber {
        scenario_id: scenario_id.to_string(),
        field: field.to_string(),
        literal: raw.to_string(),
    })
}

impl TryFrom<(usize, &ScenarioRecord)> for Scenario {
    type Error = ScenarioError;

    fn try_from((row, rec): (usize, &ScenarioRecord)) -> Result<Self, Self::Error> {
        let scenario_id = rec.scenario_id.trim().to_string();
        if scenario_id.is_empty() {
            return Err(ScenarioError::MissingId { row });
        }
        let id = scenario_id.as_str();

        let target_pct = number(id, "target_pct", &rec.target_pct)?;
        let k = number(id, "k", &rec.k)?;
        let missing = |field: &str, model: &str| ScenarioError::MissingTargetParam {
            scenario_id: id.to_string(),
            model: model.to_string(),
            field: field.to_string(),
        };

        let model = rec.target_model.trim();
        let target = match model {
            "fixed" => TargetModel::Fixed {
                target_pct: target_pct.ok_or_else(|| missing("target_pct", model))?,
            },
            "dip_scaled" => TargetModel::DipScaled {
                k: k.ok_or_else(|| missing("k", model))?,
            },
            other => {
                return Err(ScenarioError::UnknownTargetModel {
                    scenario_id: id.to_string(),
                    model: other.to_string(),
                });
            }
        };

        let time_stop_days = number(id, "time_stop_days", &rec.time_stop_days)?
            .map(f64::floor)
            .filter(|d| *d >= 1.0)
            .map(|d| d as u32);

        let bucket = rec.bucket.trim().to_uppercase();
        let dip_model = rec.dip_model.trim();

        Ok(Scenario {
            bucket: if bucket.is_empty() { ALL_BUCKETS.to_string() } else { bucket },
            dip_model: if dip_model.is_empty() {
                DEFAULT_DIP_MODEL.to_string()
            } else {
                dip_model.to_string()
            },
            pullback_pct: number(id, "pullback_pct", &rec.pullback_pct)?.unwrap_or(0.0),
            reclaim_pct: number(id, "reclaim_pct", &rec.reclaim_pct)?.unwrap_or(0.0),
            target,
            target_pct,
            k,
            shtf_pct: number(id, "shtf_pct", &rec.shtf_pct)?.unwrap_or(0.0),
            time_stop_days,
            scenario_id,
        })
    }
}

/// Parse every row; invalid rows are returned separately, not fatal.
pub fn parse_scenarios(rows: &[ScenarioRecord]) -> (Vec<Scenario>, Vec<ScenarioError>) {
    let mut scenarios = Vec::with_capacity(rows.len());
    let mut rejected = Vec::new();

    for (i, rec) in rows.iter().enumerate() {
        match Scenario::try_from((i + 1, rec)) {
            Ok(s) => scenarios.push(s),
            Err(e) => rejected.push(e),
        }
    }

    (scenarios, rejected)
}
