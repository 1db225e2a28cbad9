//! Configuration validation.
//!
//! Validates all config fields before a run starts.

use crate::domain::error::WhatifError;
use crate::domain::run_config::TIMESPANS;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), WhatifError> {
    validate_inputs(config)?;
    validate_bars(config)?;
    validate_as_of(config)?;
    Ok(())
}

fn validate_inputs(config: &dyn ConfigPort) -> Result<(), WhatifError> {
    for key in ["orders", "buckets", "scenarios"] {
        if config.get_non_empty("inputs", key).is_none() {
            return Err(WhatifError::ConfigMissing {
                section: "inputs".to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_bars(config: &dyn ConfigPort) -> Result<(), WhatifError> {
    if config.get_non_empty("bars", "cache_dir").is_none() {
        return Err(WhatifError::ConfigMissing {
            section: "bars".to_string(),
            key: "cache_dir".to_string(),
        });
    }

    let start = parse_optional_date(config, "bars", "start_date")?;
    let end = parse_optional_date(config, "bars", "end_date")?;
    if matches!((start, end), (Some(s), Some(e)) if s >= e) {
        return Err(WhatifError::ConfigInvalid {
            section: "bars".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }

    if config.get_int("bars", "multiplier", 30) <= 0 {
        return Err(WhatifError::ConfigInvalid {
            section: "bars".to_string(),
            key: "multiplier".to_string(),
            reason: "multiplier must be positive".to_string(),
        });
    }

    let timespan = config
        .get_non_empty("bars", "timespan")
        .unwrap_or_else(|| "minute".to_string());
    if !TIMESPANS.contains(&timespan.to_lowercase().as_str()) {
        return Err(WhatifError::ConfigInvalid {
            section: "bars".to_string(),
            key: "timespan".to_string(),
            reason: format!("timespan must be one of {}", TIMESPANS.join(", ")),
        });
    }
    Ok(())
}

fn validate_as_of(config: &dyn ConfigPort) -> Result<(), WhatifError> {
    parse_optional_date(config, "run", "as_of_date").map(|_| ())
}

/// Blank or absent values are `None`; anything else must be YYYY-MM-DD.
pub fn parse_optional_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, WhatifError> {
    match config.get_non_empty(section, key) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| WhatifError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", key),
            }),
    }
}
