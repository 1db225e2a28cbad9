//! Field canonicalization shared by the order, scenario and bar loaders.

use chrono::NaiveDate;

use super::error::WhatifError;

/// Strip thousands separators and footnote daggers, then trim.
pub fn clean_number(raw: &str) -> String {
    raw.replace([',', '†'], "").trim().to_string()
}

/// Parse a numeric cell, naming `field` on failure.
pub fn parse_number(field: &str, raw: &str) -> Result<f64, WhatifError> {
    let cleaned = clean_number(raw);
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| WhatifError::number(field, raw))
}

/// Parse an optional numeric cell. Blank cells are `None`.
pub fn parse_optional_number(field: &str, raw: &str) -> Result<Option<f64>, WhatifError> {
    if clean_number(raw).is_empty() {
        return Ok(None);
    }
    parse_number(field, raw).map(Some)
}

/// Accepts `M/D/YYYY` or `YYYY-MM-DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, WhatifError> {
    let s = raw.trim();
    let parsed = if s.contains('/') {
        NaiveDate::parse_from_str(s, "%m/%d/%Y")
    } else {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
    };
    parsed.map_err(|_| WhatifError::date(raw))
}

/// Round to 4 decimal places for table output.
pub fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_number_strips_separators_and_daggers() {
        assert_eq!(clean_number(" 1,234.50† "), "1234.50");
    }

    #[test]
    fn parse_number_rejects_garbage() {
        assert!(parse_number("qty", "abc").is_err());
        assert!(parse_number("qty", "").is_err());
        assert_eq!(parse_number("qty", "2,000").unwrap(), 2000.0);
    }

    #[test]
    fn parse_optional_number_blank_is_none() {
        assert_eq!(parse_optional_number("k", "  ").unwrap(), None);
        assert_eq!(parse_optional_number("k", "0.5").unwrap(), Some(0.5));
    }

    #[test]
    fn parse_date_accepts_slash_and_dash_forms() {
        let expected = NaiveDate::from_ymd_opt(2026, 1, 13).unwrap();
        assert_eq!(parse_date("1/13/2026").unwrap(), expected);
        assert_eq!(parse_date("01/13/2026").unwrap(), expected);
        assert_eq!(parse_date("2026-01-13").unwrap(), expected);
    }

    #[test]
    fn parse_date_rejects_malformed() {
        let err = parse_date("2026/13/45").unwrap_err();
        assert!(err.to_string().contains("2026/13/45"));
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn round4_rounds_half_away() {
        assert_eq!(round4(95.000049), 95.0);
        assert_eq!(round4(1.23456), 1.2346);
    }
}
