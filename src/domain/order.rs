//! Order normalization.
//!
//! Raw broker rows are filtered to executed orders, canonicalized, and put
//! in `(date, order_id)` order. That order is load-bearing: replay computes
//! a running average cost, so same-day fills must keep submission order.

use chrono::NaiveDate;
use serde::Deserialize;

use super::error::WhatifError;
use super::parse::{parse_date, parse_number};

/// One row of the orders table as exported by the broker.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawOrder {
    pub date: String,
    pub order_id: String,
    pub asset_type: String,
    pub side: String,
    #[serde(alias = "qty")]
    pub quantity: String,
    pub symbol: String,
    pub price_type: String,
    pub term: String,
    pub order_price: String,
    #[serde(alias = "exec_price", alias = "execution price")]
    pub execution_price: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Accepts broker synonyms such as `Bought`/`Sold`.
    pub fn parse(raw: &str) -> Option<Side> {
        match raw.trim().to_uppercase().as_str() {
            "BUY" | "BOUGHT" => Some(Side::Buy),
            "SELL" | "SOLD" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub date: NaiveDate,
    pub order_id: u64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub exec_price: f64,
    pub asset_type: String,
    pub price_type: String,
    pub term: String,
    pub order_price: String,
}

fn is_executed(row: &RawOrder) -> bool {
    row.status.trim().eq_ignore_ascii_case("executed")
}

/// Canonicalize one executed row. `Ok(None)` means the row is dropped.
fn normalize_row(row: &RawOrder) -> Result<Option<Order>, WhatifError> {
    let symbol = row.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Ok(None);
    }
    let Some(side) = Side::parse(&row.side) else {
        return Ok(None);
    };

    let order_id = row
        .order_id
        .trim()
        .parse::<u64>()
        .map_err(|_| WhatifError::number("order_id", &row.order_id))?;

    let quantity = parse_number("quantity", &row.quantity)?;
    if quantity <= 0.0 {
        return Err(WhatifError::number("quantity", &row.quantity));
    }

    Ok(Some(Order {
        date: parse_date(&row.date)?,
        order_id,
        symbol,
        side,
        quantity,
        exec_price: parse_number("execution_price", &row.execution_price)?,
        asset_type: row.asset_type.trim().to_string(),
        price_type: row.price_type.trim().to_string(),
        term: row.term.replace(' ', "").to_uppercase(),
        order_price: row.order_price.trim().to_string(),
    }))
}

/// Filter, canonicalize and deterministically order raw order rows.
pub fn normalize_orders(rows: &[RawOrder]) -> Result<Vec<Order>, WhatifError> {
    let mut orders = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows.iter().filter(|r| is_executed(r)) {
        match normalize_row(row)? {
            Some(order) => orders.push(order),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped executed rows without symbol or side");
    }

    orders.sort_by_key(|o| (o.date, o.order_id));
    Ok(orders)
}

/// Distinct symbols in first-seen order.
pub fn distinct_symbols(orders: &[Order]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    orders
        .iter()
        .filter(|o| seen.insert(o.symbol.as_str()))
        .map(|o| o.symbol.clone())
        .collect()
}
