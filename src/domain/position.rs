//! Reconstructed positions.
//!
//! A [`Position`] is a finalized value: either closed by a sell, or an
//! "as of" snapshot of a position still open when the order stream ends.

use chrono::NaiveDate;

pub const UNKNOWN_BUCKET: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Open => "OPEN",
            PositionStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuyFill {
    pub date: NaiveDate,
    pub order_id: u64,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub position_id: String,
    pub symbol: String,
    pub bucket: String,
    pub status: PositionStatus,
    pub open_date: NaiveDate,
    pub buy_fills: Vec<BuyFill>,
    pub entry_order_id: u64,
    pub add_order_ids: Vec<u64>,
    pub exit_order_id: Option<u64>,
    pub real_exit_date: Option<NaiveDate>,
    pub real_exit_price: Option<f64>,
    /// Quantity-weighted mean of the buy fills.
    pub avg_cost: f64,
    /// Shares held when the position was finalized.
    pub quantity: f64,
    /// Zero once closed.
    pub shares_open: f64,
    pub as_of_date: Option<NaiveDate>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// `SYMBOL_00001`-style identifier.
pub fn position_id(symbol: &str, sequence: u32) -> String {
    format!("{symbol}_{sequence:05}")
}

/// Running average cost after adding `fill_qty` at `fill_price`.
pub fn average_in(avg_cost: f64, shares: f64, fill_price: f64, fill_qty: f64) -> f64 {
    let total = shares + fill_qty;
    if total <= 0.0 {
        return avg_cost;
    }
    (avg_cost * shares + fill_price * fill_qty) / total
}
