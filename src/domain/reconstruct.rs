//! Position reconstruction by order replay.
//!
//! Each symbol runs a two-state machine (no position / open). A sell against
//! an open position is always a full exit; a sell with nothing open is an
//! orphan and is dropped. Replay state lives only inside
//! [`reconstruct_positions`]; callers only ever see finalized values.

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use super::order::{Order, Side};
use super::position::{
    average_in, position_id, BuyFill, Position, PositionStatus, UNKNOWN_BUCKET,
};

/// One row of the ticker-to-bucket mapping table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BucketRecord {
    pub symbol: String,
    pub bucket: String,
}

/// Symbol → bucket label lookup.
#[derive(Debug, Clone, Default)]
pub struct BucketMap {
    map: HashMap<String, String>,
}

impl BucketMap {
    pub fn from_records(rows: &[BucketRecord]) -> Self {
        let map = rows
            .iter()
            .map(|r| (r.symbol.trim().to_uppercase(), r.bucket.trim().to_uppercase()))
            .filter(|(symbol, _)| !symbol.is_empty())
            .collect();
        Self { map }
    }

    pub fn bucket_for(&self, symbol: &str) -> &str {
        self.map
            .get(symbol)
            .map(String::as_str)
            .filter(|b| !b.is_empty())
            .unwrap_or(UNKNOWN_BUCKET)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Per-symbol replay state.
#[derive(Debug, Default)]
struct Ledger {
    sequence: u32,
    open: Option<Position>,
}

impl Ledger {
    fn buy(&mut self, order: &Order, bucket: &str, as_of_date: Option<NaiveDate>) {
        let fill = BuyFill {
            date: order.date,
            order_id: order.order_id,
            quantity: order.quantity,
            price: order.exec_price,
        };

        match self.open.as_mut() {
            Some(pos) => {
                pos.add_order_ids.push(order.order_id);
                pos.avg_cost = average_in(pos.avg_cost, pos.shares_open, fill.price, fill.quantity);
                pos.shares_open += fill.quantity;
                pos.quantity = pos.shares_open;
                pos.buy_fills.push(fill);
            }
            None => {
                self.sequence += 1;
                self.open = Some(Position {
                    position_id: position_id(&order.symbol, self.sequence),
                    symbol: order.symbol.clone(),
                    bucket: bucket.to_string(),
                    status: PositionStatus::Open,
                    open_date: order.date,
                    entry_order_id: order.order_id,
                    add_order_ids: Vec::new(),
                    exit_order_id: None,
                    real_exit_date: None,
                    real_exit_price: None,
                    avg_cost: fill.price,
                    quantity: fill.quantity,
                    shares_open: fill.quantity,
                    as_of_date,
                    buy_fills: vec![fill],
                });
            }
        }
    }

    /// Full exit. Returns the finalized position, or `None` for an orphan.
    fn sell(&mut self, order: &Order) -> Option<Position> {
        let has_shares = self.open.as_ref().is_some_and(|p| p.shares_open > 0.0);
        if !has_shares {
            return None;
        }
        let mut pos = self.open.take()?;
        pos.status = PositionStatus::Closed;
        pos.exit_order_id = Some(order.order_id);
        pos.real_exit_date = Some(order.date);
        pos.real_exit_price = Some(order.exec_price);
        pos.shares_open = 0.0;
        Some(pos)
    }
}

/// Replay normalized orders into closed and as-of-open positions.
///
/// `orders` must already be in `(date, order_id)` order, as produced by
/// [`normalize_orders`](super::order::normalize_orders).
pub fn reconstruct_positions(
    orders: &[Order],
    buckets: &BucketMap,
    as_of_date: Option<NaiveDate>,
) -> Vec<Position> {
    let mut ledgers: BTreeMap<String, Ledger> = BTreeMap::new();
    let mut positions = Vec::new();
    let mut orphan_sells = 0usize;

    for order in orders {
        let ledger = ledgers.entry(order.symbol.clone()).or_default();
        match order.side {
            Side::Buy => ledger.buy(order, buckets.bucket_for(&order.symbol), as_of_date),
            Side::Sell => match ledger.sell(order) {
                Some(closed) => positions.push(closed),
                None => {
                    orphan_sells += 1;
                    tracing::debug!(
                        symbol = %order.symbol,
                        order_id = order.order_id,
                        "orphan sell ignored"
                    );
                }
            },
        }
    }

    positions.extend(
        ledgers
            .into_values()
            .filter_map(|l| l.open)
            .filter(|p| p.shares_open > 0.0),
    );

    positions.sort_by(|a, b| {
        a.symbol
            .cmp(&b.symbol)
            .then(a.open_date.cmp(&b.open_date))
            .then(a.position_id.cmp(&b.position_id))
    });

    tracing::info!(
        positions = positions.len(),
        open = positions.iter().filter(|p| p.is_open()).count(),
        orphan_sells,
        "reconstructed positions"
    );
    positions
}
