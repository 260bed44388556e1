//! Pairwise cross-venue arbitrage detection.
//!
//! Detection is edge-triggered: the dispatch loop calls [`Detector::check`]
//! after every book write, so a transient crossed book missed under one
//! snapshot is retried on the next update. The check itself is pure over
//! the best-price snapshots and cannot fail.

use std::sync::Arc;

use serde::Serialize;

use crate::registry::BookRegistry;
use crate::types::timestamp_ns;

pub const DEFAULT_MIN_PROFIT_BPS: f64 = 5.0;

/// A detected buy-low/sell-high pairing. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    pub symbol: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub buy_price: f64,
    pub sell_price: f64,
    /// Gross edge in basis points: `(sell - buy) / buy * 10_000`.
    pub profit_bps: f64,
    pub detected_at_ns: u64,
    /// Time from the triggering update's source stamp to detection.
    pub latency_ns: u64,
}

impl ArbitrageOpportunity {
    pub fn new(
        symbol: &str,
        buy_venue: &str,
        sell_venue: &str,
        buy_price: f64,
        sell_price: f64,
        source_ts_ns: u64,
    ) -> Self {
        let detected_at_ns = timestamp_ns();
        Self {
            symbol: symbol.to_string(),
            buy_venue: buy_venue.to_string(),
            sell_venue: sell_venue.to_string(),
            buy_price,
            sell_price,
            profit_bps: (sell_price - buy_price) / buy_price * 10_000.0,
            detected_at_ns,
            latency_ns: detected_at_ns.saturating_sub(source_ts_ns),
        }
    }
}

pub struct Detector {
    registry: Arc<BookRegistry>,
    min_profit_bps: f64,
}

impl Detector {
    pub fn new(registry: Arc<BookRegistry>) -> Self {
        Self {
            registry,
            min_profit_bps: DEFAULT_MIN_PROFIT_BPS,
        }
    }

    pub fn with_min_profit_bps(mut self, bps: f64) -> Self {
        self.min_profit_bps = bps;
        self
    }

    pub fn min_profit_bps(&self) -> f64 {
        self.min_profit_bps
    }

    /// Scan every venue pair for `symbol` and return all directed pairings
    /// whose gross edge clears the threshold. `source_ts_ns` is the stamp
    /// of the update that triggered this check; it seeds each
    /// opportunity's latency.
    pub fn check(&self, symbol: &str, source_ts_ns: u64) -> Vec<ArbitrageOpportunity> {
        let venues = self.registry.venues(symbol);
        if venues.len() < 2 {
            return Vec::new();
        }

        let mut opportunities = Vec::new();
        for i in 0..venues.len() {
            for j in (i + 1)..venues.len() {
                let (Some(a), Some(b)) = (
                    self.registry.get(symbol, &venues[i]),
                    self.registry.get(symbol, &venues[j]),
                ) else {
                    continue;
                };
                let (bid_a, ask_a) = a.best_bid_ask();
                let (bid_b, ask_b) = b.best_bid_ask();

                // Buy on A, sell on B.
                self.try_direction(
                    symbol,
                    &venues[i],
                    ask_a,
                    &venues[j],
                    bid_b,
                    source_ts_ns,
                    &mut opportunities,
                );
                // Buy on B, sell on A.
                self.try_direction(
                    symbol,
                    &venues[j],
                    ask_b,
                    &venues[i],
                    bid_a,
                    source_ts_ns,
                    &mut opportunities,
                );
            }
        }
        opportunities
    }

    #[allow(clippy::too_many_arguments)]
    fn try_direction(
        &self,
        symbol: &str,
        buy_venue: &str,
        buy_ask: Option<f64>,
        sell_venue: &str,
        sell_bid: Option<f64>,
        source_ts_ns: u64,
        out: &mut Vec<ArbitrageOpportunity>,
    ) {
        let (Some(ask), Some(bid)) = (buy_ask, sell_bid) else {
            return;
        };
        if bid <= ask {
            return;
        }
        let profit_bps = (bid - ask) / ask * 10_000.0;
        if profit_bps >= self.min_profit_bps {
            out.push(ArbitrageOpportunity::new(
                symbol,
                buy_venue,
                sell_venue,
                ask,
                bid,
                source_ts_ns,
            ));
        }
    }
}
