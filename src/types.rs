//! Core market-data types shared across the engine.

use chrono::Utc;

/// Nanoseconds since the Unix epoch.
///
/// Feeds stamp updates with this clock and the engine measures end-to-end
/// latency against it, so everything must read the same clock.
pub fn timestamp_ns() -> u64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64
}

/// What a market update changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Bid,
    Ask,
    /// Last-trade prints. Carried on the wire but not applied to book state.
    Trade,
}

/// One best-of-book update from a venue feed.
#[derive(Debug, Clone)]
pub struct MarketUpdate {
    pub kind: UpdateKind,
    pub symbol: String,
    pub venue: String,
    pub price: f64,
    pub quantity: f64,
    /// Source-stamped time; end-to-end latency is measured from here.
    pub timestamp_ns: u64,
    pub sequence_id: u64,
}

impl MarketUpdate {
    pub fn new(
        kind: UpdateKind,
        symbol: &str,
        venue: &str,
        price: f64,
        quantity: f64,
        sequence_id: u64,
    ) -> Self {
        Self {
            kind,
            symbol: symbol.to_string(),
            venue: venue.to_string(),
            price,
            quantity,
            timestamp_ns: timestamp_ns(),
            sequence_id,
        }
    }

    pub fn bid(symbol: &str, venue: &str, price: f64, quantity: f64, sequence_id: u64) -> Self {
        Self::new(UpdateKind::Bid, symbol, venue, price, quantity, sequence_id)
    }

    pub fn ask(symbol: &str, venue: &str, price: f64, quantity: f64, sequence_id: u64) -> Self {
        Self::new(UpdateKind::Ask, symbol, venue, price, quantity, sequence_id)
    }
}
