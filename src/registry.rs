//! Registry of per-`(symbol, venue)` order books.
//!
//! Built once during startup, then shared immutably behind an `Arc`; after
//! that only book interiors mutate. Registration is not thread-safe and
//! must finish before the first lookup from a producer thread.

use rustc_hash::FxHashMap;

use crate::book::OrderBook;

#[derive(Default)]
struct SymbolBooks {
    /// Venue names in registration order; pair enumeration walks this so
    /// the order is stable across checks.
    venues: Vec<String>,
    by_venue: FxHashMap<String, OrderBook>,
}

#[derive(Default)]
pub struct BookRegistry {
    symbols: FxHashMap<String, SymbolBooks>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty book. Re-registering the same `(symbol, venue)`
    /// is a no-op so startup wiring can be idempotent.
    pub fn add(&mut self, symbol: &str, venue: &str) {
        let entry = self.symbols.entry(symbol.to_string()).or_default();
        if entry.by_venue.contains_key(venue) {
            return;
        }
        entry.venues.push(venue.to_string());
        entry
            .by_venue
            .insert(venue.to_string(), OrderBook::new(symbol, venue));
    }

    pub fn get(&self, symbol: &str, venue: &str) -> Option<&OrderBook> {
        self.symbols.get(symbol)?.by_venue.get(venue)
    }

    /// Venue names registered for `symbol`, in registration order.
    pub fn venues(&self, symbol: &str) -> &[String] {
        self.symbols
            .get(symbol)
            .map(|s| s.venues.as_slice())
            .unwrap_or(&[])
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_get_round_trips() {
        let mut registry = BookRegistry::new();
        registry.add("BTCUSDT", "binance");
        registry.add("BTCUSDT", "kraken");

        assert!(registry.get("BTCUSDT", "binance").is_some());
        assert!(registry.get("BTCUSDT", "bybit").is_none());
        assert!(registry.get("ETHUSDT", "binance").is_none());
    }

    #[test]
    fn venues_preserve_registration_order() {
        let mut registry = BookRegistry::new();
        for venue in ["binance", "coinbase", "kraken", "bybit"] {
            registry.add("BTCUSDT", venue);
        }
        assert_eq!(
            registry.venues("BTCUSDT"),
            ["binance", "coinbase", "kraken", "bybit"]
        );
        assert!(registry.venues("ETHUSDT").is_empty());
    }

    #[test]
    fn duplicate_registration_is_a_noop() {
        let mut registry = BookRegistry::new();
        registry.add("BTCUSDT", "binance");
        registry.get("BTCUSDT", "binance").unwrap().update_bid(100.0, 1.0);
        registry.add("BTCUSDT", "binance");

        assert_eq!(registry.venues("BTCUSDT").len(), 1);
        // The populated book survives the duplicate add.
        let book = registry.get("BTCUSDT", "binance").unwrap();
        assert_eq!(book.best_bid_ask().0, Some(100.0));
    }
}
