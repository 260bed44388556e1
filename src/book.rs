//! Bounded per-venue top-of-book store with lock-free best-price reads.
//!
//! Each side keeps up to [`MAX_LEVELS`] price levels in a fixed array of
//! atomic slots, sorted best-first. There is exactly one logical writer per
//! book (the venue's producer thread); any number of readers may snapshot
//! the best price concurrently. The writer publishes a slot's contents
//! before bumping the side's `count` with release ordering, and readers
//! observe `count` with acquire ordering, so a reader that sees a non-empty
//! side is guaranteed a fully written top slot. Interior slots use relaxed
//! ordering: only the writer ever walks them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::types::timestamp_ns;

/// Book depth per side. Deeper quotes than this are not representable and
/// are dropped on insert.
pub const MAX_LEVELS: usize = 10;

/// A materialized price level, as read out of a slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
    pub last_update_ns: u64,
}

/// Which side of the book, and therefore which price ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Sorted strictly descending by price.
    Bid,
    /// Sorted strictly ascending by price.
    Ask,
}

#[derive(Default)]
struct Slot {
    price_bits: AtomicU64,
    quantity_bits: AtomicU64,
    timestamp_ns: AtomicU64,
}

impl Slot {
    fn write(&self, price: f64, quantity: f64, now_ns: u64) {
        self.price_bits.store(price.to_bits(), Ordering::Relaxed);
        self.quantity_bits.store(quantity.to_bits(), Ordering::Relaxed);
        self.timestamp_ns.store(now_ns, Ordering::Relaxed);
    }

    fn copy_from(&self, src: &Slot) {
        self.price_bits
            .store(src.price_bits.load(Ordering::Relaxed), Ordering::Relaxed);
        self.quantity_bits
            .store(src.quantity_bits.load(Ordering::Relaxed), Ordering::Relaxed);
        self.timestamp_ns
            .store(src.timestamp_ns.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    fn read(&self) -> PriceLevel {
        PriceLevel {
            price: f64::from_bits(self.price_bits.load(Ordering::Relaxed)),
            quantity: f64::from_bits(self.quantity_bits.load(Ordering::Relaxed)),
            last_update_ns: self.timestamp_ns.load(Ordering::Relaxed),
        }
    }
}

/// One side of the book.
pub struct BookSide {
    side: Side,
    levels: [Slot; MAX_LEVELS],
    count: AtomicUsize,
    last_update_ns: AtomicU64,
}

impl BookSide {
    fn new(side: Side) -> Self {
        Self {
            side,
            levels: std::array::from_fn(|_| Slot::default()),
            count: AtomicUsize::new(0),
            last_update_ns: AtomicU64::new(0),
        }
    }

    /// True when `candidate` sorts strictly ahead of `resident` on this side.
    fn outranks(&self, candidate: f64, resident: f64) -> bool {
        match self.side {
            Side::Bid => candidate > resident,
            Side::Ask => candidate < resident,
        }
    }

    /// Single-writer update: overwrite a matching price in place, insert at
    /// the sorted position (shifting worse levels down, the worst falling
    /// off a full side), or append at the end. A new price that sorts after
    /// every resident level of a full side is dropped.
    pub fn update(&self, price: f64, quantity: f64) {
        let now = timestamp_ns();
        let n = self.count.load(Ordering::Relaxed);

        for i in 0..n {
            let resident = f64::from_bits(self.levels[i].price_bits.load(Ordering::Relaxed));
            if resident == price {
                self.levels[i]
                    .quantity_bits
                    .store(quantity.to_bits(), Ordering::Relaxed);
                self.levels[i].timestamp_ns.store(now, Ordering::Relaxed);
                self.touch(now);
                return;
            }
            if self.outranks(price, resident) {
                let mut j = n.min(MAX_LEVELS - 1);
                while j > i {
                    self.levels[j].copy_from(&self.levels[j - 1]);
                    j -= 1;
                }
                self.levels[i].write(price, quantity, now);
                if n < MAX_LEVELS {
                    self.count.store(n + 1, Ordering::Release);
                }
                self.touch(now);
                return;
            }
        }

        if n < MAX_LEVELS {
            self.levels[n].write(price, quantity, now);
            self.count.store(n + 1, Ordering::Release);
            self.touch(now);
        }
    }

    fn touch(&self, now_ns: u64) {
        self.last_update_ns.fetch_max(now_ns, Ordering::Relaxed);
    }

    /// Lock-free best-price read. Never walks past the top slot.
    pub fn best(&self) -> Option<f64> {
        if self.count.load(Ordering::Acquire) == 0 {
            return None;
        }
        Some(f64::from_bits(
            self.levels[0].price_bits.load(Ordering::Relaxed),
        ))
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_update_ns(&self) -> u64 {
        self.last_update_ns.load(Ordering::Relaxed)
    }

    /// Snapshot of the populated levels, best first. Consistent only from
    /// the writer's thread; concurrent readers should stick to [`best`].
    ///
    /// [`best`]: BookSide::best
    pub fn levels(&self) -> Vec<PriceLevel> {
        let n = self.len();
        (0..n).map(|i| self.levels[i].read()).collect()
    }
}

/// Top-of-book for one `(symbol, venue)` pair. Single logical writer, many
/// concurrent best-price readers.
pub struct OrderBook {
    symbol: String,
    venue: String,
    bids: BookSide,
    asks: BookSide,
}

impl OrderBook {
    pub fn new(symbol: &str, venue: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            venue: venue.to_string(),
            bids: BookSide::new(Side::Bid),
            asks: BookSide::new(Side::Ask),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn update_bid(&self, price: f64, quantity: f64) {
        self.bids.update(price, quantity);
    }

    pub fn update_ask(&self, price: f64, quantity: f64) {
        self.asks.update(price, quantity);
    }

    /// Atomic best-price snapshot, one read per side. A side with no
    /// levels yet reports `None` and is not eligible for arbitrage.
    pub fn best_bid_ask(&self) -> (Option<f64>, Option<f64>) {
        (self.bids.best(), self.asks.best())
    }

    pub fn spread(&self) -> Option<f64> {
        match self.best_bid_ask() {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn mid_price(&self) -> Option<f64> {
        match self.best_bid_ask() {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    pub fn bids(&self) -> &BookSide {
        &self.bids
    }

    pub fn asks(&self) -> &BookSide {
        &self.asks
    }
}
