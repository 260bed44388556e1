//! Synthetic venue feeds.
//!
//! Each feed owns a native producer thread that pushes best-of-book
//! updates through a registered callback until stopped; `stop` joins the
//! thread. Venues deliberately differ in spread, volatility, cadence, and
//! pricing lag so crossed books actually occur; the engine must not
//! assume uniform behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Normal;
use tracing::{error, info};

use crate::types::MarketUpdate;

/// Callback through which a feed hands updates to the engine. Runs on the
/// feed's producer thread.
pub type UpdateCallback = Arc<dyn Fn(&MarketUpdate) + Send + Sync>;

/// Capability offered by any venue feed, synthetic or real.
pub trait VenueFeed: Send {
    fn name(&self) -> &str;
    fn set_symbol(&mut self, symbol: &str);
    fn set_callback(&mut self, callback: UpdateCallback);
    fn start(&mut self);
    /// Stop producing and join the producer thread.
    fn stop(&mut self);
}

/// Behavior of one simulated venue.
#[derive(Debug, Clone)]
pub struct FeedProfile {
    pub venue: &'static str,
    pub base_price: f64,
    /// Mid-price volatility as a fraction of the base price.
    pub volatility: f64,
    pub spread_mean: f64,
    pub spread_std: f64,
    /// Inclusive bounds on the inter-tick delay.
    pub delay_ms: (u64, u64),
    pub quote_size: f64,
    /// Half-width of a uniform multiplicative price lag; 0 disables it.
    pub lag_band: f64,
}

impl FeedProfile {
    /// Tight spreads, fast updates.
    pub fn binance() -> Self {
        Self {
            venue: "binance",
            base_price: 50_000.0,
            volatility: 0.001,
            spread_mean: 0.3,
            spread_std: 0.1,
            delay_ms: (35, 45),
            quote_size: 150.0,
            lag_band: 0.0,
        }
    }

    /// Wider spreads than binance, slower cadence.
    pub fn coinbase() -> Self {
        Self {
            venue: "coinbase",
            base_price: 50_000.0,
            volatility: 0.0012,
            spread_mean: 0.8,
            spread_std: 0.2,
            delay_ms: (50, 70),
            quote_size: 120.0,
            lag_band: 0.0,
        }
    }

    /// Wide, volatile, and laggy.
    pub fn kraken() -> Self {
        Self {
            venue: "kraken",
            base_price: 50_000.0,
            volatility: 0.0015,
            spread_mean: 1.2,
            spread_std: 0.4,
            delay_ms: (70, 150),
            quote_size: 80.0,
            lag_band: 0.0,
        }
    }

    /// Prices drift against the pack, which is where crossings come from.
    pub fn bybit() -> Self {
        Self {
            venue: "bybit",
            base_price: 50_000.0,
            volatility: 0.002,
            spread_mean: 0.5,
            spread_std: 0.3,
            delay_ms: (45, 65),
            quote_size: 200.0,
            lag_band: 0.02,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn with_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.delay_ms = (min, max);
        self
    }
}

/// A venue feed driven by Gaussian mid-price and spread draws.
pub struct SyntheticFeed {
    profile: FeedProfile,
    symbol: String,
    callback: Option<UpdateCallback>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl SyntheticFeed {
    pub fn new(profile: FeedProfile) -> Self {
        Self {
            profile,
            symbol: "BTCUSDT".to_string(),
            callback: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

impl VenueFeed for SyntheticFeed {
    fn name(&self) -> &str {
        self.profile.venue
    }

    fn set_symbol(&mut self, symbol: &str) {
        self.symbol = symbol.to_uppercase();
    }

    fn set_callback(&mut self, callback: UpdateCallback) {
        self.callback = Some(callback);
    }

    fn start(&mut self) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(callback) = self.callback.clone() else {
            error!(venue = self.profile.venue, "feed started without a callback");
            self.running.store(false, Ordering::Release);
            return;
        };

        let profile = self.profile.clone();
        let symbol = self.symbol.clone();
        let running = self.running.clone();

        let handle = std::thread::Builder::new()
            .name(format!("feed-{}", profile.venue))
            .spawn(move || produce(profile, symbol, callback, running));
        match handle {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::Release);
                error!(venue = self.profile.venue, error = %e, "failed to spawn feed thread");
            }
        }
    }

    fn stop(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!(venue = self.profile.venue, "feed thread panicked");
            }
        }
    }
}

impl Drop for SyntheticFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce(profile: FeedProfile, symbol: String, callback: UpdateCallback, running: Arc<AtomicBool>) {
    let mut rng = rand::thread_rng();
    let price_dist = match Normal::new(profile.base_price, profile.base_price * profile.volatility)
    {
        Ok(d) => d,
        Err(e) => {
            error!(venue = profile.venue, error = %e, "bad price distribution");
            return;
        }
    };
    let spread_dist = match Normal::new(profile.spread_mean, profile.spread_std) {
        Ok(d) => d,
        Err(e) => {
            error!(venue = profile.venue, error = %e, "bad spread distribution");
            return;
        }
    };

    info!(venue = profile.venue, symbol = %symbol, "feed started");
    let mut sequence: u64 = 0;
    while running.load(Ordering::Relaxed) {
        let mut mid: f64 = price_dist.sample(&mut rng);
        if profile.lag_band > 0.0 {
            mid *= rng.gen_range(1.0 - profile.lag_band..=1.0 + profile.lag_band);
        }
        let half_spread = spread_dist.sample(&mut rng).abs() / 2.0;

        sequence += 1;
        callback(&MarketUpdate::bid(
            &symbol,
            profile.venue,
            mid - half_spread,
            profile.quote_size,
            sequence,
        ));
        sequence += 1;
        callback(&MarketUpdate::ask(
            &symbol,
            profile.venue,
            mid + half_spread,
            profile.quote_size,
            sequence,
        ));

        let delay = rng.gen_range(profile.delay_ms.0..=profile.delay_ms.1);
        std::thread::sleep(Duration::from_millis(delay));
    }
    info!(venue = profile.venue, "feed stopped");
}

/// Owns every venue feed and fans configuration out to them.
#[derive(Default)]
pub struct FeedManager {
    feeds: Vec<Box<dyn VenueFeed>>,
}

impl FeedManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, feed: Box<dyn VenueFeed>) {
        self.feeds.push(feed);
    }

    pub fn set_symbol(&mut self, symbol: &str) {
        for feed in &mut self.feeds {
            feed.set_symbol(symbol);
        }
    }

    pub fn set_callback(&mut self, callback: UpdateCallback) {
        for feed in &mut self.feeds {
            feed.set_callback(callback.clone());
        }
    }

    pub fn start_all(&mut self) {
        info!("starting {} venue feeds", self.feeds.len());
        for feed in &mut self.feeds {
            feed.start();
        }
    }

    pub fn stop_all(&mut self) {
        info!("stopping all venue feeds");
        for feed in &mut self.feeds {
            feed.stop();
        }
    }

    pub fn venue_names(&self) -> Vec<String> {
        self.feeds.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
