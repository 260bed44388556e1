//! End-to-end tests for the dispatch pipeline: market updates in, book
//! state, risk decisions, CSV records, and sink messages out.

use std::io;
use std::sync::{Arc, Mutex};

use xarb::config::EngineConfig;
use xarb::engine::Engine;
use xarb::feeds::{FeedManager, FeedProfile, SyntheticFeed};
use xarb::metrics::PerfTracker;
use xarb::registry::BookRegistry;
use xarb::risk::{RiskLimits, RiskManager};
use xarb::sink::{PushSink, Subscriber};
use xarb::types::MarketUpdate;

/// Sink subscriber that stores every payload for later assertions.
struct CapturingSubscriber {
    received: Arc<Mutex<Vec<String>>>,
}

impl CapturingSubscriber {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                received: received.clone(),
            },
            received,
        )
    }
}

impl Subscriber for CapturingSubscriber {
    fn name(&self) -> &str {
        "capture"
    }

    fn send(&mut self, payload: &str) -> io::Result<()> {
        self.received.lock().unwrap().push(payload.to_string());
        Ok(())
    }
}

struct Harness {
    engine: Arc<Engine>,
    risk: Arc<RiskManager>,
    tracker: Arc<PerfTracker>,
    sink: Arc<PushSink>,
    received: Arc<Mutex<Vec<String>>>,
    _dir: tempfile::TempDir,
    csv_path: std::path::PathBuf,
}

fn harness(venues: &[&str], limits: RiskLimits) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("opportunities.csv");

    let config = EngineConfig {
        opportunity_log: csv_path.to_string_lossy().into_owned(),
        ..EngineConfig::default()
    };

    let mut registry = BookRegistry::new();
    for venue in venues {
        registry.add(&config.symbol, venue);
    }
    let registry = Arc::new(registry);

    let risk = Arc::new(RiskManager::new(limits));
    let tracker = Arc::new(PerfTracker::new());
    let sink = Arc::new(PushSink::new());
    let (subscriber, received) = CapturingSubscriber::new();
    sink.subscribe(Box::new(subscriber));
    sink.start();

    let engine = Arc::new(
        Engine::new(&config, registry, risk.clone(), tracker.clone(), sink.clone()).unwrap(),
    );

    Harness {
        engine,
        risk,
        tracker,
        sink,
        received,
        _dir: dir,
        csv_path,
    }
}

fn csv_lines(h: &Harness) -> Vec<String> {
    std::fs::read_to_string(&h.csv_path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn crossed_books_execute_one_trade_end_to_end() {
    let h = harness(
        &["binance", "kraken"],
        RiskLimits {
            max_single_trade_size: 0.5,
            min_profit_after_fees_bps: 5.0,
            ..RiskLimits::default()
        },
    );

    // The cross only appears with the final update, so exactly one
    // opportunity fires.
    for update in [
        MarketUpdate::bid("BTCUSDT", "binance", 99.90, 1.0, 1),
        MarketUpdate::ask("BTCUSDT", "binance", 100.00, 1.0, 2),
        MarketUpdate::ask("BTCUSDT", "kraken", 100.60, 1.0, 1),
        MarketUpdate::bid("BTCUSDT", "kraken", 100.50, 1.0, 2),
    ] {
        h.engine.handle_update(&update);
    }
    h.sink.stop();

    assert_eq!(h.tracker.updates_total(), 4);
    assert_eq!(h.tracker.opportunities(), 1);
    assert_eq!(h.tracker.trades_executed(), 1);

    // Both legs booked at the crossing prices.
    let long = h.risk.position("binance", "BTCUSDT").unwrap();
    assert!((long.quantity - 0.5).abs() < 1e-12);
    assert_eq!(long.avg_price, 100.00);
    let short = h.risk.position("kraken", "BTCUSDT").unwrap();
    assert!((short.quantity + 0.5).abs() < 1e-12);
    assert_eq!(short.avg_price, 100.50);

    let trades = h.risk.trades();
    assert_eq!(trades.len(), 1);
    assert!(trades[0].net_pnl > 0.0);

    // One CSV record with the approved decision code.
    let lines = csv_lines(&h);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("timestamp,symbol,"));
    let fields: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(fields[1], "BTCUSDT");
    assert_eq!(fields[2], "binance");
    assert_eq!(fields[3], "kraken");
    assert_eq!(fields[6], "50.0");
    assert_eq!(fields[9], "0");

    // One approved-opportunity message reached the dashboard sink.
    let messages = h.received.lock().unwrap();
    assert_eq!(messages.len(), 1);
    let v: serde_json::Value = serde_json::from_str(&messages[0]).unwrap();
    assert_eq!(v["type"], "opportunity");
    assert_eq!(v["opportunity"]["approved"], true);
    assert_eq!(v["opportunity"]["buy_exchange"], "binance");
}

#[test]
fn thin_edges_are_logged_but_not_traded() {
    let h = harness(
        &["binance", "kraken"],
        RiskLimits {
            min_profit_after_fees_bps: 10.0,
            ..RiskLimits::default()
        },
    );

    h.engine
        .handle_update(&MarketUpdate::ask("BTCUSDT", "binance", 100.00, 1.0, 1));
    // ~6 bps gross: enough for the detector, dead after fees.
    h.engine
        .handle_update(&MarketUpdate::bid("BTCUSDT", "kraken", 100.06, 1.0, 1));
    h.sink.stop();

    assert_eq!(h.tracker.opportunities(), 1);
    assert_eq!(h.tracker.trades_executed(), 0);
    assert!(h.risk.trades().is_empty());
    assert_eq!(h.risk.opportunities_taken(), 0);

    let lines = csv_lines(&h);
    assert_eq!(lines.len(), 2);
    // rejected_profit_too_low carries decision code 4.
    assert!(lines[1].ends_with(",4"));

    // Rejected opportunities do not reach the dashboard.
    assert!(h.received.lock().unwrap().is_empty());
}

#[test]
fn updates_for_unregistered_books_are_dropped() {
    let h = harness(&["binance", "kraken"], RiskLimits::default());

    h.engine
        .handle_update(&MarketUpdate::bid("BTCUSDT", "bitfinex", 100.0, 1.0, 1));
    h.engine
        .handle_update(&MarketUpdate::bid("ETHUSDT", "binance", 100.0, 1.0, 1));
    h.sink.stop();

    let s = h.tracker.snapshot();
    assert_eq!(s.updates_total, 0);
    assert_eq!(s.updates_dropped, 2);
    assert_eq!(csv_lines(&h).len(), 1);
}

#[test]
fn trade_updates_do_not_move_the_book() {
    use xarb::types::UpdateKind;

    let h = harness(&["binance", "kraken"], RiskLimits::default());
    h.engine
        .handle_update(&MarketUpdate::bid("BTCUSDT", "binance", 100.0, 1.0, 1));
    h.engine.handle_update(&MarketUpdate::new(
        UpdateKind::Trade,
        "BTCUSDT",
        "binance",
        250.0,
        1.0,
        2,
    ));
    h.sink.stop();

    // The print was processed (latency recorded) but the book kept its
    // quote state.
    assert_eq!(h.tracker.updates_total(), 2);
    assert_eq!(h.tracker.opportunities(), 0);
}

#[test]
fn sustained_flow_keeps_invariants() {
    use rand::Rng;

    let h = harness(&["binance", "kraken"], RiskLimits::default());
    let mut rng = rand::thread_rng();

    for i in 0..10_000u64 {
        let venue = if i % 2 == 0 { "binance" } else { "kraken" };
        let mid: f64 = rng.gen_range(49_950.0..50_050.0);
        h.engine
            .handle_update(&MarketUpdate::bid("BTCUSDT", venue, mid - 0.5, 1.0, i));
        h.engine
            .handle_update(&MarketUpdate::ask("BTCUSDT", venue, mid + 0.5, 1.0, i));
    }
    h.sink.stop();

    let s = h.tracker.snapshot();
    assert_eq!(s.updates_total, 20_000);
    assert_eq!(s.updates_dropped, 0);
    assert!(s.max_latency_ns >= s.min_latency_ns);

    // Risk counters stay consistent no matter how many crossings fired.
    assert!(h.risk.opportunities_taken() <= h.risk.opportunities_seen());
    assert_eq!(h.tracker.opportunities(), h.risk.opportunities_seen());

    // Every CSV record carries the full field set.
    for line in csv_lines(&h).iter().skip(1) {
        assert_eq!(line.split(',').count(), 10);
    }
}

#[test]
fn synthetic_feeds_drive_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("opportunities.csv");
    let config = EngineConfig {
        opportunity_log: csv_path.to_string_lossy().into_owned(),
        base_price: 100.0,
        ..EngineConfig::default()
    };

    let mut feeds = FeedManager::new();
    feeds.add(Box::new(SyntheticFeed::new(
        FeedProfile::binance()
            .with_base_price(config.base_price)
            .with_delay_ms(1, 2),
    )));
    feeds.add(Box::new(SyntheticFeed::new(
        FeedProfile::bybit()
            .with_base_price(config.base_price)
            .with_delay_ms(1, 2),
    )));

    let mut registry = BookRegistry::new();
    for venue in feeds.venue_names() {
        registry.add(&config.symbol, &venue);
    }
    let registry = Arc::new(registry);

    let risk = Arc::new(RiskManager::new(RiskLimits::default()));
    let tracker = Arc::new(PerfTracker::new());
    let sink = Arc::new(PushSink::new());
    sink.start();

    let engine = Arc::new(
        Engine::new(&config, registry, risk.clone(), tracker.clone(), sink.clone()).unwrap(),
    );

    feeds.set_symbol(&config.symbol);
    let dispatch = engine.clone();
    feeds.set_callback(Arc::new(move |update: &MarketUpdate| {
        dispatch.handle_update(update);
    }));
    feeds.start_all();
    std::thread::sleep(std::time::Duration::from_millis(150));
    feeds.stop_all();
    sink.stop();

    let s = tracker.snapshot();
    assert!(s.updates_total > 0, "feeds produced no updates");
    assert_eq!(s.updates_dropped, 0);
    assert!(s.max_latency_ns > 0);

    // The log exists with a header regardless of whether books crossed.
    let contents = std::fs::read_to_string(&csv_path).unwrap();
    assert!(contents.starts_with("timestamp,symbol,"));
    assert_eq!(
        contents.lines().count() as u64,
        1 + tracker.opportunities()
    );
}
