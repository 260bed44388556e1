//! Engine bootstrap: wire feeds, books, risk, and outputs together, run
//! until Ctrl-C, then shut down in dependency order and emit the final
//! session summaries.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use xarb::config::EngineConfig;
use xarb::dashboard::DashboardServer;
use xarb::engine::Engine;
use xarb::feeds::{FeedManager, FeedProfile, SyntheticFeed};
use xarb::logging;
use xarb::metrics::{PerfSnapshot, PerfTracker};
use xarb::registry::BookRegistry;
use xarb::risk::{RiskManager, RiskReport};
use xarb::sink::PushSink;
use xarb::types::MarketUpdate;

const SESSION_SUMMARY_FILE: &str = "session_summary.txt";

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init_logging();
    dotenvy::dotenv().ok();
    let config = EngineConfig::from_env();
    let run_id = logging::get_run_id();

    info!(
        run_id = %run_id,
        symbol = %config.symbol,
        min_profit_bps = config.min_profit_bps,
        fee_rate = config.fee_rate,
        dashboard_port = config.dashboard_port,
        "cross-venue arbitrage engine starting"
    );

    // Venue feeds first: the registry is keyed off their names.
    let mut feeds = FeedManager::new();
    for profile in [
        FeedProfile::binance(),
        FeedProfile::coinbase(),
        FeedProfile::kraken(),
        FeedProfile::bybit(),
    ] {
        feeds.add(Box::new(SyntheticFeed::new(
            profile.with_base_price(config.base_price),
        )));
    }

    let mut registry = BookRegistry::new();
    for venue in feeds.venue_names() {
        registry.add(&config.symbol, &venue);
    }
    let registry = Arc::new(registry);
    info!(venues = feeds.len(), "order books registered");

    let risk = Arc::new(
        RiskManager::new(config.limits.clone())
            .with_fee_rate(config.fee_rate)
            .with_reference_price(config.reference_price)
            .with_min_viable_size(config.min_viable_size)
            .with_initial_balance(config.initial_balance),
    );
    let tracker = Arc::new(PerfTracker::new());
    let sink = Arc::new(PushSink::new());

    let dashboard = DashboardServer::new(config.dashboard_port);
    sink.subscribe(Box::new(dashboard.subscriber()));
    tokio::spawn(dashboard.run());
    sink.start();

    let engine = Arc::new(
        Engine::new(&config, registry, risk.clone(), tracker.clone(), sink.clone())
            .context("failed to open the opportunity log")?,
    );

    feeds.set_symbol(&config.symbol);
    let dispatch = engine.clone();
    feeds.set_callback(Arc::new(move |update: &MarketUpdate| {
        dispatch.handle_update(update);
    }));
    feeds.start_all();

    let shutdown = Arc::new(AtomicBool::new(false));
    let stats = engine
        .clone()
        .spawn_stats_reporter(
            Duration::from_secs(config.stats_interval_secs),
            shutdown.clone(),
        )
        .context("failed to spawn the stats reporter")?;

    info!("engine running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    // Producers first so no update arrives after the sinks wind down.
    shutdown.store(true, Ordering::Relaxed);
    feeds.stop_all();
    if stats.join().is_err() {
        warn!("stats thread panicked");
    }
    sink.stop();

    tracker.log_summary();
    let report = risk.report();
    log_final_summary(&report);

    if let Err(e) = write_session_summary(SESSION_SUMMARY_FILE, &report, &tracker.snapshot()) {
        warn!(error = %e, "failed to write session summary");
    } else {
        info!(file = SESSION_SUMMARY_FILE, "session summary saved");
    }

    info!("engine stopped");
    Ok(())
}

fn log_final_summary(report: &RiskReport) {
    info!("=== FINAL SESSION SUMMARY ===");
    info!("  opportunities seen: {}", report.opportunities_seen);
    info!("  trades executed: {}", report.opportunities_taken);
    info!("  take rate: {:.1}%", report.take_rate * 100.0);
    info!("  win rate: {:.1}%", report.win_rate * 100.0);
    info!("  total P&L: ${:.2}", report.total_pnl);
    info!("  total exposure: ${:.0}", report.total_exposure);
    info!("  drawdown: {:.2}%", report.current_drawdown * 100.0);
}

fn write_session_summary(
    path: &str,
    report: &RiskReport,
    perf: &PerfSnapshot,
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    writeln!(file, "cross-venue arbitrage session summary")?;
    writeln!(file, "=====================================")?;
    writeln!(file, "runtime: {:.1}s", perf.runtime_secs)?;
    writeln!(
        file,
        "updates: {} ({:.1}/s)",
        perf.updates_total, perf.updates_per_sec
    )?;
    writeln!(file, "avg latency: {}us", perf.avg_latency_ns / 1_000)?;
    writeln!(file, "opportunities seen: {}", report.opportunities_seen)?;
    writeln!(file, "trades executed: {}", report.opportunities_taken)?;
    writeln!(file, "take rate: {:.1}%", report.take_rate * 100.0)?;
    writeln!(file, "win rate: {:.1}%", report.win_rate * 100.0)?;
    writeln!(file, "daily P&L: ${:.2}", report.daily_pnl)?;
    writeln!(file, "total P&L: ${:.2}", report.total_pnl)?;
    writeln!(file, "total exposure: ${:.0}", report.total_exposure)?;
    Ok(())
}
