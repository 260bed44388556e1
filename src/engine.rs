//! Per-update dispatch: book write, detection, risk, and output fan-out.
//!
//! The whole pipeline runs synchronously on the producer thread that
//! delivered the update; there is no queue between a feed and the hot
//! path. Nothing here aborts the loop: bad updates are dropped and
//! counted, sink and log failures are isolated, and risk rejections are
//! ordinary values.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::detector::{ArbitrageOpportunity, Detector};
use crate::metrics::PerfTracker;
use crate::oplog::OpportunityLog;
use crate::registry::BookRegistry;
use crate::risk::RiskManager;
use crate::sink::{opportunity_message, price_update_message, PushSink};
use crate::types::{timestamp_ns, MarketUpdate, UpdateKind};

pub struct Engine {
    symbol: String,
    registry: Arc<BookRegistry>,
    detector: Detector,
    risk: Arc<RiskManager>,
    tracker: Arc<PerfTracker>,
    oplog: Mutex<OpportunityLog>,
    sink: Arc<PushSink>,
}

impl Engine {
    pub fn new(
        config: &EngineConfig,
        registry: Arc<BookRegistry>,
        risk: Arc<RiskManager>,
        tracker: Arc<PerfTracker>,
        sink: Arc<PushSink>,
    ) -> anyhow::Result<Self> {
        let oplog = OpportunityLog::create(&config.opportunity_log)?;
        let detector =
            Detector::new(registry.clone()).with_min_profit_bps(config.min_profit_bps);
        Ok(Self {
            symbol: config.symbol.clone(),
            registry,
            detector,
            risk,
            tracker,
            oplog: Mutex::new(oplog),
            sink,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn tracker(&self) -> &PerfTracker {
        &self.tracker
    }

    pub fn risk(&self) -> &RiskManager {
        &self.risk
    }

    /// Apply one market update and run the full detection/risk pipeline.
    /// Called from the producing venue's thread.
    pub fn handle_update(&self, update: &MarketUpdate) {
        let Some(book) = self.registry.get(&update.symbol, &update.venue) else {
            self.tracker.record_dropped_update();
            debug!(
                symbol = %update.symbol,
                venue = %update.venue,
                "dropping update for unregistered book"
            );
            return;
        };

        match update.kind {
            UpdateKind::Bid => book.update_bid(update.price, update.quantity),
            UpdateKind::Ask => book.update_ask(update.price, update.quantity),
            // Prints do not change book state.
            UpdateKind::Trade => {}
        }

        let opportunities = self.detector.check(&update.symbol, update.timestamp_ns);

        let latency = timestamp_ns().saturating_sub(update.timestamp_ns);
        self.tracker.record_update_latency(latency);

        for opp in &opportunities {
            self.tracker.record_opportunity();
            self.process_opportunity(opp);
        }
    }

    fn process_opportunity(&self, opp: &ArbitrageOpportunity) {
        let assessment = self.risk.assess(opp);

        {
            let mut oplog = self.oplog.lock();
            if let Err(e) = oplog.append(opp, assessment.net_profit_bps, assessment.decision.code())
            {
                warn!(error = %e, "opportunity log write failed");
            }
        }

        if assessment.approved() {
            self.tracker.record_trade_executed();
            self.risk.execute(opp, assessment.recommended_size);
            info!(
                symbol = %opp.symbol,
                buy = %opp.buy_venue,
                sell = %opp.sell_venue,
                buy_price = opp.buy_price,
                sell_price = opp.sell_price,
                size = assessment.recommended_size,
                gross_bps = opp.profit_bps,
                net_bps = assessment.net_profit_bps,
                latency_us = opp.latency_ns / 1_000,
                "arbitrage executed"
            );
            self.sink
                .push(opportunity_message(opp, true, &assessment.reason));
        } else {
            debug!(
                symbol = %opp.symbol,
                buy = %opp.buy_venue,
                sell = %opp.sell_venue,
                gross_bps = opp.profit_bps,
                decision = %assessment.decision,
                reason = %assessment.reason,
                "arbitrage rejected"
            );
        }
    }

    /// One-line risk summary for the periodic reporter.
    pub fn log_risk_summary(&self) {
        let report = self.risk.report();
        info!(
            "risk: P&L ${:.2} | exposure ${:.0} | positions {} | trades {} | take rate {:.1}%",
            report.daily_pnl,
            report.total_exposure,
            report.active_positions,
            report.total_trades,
            report.take_rate * 100.0
        );
    }

    /// Queue per-venue mid prices for dashboard consumers.
    pub fn push_price_updates(&self) {
        for venue in self.registry.venues(&self.symbol) {
            if let Some(book) = self.registry.get(&self.symbol, venue) {
                if let Some(mid) = book.mid_price() {
                    self.sink.push(price_update_message(venue, mid));
                }
            }
        }
    }

    /// Spawn the periodic stats thread. It observes and reports; it never
    /// mutates engine state.
    pub fn spawn_stats_reporter(
        self: Arc<Self>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let engine = self;
        let handle = std::thread::Builder::new()
            .name("stats".to_string())
            .spawn(move || {
                let step = Duration::from_millis(200);
                let mut waited = Duration::ZERO;
                while !shutdown.load(Ordering::Relaxed) {
                    std::thread::sleep(step);
                    waited += step;
                    if waited < interval {
                        continue;
                    }
                    waited = Duration::ZERO;
                    engine.tracker.log_summary();
                    engine.log_risk_summary();
                    engine.push_price_updates();
                }
            })?;
        Ok(handle)
    }
}
