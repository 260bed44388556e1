//! Pre-trade risk assessment and simulated execution.
//!
//! All mutating state (positions, trade ledger, P&L, balance peak) lives
//! behind one mutex; opportunity counters and the trade-id allocator are
//! atomics and may be touched outside it. Assessment is a pure function of
//! the risk state and the opportunity: it never writes positions or the
//! ledger, so a rejected opportunity leaves no trace beyond counters.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::detector::ArbitrageOpportunity;
use crate::types::timestamp_ns;

/// Per-side fee rate charged on notional, 0.1% per side by default.
pub const DEFAULT_FEE_RATE: f64 = 0.001;
/// Fixed mark used to convert remaining dollar exposure into instrument size.
pub const DEFAULT_REFERENCE_PRICE: f64 = 50_000.0;
/// Floor applied when a sizing cap has been exhausted.
pub const DEFAULT_MIN_VIABLE_SIZE: f64 = 0.01;
/// Starting account balance for drawdown accounting.
pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;
/// Positions with |quantity| at or below this are treated as flat.
const POSITION_EPSILON: f64 = 0.001;

/// Hard limits applied to every opportunity.
#[derive(Debug, Clone)]
pub struct RiskLimits {
    /// Max absolute position per `(venue, symbol)`.
    pub max_position_size: f64,
    /// Max summed absolute notional across all positions, in dollars.
    pub max_total_exposure: f64,
    pub max_single_trade_size: f64,
    pub min_profit_after_fees_bps: f64,
    /// Daily loss beyond which no new trades are approved, in dollars.
    pub max_daily_loss: f64,
    /// Max tolerated fractional decline of the account balance.
    pub max_drawdown_frac: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: 5.0,
            max_total_exposure: 500_000.0,
            max_single_trade_size: 1.0,
            min_profit_after_fees_bps: 2.0,
            max_daily_loss: 2_000.0,
            max_drawdown_frac: 0.10,
        }
    }
}

/// Outcome of a risk assessment. Rejections are ordinary values, not
/// errors; most opportunities die here. The discriminant order fixes the
/// CSV decision codes 0 through 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDecision {
    Approved,
    RejectedPositionLimit,
    RejectedExposureLimit,
    RejectedTradeSize,
    RejectedProfitTooLow,
    RejectedDailyLoss,
    RejectedDrawdown,
    RejectedExchangeLimit,
}

impl RiskDecision {
    /// Integer code written to the opportunity log.
    pub fn code(self) -> u8 {
        match self {
            RiskDecision::Approved => 0,
            RiskDecision::RejectedPositionLimit => 1,
            RiskDecision::RejectedExposureLimit => 2,
            RiskDecision::RejectedTradeSize => 3,
            RiskDecision::RejectedProfitTooLow => 4,
            RiskDecision::RejectedDailyLoss => 5,
            RiskDecision::RejectedDrawdown => 6,
            RiskDecision::RejectedExchangeLimit => 7,
        }
    }
}

impl std::fmt::Display for RiskDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskDecision::Approved => "approved",
            RiskDecision::RejectedPositionLimit => "rejected_position_limit",
            RiskDecision::RejectedExposureLimit => "rejected_exposure_limit",
            RiskDecision::RejectedTradeSize => "rejected_trade_size",
            RiskDecision::RejectedProfitTooLow => "rejected_profit_too_low",
            RiskDecision::RejectedDailyLoss => "rejected_daily_loss",
            RiskDecision::RejectedDrawdown => "rejected_drawdown",
            RiskDecision::RejectedExchangeLimit => "rejected_exchange_limit",
        };
        f.write_str(s)
    }
}

/// Full result of assessing one opportunity.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub decision: RiskDecision,
    /// Size to trade when approved, zero otherwise.
    pub recommended_size: f64,
    pub reason: String,
    /// Gross P&L of the simulated trade at the recommended size.
    pub expected_pnl: f64,
    pub fees: f64,
    pub net_profit_bps: f64,
}

impl Assessment {
    pub fn approved(&self) -> bool {
        self.decision == RiskDecision::Approved
    }
}

/// Signed inventory on one venue. Never erased once created; a closed
/// position stays at quantity ~0 with `avg_price` reset.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub venue: String,
    pub symbol: String,
    /// Positive = long, negative = short.
    pub quantity: f64,
    pub avg_price: f64,
    pub last_update_ns: u64,
}

impl Position {
    fn flat(venue: &str, symbol: &str) -> Self {
        Self {
            venue: venue.to_string(),
            symbol: symbol.to_string(),
            quantity: 0.0,
            avg_price: 0.0,
            last_update_ns: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.quantity.abs() > POSITION_EPSILON
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Simulated,
    Pending,
    Filled,
    Failed,
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeStatus::Simulated => "simulated",
            TradeStatus::Pending => "pending",
            TradeStatus::Filled => "filled",
            TradeStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One booked (simulated) fill pair. Append-only.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    pub id: u64,
    pub ts_ns: u64,
    pub symbol: String,
    pub buy_venue: String,
    pub sell_venue: String,
    pub quantity: f64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub gross_pnl: f64,
    pub fees: f64,
    pub net_pnl: f64,
    pub status: TradeStatus,
}

impl Trade {
    /// Build a simulated trade from an opportunity at the given size.
    /// Fees are charged per side on notional.
    pub fn simulated(id: u64, opp: &ArbitrageOpportunity, quantity: f64, fee_rate: f64) -> Self {
        let gross_pnl = (opp.sell_price - opp.buy_price) * quantity;
        let fees = (quantity * opp.buy_price + quantity * opp.sell_price) * fee_rate;
        Self {
            id,
            ts_ns: timestamp_ns(),
            symbol: opp.symbol.clone(),
            buy_venue: opp.buy_venue.clone(),
            sell_venue: opp.sell_venue.clone(),
            quantity,
            buy_price: opp.buy_price,
            sell_price: opp.sell_price,
            gross_pnl,
            fees,
            net_pnl: gross_pnl - fees,
            status: TradeStatus::Simulated,
        }
    }
}

/// Snapshot returned by [`RiskManager::report`].
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub total_exposure: f64,
    pub daily_pnl: f64,
    pub total_pnl: f64,
    pub current_drawdown: f64,
    pub active_positions: usize,
    pub total_trades: usize,
    pub win_rate: f64,
    pub avg_profit_per_trade: f64,
    pub opportunities_seen: u64,
    pub opportunities_taken: u64,
    pub take_rate: f64,
}

type PositionKey = (String, String);

#[derive(Default)]
struct RiskState {
    positions: FxHashMap<PositionKey, Position>,
    trades: Vec<Trade>,
    daily_pnl: f64,
    total_pnl: f64,
    /// Peak balance, ratcheted in `execute`; feeds the report drawdown.
    max_balance: f64,
}

pub struct RiskManager {
    limits: RiskLimits,
    fee_rate: f64,
    reference_price: f64,
    min_viable_size: f64,
    initial_balance: f64,
    state: Mutex<RiskState>,
    next_trade_id: AtomicU64,
    opportunities_seen: AtomicU64,
    opportunities_taken: AtomicU64,
    opportunities_rejected: AtomicU64,
}

impl RiskManager {
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            fee_rate: DEFAULT_FEE_RATE,
            reference_price: DEFAULT_REFERENCE_PRICE,
            min_viable_size: DEFAULT_MIN_VIABLE_SIZE,
            initial_balance: DEFAULT_INITIAL_BALANCE,
            state: Mutex::new(RiskState {
                max_balance: DEFAULT_INITIAL_BALANCE,
                ..RiskState::default()
            }),
            next_trade_id: AtomicU64::new(1),
            opportunities_seen: AtomicU64::new(0),
            opportunities_taken: AtomicU64::new(0),
            opportunities_rejected: AtomicU64::new(0),
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: f64) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_reference_price(mut self, reference_price: f64) -> Self {
        self.reference_price = reference_price;
        self
    }

    pub fn with_min_viable_size(mut self, min_viable_size: f64) -> Self {
        self.min_viable_size = min_viable_size;
        self
    }

    pub fn with_initial_balance(mut self, initial_balance: f64) -> Self {
        self.initial_balance = initial_balance;
        self.state.get_mut().max_balance = initial_balance;
        self
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    /// Size, simulate, and gate an opportunity. Reads risk state but never
    /// mutates positions or the ledger.
    pub fn assess(&self, opp: &ArbitrageOpportunity) -> Assessment {
        self.opportunities_seen.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock();

        let size_by_position = self.max_size_by_position(&state, opp);
        let size_by_exposure = self.max_size_by_exposure(&state);
        let size = self
            .limits
            .max_single_trade_size
            .min(size_by_position)
            .min(size_by_exposure);

        if size <= 0.001 {
            return self.reject(
                RiskDecision::RejectedTradeSize,
                format!("trade size too small ({size:.4})"),
                0.0,
                0.0,
                0.0,
            );
        }

        // Dry-run the trade at the chosen size; the id is only peeked at,
        // allocation happens in execute.
        let simulated = Trade::simulated(
            self.next_trade_id.load(Ordering::Relaxed),
            opp,
            size,
            self.fee_rate,
        );
        let net_profit_bps = simulated.net_pnl / (size * opp.buy_price) * 10_000.0;

        if net_profit_bps < self.limits.min_profit_after_fees_bps {
            return self.reject(
                RiskDecision::RejectedProfitTooLow,
                format!(
                    "net profit below threshold ({:.1} < {:.1} bps)",
                    net_profit_bps, self.limits.min_profit_after_fees_bps
                ),
                simulated.gross_pnl,
                simulated.fees,
                net_profit_bps,
            );
        }

        if state.daily_pnl < -self.limits.max_daily_loss {
            return self.reject(
                RiskDecision::RejectedDailyLoss,
                format!("daily loss limit exceeded ({:.2})", state.daily_pnl),
                simulated.gross_pnl,
                simulated.fees,
                net_profit_bps,
            );
        }

        let current_balance = self.initial_balance + state.total_pnl;
        let drawdown = (self.initial_balance - current_balance) / self.initial_balance;
        if drawdown > self.limits.max_drawdown_frac {
            return self.reject(
                RiskDecision::RejectedDrawdown,
                format!("drawdown limit exceeded ({:.1}%)", drawdown * 100.0),
                simulated.gross_pnl,
                simulated.fees,
                net_profit_bps,
            );
        }

        self.opportunities_taken.fetch_add(1, Ordering::Relaxed);
        Assessment {
            decision: RiskDecision::Approved,
            recommended_size: size,
            reason: "trade approved".to_string(),
            expected_pnl: simulated.gross_pnl,
            fees: simulated.fees,
            net_profit_bps,
        }
    }

    /// Book an approved opportunity at `size`: allocate a trade id, apply
    /// both legs to the position table, roll P&L, ratchet the balance
    /// peak, and append to the ledger.
    pub fn execute(&self, opp: &ArbitrageOpportunity, size: f64) -> bool {
        let mut state = self.state.lock();

        let id = self.next_trade_id.fetch_add(1, Ordering::Relaxed);
        let trade = Trade::simulated(id, opp, size, self.fee_rate);

        Self::apply_fill(&mut state.positions, &opp.buy_venue, &opp.symbol, size, opp.buy_price);
        Self::apply_fill(
            &mut state.positions,
            &opp.sell_venue,
            &opp.symbol,
            -size,
            opp.sell_price,
        );

        state.daily_pnl += trade.net_pnl;
        state.total_pnl += trade.net_pnl;
        let current_balance = self.initial_balance + state.total_pnl;
        if current_balance > state.max_balance {
            state.max_balance = current_balance;
        }

        state.trades.push(trade);
        true
    }

    /// Weighted-average position merge.
    ///
    /// Same-direction fills re-average the entry price; reductions keep it;
    /// a sign flip adopts the fill price; a quantity within epsilon of zero
    /// closes the position and clears the entry price.
    fn apply_fill(
        positions: &mut FxHashMap<PositionKey, Position>,
        venue: &str,
        symbol: &str,
        delta_qty: f64,
        price: f64,
    ) {
        let pos = positions
            .entry((venue.to_string(), symbol.to_string()))
            .or_insert_with(|| Position::flat(venue, symbol));

        let q0 = pos.quantity;
        let p0 = pos.avg_price;
        let q = q0 + delta_qty;

        if q0 == 0.0 || (q0 > 0.0) == (delta_qty > 0.0) {
            pos.quantity = q;
            pos.avg_price = if q.abs() > POSITION_EPSILON {
                (q0 * p0 + delta_qty * price) / q
            } else {
                0.0
            };
        } else {
            pos.quantity = q;
            if q.abs() < POSITION_EPSILON {
                pos.avg_price = 0.0;
            } else if (q > 0.0) != (q0 > 0.0) {
                pos.avg_price = price;
            }
            // Partial reduction: entry price unchanged.
        }
        pos.last_update_ns = timestamp_ns();
    }

    fn max_size_by_position(&self, state: &RiskState, opp: &ArbitrageOpportunity) -> f64 {
        let held = |venue: &str| {
            state
                .positions
                .get(&(venue.to_string(), opp.symbol.clone()))
                .map(|p| p.quantity.abs())
                .unwrap_or(0.0)
        };
        let cap = (self.limits.max_position_size - held(&opp.buy_venue))
            .min(self.limits.max_position_size - held(&opp.sell_venue));
        if cap <= 0.0 {
            self.min_viable_size
        } else {
            cap
        }
    }

    fn max_size_by_exposure(&self, state: &RiskState) -> f64 {
        let exposure: f64 = state
            .positions
            .values()
            .map(|p| (p.quantity * p.avg_price).abs())
            .sum();
        let remaining = self.limits.max_total_exposure - exposure;
        let size = remaining / self.reference_price;
        if size <= 0.0 {
            return self.min_viable_size;
        }
        size.clamp(0.001, 10.0)
    }

    fn reject(
        &self,
        decision: RiskDecision,
        reason: String,
        expected_pnl: f64,
        fees: f64,
        net_profit_bps: f64,
    ) -> Assessment {
        self.opportunities_rejected.fetch_add(1, Ordering::Relaxed);
        Assessment {
            decision,
            recommended_size: 0.0,
            reason,
            expected_pnl,
            fees,
            net_profit_bps,
        }
    }

    /// Consistent snapshot of risk and performance figures.
    pub fn report(&self) -> RiskReport {
        let state = self.state.lock();

        let total_exposure: f64 = state
            .positions
            .values()
            .map(|p| (p.quantity * p.avg_price).abs())
            .sum();
        let active_positions = state.positions.values().filter(|p| p.is_active()).count();

        let total_trades = state.trades.len();
        let (win_rate, avg_profit_per_trade) = if total_trades > 0 {
            let wins = state.trades.iter().filter(|t| t.net_pnl > 0.0).count();
            let total: f64 = state.trades.iter().map(|t| t.net_pnl).sum();
            (
                wins as f64 / total_trades as f64,
                total / total_trades as f64,
            )
        } else {
            (0.0, 0.0)
        };

        let current_balance = self.initial_balance + state.total_pnl;
        let current_drawdown = (state.max_balance - current_balance) / state.max_balance;

        let seen = self.opportunities_seen.load(Ordering::Relaxed);
        let taken = self.opportunities_taken.load(Ordering::Relaxed);
        let take_rate = if seen > 0 {
            taken as f64 / seen as f64
        } else {
            0.0
        };

        RiskReport {
            total_exposure,
            daily_pnl: state.daily_pnl,
            total_pnl: state.total_pnl,
            current_drawdown,
            active_positions,
            total_trades,
            win_rate,
            avg_profit_per_trade,
            opportunities_seen: seen,
            opportunities_taken: taken,
            take_rate,
        }
    }

    /// Roll the daily loss window.
    pub fn reset_daily_pnl(&self) {
        self.state.lock().daily_pnl = 0.0;
    }

    pub fn position(&self, venue: &str, symbol: &str) -> Option<Position> {
        self.state
            .lock()
            .positions
            .get(&(venue.to_string(), symbol.to_string()))
            .cloned()
    }

    pub fn trades(&self) -> Vec<Trade> {
        self.state.lock().trades.clone()
    }

    pub fn opportunities_seen(&self) -> u64 {
        self.opportunities_seen.load(Ordering::Relaxed)
    }

    pub fn opportunities_taken(&self) -> u64 {
        self.opportunities_taken.load(Ordering::Relaxed)
    }

    pub fn opportunities_rejected(&self) -> u64 {
        self.opportunities_rejected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opp(buy: f64, sell: f64) -> ArbitrageOpportunity {
        ArbitrageOpportunity::new("BTCUSDT", "binance", "kraken", buy, sell, timestamp_ns())
    }

    fn manager(limits: RiskLimits) -> RiskManager {
        RiskManager::new(limits)
    }

    #[test]
    fn approves_a_clean_cross_and_caps_size() {
        let risk = manager(RiskLimits {
            max_single_trade_size: 0.5,
            min_profit_after_fees_bps: 5.0,
            ..RiskLimits::default()
        });
        // 50 bps gross.
        let assessment = risk.assess(&opp(100.00, 100.50));

        assert_eq!(assessment.decision, RiskDecision::Approved);
        assert!(assessment.recommended_size <= 0.5);
        assert!(assessment.recommended_size > 0.0);
        assert!(
            (assessment.net_profit_bps - 30.0).abs() < 0.1,
            "net {} bps",
            assessment.net_profit_bps
        );
        assert_eq!(risk.opportunities_seen(), 1);
        assert_eq!(risk.opportunities_taken(), 1);
    }

    #[test]
    fn thin_edges_lose_to_fees() {
        let risk = manager(RiskLimits {
            min_profit_after_fees_bps: 10.0,
            ..RiskLimits::default()
        });
        // 5 bps gross, roughly -15 bps net of 20 bps round-trip fees.
        let assessment = risk.assess(&opp(100.00, 100.05));

        assert_eq!(assessment.decision, RiskDecision::RejectedProfitTooLow);
        assert!(assessment.net_profit_bps < 0.0);
        assert!((assessment.net_profit_bps - (-15.0)).abs() < 0.2);
        assert_eq!(risk.opportunities_taken(), 0);
        assert_eq!(risk.opportunities_rejected(), 1);
    }

    #[test]
    fn assessment_does_not_touch_positions_or_ledger() {
        let risk = manager(RiskLimits::default());
        let a = risk.assess(&opp(100.00, 100.50));
        assert!(a.approved());

        assert!(risk.position("binance", "BTCUSDT").is_none());
        assert!(risk.trades().is_empty());
        assert_eq!(risk.report().total_trades, 0);
    }

    #[test]
    fn execute_books_both_legs_and_pnl() {
        let risk = manager(RiskLimits::default());
        let o = opp(100.00, 100.50);
        assert!(risk.execute(&o, 0.1));

        let long = risk.position("binance", "BTCUSDT").unwrap();
        assert!((long.quantity - 0.1).abs() < 1e-12);
        assert_eq!(long.avg_price, 100.00);

        let short = risk.position("kraken", "BTCUSDT").unwrap();
        assert!((short.quantity + 0.1).abs() < 1e-12);
        assert_eq!(short.avg_price, 100.50);

        let trades = risk.trades();
        assert_eq!(trades.len(), 1);
        let t = &trades[0];
        assert_eq!(t.id, 1);
        assert_eq!(t.status, TradeStatus::Simulated);
        assert!((t.gross_pnl - 0.05).abs() < 1e-12);
        assert!((t.fees - 0.02005).abs() < 1e-12);
        assert!((t.net_pnl - 0.02995).abs() < 1e-12);

        let report = risk.report();
        assert!((report.total_pnl - t.net_pnl).abs() < 1e-12);
        assert!((report.daily_pnl - t.net_pnl).abs() < 1e-12);
    }

    #[test]
    fn trade_ids_are_monotone_from_one() {
        let risk = manager(RiskLimits::default());
        let o = opp(100.00, 100.50);
        for _ in 0..3 {
            risk.execute(&o, 0.1);
        }
        let ids: Vec<u64> = risk.trades().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn net_pnl_matches_the_fee_identity() {
        let o = opp(100.00, 100.50);
        let t = Trade::simulated(1, &o, 0.25, DEFAULT_FEE_RATE);
        let expected_net = (100.50 - 100.00) * 0.25 - (100.00 + 100.50) * 0.25 * DEFAULT_FEE_RATE;
        assert!((t.net_pnl - expected_net).abs() < 1e-12);

        // Round-trip fees cost roughly 20 bps when both legs are near par.
        let net_bps = t.net_pnl / (0.25 * 100.00) * 10_000.0;
        assert!((net_bps - (o.profit_bps - 20.0)).abs() < 0.2);
    }

    #[test]
    fn same_direction_fills_reaverage_the_entry() {
        let risk = manager(RiskLimits::default());
        risk.execute(&opp(100.0, 200.0), 1.0);
        risk.execute(&opp(110.0, 200.0), 1.0);

        let long = risk.position("binance", "BTCUSDT").unwrap();
        assert!((long.quantity - 2.0).abs() < 1e-12);
        assert!((long.avg_price - 105.0).abs() < 1e-9);
    }

    #[test]
    fn partial_reduction_keeps_entry_and_flip_takes_fill_price() {
        let risk = manager(RiskLimits::default());
        // Long 1.0 @ 100 on binance via the buy leg.
        risk.execute(&opp(100.0, 200.0), 1.0);

        // Sell leg lands on binance now: reduce by 0.4.
        let reduce =
            ArbitrageOpportunity::new("BTCUSDT", "kraken", "binance", 150.0, 160.0, timestamp_ns());
        risk.execute(&reduce, 0.4);
        let pos = risk.position("binance", "BTCUSDT").unwrap();
        assert!((pos.quantity - 0.6).abs() < 1e-12);
        assert_eq!(pos.avg_price, 100.0, "reduction must not re-average");

        // Sell 1.0 more: flips to -0.4, entry becomes the fill price.
        risk.execute(&reduce, 1.0);
        let pos = risk.position("binance", "BTCUSDT").unwrap();
        assert!((pos.quantity + 0.4).abs() < 1e-12);
        assert_eq!(pos.avg_price, 160.0);
    }

    #[test]
    fn closing_within_epsilon_clears_the_entry_price() {
        let risk = manager(RiskLimits::default());
        risk.execute(&opp(100.0, 200.0), 1.0);
        let reduce =
            ArbitrageOpportunity::new("BTCUSDT", "kraken", "binance", 150.0, 160.0, timestamp_ns());
        risk.execute(&reduce, 1.0);

        let pos = risk.position("binance", "BTCUSDT").unwrap();
        assert!(pos.quantity.abs() < POSITION_EPSILON);
        assert_eq!(pos.avg_price, 0.0);
        assert!(!pos.is_active());
    }

    #[test]
    fn daily_loss_limit_blocks_new_trades() {
        let risk = manager(RiskLimits {
            max_daily_loss: 1.0,
            min_profit_after_fees_bps: 2.0,
            ..RiskLimits::default()
        });
        // A deliberately losing "arbitrage": sell below buy.
        let loser =
            ArbitrageOpportunity::new("BTCUSDT", "binance", "kraken", 100.0, 80.0, timestamp_ns());
        risk.execute(&loser, 1.0);
        assert!(risk.report().daily_pnl < -1.0);

        let assessment = risk.assess(&opp(100.00, 100.50));
        assert_eq!(assessment.decision, RiskDecision::RejectedDailyLoss);
    }

    #[test]
    fn drawdown_gate_measures_against_the_initial_balance() {
        let risk = manager(RiskLimits {
            max_daily_loss: f64::MAX,
            max_drawdown_frac: 0.05,
            ..RiskLimits::default()
        })
        .with_initial_balance(100.0);
        // Lose ~20 against a 100 starting balance: 20% drawdown.
        let loser =
            ArbitrageOpportunity::new("BTCUSDT", "binance", "kraken", 100.0, 80.0, timestamp_ns());
        risk.execute(&loser, 1.0);

        let assessment = risk.assess(&opp(100.00, 100.50));
        assert_eq!(assessment.decision, RiskDecision::RejectedDrawdown);
        assert!(risk.report().current_drawdown > 0.05);
    }

    #[test]
    fn exhausted_position_limit_falls_back_to_min_viable() {
        let risk = manager(RiskLimits {
            max_position_size: 0.5,
            max_single_trade_size: 1.0,
            ..RiskLimits::default()
        });
        // Fill the binance long to the cap.
        risk.execute(&opp(100.0, 200.0), 0.5);

        let assessment = risk.assess(&opp(100.00, 100.50));
        // Cap is exhausted, so sizing clamps to the minimum viable size
        // rather than rejecting outright.
        assert!(assessment.approved());
        assert!((assessment.recommended_size - DEFAULT_MIN_VIABLE_SIZE).abs() < 1e-12);
    }

    #[test]
    fn exposure_cap_converts_through_the_reference_price() {
        let risk = manager(RiskLimits {
            max_position_size: 50.0,
            max_total_exposure: 1_000.0,
            max_single_trade_size: 10.0,
            min_profit_after_fees_bps: 5.0,
            ..RiskLimits::default()
        })
        .with_reference_price(100.0);

        // Empty book: remaining exposure 1_000 / 100 = 10, clamped at 10.
        let assessment = risk.assess(&opp(100.00, 100.50));
        assert!(assessment.approved());
        assert!((assessment.recommended_size - 10.0).abs() < 1e-12);
    }

    #[test]
    fn tiny_exposure_remainder_rejects_on_size() {
        let risk = manager(RiskLimits {
            max_total_exposure: 50.0,
            ..RiskLimits::default()
        })
        .with_reference_price(50_000.0);

        // 50 / 50_000 = 0.001, at the reject threshold.
        let assessment = risk.assess(&opp(100.00, 100.50));
        assert_eq!(assessment.decision, RiskDecision::RejectedTradeSize);
        assert_eq!(assessment.recommended_size, 0.0);
    }

    #[test]
    fn taken_never_exceeds_seen() {
        let risk = manager(RiskLimits::default());
        for i in 0..20 {
            // Alternate between viable and too-thin edges.
            let sell = if i % 2 == 0 { 100.50 } else { 100.01 };
            let a = risk.assess(&opp(100.00, sell));
            if a.approved() {
                risk.execute(&opp(100.00, sell), a.recommended_size);
            }
        }
        assert!(risk.opportunities_taken() <= risk.opportunities_seen());
        assert_eq!(risk.opportunities_seen(), 20);
    }

    #[test]
    fn report_aggregates_wins_and_take_rate() {
        let risk = manager(RiskLimits::default());
        let winner = opp(100.00, 100.50);
        let a = risk.assess(&winner);
        assert!(a.approved());
        risk.execute(&winner, a.recommended_size);

        let loser =
            ArbitrageOpportunity::new("BTCUSDT", "binance", "kraken", 100.0, 99.0, timestamp_ns());
        assert!(!risk.assess(&loser).approved());
        risk.execute(&loser, 0.1);

        let report = risk.report();
        assert_eq!(report.total_trades, 2);
        assert!((report.win_rate - 0.5).abs() < 1e-12);
        assert_eq!(report.opportunities_seen, 2);
        assert_eq!(report.opportunities_taken, 1);
        assert!((report.take_rate - 0.5).abs() < 1e-12);
        assert_eq!(report.active_positions, 2);
        assert!(report.total_exposure > 0.0);
    }

    #[test]
    fn reset_daily_pnl_only_clears_the_daily_window() {
        let risk = manager(RiskLimits::default());
        risk.execute(&opp(100.00, 100.50), 0.1);
        let before = risk.report();
        assert!(before.daily_pnl > 0.0);

        risk.reset_daily_pnl();
        let after = risk.report();
        assert_eq!(after.daily_pnl, 0.0);
        assert!((after.total_pnl - before.total_pnl).abs() < 1e-12);
    }
}
