//! Engine configuration from environment variables.
//!
//! Every knob has a sane default; a value that fails to parse is reported
//! with `warn!` and replaced by the default rather than aborting startup.
//! `.env` files are honored via `dotenvy` in `main`.

use tracing::warn;

use crate::detector::DEFAULT_MIN_PROFIT_BPS;
use crate::risk::{
    RiskLimits, DEFAULT_FEE_RATE, DEFAULT_INITIAL_BALANCE, DEFAULT_MIN_VIABLE_SIZE,
    DEFAULT_REFERENCE_PRICE,
};

pub const DEFAULT_OPPORTUNITY_LOG: &str = "arbitrage_opportunities.csv";
pub const DEFAULT_DASHBOARD_PORT: u16 = 8080;
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_BASE_PRICE: f64 = 50_000.0;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    /// Detector threshold in basis points.
    pub min_profit_bps: f64,
    /// Per-side fee rate on notional.
    pub fee_rate: f64,
    /// Fixed mark for exposure-to-size conversion.
    pub reference_price: f64,
    pub min_viable_size: f64,
    pub initial_balance: f64,
    pub limits: RiskLimits,
    pub opportunity_log: String,
    pub dashboard_port: u16,
    pub stats_interval_secs: u64,
    /// Mid price the synthetic venues orbit.
    pub base_price: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            min_profit_bps: DEFAULT_MIN_PROFIT_BPS,
            fee_rate: DEFAULT_FEE_RATE,
            reference_price: DEFAULT_REFERENCE_PRICE,
            min_viable_size: DEFAULT_MIN_VIABLE_SIZE,
            initial_balance: DEFAULT_INITIAL_BALANCE,
            limits: RiskLimits::default(),
            opportunity_log: DEFAULT_OPPORTUNITY_LOG.to_string(),
            dashboard_port: DEFAULT_DASHBOARD_PORT,
            stats_interval_secs: DEFAULT_STATS_INTERVAL_SECS,
            base_price: DEFAULT_BASE_PRICE,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let limits = RiskLimits {
            max_position_size: env_f64("MAX_POSITION_SIZE", defaults.limits.max_position_size),
            max_total_exposure: env_f64("MAX_TOTAL_EXPOSURE", defaults.limits.max_total_exposure),
            max_single_trade_size: env_f64(
                "MAX_SINGLE_TRADE_SIZE",
                defaults.limits.max_single_trade_size,
            ),
            min_profit_after_fees_bps: env_f64(
                "MIN_PROFIT_AFTER_FEES_BPS",
                defaults.limits.min_profit_after_fees_bps,
            ),
            max_daily_loss: env_f64("MAX_DAILY_LOSS", defaults.limits.max_daily_loss),
            max_drawdown_frac: env_f64("MAX_DRAWDOWN_FRAC", defaults.limits.max_drawdown_frac),
        };

        Self {
            symbol: std::env::var("SYMBOL")
                .map(|s| s.to_uppercase())
                .unwrap_or(defaults.symbol),
            min_profit_bps: env_f64("MIN_PROFIT_BPS", defaults.min_profit_bps),
            fee_rate: env_f64("FEE_RATE", defaults.fee_rate),
            reference_price: env_f64("REFERENCE_PRICE", defaults.reference_price),
            min_viable_size: env_f64("MIN_VIABLE_SIZE", defaults.min_viable_size),
            initial_balance: env_f64("INITIAL_BALANCE", defaults.initial_balance),
            limits,
            opportunity_log: std::env::var("OPPORTUNITY_LOG").unwrap_or(defaults.opportunity_log),
            dashboard_port: env_u16("DASHBOARD_PORT", defaults.dashboard_port),
            stats_interval_secs: env_u64("STATS_INTERVAL_SECS", defaults.stats_interval_secs),
            base_price: env_f64("BASE_PRICE", defaults.base_price),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                warn!("failed to parse {key}='{raw}', using default {default}");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("failed to parse {key}='{raw}', using default {default}");
            default
        }),
        Err(_) => default,
    }
}

fn env_u16(key: &str, default: u16) -> u16 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("failed to parse {key}='{raw}', using default {default}");
            default
        }),
        Err(_) => default,
    }
}
