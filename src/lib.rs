//! Simulated cross-venue arbitrage engine.
//!
//! Synthetic venue feeds stream best-of-book quotes from native producer
//! threads into per-venue order books with lock-free best-price reads. A
//! pairwise detector runs on every update; each detected opportunity is
//! sized and gated by the risk manager, and approved ones are booked as
//! simulated fills. Outcomes land in an append-only CSV log and are pushed
//! to a WebSocket dashboard.

pub mod book;
pub mod config;
pub mod dashboard;
pub mod detector;
pub mod engine;
pub mod feeds;
pub mod logging;
pub mod metrics;
pub mod oplog;
pub mod registry;
pub mod risk;
pub mod sink;
pub mod types;
