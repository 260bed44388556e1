//! Append-only CSV log of every detected opportunity.
//!
//! The file is the hand-off point for downstream consumers (the dashboard
//! bridge tails it), so every record is flushed as soon as it is written.
//! Venue threads share the writer through a mutex held by the engine.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::detector::ArbitrageOpportunity;

pub const CSV_HEADER: &str =
    "timestamp,symbol,buy_exchange,sell_exchange,buy_price,sell_price,profit_bps,net_profit_bps,latency_ns,decision";

pub struct OpportunityLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl OpportunityLog {
    /// Create (truncating) the log file and emit the header.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;
        Ok(Self { writer, path })
    }

    /// Append one record and flush it through to disk.
    pub fn append(
        &mut self,
        opp: &ArbitrageOpportunity,
        net_profit_bps: f64,
        decision_code: u8,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{:.2},{:.2},{:.1},{:.1},{},{}",
            opp.detected_at_ns,
            opp.symbol,
            opp.buy_venue,
            opp.sell_venue,
            opp.buy_price,
            opp.sell_price,
            opp.profit_bps,
            net_profit_bps,
            opp.latency_ns,
            decision_code,
        )?;
        self.writer.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
