//! Push sink: a thread-safe FIFO of pre-serialized messages drained by a
//! background thread that fans them out to attached subscribers.
//!
//! Delivery is best-effort. Subscribers are served in attachment order and
//! a subscriber whose send fails is detached; transports (WebSocket, pipe,
//! a test buffer) live behind the [`Subscriber`] trait.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::detector::ArbitrageOpportunity;

/// A message transport attached to the sink.
pub trait Subscriber: Send {
    fn name(&self) -> &str;

    /// Deliver one payload. An error detaches this subscriber.
    fn send(&mut self, payload: &str) -> io::Result<()>;
}

struct SinkShared {
    queue: Mutex<VecDeque<String>>,
    ready: Condvar,
    running: AtomicBool,
    subscribers: Mutex<Vec<Box<dyn Subscriber>>>,
}

impl SinkShared {
    fn fan_out(&self, payload: &str) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain_mut(|sub| match sub.send(payload) {
            Ok(()) => true,
            Err(e) => {
                warn!(subscriber = sub.name(), error = %e, "subscriber send failed, detaching");
                false
            }
        });
    }
}

pub struct PushSink {
    shared: Arc<SinkShared>,
    drain: Mutex<Option<JoinHandle<()>>>,
}

impl PushSink {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SinkShared {
                queue: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
                running: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
            drain: Mutex::new(None),
        }
    }

    /// Attach a subscriber. Fan-out order is attachment order.
    pub fn subscribe(&self, subscriber: Box<dyn Subscriber>) {
        debug!(subscriber = subscriber.name(), "sink subscriber attached");
        self.shared.subscribers.lock().push(subscriber);
    }

    /// Enqueue one pre-serialized message for delivery.
    pub fn push(&self, payload: String) {
        self.shared.queue.lock().push_back(payload);
        self.shared.ready.notify_one();
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Start the drain thread. Idempotent.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }
        let shared = self.shared.clone();
        let handle = std::thread::Builder::new()
            .name("sink-drain".to_string())
            .spawn(move || drain_loop(&shared));
        match handle {
            Ok(handle) => *self.drain.lock() = Some(handle),
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                warn!(error = %e, "failed to spawn sink drain thread");
            }
        }
    }

    /// Stop the drain thread, delivering anything still queued first.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shared.ready.notify_all();
        if let Some(handle) = self.drain.lock().take() {
            if handle.join().is_err() {
                warn!("sink drain thread panicked");
            }
        }
    }
}

impl Default for PushSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PushSink {
    fn drop(&mut self) {
        self.stop();
    }
}

fn drain_loop(shared: &SinkShared) {
    info!("sink drain started");
    loop {
        let mut queue = shared.queue.lock();
        while queue.is_empty() && shared.running.load(Ordering::Acquire) {
            shared.ready.wait(&mut queue);
        }
        if queue.is_empty() {
            // Shut down with nothing left to deliver.
            break;
        }
        while let Some(payload) = queue.pop_front() {
            drop(queue);
            shared.fan_out(&payload);
            queue = shared.queue.lock();
        }
        if !shared.running.load(Ordering::Acquire) {
            break;
        }
    }
    info!("sink drain stopped");
}

/// Dashboard payload for one assessed opportunity.
pub fn opportunity_message(opp: &ArbitrageOpportunity, approved: bool, reason: &str) -> String {
    serde_json::json!({
        "type": "opportunity",
        "opportunity": {
            "symbol": opp.symbol,
            "buy_exchange": opp.buy_venue,
            "sell_exchange": opp.sell_venue,
            "buy_price": opp.buy_price,
            "sell_price": opp.sell_price,
            "profit_bps": opp.profit_bps,
            "latency_ns": opp.latency_ns,
            "approved": approved,
            "reason": reason,
        }
    })
    .to_string()
}

/// Dashboard payload for a periodic per-venue price tick.
pub fn price_update_message(venue: &str, price: f64) -> String {
    serde_json::json!({
        "type": "price_update",
        "exchange": venue,
        "price": price,
    })
    .to_string()
}
