//! WebSocket bridge between the push sink and browser dashboards.
//!
//! The core stays transport-agnostic: a [`DashboardSubscriber`] attached
//! to the sink forwards every payload into a broadcast channel, and the
//! async server fans the channel out to however many WebSocket clients are
//! connected. Delivery is best-effort; a client whose socket errors (or
//! that lags the channel far enough to be cut off) is dropped.

use std::io;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::sink::Subscriber;

const BROADCAST_CAPACITY: usize = 1_024;

/// Sink subscriber that feeds the dashboard broadcast channel.
pub struct DashboardSubscriber {
    tx: broadcast::Sender<String>,
}

impl Subscriber for DashboardSubscriber {
    fn name(&self) -> &str {
        "dashboard"
    }

    fn send(&mut self, payload: &str) -> io::Result<()> {
        // No connected dashboard is not a failure; the message is simply
        // not deliverable right now.
        let _ = self.tx.send(payload.to_string());
        Ok(())
    }
}

pub struct DashboardServer {
    port: u16,
    tx: broadcast::Sender<String>,
}

impl DashboardServer {
    pub fn new(port: u16) -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { port, tx }
    }

    /// A subscriber to attach to the push sink.
    pub fn subscriber(&self) -> DashboardSubscriber {
        DashboardSubscriber {
            tx: self.tx.clone(),
        }
    }

    /// Accept WebSocket clients until the task is dropped.
    pub async fn run(self) {
        let listener = match TcpListener::bind(("127.0.0.1", self.port)).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(port = self.port, error = %e, "dashboard bind failed");
                return;
            }
        };
        info!(port = self.port, "dashboard listening");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let rx = self.tx.subscribe();
                    tokio::spawn(async move {
                        handle_client(stream, peer.to_string(), rx).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "dashboard accept failed");
                }
            }
        }
    }
}

async fn handle_client(stream: TcpStream, peer: String, mut rx: broadcast::Receiver<String>) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%peer, error = %e, "websocket handshake failed");
            return;
        }
    };
    info!(%peer, "dashboard client connected");
    let (mut write, mut read) = ws.split();

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(payload) => {
                    if write.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%peer, skipped, "dashboard client lagging, dropping");
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
    info!(%peer, "dashboard client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_without_clients_still_accepts_sends() {
        let server = DashboardServer::new(0);
        let mut sub = server.subscriber();
        assert!(sub.send("{\"type\":\"price_update\"}").is_ok());
        assert_eq!(sub.name(), "dashboard");
    }

    #[tokio::test]
    async fn connected_client_receives_sink_payloads() {
        // Bind on an ephemeral port by standing the listener up manually.
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, _) = broadcast::channel(16);

        let rx = tx.subscribe();
        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            handle_client(stream, peer.to_string(), rx).await;
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .unwrap();

        // The receiver was subscribed before the send, so the payload is
        // buffered even if the client task has not polled yet.
        let mut sub = DashboardSubscriber { tx };
        sub.send("hello dashboards").unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        assert_eq!(frame.into_text().unwrap(), "hello dashboards");

        ws.close(None).await.unwrap();
        server.await.unwrap();
    }
}
