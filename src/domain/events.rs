//! Position Event Stream
//!
//! Outbound events emitted by the engine for downstream stats/learning
//! consumers. Sinks are fire-and-forget: a slow or closed consumer never
//! blocks or fails a ledger operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::position::{EntryStrategy, ExitReason};

/// Lifecycle event for a tracked position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PositionEvent {
    /// First entry fill opened the position
    Opened {
        mint: String,
        symbol: String,
        entry_price: f64,
        position_size_usd: f64,
        entry_strategy: EntryStrategy,
        stop_loss: f64,
        time: DateTime<Utc>,
    },
    /// A take-profit stage sold part of the position
    PartialExit {
        mint: String,
        symbol: String,
        stage: String,
        price: f64,
        size_pct: f64,
        pnl: f64,
        time: DateTime<Utc>,
    },
    /// The position reached a terminal state
    Closed {
        mint: String,
        symbol: String,
        exit_price: f64,
        realized_pnl: f64,
        reason: ExitReason,
        time: DateTime<Utc>,
    },
}

impl PositionEvent {
    /// Mint address the event refers to
    pub fn mint(&self) -> &str {
        match self {
            PositionEvent::Opened { mint, .. } => mint,
            PositionEvent::PartialExit { mint, .. } => mint,
            PositionEvent::Closed { mint, .. } => mint,
        }
    }
}

/// Consumer of the position-event stream
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Implementations must not block on slow consumers.
    async fn publish(&self, event: PositionEvent);
}

/// Event sink backed by an unbounded tokio channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PositionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving half for the consumer
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PositionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn publish(&self, event: PositionEvent) {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}
