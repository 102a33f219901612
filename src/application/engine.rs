//! Trading Engine
//!
//! Orchestrator wiring the ledger, journal and event stream into the
//! operations callers use: watch, check-entry, enter, update, close. The
//! ledger sits behind a single async mutex, so all mutating operations are
//! serialized; price retrieval stays the caller's responsibility and no
//! operation here performs network I/O.
//!
//! Journal saves happen after every mutating operation. A failed save is
//! logged loudly and retried on the next operation; in-memory state stays
//! authoritative for the process lifetime.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::loader::Config;
use crate::domain::events::{EventSink, PositionEvent};
use crate::domain::journal::{JournalStore, JsonJournal};
use crate::domain::ledger::{
    CloseReport, EnterOutcome, EntryOutcome, PerformanceSummary, PositionLedger, UpdateReport,
    WatchOutcome,
};
use crate::domain::position::{ExitReason, Position};
use crate::domain::signal::{PriceTick, Signal, SocialSignals, TokenFeatures};
use crate::risk::RiskPolicy;
use crate::strategy::entry::EntryScheduler;

struct EngineInner {
    ledger: PositionLedger,
    journal: Box<dyn JournalStore>,
    sinks: Vec<Arc<dyn EventSink>>,
    /// Last journal save failed; retry on the next operation
    journal_dirty: bool,
}

/// The process-wide trading engine. Cheap to clone; all clones share the
/// same ledger. Construct one per process and pass it by handle.
#[derive(Clone)]
pub struct TradingEngine {
    inner: Arc<Mutex<EngineInner>>,
}

impl TradingEngine {
    /// Create an engine with an explicit journal store, reloading any
    /// previous journal state. A corrupt journal is reported and ignored;
    /// it never prevents startup.
    pub fn new(config: &Config, journal: Box<dyn JournalStore>) -> Self {
        let mut ledger = PositionLedger::new(
            config.engine.initial_capital,
            RiskPolicy::new(config.risk.clone()),
            EntryScheduler::new(config.entry.clone()),
            config.sizing.clone(),
        );

        match journal.load() {
            Ok(Some(snapshot)) => ledger.restore(snapshot),
            Ok(None) => info!("No journal found, starting fresh"),
            Err(e) => warn!("Journal unreadable ({}), starting fresh", e),
        }

        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                ledger,
                journal,
                sinks: Vec::new(),
                journal_dirty: false,
            })),
        }
    }

    /// Create an engine with the JSON journal at the configured path
    pub fn from_config(config: &Config) -> Self {
        let journal = JsonJournal::new(config.journal.path.clone());
        Self::new(config, Box::new(journal))
    }

    /// Register a consumer for the position-event stream
    pub async fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.inner.lock().await.sinks.push(sink);
    }

    /// Start watching a token for entry
    pub async fn watch(
        &self,
        signal: &Signal,
        features: &TokenFeatures,
        social: &SocialSignals,
        now: DateTime<Utc>,
    ) -> WatchOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = inner.ledger.watch(signal, features, social, now);
        if inner.journal_dirty {
            Self::persist(&mut inner, now);
        }
        outcome
    }

    /// Run the entry check for a watching position
    pub async fn check_entry(
        &self,
        mint: &str,
        current_price: f64,
        volume_increase: Option<f64>,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = inner.ledger.check_entry(mint, current_price, volume_increase, now);

        let mut events = Vec::new();
        match &outcome {
            EntryOutcome::Entered(entered) => {
                if let EnterOutcome::Opened {
                    symbol,
                    entry_price,
                    position_size_usd,
                    entry_strategy,
                    stop_loss,
                } = entered
                {
                    events.push(PositionEvent::Opened {
                        mint: mint.to_string(),
                        symbol: symbol.clone(),
                        entry_price: *entry_price,
                        position_size_usd: *position_size_usd,
                        entry_strategy: *entry_strategy,
                        stop_loss: *stop_loss,
                        time: now,
                    });
                }
                Self::persist(&mut inner, now);
            }
            EntryOutcome::Expired(report) => {
                events.push(Self::closed_event(report));
                Self::persist(&mut inner, now);
            }
            EntryOutcome::Waiting | EntryOutcome::Untracked => {
                if inner.journal_dirty {
                    Self::persist(&mut inner, now);
                }
            }
        }

        Self::publish(&inner, events).await;
        outcome
    }

    /// Apply an entry fill directly (for callers doing their own scheduling)
    pub async fn enter(
        &self,
        mint: &str,
        entry_price: f64,
        fill_pct: f64,
        now: DateTime<Utc>,
    ) -> EnterOutcome {
        let mut inner = self.inner.lock().await;
        let outcome = inner.ledger.enter(mint, entry_price, fill_pct, now);

        let mut events = Vec::new();
        match &outcome {
            EnterOutcome::Opened {
                symbol,
                entry_price,
                position_size_usd,
                entry_strategy,
                stop_loss,
            } => {
                events.push(PositionEvent::Opened {
                    mint: mint.to_string(),
                    symbol: symbol.clone(),
                    entry_price: *entry_price,
                    position_size_usd: *position_size_usd,
                    entry_strategy: *entry_strategy,
                    stop_loss: *stop_loss,
                    time: now,
                });
                Self::persist(&mut inner, now);
            }
            EnterOutcome::Filled { .. } => {
                Self::persist(&mut inner, now);
            }
            EnterOutcome::Untracked => {
                if inner.journal_dirty {
                    Self::persist(&mut inner, now);
                }
            }
        }

        Self::publish(&inner, events).await;
        outcome
    }

    /// Apply a price tick to the token's open position
    pub async fn update(&self, tick: &PriceTick) -> UpdateReport {
        let mut inner = self.inner.lock().await;

        let symbol = inner
            .ledger
            .position(&tick.mint)
            .map(|p| p.symbol.clone())
            .unwrap_or_default();

        let report = inner.ledger.update(&tick.mint, tick.price, tick.timestamp);

        let mut events = Vec::new();
        for exit in &report.partial_exits {
            events.push(PositionEvent::PartialExit {
                mint: tick.mint.clone(),
                symbol: symbol.clone(),
                stage: exit.stage.clone(),
                price: exit.price,
                size_pct: exit.size_pct,
                pnl: exit.pnl,
                time: exit.time,
            });
        }
        if let Some(report) = &report.closed {
            events.push(Self::closed_event(report));
        }

        if !events.is_empty() || inner.journal_dirty {
            Self::persist(&mut inner, tick.timestamp);
        }

        Self::publish(&inner, events).await;
        report
    }

    /// Close a position explicitly; untracked tokens are a no-op
    pub async fn close(
        &self,
        mint: &str,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Option<CloseReport> {
        let mut inner = self.inner.lock().await;
        let report = inner.ledger.close(mint, exit_price, reason, now);

        let mut events = Vec::new();
        if let Some(report) = &report {
            events.push(Self::closed_event(report));
            Self::persist(&mut inner, now);
        } else if inner.journal_dirty {
            Self::persist(&mut inner, now);
        }

        Self::publish(&inner, events).await;
        report
    }

    /// Expire any watching positions whose entry window elapsed
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<CloseReport> {
        let mut inner = self.inner.lock().await;
        let reports = inner.ledger.sweep_expired(now);

        if !reports.is_empty() || inner.journal_dirty {
            Self::persist(&mut inner, now);
        }

        let events: Vec<PositionEvent> = reports.iter().map(Self::closed_event).collect();
        Self::publish(&inner, events).await;
        reports
    }

    /// A copy of the tracked position, if any
    pub async fn position(&self, mint: &str) -> Option<Position> {
        self.inner.lock().await.ledger.position(mint).cloned()
    }

    /// Aggregate performance derived from the ledger
    pub async fn performance_summary(&self) -> PerformanceSummary {
        self.inner.lock().await.ledger.performance_summary()
    }

    fn closed_event(report: &CloseReport) -> PositionEvent {
        PositionEvent::Closed {
            mint: report.mint.clone(),
            symbol: report.symbol.clone(),
            exit_price: report.exit_price,
            realized_pnl: report.realized_pnl,
            reason: report.reason,
            time: report.time,
        }
    }

    fn persist(inner: &mut EngineInner, now: DateTime<Utc>) {
        let snapshot = inner.ledger.snapshot(now);
        match inner.journal.save(&snapshot) {
            Ok(()) => inner.journal_dirty = false,
            Err(e) => {
                error!("Journal save failed, will retry: {}", e);
                inner.journal_dirty = true;
            }
        }
    }

    async fn publish(inner: &EngineInner, events: Vec<PositionEvent>) {
        for event in events {
            for sink in &inner.sinks {
                sink.publish(event.clone()).await;
            }
        }
    }
}
