//! Trading Journal
//!
//! Durable record of closed positions and aggregate statistics with
//! crash-safe reload. The ledger stays authoritative while the process
//! lives; the journal is what survives a restart. Snapshots are written
//! atomically (temp file + rename) so a crash mid-write leaves the last
//! known-good journal readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use super::position::{
    EntryStrategy, ExitReason, PartialExit, Position, PositionStatus, TokenType,
};
use super::signal::Confidence;

/// Journal persistence errors
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to serialize journal: {0}")]
    SerializationError(String),

    #[error("Failed to write journal file: {0}")]
    WriteError(String),

    #[error("Failed to read journal file: {0}")]
    ReadError(String),

    #[error("Journal file is corrupted: {0}")]
    CorruptedFile(String),
}

/// One closed position as persisted for reporting consumers.
///
/// This field set is a stable interface; extend it, never repurpose it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Token mint address
    pub mint: String,
    /// Token symbol
    pub symbol: String,
    /// Terminal status
    pub status: PositionStatus,
    /// Why the position closed
    pub exit_reason: Option<ExitReason>,
    /// Token classification at watch time
    pub token_type: TokenType,
    /// Entry strategy used
    pub entry_strategy: EntryStrategy,
    /// Signal confidence
    pub confidence: Confidence,
    /// Signal risk score
    pub risk_score: u8,
    /// Position size in quote currency
    pub position_size_usd: f64,
    /// Entry price, absent if the position never filled
    pub entry_price: Option<f64>,
    /// Exit price
    pub exit_price: Option<f64>,
    /// Realized profit over the whole position
    pub realized_pnl: f64,
    /// Partial exits taken before the close
    pub partial_exits: Vec<PartialExit>,
    /// When watching began
    pub watch_start: DateTime<Utc>,
    /// First fill time
    pub entry_time: Option<DateTime<Utc>>,
    /// Terminal transition time
    pub exit_time: Option<DateTime<Utc>>,
}

impl From<&Position> for JournalRecord {
    fn from(position: &Position) -> Self {
        Self {
            mint: position.mint.clone(),
            symbol: position.symbol.clone(),
            status: position.status,
            exit_reason: position.exit_reason,
            token_type: position.token_type,
            entry_strategy: position.entry_strategy,
            confidence: position.confidence,
            risk_score: position.risk_score,
            position_size_usd: position.position_size_usd,
            entry_price: position.entry_price,
            exit_price: position.current_price,
            realized_pnl: position.realized_pnl,
            partial_exits: position.partial_exits.clone(),
            watch_start: position.watch_start,
            entry_time: position.entry_time,
            exit_time: position.exit_time,
        }
    }
}

/// Full journal state as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalSnapshot {
    /// Capital the ledger started with
    pub initial_capital: f64,
    /// Capital after all closed positions
    pub current_capital: f64,
    /// Count of entered-and-closed positions
    pub total_trades: u32,
    /// Trades closed with positive PnL
    pub winning_trades: u32,
    /// Trades closed with non-positive PnL
    pub losing_trades: u32,
    /// Sum of winning trades' PnL
    pub win_sum: f64,
    /// Sum of losing trades' losses (positive number)
    pub loss_sum: f64,
    /// Total realized PnL across closed positions
    pub total_pnl: f64,
    /// Closed-position records
    pub closed_positions: Vec<JournalRecord>,
    /// When the snapshot was written
    pub last_updated: DateTime<Utc>,
}

/// Storage interface for the trading journal.
///
/// The ledger only ever writes full snapshots and reads one back at
/// startup, so the storage mechanism can change (append-only log,
/// embedded KV) without touching ledger logic.
pub trait JournalStore: Send + Sync {
    /// Persist a full snapshot, atomically with respect to crashes
    fn save(&self, snapshot: &JournalSnapshot) -> Result<(), JournalError>;

    /// Load the last snapshot; `None` means a clean start
    fn load(&self) -> Result<Option<JournalSnapshot>, JournalError>;
}

/// JSON-file journal. Full-file rewrite per save is fine at this scale;
/// the rename keeps the previous snapshot intact if the write dies.
#[derive(Debug, Clone)]
pub struct JsonJournal {
    path: PathBuf,
}

impl JsonJournal {
    /// Create a journal backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JournalStore for JsonJournal {
    fn save(&self, snapshot: &JournalSnapshot) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| JournalError::WriteError(e.to_string()))?;
            }
        }

        let content = serde_json::to_string_pretty(snapshot)
            .map_err(|e| JournalError::SerializationError(e.to_string()))?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| JournalError::WriteError(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| JournalError::WriteError(e.to_string()))?;

        Ok(())
    }

    fn load(&self) -> Result<Option<JournalSnapshot>, JournalError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(&self.path).map_err(|e| JournalError::ReadError(e.to_string()))?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        let snapshot: JournalSnapshot = serde_json::from_str(&content)
            .map_err(|e| JournalError::CorruptedFile(e.to_string()))?;

        info!(
            "Journal loaded: {} trades, ${:.2} total PnL",
            snapshot.total_trades, snapshot.total_pnl
        );

        Ok(Some(snapshot))
    }
}
