//! Domain Layer - Core position-lifecycle and accounting logic
//!
//! Pure business types and bookkeeping with no I/O of their own:
//! - `signal`: typed inbound interface (signals, features, price ticks)
//! - `position`: the position record and its lifecycle state machine
//! - `ledger`: capital/PnL accounting and the exit policy
//! - `journal`: durable closed-position records with crash-safe reload
//! - `events`: outbound position-event stream for downstream consumers

pub mod events;
pub mod journal;
pub mod ledger;
pub mod position;
pub mod signal;

pub use events::{ChannelSink, EventSink, PositionEvent};
pub use journal::{JournalError, JournalRecord, JournalSnapshot, JournalStore, JsonJournal};
pub use ledger::{
    CloseReport, EnterOutcome, EntryOutcome, PerformanceSummary, PositionLedger, UpdateReport,
    WatchOutcome,
};
pub use position::{
    EntryStrategy, ExitReason, PartialExit, Position, PositionStatus, TokenType, TpStage,
};
pub use signal::{
    Confidence, DevRisk, PriceTick, Recommendation, Signal, SocialSignals, TokenCategory,
    TokenFeatures,
};
