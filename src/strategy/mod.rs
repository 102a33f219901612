//! Strategy Layer - Token Classification and Entry Scheduling
//!
//! Decides how positions get acquired:
//! - Token classification (TECH / VIRAL_MEME / UNKNOWN) from chain features
//!   and social signals
//! - Entry strategy selection (immediate / wait-for-dip / ladder) with
//!   per-strategy entry windows
//! - Per-tick entry checks, including entry-window expiry

pub mod classify;
pub mod entry;

pub use classify::classify_token;
pub use entry::{EntryCheck, EntryScheduler};
