//! Risk Policy Layer
//!
//! Pure, deterministic risk computations: adaptive stop-loss placement,
//! the take-profit ladder, trailing-stop levels and time-based stop
//! tightening. The policy holds no position state; the ledger owns when
//! and how the results are applied.

pub mod policy;

pub use policy::{RiskPolicy, RiskSummary, TradeQuality};
