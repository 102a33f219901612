//! Mintwatch - Position Lifecycle and Risk Management Core
//!
//! The position-lifecycle and risk-management core of an automated token
//! trading tool: consumes buy signals and price ticks, decides how and
//! when to acquire positions, runs an adaptive staged exit policy and
//! keeps an exactly-reconciling ledger of capital and PnL.
//!
//! # Modules
//!
//! - `domain`: core business logic (Signal, Position, PositionLedger, Journal)
//! - `risk`: adaptive stop-loss/take-profit policy (RiskPolicy)
//! - `strategy`: token classification and entry scheduling
//! - `application`: the TradingEngine orchestrator
//! - `config`: configuration loading and validation

pub mod application;
pub mod config;
pub mod domain;
pub mod risk;
pub mod strategy;
