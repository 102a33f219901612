//! Position State
//!
//! The position record and its lifecycle states. A position is created in
//! `Watching`, becomes `Open` on the first entry fill, and ends in exactly
//! one terminal state. All money math here is per-position; capital
//! aggregation lives in the ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{Confidence, DevRisk, Recommendation, Signal, TokenCategory};

/// Position lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    /// Waiting for an entry signal
    Watching,
    /// Entry filled, monitored against price updates
    Open,
    /// Closed with all take-profit stages executed
    ClosedTp,
    /// Closed at the stop-loss or trailing stop
    ClosedSl,
    /// Closed by an explicit external call
    ClosedManual,
    /// Entry window elapsed with no fill
    Expired,
}

impl PositionStatus {
    /// Terminal states permit no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PositionStatus::ClosedTp
                | PositionStatus::ClosedSl
                | PositionStatus::ClosedManual
                | PositionStatus::Expired
        )
    }
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PositionStatus::Watching => "watching",
            PositionStatus::Open => "open",
            PositionStatus::ClosedTp => "closed_tp",
            PositionStatus::ClosedSl => "closed_sl",
            PositionStatus::ClosedManual => "closed_manual",
            PositionStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// Token classification driving entry strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Slower steady growth, often dumps post-migration then recovers
    Tech,
    /// Social-momentum driven, often pumps immediately
    ViralMeme,
    #[default]
    Unknown,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenType::Tech => "tech",
            TokenType::ViralMeme => "viral_meme",
            TokenType::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// How the position is acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStrategy {
    /// Full position on the first price check
    Immediate,
    /// Wait for a retrace from the running high
    WaitForDip,
    /// First tranche immediately, the rest on volume confirmation
    Ladder,
}

impl std::fmt::Display for EntryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryStrategy::Immediate => "immediate",
            EntryStrategy::WaitForDip => "wait_for_dip",
            EntryStrategy::Ladder => "ladder",
        };
        write!(f, "{}", s)
    }
}

/// Why a position left the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Regular stop-loss hit
    StopLoss,
    /// Trailing stop hit after activation
    TrailingStop,
    /// Every take-profit stage executed
    AllTargetsHit,
    /// Explicit external close
    Manual,
    /// Entry window elapsed unfilled
    Expired,
}

impl ExitReason {
    /// The terminal status this exit maps to
    pub fn terminal_status(&self) -> PositionStatus {
        match self {
            ExitReason::StopLoss | ExitReason::TrailingStop => PositionStatus::ClosedSl,
            ExitReason::AllTargetsHit => PositionStatus::ClosedTp,
            ExitReason::Manual => PositionStatus::ClosedManual,
            ExitReason::Expired => PositionStatus::Expired,
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::AllTargetsHit => "all_targets_hit",
            ExitReason::Manual => "manual",
            ExitReason::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// One rung of the take-profit ladder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TpStage {
    /// Display label ("First Target")
    pub label: String,
    /// Profit threshold as a fraction of entry (0.5 = +50%)
    pub threshold_pct: f64,
    /// Fraction of the original position size sold at this stage
    pub sell_pct: f64,
    /// Trigger price, entry * (1 + threshold)
    pub price: f64,
    /// Stages fire at most once
    pub executed: bool,
}

impl TpStage {
    /// Whether this stage should fire at the given price
    pub fn should_fire(&self, current_price: f64) -> bool {
        !self.executed && current_price >= self.price
    }
}

/// A partial exit taken at a take-profit stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialExit {
    /// Label of the stage that fired
    pub stage: String,
    /// Execution price
    pub price: f64,
    /// Fraction of the original position size sold
    pub size_pct: f64,
    /// Realized profit for this slice
    pub pnl: f64,
    /// Execution time
    pub time: DateTime<Utc>,
}

/// A tracked trading position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Token mint address
    pub mint: String,
    /// Token symbol
    pub symbol: String,
    /// Lifecycle status
    pub status: PositionStatus,
    /// Token classification at watch time
    pub token_type: TokenType,
    /// Category from the upstream pipeline
    pub token_category: TokenCategory,
    /// Developer-risk tier if known
    pub dev_risk: Option<DevRisk>,
    /// Signal confidence
    pub confidence: Confidence,
    /// Signal risk score (0-10)
    pub risk_score: u8,
    /// Signal recommendation (always BUY for tracked positions)
    pub recommendation: Recommendation,
    /// Predicted return from the upstream model
    pub predicted_return: f64,
    /// Volatility adjustment used for stop-loss sizing
    pub volatility_multiplier: f64,
    /// Entry strategy chosen at watch time
    pub entry_strategy: EntryStrategy,
    /// Full position size in quote currency (USD)
    pub position_size_usd: f64,

    /// Entry price, set by the first fill
    pub entry_price: Option<f64>,
    /// Most recently observed price
    pub current_price: Option<f64>,
    /// Active stop-loss price
    pub stop_loss: Option<f64>,
    /// Take-profit ladder, ordered by threshold
    pub tp_stages: Vec<TpStage>,

    /// Trailing stop latch
    pub trailing_active: bool,
    /// Current trailing stop price
    pub trailing_price: Option<f64>,
    /// Peak price since trailing activation
    pub peak_price: Option<f64>,

    /// When watching began
    pub watch_start: DateTime<Utc>,
    /// First fill time
    pub entry_time: Option<DateTime<Utc>>,
    /// Terminal transition time
    pub exit_time: Option<DateTime<Utc>>,

    /// Fraction of the position filled so far, [0, 1], never decreases
    pub entry_filled_pct: f64,
    /// Number of entry fills attempted
    pub entry_attempts: u32,
    /// Entry window length in hours
    pub max_entry_wait_hours: f64,

    /// Profit locked in by partial and final exits
    pub realized_pnl: f64,
    /// Mark-to-market profit on the unsold remainder
    pub unrealized_pnl: f64,
    /// Highest price observed since watch start
    pub highest_price: Option<f64>,
    /// Lowest price observed since watch start
    pub lowest_price: Option<f64>,
    /// Largest retrace from the running high (fraction)
    pub max_drawdown: f64,

    /// Why the position closed
    pub exit_reason: Option<ExitReason>,
    /// Partial exits taken at take-profit stages
    pub partial_exits: Vec<PartialExit>,
    /// Free-text annotations
    pub notes: Vec<String>,
}

impl Position {
    /// Create a new watching position from a signal
    pub fn watching(
        signal: &Signal,
        token_type: TokenType,
        entry_strategy: EntryStrategy,
        position_size_usd: f64,
        max_entry_wait_hours: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            mint: signal.mint.clone(),
            symbol: signal.symbol.clone(),
            status: PositionStatus::Watching,
            token_type,
            token_category: signal.token_category,
            dev_risk: signal.dev_risk,
            confidence: signal.confidence,
            risk_score: signal.risk_score,
            recommendation: signal.recommendation,
            predicted_return: signal.predicted_return,
            volatility_multiplier: signal.volatility_multiplier,
            entry_strategy,
            position_size_usd,
            entry_price: None,
            current_price: None,
            stop_loss: None,
            tp_stages: Vec::new(),
            trailing_active: false,
            trailing_price: None,
            peak_price: None,
            watch_start: now,
            entry_time: None,
            exit_time: None,
            entry_filled_pct: 0.0,
            entry_attempts: 0,
            max_entry_wait_hours,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            highest_price: None,
            lowest_price: None,
            max_drawdown: 0.0,
            exit_reason: None,
            partial_exits: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Fraction of the original size already sold through partial exits
    pub fn sold_size_pct(&self) -> f64 {
        self.partial_exits.iter().map(|e| e.size_pct).sum()
    }

    /// Fraction of the original size still held
    pub fn remaining_size_pct(&self) -> f64 {
        (1.0 - self.sold_size_pct()).max(0.0)
    }

    /// Hours since watching began
    pub fn hours_since_watch(&self, now: DateTime<Utc>) -> f64 {
        (now - self.watch_start).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Hours since the first entry fill, zero if never entered
    pub fn hours_held(&self, now: DateTime<Utc>) -> f64 {
        match self.entry_time {
            Some(entry_time) => (now - entry_time).num_milliseconds() as f64 / 3_600_000.0,
            None => 0.0,
        }
    }

    /// Whether the entry window has elapsed without a fill
    pub fn entry_window_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PositionStatus::Watching
            && self.hours_since_watch(now) > self.max_entry_wait_hours
    }

    /// Record a price observation: current price, extremes, trailing peak
    /// and drawdown tracking.
    pub fn observe_price(&mut self, price: f64) {
        self.current_price = Some(price);

        match self.highest_price {
            Some(high) if price <= high => {}
            _ => {
                self.highest_price = Some(price);
                if self.trailing_active {
                    self.peak_price = Some(price);
                }
            }
        }

        match self.lowest_price {
            Some(low) if price >= low => {}
            _ => self.lowest_price = Some(price),
        }

        if self.entry_price.is_some() {
            if let Some(high) = self.highest_price {
                if high > 0.0 {
                    let drawdown = (high - price) / high;
                    if drawdown > self.max_drawdown {
                        self.max_drawdown = drawdown;
                    }
                }
            }
        }
    }

    /// Recompute mark-to-market PnL on the unsold remainder
    pub fn recompute_unrealized(&mut self) {
        if let (Some(entry), Some(price)) = (self.entry_price, self.current_price) {
            if entry > 0.0 {
                self.unrealized_pnl =
                    (price - entry) / entry * self.position_size_usd * self.remaining_size_pct();
            }
        }
    }

    /// Apply an entry fill. The first fill fixes the entry price and time
    /// and opens the position; later ladder fills only advance the filled
    /// fraction. Returns true on the first fill.
    pub fn apply_entry_fill(&mut self, price: f64, fill_pct: f64, now: DateTime<Utc>) -> bool {
        let first_fill = self.entry_price.is_none();

        if first_fill {
            self.entry_price = Some(price);
            self.entry_time = Some(now);
            self.current_price = Some(price);
            self.highest_price = Some(price);
            self.lowest_price = Some(price);
            self.status = PositionStatus::Open;
        }

        self.entry_filled_pct = (self.entry_filled_pct + fill_pct).min(1.0);
        self.entry_attempts += 1;

        first_fill
    }

    /// Record a partial exit at a take-profit stage and return its PnL.
    /// The stage must already be marked executed by the caller.
    pub fn record_partial_exit(
        &mut self,
        stage_label: &str,
        price: f64,
        size_pct: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        let entry = self.entry_price.unwrap_or(price);
        let pnl = if entry > 0.0 {
            (price - entry) / entry * self.position_size_usd * size_pct
        } else {
            0.0
        };

        self.partial_exits.push(PartialExit {
            stage: stage_label.to_string(),
            price,
            size_pct,
            pnl,
            time: now,
        });
        self.realized_pnl += pnl;
        pnl
    }

    /// Whether every take-profit stage has executed
    pub fn all_stages_executed(&self) -> bool {
        !self.tp_stages.is_empty() && self.tp_stages.iter().all(|s| s.executed)
    }

    /// Apply the terminal transition: realize PnL on the unsold remainder,
    /// stamp the exit and flip to the terminal status. Returns the final
    /// slice of PnL (zero for positions that never entered).
    pub fn finalize_close(
        &mut self,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> f64 {
        self.exit_time = Some(now);
        self.exit_reason = Some(reason);
        self.current_price = Some(exit_price);

        let final_pnl = match self.entry_price {
            Some(entry) if entry > 0.0 => {
                (exit_price - entry) / entry * self.position_size_usd * self.remaining_size_pct()
            }
            _ => 0.0,
        };

        self.realized_pnl += final_pnl;
        self.unrealized_pnl = 0.0;
        self.status = reason.terminal_status();
        final_pnl
    }
}
