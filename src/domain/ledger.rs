//! Position Ledger
//!
//! Owns the in-flight positions and all capital/PnL accounting. Every
//! mutating operation runs the position state machine: watch starts a
//! position, entry checks fill it, price updates fire the exit policy in
//! a fixed order (trailing stop, then regular stop-loss, then take-profit
//! stages), and terminal transitions settle capital.
//!
//! Capital moves only on close events; partial exits accrue on the
//! position until then. At every point
//! `current_capital == initial_capital + sum of closed realized PnL`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::loader::SizingSection;
use crate::domain::journal::{JournalRecord, JournalSnapshot};
use crate::domain::position::{EntryStrategy, ExitReason, PartialExit, Position, PositionStatus};
use crate::domain::signal::{
    Confidence, Recommendation, Signal, SocialSignals, TokenFeatures,
};
use crate::risk::RiskPolicy;
use crate::strategy::classify::classify_token;
use crate::strategy::entry::{EntryCheck, EntryScheduler};

/// Result of a watch request
#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    /// Position is now being watched for entry
    Watching {
        strategy: EntryStrategy,
        size_usd: f64,
    },
    /// Signal was not a BUY
    RejectedNotBuy,
    /// Sizing produced nothing worth tracking
    RejectedZeroSize,
    /// The token already has an open-or-watching position
    RejectedDuplicate,
}

/// Result of an entry fill
#[derive(Debug, Clone, PartialEq)]
pub enum EnterOutcome {
    /// First fill opened the position
    Opened {
        symbol: String,
        entry_price: f64,
        position_size_usd: f64,
        entry_strategy: EntryStrategy,
        stop_loss: f64,
    },
    /// A later ladder tranche advanced the fill
    Filled { total_filled_pct: f64 },
    /// No position tracked for the token
    Untracked,
}

/// Result of an entry check on a watching position
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// An entry fill was applied
    Entered(EnterOutcome),
    /// Still waiting for the entry condition
    Waiting,
    /// Entry window elapsed; the position expired
    Expired(CloseReport),
    /// No watching position for the token
    Untracked,
}

/// Terminal transition details, for events and logging
#[derive(Debug, Clone, PartialEq)]
pub struct CloseReport {
    pub mint: String,
    pub symbol: String,
    pub exit_price: f64,
    pub realized_pnl: f64,
    pub reason: ExitReason,
    pub time: DateTime<Utc>,
}

/// Everything a single price update did to a position
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Take-profit stages that fired on this tick, in ladder order
    pub partial_exits: Vec<PartialExit>,
    /// Terminal transition, if one fired
    pub closed: Option<CloseReport>,
}

/// Aggregate trading performance, derived purely from ledger state
#[derive(Debug, Clone, serde::Serialize)]
pub struct PerformanceSummary {
    pub initial_capital: f64,
    pub current_capital: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    /// Fraction of closed trades with positive PnL
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub active_positions: usize,
}

/// The position book and capital accounting. Single logical writer: all
/// mutation goes through `&mut self`, serialization is the caller's job.
#[derive(Debug)]
pub struct PositionLedger {
    risk: RiskPolicy,
    entry: EntryScheduler,
    sizing: SizingSection,

    initial_capital: f64,
    current_capital: f64,

    positions: HashMap<String, Position>,
    closed: Vec<JournalRecord>,

    total_trades: u32,
    winning_trades: u32,
    losing_trades: u32,
    win_sum: f64,
    loss_sum: f64,
    total_pnl: f64,
}

impl PositionLedger {
    /// Create an empty ledger
    pub fn new(
        initial_capital: f64,
        risk: RiskPolicy,
        entry: EntryScheduler,
        sizing: SizingSection,
    ) -> Self {
        Self {
            risk,
            entry,
            sizing,
            initial_capital,
            current_capital: initial_capital,
            positions: HashMap::new(),
            closed: Vec::new(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_sum: 0.0,
            loss_sum: 0.0,
            total_pnl: 0.0,
        }
    }

    /// Restore aggregates and closed records from a journal snapshot
    pub fn restore(&mut self, snapshot: JournalSnapshot) {
        if (snapshot.initial_capital - self.initial_capital).abs() > f64::EPSILON {
            warn!(
                "Journal initial capital ${:.2} overrides configured ${:.2}",
                snapshot.initial_capital, self.initial_capital
            );
        }

        self.initial_capital = snapshot.initial_capital;
        self.current_capital = snapshot.current_capital;
        self.total_trades = snapshot.total_trades;
        self.winning_trades = snapshot.winning_trades;
        self.losing_trades = snapshot.losing_trades;
        self.win_sum = snapshot.win_sum;
        self.loss_sum = snapshot.loss_sum;
        self.total_pnl = snapshot.total_pnl;
        self.closed = snapshot.closed_positions;

        info!(
            "Ledger restored: {} closed trades, ${:.2} capital",
            self.total_trades, self.current_capital
        );
    }

    /// Snapshot the full journal state
    pub fn snapshot(&self, now: DateTime<Utc>) -> JournalSnapshot {
        JournalSnapshot {
            initial_capital: self.initial_capital,
            current_capital: self.current_capital,
            total_trades: self.total_trades,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_sum: self.win_sum,
            loss_sum: self.loss_sum,
            total_pnl: self.total_pnl,
            closed_positions: self.closed.clone(),
            last_updated: now,
        }
    }

    /// Current capital in quote currency
    pub fn current_capital(&self) -> f64 {
        self.current_capital
    }

    /// A tracked position, if any
    pub fn position(&self, mint: &str) -> Option<&Position> {
        self.positions.get(mint)
    }

    /// All tracked positions
    pub fn active_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Closed-position records accumulated this run (plus restored ones)
    pub fn closed_records(&self) -> &[JournalRecord] {
        &self.closed
    }

    /// Position size for a signal. Non-BUY signals size to zero rather
    /// than erroring; risk shrinks the size monotonically.
    pub fn position_size(
        &self,
        recommendation: Recommendation,
        confidence: Confidence,
        risk_score: u8,
    ) -> f64 {
        if recommendation != Recommendation::Buy {
            return 0.0;
        }

        let conf_mult = self.sizing.confidence_multipliers.get(confidence);
        let risk_adjustment = 1.0 - (risk_score.min(10) as f64 / 20.0);
        self.current_capital * self.sizing.max_position_pct * conf_mult * risk_adjustment
    }

    /// Start watching a token for entry. Enforces the one-position-per-token
    /// invariant by rejecting the new signal.
    pub fn watch(
        &mut self,
        signal: &Signal,
        features: &TokenFeatures,
        social: &SocialSignals,
        now: DateTime<Utc>,
    ) -> WatchOutcome {
        if signal.recommendation != Recommendation::Buy {
            info!(
                "Not watching {}: recommendation is {}",
                signal.symbol, signal.recommendation
            );
            return WatchOutcome::RejectedNotBuy;
        }

        if let Some(existing) = self.positions.get(&signal.mint) {
            warn!(
                "Rejecting watch for {}: already {} for this token",
                signal.symbol, existing.status
            );
            return WatchOutcome::RejectedDuplicate;
        }

        let size_usd = self.position_size(signal.recommendation, signal.confidence, signal.risk_score);
        if size_usd <= 0.0 {
            info!("Not watching {}: position size is 0", signal.symbol);
            return WatchOutcome::RejectedZeroSize;
        }

        let token_type = classify_token(features, social);
        let strategy = self.entry.select_strategy(token_type, signal.confidence, features);
        let max_wait_hours = self.entry.max_wait_hours(strategy);

        let position = Position::watching(signal, token_type, strategy, size_usd, max_wait_hours, now);

        info!(
            "Watching {} ({}) strategy={} size=${:.2} window={:.1}h",
            position.symbol, token_type, strategy, size_usd, max_wait_hours
        );

        self.positions.insert(signal.mint.clone(), position);
        WatchOutcome::Watching {
            strategy,
            size_usd,
        }
    }

    /// Run the entry check for a watching position and apply the outcome
    pub fn check_entry(
        &mut self,
        mint: &str,
        current_price: f64,
        volume_increase: Option<f64>,
        now: DateTime<Utc>,
    ) -> EntryOutcome {
        let Some(position) = self.positions.get_mut(mint) else {
            debug!("Entry check for untracked token {}", mint);
            return EntryOutcome::Untracked;
        };

        let continuing_ladder = position.status == PositionStatus::Open
            && position.entry_strategy == EntryStrategy::Ladder
            && position.entry_filled_pct < 1.0;
        if position.status != PositionStatus::Watching && !continuing_ladder {
            return EntryOutcome::Waiting;
        }

        match self.entry.check_entry(position, current_price, volume_increase, now) {
            EntryCheck::Hold => EntryOutcome::Waiting,
            EntryCheck::Enter { fill_pct } => {
                EntryOutcome::Entered(self.enter(mint, current_price, fill_pct, now))
            }
            EntryCheck::Expired => {
                let position = self
                    .positions
                    .remove(mint)
                    .expect("position present before expiry");
                let report = self.settle_close(position, current_price, ExitReason::Expired, now);
                EntryOutcome::Expired(report)
            }
        }
    }

    /// Apply an entry fill. The first fill opens the position and computes
    /// the stop-loss and take-profit ladder from the risk policy.
    pub fn enter(
        &mut self,
        mint: &str,
        entry_price: f64,
        fill_pct: f64,
        now: DateTime<Utc>,
    ) -> EnterOutcome {
        let Some(position) = self.positions.get_mut(mint) else {
            warn!("Cannot enter untracked token {}", mint);
            return EnterOutcome::Untracked;
        };

        if position.status.is_terminal() {
            warn!("Cannot enter {}: position is {}", position.symbol, position.status);
            return EnterOutcome::Untracked;
        }

        let first_fill = position.apply_entry_fill(entry_price, fill_pct, now);

        if !first_fill {
            info!(
                "Ladder fill for {}: {:.0}% total at {:.6}",
                position.symbol,
                position.entry_filled_pct * 100.0,
                entry_price
            );
            return EnterOutcome::Filled {
                total_filled_pct: position.entry_filled_pct,
            };
        }

        let stop_loss = self.risk.stop_loss_price(
            entry_price,
            position.confidence,
            position.risk_score,
            position.token_category,
            position.dev_risk,
            position.volatility_multiplier,
        );
        position.stop_loss = Some(stop_loss);
        position.tp_stages = self.risk.take_profit_stages(entry_price, position.position_size_usd);

        let summary = self.risk.risk_summary(
            entry_price,
            stop_loss,
            &position.tp_stages,
            position.risk_score,
            position.dev_risk,
        );
        position.notes.push(format!(
            "entered: risk {:.1}%, reward {:.1}%, R:R {:.2}, {}",
            summary.risk_pct * 100.0,
            summary.expected_reward_pct * 100.0,
            summary.risk_reward_ratio,
            summary.quality
        ));

        info!(
            "ENTERED {} at {:.6} size=${:.2} ({:.0}% filled) SL={:.6} stages={}",
            position.symbol,
            entry_price,
            position.position_size_usd * position.entry_filled_pct,
            position.entry_filled_pct * 100.0,
            stop_loss,
            position.tp_stages.len()
        );

        EnterOutcome::Opened {
            symbol: position.symbol.clone(),
            entry_price,
            position_size_usd: position.position_size_usd,
            entry_strategy: position.entry_strategy,
            stop_loss,
        }
    }

    /// Apply a price update to an open position.
    ///
    /// Processing order is fixed: price extremes, unrealized PnL, time
    /// decay, trailing activation, trailing hit, stop-loss hit, take-profit
    /// stages. The first terminal condition halts the pass. A gap through
    /// several take-profit thresholds fires all of them on one tick.
    pub fn update(&mut self, mint: &str, price: f64, now: DateTime<Utc>) -> UpdateReport {
        let mut report = UpdateReport::default();

        let Some(position) = self.positions.get_mut(mint) else {
            debug!("Price update for untracked token {}", mint);
            return report;
        };

        if position.status != PositionStatus::Open {
            return report;
        }

        position.observe_price(price);
        position.recompute_unrealized();

        let entry_price = position
            .entry_price
            .expect("open position always has an entry price");

        // Time decay only ever tightens
        if let (Some(stop_loss), Some(entry_time)) = (position.stop_loss, position.entry_time) {
            let decayed = self
                .risk
                .decayed_stop_loss(stop_loss, entry_price, entry_time, now);
            if decayed > stop_loss {
                info!(
                    "Time decay tightened SL for {}: {:.6} -> {:.6}",
                    position.symbol, stop_loss, decayed
                );
                position.stop_loss = Some(decayed);
            }
        }

        // One-way trailing latch
        if !position.trailing_active && self.risk.should_activate_trailing(entry_price, price) {
            position.trailing_active = true;
            position.peak_price = Some(price);
            info!("Trailing stop activated for {} at {:.6}", position.symbol, price);
        }

        let mut terminal: Option<ExitReason> = None;

        // Trailing stop is checked before the regular stop-loss
        if position.trailing_active {
            if let Some(peak) = position.peak_price {
                let trailing_price = self.risk.trailing_stop_price(peak, position.confidence);
                position.trailing_price = Some(trailing_price);
                if price <= trailing_price {
                    warn!(
                        "TRAILING STOP HIT {}: peak {:.6}, exit {:.6}",
                        position.symbol, peak, price
                    );
                    terminal = Some(ExitReason::TrailingStop);
                }
            }
        }

        if terminal.is_none() {
            if let Some(stop_loss) = position.stop_loss {
                if price <= stop_loss {
                    warn!(
                        "STOP LOSS HIT {}: entry {:.6}, exit {:.6}",
                        position.symbol, entry_price, price
                    );
                    terminal = Some(ExitReason::StopLoss);
                }
            }
        }

        if terminal.is_none() {
            for i in 0..position.tp_stages.len() {
                if !position.tp_stages[i].should_fire(price) {
                    continue;
                }
                position.tp_stages[i].executed = true;
                let label = position.tp_stages[i].label.clone();
                let sell_pct = position.tp_stages[i].sell_pct;

                let pnl = position.record_partial_exit(&label, price, sell_pct, now);
                info!(
                    "{} HIT for {}: selling {:.0}% at {:.6}, pnl ${:.2}",
                    label,
                    position.symbol,
                    sell_pct * 100.0,
                    price,
                    pnl
                );

                report.partial_exits.push(
                    position
                        .partial_exits
                        .last()
                        .expect("partial exit just recorded")
                        .clone(),
                );
            }

            if !report.partial_exits.is_empty() {
                position.recompute_unrealized();
            }

            if position.all_stages_executed() {
                terminal = Some(ExitReason::AllTargetsHit);
            }
        }

        if let Some(reason) = terminal {
            let position = self
                .positions
                .remove(mint)
                .expect("position present before close");
            report.closed = Some(self.settle_close(position, price, reason, now));
        }

        report
    }

    /// Close a position explicitly. Untracked tokens are a logged no-op.
    pub fn close(
        &mut self,
        mint: &str,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Option<CloseReport> {
        let Some(position) = self.positions.remove(mint) else {
            debug!("Close requested for untracked token {}", mint);
            return None;
        };
        Some(self.settle_close(position, exit_price, reason, now))
    }

    /// Expire any watching positions whose entry window has elapsed
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<CloseReport> {
        let expired: Vec<String> = self
            .positions
            .values()
            .filter(|p| p.entry_window_expired(now))
            .map(|p| p.mint.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|mint| {
                let position = self.positions.remove(&mint)?;
                let last_price = position.current_price.unwrap_or(0.0);
                Some(self.settle_close(position, last_price, ExitReason::Expired, now))
            })
            .collect()
    }

    /// Aggregate performance; always reconciles with the closed records
    pub fn performance_summary(&self) -> PerformanceSummary {
        let win_rate = if self.total_trades > 0 {
            self.winning_trades as f64 / self.total_trades as f64
        } else {
            0.0
        };
        let avg_win = if self.winning_trades > 0 {
            self.win_sum / self.winning_trades as f64
        } else {
            0.0
        };
        let avg_loss = if self.losing_trades > 0 {
            self.loss_sum / self.losing_trades as f64
        } else {
            0.0
        };

        PerformanceSummary {
            initial_capital: self.initial_capital,
            current_capital: self.current_capital,
            total_pnl: self.total_pnl,
            total_return_pct: (self.current_capital / self.initial_capital - 1.0) * 100.0,
            total_trades: self.total_trades,
            winning_trades: self.winning_trades,
            losing_trades: self.losing_trades,
            win_rate,
            avg_win,
            avg_loss,
            active_positions: self.positions.len(),
        }
    }

    /// Settle a terminal transition: realize the remainder, move capital,
    /// bump the win/loss counters and append the journal record. Positions
    /// that never entered move no capital and count no trade.
    fn settle_close(
        &mut self,
        mut position: Position,
        exit_price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> CloseReport {
        position.finalize_close(exit_price, reason, now);
        let entered = position.entry_time.is_some();

        if entered {
            let pnl = position.realized_pnl;
            self.current_capital += pnl;
            self.total_pnl += pnl;
            self.total_trades += 1;

            if pnl > 0.0 {
                self.winning_trades += 1;
                self.win_sum += pnl;
            } else {
                self.losing_trades += 1;
                self.loss_sum += pnl.abs();
            }

            info!(
                "CLOSED {} [{}] entry {:.6} exit {:.6} pnl ${:.2} capital ${:.2}",
                position.symbol,
                reason,
                position.entry_price.unwrap_or(0.0),
                exit_price,
                pnl,
                self.current_capital
            );
        } else {
            info!("Removed {} [{}] with no fill, capital unchanged", position.symbol, reason);
        }

        let report = CloseReport {
            mint: position.mint.clone(),
            symbol: position.symbol.clone(),
            exit_price,
            realized_pnl: position.realized_pnl,
            reason,
            time: now,
        };

        self.closed.push(JournalRecord::from(&position));
        report
    }
}
