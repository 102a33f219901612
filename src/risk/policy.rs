//! Adaptive Risk Policy
//!
//! Pure price-level computations for the position lifecycle: the adaptive
//! stop-loss, the multi-stage take-profit ladder, trailing-stop activation
//! and placement, and time-based stop tightening. Every function is
//! deterministic and side-effect free; the ledger decides when to apply
//! the results.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::loader::RiskSection;
use crate::domain::position::TpStage;
use crate::domain::signal::{Confidence, DevRisk, TokenCategory};

/// Overall trade quality grade derived from risk/reward and risk inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for TradeQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TradeQuality::Excellent => "EXCELLENT",
            TradeQuality::Good => "GOOD",
            TradeQuality::Fair => "FAIR",
            TradeQuality::Poor => "POOR",
        };
        write!(f, "{}", s)
    }
}

/// Risk/reward summary for an entry, used for logging and position notes
#[derive(Debug, Clone)]
pub struct RiskSummary {
    /// Stop-loss distance from entry (fraction)
    pub risk_pct: f64,
    /// Reward across the ladder, weighted by stage sell fractions
    pub expected_reward_pct: f64,
    /// Reward over risk
    pub risk_reward_ratio: f64,
    /// Quality grade
    pub quality: TradeQuality,
}

/// Adaptive stop-loss and take-profit policy
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    config: RiskSection,
}

impl RiskPolicy {
    /// Create a policy from the `[risk]` configuration section
    pub fn new(config: RiskSection) -> Self {
        Self { config }
    }

    /// The clamped stop-loss discount for the given risk inputs.
    ///
    /// Base percentage comes from the risk-score bucket, then confidence,
    /// category, dev-risk and volatility multipliers compose on top. The
    /// result is clamped so the stop is never tight enough to be whipsawed
    /// by noise nor loose enough to be pointless.
    pub fn stop_loss_pct(
        &self,
        confidence: Confidence,
        risk_score: u8,
        category: TokenCategory,
        dev_risk: Option<DevRisk>,
        volatility_multiplier: f64,
    ) -> f64 {
        let base = if risk_score >= 7 {
            self.config.base_stop_loss.high_risk
        } else if risk_score >= 4 {
            self.config.base_stop_loss.medium_risk
        } else {
            self.config.base_stop_loss.low_risk
        };

        let conf_mult = self.config.confidence_multipliers.get(confidence);
        let cat_mult = self.config.category_multipliers.get(category);
        let dev_mult = self.config.dev_risk_multipliers.get(dev_risk);

        let pct = base * conf_mult * cat_mult * dev_mult * volatility_multiplier;
        pct.clamp(self.config.min_stop_loss_pct, self.config.max_stop_loss_pct)
    }

    /// Adaptive stop-loss price for an entry
    pub fn stop_loss_price(
        &self,
        entry_price: f64,
        confidence: Confidence,
        risk_score: u8,
        category: TokenCategory,
        dev_risk: Option<DevRisk>,
        volatility_multiplier: f64,
    ) -> f64 {
        let pct = self.stop_loss_pct(confidence, risk_score, category, dev_risk, volatility_multiplier);
        let price = entry_price * (1.0 - pct);

        debug!(
            "Stop-loss {:.6} ({:.1}% below entry {:.6})",
            price,
            pct * 100.0,
            entry_price
        );
        price
    }

    /// Build the take-profit ladder for an entry. Stage sell fractions are
    /// taken against the original position size; whatever they leave unsold
    /// rides the trailing stop.
    pub fn take_profit_stages(&self, entry_price: f64, position_size_usd: f64) -> Vec<TpStage> {
        let stages: Vec<TpStage> = self
            .config
            .take_profit_stages
            .iter()
            .map(|spec| TpStage {
                label: spec.label.clone(),
                threshold_pct: spec.threshold,
                sell_pct: spec.sell_pct,
                price: entry_price * (1.0 + spec.threshold),
                executed: false,
            })
            .collect();

        let staged: f64 = stages.iter().map(|s| s.sell_pct).sum();
        debug!(
            "Take-profit ladder: {} stages covering {:.0}% of ${:.2}, {:.0}% on trailing stop",
            stages.len(),
            staged * 100.0,
            position_size_usd,
            (1.0 - staged) * 100.0
        );

        stages
    }

    /// Fraction of the position the ladder leaves for the trailing stop
    pub fn trailing_reserve_pct(&self) -> f64 {
        let staged: f64 = self.config.take_profit_stages.iter().map(|s| s.sell_pct).sum();
        (1.0 - staged).max(0.0)
    }

    /// Whether the trailing stop should latch on at the current profit.
    /// Activation is a one-way latch; callers never unset it.
    pub fn should_activate_trailing(&self, entry_price: f64, current_price: f64) -> bool {
        if entry_price <= 0.0 {
            return false;
        }
        let profit_pct = (current_price - entry_price) / entry_price;
        profit_pct >= self.config.trailing.activation_profit
    }

    /// Trailing stop price below the peak; the trail narrows as confidence
    /// increases.
    pub fn trailing_stop_price(&self, peak_price: f64, confidence: Confidence) -> f64 {
        let trail = self.config.trailing.trail_distance.get(confidence);
        peak_price * (1.0 - trail)
    }

    /// Time-decayed stop-loss: once the position has been held past the
    /// configured threshold, shrink the stop distance by the decay rate per
    /// additional full day. The stop only ever moves toward the entry.
    pub fn decayed_stop_loss(
        &self,
        current_sl: f64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> f64 {
        if !self.config.time_decay.enabled || entry_price <= 0.0 {
            return current_sl;
        }

        let hours_held = (now - entry_time).num_milliseconds() as f64 / 3_600_000.0;
        let threshold = self.config.time_decay.hold_threshold_hours;
        if hours_held < threshold {
            return current_sl;
        }

        let decay_periods = ((hours_held - threshold) / 24.0).floor() as i32;
        if decay_periods == 0 {
            return current_sl;
        }

        let decay_multiplier = self.config.time_decay.decay_rate.powi(decay_periods);
        let current_pct = 1.0 - (current_sl / entry_price);
        let new_pct = current_pct * decay_multiplier;
        let new_sl = entry_price * (1.0 - new_pct);

        new_sl.max(current_sl)
    }

    /// Risk/reward summary for an entry at the given stop and ladder
    pub fn risk_summary(
        &self,
        entry_price: f64,
        stop_loss: f64,
        stages: &[TpStage],
        risk_score: u8,
        dev_risk: Option<DevRisk>,
    ) -> RiskSummary {
        let risk_pct = if entry_price > 0.0 {
            (entry_price - stop_loss) / entry_price
        } else {
            0.0
        };

        let expected_reward_pct: f64 = stages
            .iter()
            .map(|s| {
                let stage_return = (s.price - entry_price) / entry_price;
                stage_return * s.sell_pct
            })
            .sum();

        let risk_reward_ratio = if risk_pct > 0.0 {
            expected_reward_pct / risk_pct
        } else {
            0.0
        };

        let mut quality = if risk_reward_ratio >= 3.0 {
            TradeQuality::Excellent
        } else if risk_reward_ratio >= 2.0 {
            TradeQuality::Good
        } else if risk_reward_ratio >= 1.5 {
            TradeQuality::Fair
        } else {
            TradeQuality::Poor
        };

        // High token or dev risk overrides the ratio
        if risk_score >= 7 || dev_risk == Some(DevRisk::High) {
            quality = TradeQuality::Poor;
        }

        RiskSummary {
            risk_pct,
            expected_reward_pct,
            risk_reward_ratio,
            quality,
        }
    }
}
