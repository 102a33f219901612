//! Entry Scheduling
//!
//! Decides how a watched position gets filled: strategy selection from the
//! token classification, and the per-tick entry check (immediate fill, dip
//! retrace, or laddered tranches on volume confirmation). An elapsed entry
//! window always wins over an entry signal.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::loader::EntrySection;
use crate::domain::position::{EntryStrategy, Position, PositionStatus, TokenType};
use crate::domain::signal::{Confidence, TokenFeatures};

/// Liquidity above which a high-confidence viral launch is bought outright
const VIRAL_IMMEDIATE_MIN_LIQUIDITY_SOL: f64 = 20.0;
/// Liquidity below which a tech token is expected to dump first
const TECH_DIP_MAX_LIQUIDITY_SOL: f64 = 10.0;

/// Outcome of an entry check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntryCheck {
    /// Fill this fraction of the position now
    Enter { fill_pct: f64 },
    /// Keep waiting
    Hold,
    /// Entry window elapsed with no fill
    Expired,
}

/// Entry strategy selection and per-tick entry checks
#[derive(Debug, Clone)]
pub struct EntryScheduler {
    config: EntrySection,
}

impl EntryScheduler {
    /// Create a scheduler from the `[entry]` configuration section
    pub fn new(config: EntrySection) -> Self {
        Self { config }
    }

    /// Pick the entry strategy for a classified token.
    ///
    /// Viral launches are bought immediately when confidence and liquidity
    /// support it, otherwise laddered. Tech tokens tend to dump after
    /// migration, so thin pools wait for the dip. Anything unclear ladders.
    pub fn select_strategy(
        &self,
        token_type: TokenType,
        confidence: Confidence,
        features: &TokenFeatures,
    ) -> EntryStrategy {
        match token_type {
            TokenType::ViralMeme => {
                if confidence == Confidence::High
                    && features.initial_liquidity_sol > VIRAL_IMMEDIATE_MIN_LIQUIDITY_SOL
                {
                    EntryStrategy::Immediate
                } else {
                    EntryStrategy::Ladder
                }
            }
            TokenType::Tech => {
                if features.initial_liquidity_sol < TECH_DIP_MAX_LIQUIDITY_SOL {
                    EntryStrategy::WaitForDip
                } else {
                    EntryStrategy::Ladder
                }
            }
            TokenType::Unknown => EntryStrategy::Ladder,
        }
    }

    /// Entry window length for a strategy
    pub fn max_wait_hours(&self, strategy: EntryStrategy) -> f64 {
        match strategy {
            EntryStrategy::Immediate => self.config.immediate_max_wait_hours,
            EntryStrategy::WaitForDip => self.config.dip_max_wait_hours,
            EntryStrategy::Ladder => self.config.ladder_max_wait_hours,
        }
    }

    /// Check whether a position should fill now. Watching positions run
    /// their full strategy; a partially filled ladder keeps checking for
    /// its remaining tranches after it opens.
    ///
    /// Mutates the position's running price extremes (the dip check needs
    /// the high-water mark since watch start) but never its status; the
    /// caller applies the resulting transition.
    pub fn check_entry(
        &self,
        position: &mut Position,
        current_price: f64,
        volume_increase: Option<f64>,
        now: DateTime<Utc>,
    ) -> EntryCheck {
        let continuing_ladder = position.status == PositionStatus::Open
            && position.entry_strategy == EntryStrategy::Ladder
            && position.entry_filled_pct < 1.0;

        if position.status != PositionStatus::Watching && !continuing_ladder {
            return EntryCheck::Hold;
        }

        if position.entry_window_expired(now) {
            info!(
                "Entry window expired for {} after {:.1}h",
                position.symbol, position.max_entry_wait_hours
            );
            return EntryCheck::Expired;
        }

        match position.entry_strategy {
            EntryStrategy::Immediate => EntryCheck::Enter { fill_pct: 1.0 },

            EntryStrategy::WaitForDip => {
                let previous_high = position.highest_price;
                position.observe_price(current_price);

                let Some(high) = previous_high else {
                    // First observation seeds the high-water mark
                    return EntryCheck::Hold;
                };

                let high = high.max(current_price);
                let dip_pct = (high - current_price) / high;
                if dip_pct >= self.config.dip_trigger_pct {
                    info!(
                        "Dip entry for {}: {:.1}% retrace from {:.6}",
                        position.symbol,
                        dip_pct * 100.0,
                        high
                    );
                    EntryCheck::Enter { fill_pct: 1.0 }
                } else {
                    debug!(
                        "Waiting on dip for {}: {:.1}% of {:.1}% retrace",
                        position.symbol,
                        dip_pct * 100.0,
                        self.config.dip_trigger_pct * 100.0
                    );
                    EntryCheck::Hold
                }
            }

            EntryStrategy::Ladder => {
                if position.entry_filled_pct == 0.0 {
                    return EntryCheck::Enter {
                        fill_pct: self.config.ladder_first_tranche_pct,
                    };
                }

                if position.entry_filled_pct < 1.0 {
                    if let Some(volume) = volume_increase {
                        if volume >= self.config.volume_confirmation_multiple {
                            info!(
                                "Volume confirmation for {}: {:.2}x",
                                position.symbol, volume
                            );
                            return EntryCheck::Enter {
                                fill_pct: 1.0 - position.entry_filled_pct,
                            };
                        }
                    }
                }

                EntryCheck::Hold
            }
        }
    }
}
