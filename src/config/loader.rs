//! Configuration Loader
//!
//! Loads and validates configuration from TOML files. Every section and
//! field has a serde default, so an empty file yields a usable
//! configuration; `validate()` rejects tables that would make the risk
//! math unsound (empty take-profit ladder, overselling stages, inverted
//! clamp bounds).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::signal::{Confidence, DevRisk, TokenCategory};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub risk: RiskSection,
    #[serde(default)]
    pub sizing: SizingSection,
    #[serde(default)]
    pub entry: EntrySection,
    #[serde(default)]
    pub journal: JournalSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Engine-level settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSection {
    /// Starting capital in quote currency (USD)
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
}

/// Adaptive risk management section
#[derive(Debug, Clone, Deserialize)]
pub struct RiskSection {
    /// Base stop-loss percentages chosen by risk-score bucket
    #[serde(default)]
    pub base_stop_loss: StopLossTable,

    /// Stop-loss width multipliers by confidence (HIGH tightens, LOW widens)
    #[serde(default = "default_sl_confidence_multipliers")]
    pub confidence_multipliers: ConfidenceTable,

    /// Stop-loss width multipliers by token category
    #[serde(default)]
    pub category_multipliers: CategoryTable,

    /// Stop-loss width multipliers by developer-risk tier (riskier dev = tighter)
    #[serde(default)]
    pub dev_risk_multipliers: DevRiskTable,

    /// Floor for the final stop-loss discount
    #[serde(default = "default_min_stop_loss_pct")]
    pub min_stop_loss_pct: f64,

    /// Ceiling for the final stop-loss discount
    #[serde(default = "default_max_stop_loss_pct")]
    pub max_stop_loss_pct: f64,

    /// Multi-stage take-profit ladder; the unsold remainder rides the
    /// trailing stop
    #[serde(default = "default_take_profit_stages")]
    pub take_profit_stages: Vec<TpStageSpec>,

    /// Trailing stop configuration
    #[serde(default)]
    pub trailing: TrailingSection,

    /// Time-based stop-loss tightening
    #[serde(default)]
    pub time_decay: TimeDecaySection,
}

/// Base stop-loss percentage per risk-score bucket
#[derive(Debug, Clone, Deserialize)]
pub struct StopLossTable {
    /// Applied when risk_score >= 7
    #[serde(default = "default_sl_high_risk")]
    pub high_risk: f64,
    /// Applied when risk_score >= 4
    #[serde(default = "default_sl_medium_risk")]
    pub medium_risk: f64,
    /// Applied otherwise
    #[serde(default = "default_sl_low_risk")]
    pub low_risk: f64,
}

/// A value per confidence tier
#[derive(Debug, Clone, Deserialize)]
pub struct ConfidenceTable {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl ConfidenceTable {
    /// Look up the value for a confidence tier
    pub fn get(&self, confidence: Confidence) -> f64 {
        match confidence {
            Confidence::High => self.high,
            Confidence::Medium => self.medium,
            Confidence::Low => self.low,
        }
    }
}

/// Stop-loss width multiplier per token category
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryTable {
    #[serde(default = "default_cat_meme")]
    pub meme: f64,
    #[serde(default = "default_cat_tech")]
    pub tech: f64,
    #[serde(default = "default_cat_viral")]
    pub viral: f64,
    #[serde(default = "default_cat_neutral")]
    pub gaming: f64,
    #[serde(default = "default_cat_tech")]
    pub defi: f64,
    #[serde(default = "default_cat_neutral")]
    pub unknown: f64,
}

impl CategoryTable {
    /// Look up the multiplier for a token category
    pub fn get(&self, category: TokenCategory) -> f64 {
        match category {
            TokenCategory::Meme => self.meme,
            TokenCategory::Tech => self.tech,
            TokenCategory::Viral => self.viral,
            TokenCategory::Gaming => self.gaming,
            TokenCategory::Defi => self.defi,
            TokenCategory::Unknown => self.unknown,
        }
    }
}

/// Stop-loss width multiplier per developer-risk tier
#[derive(Debug, Clone, Deserialize)]
pub struct DevRiskTable {
    #[serde(default = "default_dev_low")]
    pub low: f64,
    #[serde(default = "default_dev_medium")]
    pub medium: f64,
    #[serde(default = "default_dev_high")]
    pub high: f64,
}

impl DevRiskTable {
    /// Look up the multiplier for a dev-risk tier; unknown tier is neutral
    pub fn get(&self, dev_risk: Option<DevRisk>) -> f64 {
        match dev_risk {
            Some(DevRisk::Low) => self.low,
            Some(DevRisk::Medium) => self.medium,
            Some(DevRisk::High) => self.high,
            None => 1.0,
        }
    }
}

/// One take-profit stage: at +threshold, sell sell_pct of the original size
#[derive(Debug, Clone, Deserialize)]
pub struct TpStageSpec {
    /// Display label ("First Target")
    pub label: String,
    /// Profit threshold as a fraction (0.5 = +50%)
    pub threshold: f64,
    /// Fraction of the original position size to sell (0.3 = 30%)
    pub sell_pct: f64,
}

/// Trailing stop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrailingSection {
    /// Unrealized profit fraction at which the trailing stop latches on
    #[serde(default = "default_trailing_activation")]
    pub activation_profit: f64,

    /// Distance below the peak price per confidence tier
    #[serde(default = "default_trail_distance")]
    pub trail_distance: ConfidenceTable,
}

/// Time-based stop-loss tightening configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TimeDecaySection {
    /// Disable to leave the stop-loss untouched by holding time
    #[serde(default = "default_time_decay_enabled")]
    pub enabled: bool,

    /// Hours held before tightening begins
    #[serde(default = "default_hold_threshold_hours")]
    pub hold_threshold_hours: f64,

    /// Stop-loss distance multiplier per full day past the threshold
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
}

/// Position sizing section
#[derive(Debug, Clone, Deserialize)]
pub struct SizingSection {
    /// Maximum position size as a fraction of current capital
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,

    /// Size multipliers by confidence
    #[serde(default = "default_sizing_confidence_multipliers")]
    pub confidence_multipliers: ConfidenceTable,
}

/// Entry scheduling section
#[derive(Debug, Clone, Deserialize)]
pub struct EntrySection {
    /// Entry window for the immediate strategy (hours)
    #[serde(default = "default_immediate_max_wait_hours")]
    pub immediate_max_wait_hours: f64,

    /// Entry window for the wait-for-dip strategy (hours)
    #[serde(default = "default_dip_max_wait_hours")]
    pub dip_max_wait_hours: f64,

    /// Entry window for the ladder strategy (hours, first tranche)
    #[serde(default = "default_ladder_max_wait_hours")]
    pub ladder_max_wait_hours: f64,

    /// Retrace from the running high that triggers a dip entry (fraction)
    #[serde(default = "default_dip_trigger_pct")]
    pub dip_trigger_pct: f64,

    /// Fraction of the position filled by the first ladder tranche
    #[serde(default = "default_ladder_first_tranche_pct")]
    pub ladder_first_tranche_pct: f64,

    /// Volume increase multiple confirming later ladder tranches
    #[serde(default = "default_volume_confirmation_multiple")]
    pub volume_confirmation_multiple: f64,
}

/// Journal persistence section
#[derive(Debug, Clone, Deserialize)]
pub struct JournalSection {
    /// Path to the journal snapshot file (supports ~)
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
}

/// Logging section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_initial_capital() -> f64 {
    10_000.0
}

fn default_sl_high_risk() -> f64 {
    0.10
}
fn default_sl_medium_risk() -> f64 {
    0.12
}
fn default_sl_low_risk() -> f64 {
    0.15
}

fn default_sl_confidence_multipliers() -> ConfidenceTable {
    ConfidenceTable {
        high: 0.8,
        medium: 1.0,
        low: 1.3,
    }
}

fn default_cat_meme() -> f64 {
    1.3
}
fn default_cat_tech() -> f64 {
    0.9
}
fn default_cat_viral() -> f64 {
    1.2
}
fn default_cat_neutral() -> f64 {
    1.0
}

fn default_dev_low() -> f64 {
    1.0
}
fn default_dev_medium() -> f64 {
    0.85
}
fn default_dev_high() -> f64 {
    0.7
}

fn default_min_stop_loss_pct() -> f64 {
    0.05
}
fn default_max_stop_loss_pct() -> f64 {
    0.30
}

fn default_take_profit_stages() -> Vec<TpStageSpec> {
    vec![
        TpStageSpec {
            label: "First Target".to_string(),
            threshold: 0.50,
            sell_pct: 0.30,
        },
        TpStageSpec {
            label: "Second Target".to_string(),
            threshold: 1.00,
            sell_pct: 0.30,
        },
        TpStageSpec {
            label: "Moon Target".to_string(),
            threshold: 2.00,
            sell_pct: 0.20,
        },
    ]
}

fn default_trailing_activation() -> f64 {
    0.30
}

fn default_trail_distance() -> ConfidenceTable {
    ConfidenceTable {
        high: 0.15,
        medium: 0.20,
        low: 0.25,
    }
}

fn default_time_decay_enabled() -> bool {
    true
}
fn default_hold_threshold_hours() -> f64 {
    24.0
}
fn default_decay_rate() -> f64 {
    0.9
}

fn default_max_position_pct() -> f64 {
    0.10
}

fn default_sizing_confidence_multipliers() -> ConfidenceTable {
    ConfidenceTable {
        high: 1.0,
        medium: 0.6,
        low: 0.3,
    }
}

fn default_immediate_max_wait_hours() -> f64 {
    0.5
}
fn default_dip_max_wait_hours() -> f64 {
    6.0
}
fn default_ladder_max_wait_hours() -> f64 {
    2.0
}
fn default_dip_trigger_pct() -> f64 {
    0.05
}
fn default_ladder_first_tranche_pct() -> f64 {
    0.5
}
fn default_volume_confirmation_multiple() -> f64 {
    1.5
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("data/journal.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
        }
    }
}

impl Default for StopLossTable {
    fn default() -> Self {
        Self {
            high_risk: default_sl_high_risk(),
            medium_risk: default_sl_medium_risk(),
            low_risk: default_sl_low_risk(),
        }
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            meme: default_cat_meme(),
            tech: default_cat_tech(),
            viral: default_cat_viral(),
            gaming: default_cat_neutral(),
            defi: default_cat_tech(),
            unknown: default_cat_neutral(),
        }
    }
}

impl Default for DevRiskTable {
    fn default() -> Self {
        Self {
            low: default_dev_low(),
            medium: default_dev_medium(),
            high: default_dev_high(),
        }
    }
}

impl Default for RiskSection {
    fn default() -> Self {
        Self {
            base_stop_loss: StopLossTable::default(),
            confidence_multipliers: default_sl_confidence_multipliers(),
            category_multipliers: CategoryTable::default(),
            dev_risk_multipliers: DevRiskTable::default(),
            min_stop_loss_pct: default_min_stop_loss_pct(),
            max_stop_loss_pct: default_max_stop_loss_pct(),
            take_profit_stages: default_take_profit_stages(),
            trailing: TrailingSection::default(),
            time_decay: TimeDecaySection::default(),
        }
    }
}

impl Default for TrailingSection {
    fn default() -> Self {
        Self {
            activation_profit: default_trailing_activation(),
            trail_distance: default_trail_distance(),
        }
    }
}

impl Default for TimeDecaySection {
    fn default() -> Self {
        Self {
            enabled: default_time_decay_enabled(),
            hold_threshold_hours: default_hold_threshold_hours(),
            decay_rate: default_decay_rate(),
        }
    }
}

impl Default for SizingSection {
    fn default() -> Self {
        Self {
            max_position_pct: default_max_position_pct(),
            confidence_multipliers: default_sizing_confidence_multipliers(),
        }
    }
}

impl Default for EntrySection {
    fn default() -> Self {
        Self {
            immediate_max_wait_hours: default_immediate_max_wait_hours(),
            dip_max_wait_hours: default_dip_max_wait_hours(),
            ladder_max_wait_hours: default_ladder_max_wait_hours(),
            dip_trigger_pct: default_dip_trigger_pct(),
            ladder_first_tranche_pct: default_ladder_first_tranche_pct(),
            volume_confirmation_multiple: default_volume_confirmation_multiple(),
        }
    }
}

impl Default for JournalSection {
    fn default() -> Self {
        Self {
            path: default_journal_path(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.initial_capital <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "engine.initial_capital must be > 0, got {}",
                self.engine.initial_capital
            )));
        }

        let sl = &self.risk.base_stop_loss;
        for (name, value) in [
            ("high_risk", sl.high_risk),
            ("medium_risk", sl.medium_risk),
            ("low_risk", sl.low_risk),
        ] {
            if value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "risk.base_stop_loss.{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.risk.min_stop_loss_pct <= 0.0
            || self.risk.max_stop_loss_pct >= 1.0
            || self.risk.min_stop_loss_pct >= self.risk.max_stop_loss_pct
        {
            return Err(ConfigError::ValidationError(format!(
                "stop-loss clamp bounds must satisfy 0 < min < max < 1, got [{}, {}]",
                self.risk.min_stop_loss_pct, self.risk.max_stop_loss_pct
            )));
        }

        if self.risk.take_profit_stages.is_empty() {
            return Err(ConfigError::ValidationError(
                "risk.take_profit_stages must not be empty".to_string(),
            ));
        }

        let mut prev_threshold = 0.0;
        let mut total_sell_pct = 0.0;
        for (i, stage) in self.risk.take_profit_stages.iter().enumerate() {
            if stage.threshold <= prev_threshold {
                return Err(ConfigError::ValidationError(format!(
                    "risk.take_profit_stages[{}].threshold must exceed the previous stage",
                    i
                )));
            }
            if stage.sell_pct <= 0.0 || stage.sell_pct > 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "risk.take_profit_stages[{}].sell_pct must be between 0 and 1, got {}",
                    i, stage.sell_pct
                )));
            }
            prev_threshold = stage.threshold;
            total_sell_pct += stage.sell_pct;
        }
        if total_sell_pct > 1.0 + 1e-9 {
            return Err(ConfigError::ValidationError(format!(
                "risk.take_profit_stages sell_pct values sum to {:.2}, may not exceed 1.0",
                total_sell_pct
            )));
        }

        if self.risk.trailing.activation_profit <= 0.0 {
            return Err(ConfigError::ValidationError(
                "risk.trailing.activation_profit must be > 0".to_string(),
            ));
        }
        let trail = &self.risk.trailing.trail_distance;
        for (name, value) in [
            ("high", trail.high),
            ("medium", trail.medium),
            ("low", trail.low),
        ] {
            if value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::ValidationError(format!(
                    "risk.trailing.trail_distance.{} must be between 0 and 1, got {}",
                    name, value
                )));
            }
        }

        if self.risk.time_decay.hold_threshold_hours <= 0.0 {
            return Err(ConfigError::ValidationError(
                "risk.time_decay.hold_threshold_hours must be > 0".to_string(),
            ));
        }
        if self.risk.time_decay.decay_rate <= 0.0 || self.risk.time_decay.decay_rate > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "risk.time_decay.decay_rate must be in (0, 1], got {}",
                self.risk.time_decay.decay_rate
            )));
        }

        if self.sizing.max_position_pct <= 0.0 || self.sizing.max_position_pct > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "sizing.max_position_pct must be in (0, 1], got {}",
                self.sizing.max_position_pct
            )));
        }

        for (name, value) in [
            ("immediate_max_wait_hours", self.entry.immediate_max_wait_hours),
            ("dip_max_wait_hours", self.entry.dip_max_wait_hours),
            ("ladder_max_wait_hours", self.entry.ladder_max_wait_hours),
        ] {
            if value <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "entry.{} must be > 0, got {}",
                    name, value
                )));
            }
        }

        if self.entry.dip_trigger_pct <= 0.0 || self.entry.dip_trigger_pct >= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "entry.dip_trigger_pct must be between 0 and 1, got {}",
                self.entry.dip_trigger_pct
            )));
        }
        if self.entry.ladder_first_tranche_pct <= 0.0 || self.entry.ladder_first_tranche_pct > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "entry.ladder_first_tranche_pct must be in (0, 1], got {}",
                self.entry.ladder_first_tranche_pct
            )));
        }
        if self.entry.volume_confirmation_multiple <= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "entry.volume_confirmation_multiple must be > 1, got {}",
                self.entry.volume_confirmation_multiple
            )));
        }

        Ok(())
    }
}
