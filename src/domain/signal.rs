//! Inbound Signal Types
//!
//! Typed representation of what the upstream analysis pipeline hands the
//! trading core: a buy/hold/avoid decision with its risk inputs, the raw
//! token features used for entry classification, and price ticks from the
//! external price poller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trade recommendation from the analysis pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Avoid,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Recommendation::Buy => write!(f, "BUY"),
            Recommendation::Hold => write!(f, "HOLD"),
            Recommendation::Avoid => write!(f, "AVOID"),
        }
    }
}

/// Confidence tier attached to a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "HIGH"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::Low => write!(f, "LOW"),
        }
    }
}

/// Token category supplied by the upstream classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenCategory {
    Meme,
    Tech,
    Viral,
    Gaming,
    Defi,
    #[default]
    Unknown,
}

impl std::fmt::Display for TokenCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TokenCategory::Meme => "meme",
            TokenCategory::Tech => "tech",
            TokenCategory::Viral => "viral",
            TokenCategory::Gaming => "gaming",
            TokenCategory::Defi => "defi",
            TokenCategory::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Developer-risk tier for the token issuer, supplied by an external
/// collaborator and consumed as an opaque input here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevRisk {
    /// Tier 0
    Low,
    /// Tier 1
    Medium,
    /// Tier 2
    High,
}

impl DevRisk {
    /// Map the upstream numeric tier (0/1/2) to a typed value
    pub fn from_tier(tier: u8) -> Option<Self> {
        match tier {
            0 => Some(DevRisk::Low),
            1 => Some(DevRisk::Medium),
            2 => Some(DevRisk::High),
            _ => None,
        }
    }
}

/// Buy signal from the upstream analysis pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Token mint address
    pub mint: String,
    /// Token symbol
    pub symbol: String,
    /// BUY / HOLD / AVOID decision
    pub recommendation: Recommendation,
    /// Confidence tier for the decision
    pub confidence: Confidence,
    /// Overall risk score, 0 (safest) to 10
    pub risk_score: u8,
    /// Predicted return from the upstream model (fraction, 0.5 = +50%)
    #[serde(default)]
    pub predicted_return: f64,
    /// Token category
    #[serde(default)]
    pub token_category: TokenCategory,
    /// Developer-risk tier if the upstream pipeline produced one
    #[serde(default)]
    pub dev_risk: Option<DevRisk>,
    /// Volatility adjustment for stop-loss sizing (1.0 = neutral)
    #[serde(default = "default_volatility_multiplier")]
    pub volatility_multiplier: f64,
}

fn default_volatility_multiplier() -> f64 {
    1.0
}

/// On-chain features used to classify the token for entry strategy selection.
/// Missing values default to zero, matching an upstream pipeline that only
/// fills in what it observed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenFeatures {
    /// Scanner mention velocity (scans per hour)
    #[serde(default)]
    pub scan_velocity: f64,
    /// Composite social momentum score
    #[serde(default)]
    pub social_momentum: f64,
    /// Hours the token spent on the bonding curve before migration
    #[serde(default)]
    pub time_on_curve_hours: f64,
    /// Unique wallets holding before migration
    #[serde(default)]
    pub unique_wallets: u32,
    /// Initial pool liquidity in SOL
    #[serde(default)]
    pub initial_liquidity_sol: f64,
}

/// Social-graph signals used to classify the token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialSignals {
    /// Follower count of the project account
    #[serde(default)]
    pub followers: u64,
    /// Average engagement rate across recent posts
    #[serde(default)]
    pub avg_engagement: f64,
}

/// Price observation from the external polling loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Token mint address
    pub mint: String,
    /// Observed price in quote currency
    pub price: f64,
    /// Observation time
    pub timestamp: DateTime<Utc>,
}
