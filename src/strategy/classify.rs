//! Token Classification
//!
//! Threshold rules separating viral meme launches from slower tech tokens.
//! Classification only drives entry-strategy selection; it deliberately
//! errs toward `Unknown` when the signals disagree.

use tracing::debug;

use crate::domain::position::TokenType;
use crate::domain::signal::{SocialSignals, TokenFeatures};

/// Scan velocity that marks a token as viral on its own
const VIRAL_SCAN_VELOCITY: f64 = 100.0;
/// Follower count indicating an existing audience
const VIRAL_FOLLOWERS: u64 = 50_000;
/// Engagement rate indicating viral traction
const VIRAL_ENGAGEMENT: f64 = 500.0;
/// Fast-growth rule: elevated velocity while still young on the curve
const FAST_GROWTH_VELOCITY: f64 = 50.0;
const FAST_GROWTH_MAX_CURVE_HOURS: f64 = 3.0;

/// Tech profile: slow curve, modest hype, a real holder base
const TECH_MIN_CURVE_HOURS: f64 = 12.0;
const TECH_MAX_SCAN_VELOCITY: f64 = 50.0;
const TECH_MIN_UNIQUE_WALLETS: u32 = 100;

/// Classify a token for entry-strategy selection
pub fn classify_token(features: &TokenFeatures, social: &SocialSignals) -> TokenType {
    let is_viral = features.scan_velocity > VIRAL_SCAN_VELOCITY
        || social.followers > VIRAL_FOLLOWERS
        || social.avg_engagement > VIRAL_ENGAGEMENT
        || (features.scan_velocity > FAST_GROWTH_VELOCITY
            && features.time_on_curve_hours < FAST_GROWTH_MAX_CURVE_HOURS);

    if is_viral {
        debug!(
            "Classified viral_meme: velocity={:.0} followers={} engagement={:.0}",
            features.scan_velocity, social.followers, social.avg_engagement
        );
        return TokenType::ViralMeme;
    }

    let is_tech = features.time_on_curve_hours > TECH_MIN_CURVE_HOURS
        && features.scan_velocity < TECH_MAX_SCAN_VELOCITY
        && features.unique_wallets > TECH_MIN_UNIQUE_WALLETS;

    if is_tech {
        debug!(
            "Classified tech: curve_hours={:.1} wallets={}",
            features.time_on_curve_hours, features.unique_wallets
        );
        return TokenType::Tech;
    }

    TokenType::Unknown
}
