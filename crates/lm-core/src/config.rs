//! Tunable thresholds. Every field defaults to the matching constant, so a
//! partial TOML/JSON document only overrides what it names.

use serde::{Deserialize, Serialize};

use crate::constants::*;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub decay: DecayConfig,
    pub lifecycle: LifecycleConfig,
    pub sequence: SequenceConfig,
    pub creation: CreationConfig,
    pub tokenizer: TokenizerConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Active-regime decay per second.
    pub active_rate: f64,
    /// Dormant rate = active_rate / dormant_divisor.
    pub dormant_divisor: f64,
    pub invalidation_multiplier: f64,
    pub invalidation_window_secs: f64,
    pub clean_break_half_widths: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            active_rate: ACTIVE_DECAY_RATE,
            dormant_divisor: DORMANT_RATE_DIVISOR,
            invalidation_multiplier: INVALIDATION_MULTIPLIER,
            invalidation_window_secs: INVALIDATION_WINDOW_SECS,
            clean_break_half_widths: CLEAN_BREAK_HALF_WIDTHS,
        }
    }
}

impl DecayConfig {
    pub fn dormant_rate(&self) -> f64 {
        if self.dormant_divisor <= 0.0 {
            return self.active_rate;
        }
        self.active_rate / self.dormant_divisor
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub archive_threshold: f64,
    pub dormancy_threshold: f64,
    pub revisit_boost: f64,
    pub touch_confidence_boost: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            archive_threshold: ARCHIVE_THRESHOLD,
            dormancy_threshold: DORMANCY_THRESHOLD,
            revisit_boost: REVISIT_BOOST,
            touch_confidence_boost: TOUCH_CONFIDENCE_BOOST,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub max_len: usize,
    pub window_secs: f64,
    pub interaction_history_len: usize,
    pub strength_history_len: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_len: SEQUENCE_MAX_LEN,
            window_secs: SEQUENCE_WINDOW_SECS,
            interaction_history_len: INTERACTION_HISTORY_LEN,
            strength_history_len: STRENGTH_HISTORY_LEN,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreationConfig {
    pub orderbook_persist_min_secs: f64,
    pub executed_liquidity_min_usd: f64,
    pub liquidation_proximity_bps: f64,
    pub rejection_min_visits: u32,
    pub default_half_width_bps: f64,
}

impl Default for CreationConfig {
    fn default() -> Self {
        Self {
            orderbook_persist_min_secs: ORDERBOOK_PERSIST_MIN_SECS,
            executed_liquidity_min_usd: EXECUTED_LIQUIDITY_MIN_USD,
            liquidation_proximity_bps: LIQUIDATION_PROXIMITY_BPS,
            rejection_min_visits: REJECTION_MIN_VISITS,
            default_half_width_bps: DEFAULT_HALF_WIDTH_BPS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub persist_secs: f64,
    pub high_volume_usd: f64,
    pub cascade_min_size: u32,
    pub dwell_secs: f64,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            persist_secs: ORDERBOOK_PERSIST_MIN_SECS,
            high_volume_usd: HIGH_VOLUME_USD,
            cascade_min_size: CASCADE_MIN_SIZE,
            dwell_secs: DWELL_MIN_SECS,
        }
    }
}
