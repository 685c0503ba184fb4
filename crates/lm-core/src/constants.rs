// --- Decay ---

/// Active-regime strength decay per second.
pub const ACTIVE_DECAY_RATE: f64 = 0.0001;

/// Dormant rate = active rate / this divisor.
pub const DORMANT_RATE_DIVISOR: f64 = 10.0;

/// Invalidation multiplies the current regime rate by this factor.
pub const INVALIDATION_MULTIPLIER: f64 = 10.0;

/// Seconds a clean break or a no-reaction dwell must persist before it invalidates.
pub const INVALIDATION_WINDOW_SECS: f64 = 300.0;

/// A clean break requires price farther than this many half-widths from center.
pub const CLEAN_BREAK_HALF_WIDTHS: f64 = 2.0;

// --- Lifecycle ---

/// Below this strength a node is archived and frozen.
pub const ARCHIVE_THRESHOLD: f64 = 0.01;

/// Active nodes whose strength falls below this become dormant.
pub const DORMANCY_THRESHOLD: f64 = 0.15;

pub const FORMING_MAX_AGE_SECS: f64 = 60.0;
pub const FORMING_MAX_STRENGTH: f64 = 0.3;
pub const ACTIVE_RECENCY_SECS: f64 = 600.0;
pub const ACTIVE_MIN_STRENGTH: f64 = 0.4;
pub const ESTABLISHED_MIN_STRENGTH: f64 = 0.5;
pub const ESTABLISHED_MIN_INTERACTIONS: u64 = 2;
pub const DORMANT_RECENCY_SECS: f64 = 3600.0;
pub const DORMANT_MIN_STRENGTH: f64 = 0.1;

// --- Accumulation & revival ---

/// Additive strength boost for every interaction after the first.
pub const REVISIT_BOOST: f64 = 0.1;

/// Additive confidence boost per price touch.
pub const TOUCH_CONFIDENCE_BOOST: f64 = 0.05;

pub const REVIVAL_INTERACTION_WEIGHT: f64 = 0.02;
pub const REVIVAL_HISTORY_CAP: f64 = 0.5;
pub const REVIVAL_VOLUME_SCALE: f64 = 100_000.0;
pub const REVIVAL_VOLUME_CAP: f64 = 0.3;

// --- Creation ---

pub const ORDERBOOK_PERSIST_MIN_SECS: f64 = 10.0;
pub const EXECUTED_LIQUIDITY_MIN_USD: f64 = 1_000.0;
pub const LIQUIDATION_PROXIMITY_BPS: f64 = 5.0;
pub const REJECTION_MIN_VISITS: u32 = 3;

/// Half-width of a newly created band, in basis points of its center price.
pub const DEFAULT_HALF_WIDTH_BPS: f64 = 5.0;

/// Confidence of nodes created by anything other than price rejection.
pub const BASE_CONFIDENCE: f64 = 0.5;

// --- Tokenizer ---

pub const HIGH_VOLUME_USD: f64 = 10_000.0;
pub const CASCADE_MIN_SIZE: u32 = 3;
pub const DWELL_MIN_SECS: f64 = 30.0;

// --- Bounded per-node histories ---

pub const SEQUENCE_MAX_LEN: usize = 100;
pub const SEQUENCE_WINDOW_SECS: f64 = 3600.0;
pub const INTERACTION_HISTORY_LEN: usize = 64;
pub const STRENGTH_HISTORY_LEN: usize = 64;

/// Hard cap on distinct motifs per node. 10 tokens give at most
/// 100 bigrams + 1000 trigrams, so this bounds the map below that.
pub const MAX_MOTIFS_PER_NODE: usize = 1024;

/// Strength added to a motif per counted occurrence.
pub const MOTIF_OCCURRENCE_BOOST: f64 = 0.1;

/// Numerical epsilon for near-zero comparisons
pub const EPSILON: f64 = 1e-10;
