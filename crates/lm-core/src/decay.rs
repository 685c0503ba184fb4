//! Time-based weakening of node strength and lifecycle classification.
//!
//! `apply_decay` is pure: it reads a node and returns what the node should
//! become. The caller writes the result back with
//! [`MemoryNode::apply_decay_result`].

use serde::{Deserialize, Serialize};

use crate::config::{DecayConfig, LifecycleConfig};
use crate::constants::{
    ACTIVE_MIN_STRENGTH, ACTIVE_RECENCY_SECS, DORMANT_MIN_STRENGTH, DORMANT_RECENCY_SECS,
    ESTABLISHED_MIN_INTERACTIONS, ESTABLISHED_MIN_STRENGTH, FORMING_MAX_AGE_SECS,
    FORMING_MAX_STRENGTH,
};
use crate::node::{InvalidationTracking, MemoryNode};

/// Price behaviour that demotes a band faster than plain decay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invalidation {
    /// Price has stayed beyond `clean_break_half_widths` half-widths of the
    /// center for longer than the window.
    CleanBreak,
    /// Price has sat inside the band for longer than the window without any
    /// interaction being recorded.
    NoReaction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Forming,
    Active,
    Established,
    Dormant,
    Archived,
}

impl LifecycleState {
    /// Derived state, first match wins. Never stored.
    pub fn classify(node: &MemoryNode, now: f64, cfg: &LifecycleConfig) -> Self {
        Self::classify_at(node, node.strength, now, cfg)
    }

    fn classify_at(node: &MemoryNode, strength: f64, now: f64, cfg: &LifecycleConfig) -> Self {
        if node.archived || strength < cfg.archive_threshold {
            return Self::Archived;
        }
        if node.age(now) < FORMING_MAX_AGE_SECS && strength < FORMING_MAX_STRENGTH {
            return Self::Forming;
        }
        if node.seconds_since_interaction(now) < ACTIVE_RECENCY_SECS
            && strength >= ACTIVE_MIN_STRENGTH
        {
            return Self::Active;
        }
        if strength >= ESTABLISHED_MIN_STRENGTH
            && node.evidence.interaction_count >= ESTABLISHED_MIN_INTERACTIONS
        {
            return Self::Established;
        }
        if node.seconds_since_interaction(now) < DORMANT_RECENCY_SECS
            && strength >= DORMANT_MIN_STRENGTH
        {
            return Self::Dormant;
        }
        Self::Dormant
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forming => "forming",
            Self::Active => "active",
            Self::Established => "established",
            Self::Dormant => "dormant",
            Self::Archived => "archived",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayResult {
    pub now: f64,
    /// Seconds of decay applied (never negative).
    pub elapsed: f64,
    pub strength_before: f64,
    pub strength_after: f64,
    /// Effective rate per second, including any invalidation multiplier.
    pub rate_applied: f64,
    pub invalidation: Option<Invalidation>,
    pub tracking: InvalidationTracking,
    pub state: LifecycleState,
}

/// Compute the decayed strength of `node` at `now`.
///
/// Decay is linear in elapsed time: `s * max(0, 1 - rate * dt)`. Archived
/// nodes are frozen and returned unchanged. With no `current_price` the
/// invalidation tracking is carried over and no invalidation is detected.
pub fn apply_decay(
    node: &MemoryNode,
    now: f64,
    current_price: Option<f64>,
    decay: &DecayConfig,
    lifecycle: &LifecycleConfig,
) -> DecayResult {
    if node.archived {
        return DecayResult {
            now,
            elapsed: 0.0,
            strength_before: node.strength,
            strength_after: node.strength,
            rate_applied: 0.0,
            invalidation: None,
            tracking: node.tracking,
            state: LifecycleState::Archived,
        };
    }

    let elapsed = (now - node.decayed_through).max(0.0);
    let (tracking, invalidation) = match current_price.filter(|p| p.is_finite()) {
        Some(price) => {
            let tracking = track_price(node, now, price, decay);
            (tracking, detect_invalidation(node, now, &tracking, decay))
        }
        None => (node.tracking, None),
    };

    let mut rate = node.decay_rate;
    if invalidation.is_some() {
        rate *= decay.invalidation_multiplier;
    }
    let factor = (1.0 - rate * elapsed).max(0.0);
    let strength_after = (node.strength * factor).clamp(0.0, 1.0);

    DecayResult {
        now,
        elapsed,
        strength_before: node.strength,
        strength_after,
        rate_applied: rate,
        invalidation,
        tracking,
        state: LifecycleState::classify_at(node, strength_after, now, lifecycle),
    }
}

fn track_price(
    node: &MemoryNode,
    now: f64,
    price: f64,
    decay: &DecayConfig,
) -> InvalidationTracking {
    let distance = (price - node.price_center).abs();
    let away = distance > decay.clean_break_half_widths * node.half_width;
    let inside = node.contains(price);

    InvalidationTracking {
        away_since: away.then(|| node.tracking.away_since.unwrap_or(now)),
        inside_since: inside.then(|| node.tracking.inside_since.unwrap_or(now)),
    }
}

fn detect_invalidation(
    node: &MemoryNode,
    now: f64,
    tracking: &InvalidationTracking,
    decay: &DecayConfig,
) -> Option<Invalidation> {
    let window = decay.invalidation_window_secs;
    if let Some(since) = tracking.away_since
        && now - since > window
    {
        return Some(Invalidation::CleanBreak);
    }
    if let Some(since) = tracking.inside_since
        && now - since > window
        && node.seconds_since_interaction(now) > window
    {
        return Some(Invalidation::NoReaction);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::node::{CreationTrigger, NodeSide};
    use crate::tokenizer::EvidenceToken;

    fn node_with_strength(strength: f64) -> MemoryNode {
        let mut node = MemoryNode::new(
            &CreationTrigger::ExecutedLiquidity { volume_usd: 1_000.0 },
            100.0,
            0.05,
            NodeSide::Both,
            0.0,
            &MemoryConfig::default(),
        );
        node.strength = strength;
        node
    }

    fn decay(node: &MemoryNode, now: f64, price: Option<f64>) -> DecayResult {
        let cfg = MemoryConfig::default();
        apply_decay(node, now, price, &cfg.decay, &cfg.lifecycle)
    }

    #[test]
    fn test_one_hour_active_decay() {
        let node = node_with_strength(0.8);
        let r = decay(&node, 3_600.0, None);
        // 0.8 * (1 - 0.0001 * 3600) = 0.512
        assert!((r.strength_after - 0.512).abs() < 1e-12);
        assert_eq!(r.elapsed, 3_600.0);
        assert_eq!(r.invalidation, None);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let node = node_with_strength(0.5);
        let r = decay(&node, 100_000.0, None);
        assert_eq!(r.strength_after, 0.0);
        assert_eq!(r.state, LifecycleState::Archived);
    }

    #[test]
    fn test_dormant_rate_is_slower() {
        let mut node = node_with_strength(0.5);
        node.decay_rate = MemoryConfig::default().decay.dormant_rate();
        let r = decay(&node, 3_600.0, None);
        // 0.5 * (1 - 0.00001 * 3600) = 0.482
        assert!((r.strength_after - 0.482).abs() < 1e-12);
    }

    #[test]
    fn test_archived_node_is_frozen() {
        let mut node = node_with_strength(0.005);
        node.archive();
        let r = decay(&node, 1e6, Some(500.0));
        assert_eq!(r.strength_after, 0.005);
        assert_eq!(r.rate_applied, 0.0);
        assert_eq!(r.tracking, node.tracking);
    }

    #[test]
    fn test_clean_break_after_window() {
        let mut node = node_with_strength(0.8);
        let far = 100.5; // 10 half-widths away
        let r = decay(&node, 100.0, Some(far));
        assert_eq!(r.tracking.away_since, Some(100.0));
        assert_eq!(r.invalidation, None);
        node.apply_decay_result(&r);

        let r = decay(&node, 401.0, Some(far));
        assert_eq!(r.invalidation, Some(Invalidation::CleanBreak));
        assert!((r.rate_applied - 0.001).abs() < 1e-15);
    }

    #[test]
    fn test_returning_price_resets_clean_break() {
        let mut node = node_with_strength(0.8);
        let r = decay(&node, 100.0, Some(100.5));
        node.apply_decay_result(&r);
        let r = decay(&node, 200.0, Some(100.0));
        node.apply_decay_result(&r);
        assert_eq!(node.tracking.away_since, None);
        let r = decay(&node, 450.0, Some(100.5));
        assert_eq!(r.tracking.away_since, Some(450.0));
        assert_eq!(r.invalidation, None);
    }

    #[test]
    fn test_no_reaction_inside_band() {
        let mut node = node_with_strength(0.8);
        let r = decay(&node, 10.0, Some(100.0));
        node.apply_decay_result(&r);
        let r = decay(&node, 320.0, Some(100.01));
        assert_eq!(r.invalidation, Some(Invalidation::NoReaction));
    }

    #[test]
    fn test_recent_interaction_blocks_no_reaction() {
        let mut node = node_with_strength(0.8);
        let r = decay(&node, 10.0, Some(100.0));
        node.apply_decay_result(&r);
        node.record_orderbook_appearance(
            200.0,
            EvidenceToken::ObAppear,
            &MemoryConfig::default().lifecycle,
        )
        .unwrap();
        let r = decay(&node, 320.0, Some(100.0));
        assert_eq!(r.invalidation, None);
    }

    #[test]
    fn test_no_price_means_no_invalidation() {
        let mut node = node_with_strength(0.8);
        node.tracking.away_since = Some(0.0);
        let r = decay(&node, 1_000.0, None);
        assert_eq!(r.invalidation, None);
        assert_eq!(r.tracking.away_since, Some(0.0));
    }

    #[test]
    fn test_classification_order() {
        let cfg = LifecycleConfig::default();
        let mut node = node_with_strength(0.2);
        assert_eq!(LifecycleState::classify(&node, 30.0, &cfg), LifecycleState::Forming);

        node.strength = 0.6;
        assert_eq!(LifecycleState::classify(&node, 120.0, &cfg), LifecycleState::Active);

        node.evidence.interaction_count = 3;
        node.evidence.trade_count = 3;
        assert_eq!(
            LifecycleState::classify(&node, 5_000.0, &cfg),
            LifecycleState::Established
        );

        // last interaction at 0: 3000s ago is recently touched, 5000s is idle
        node.strength = 0.12;
        assert_eq!(LifecycleState::classify(&node, 3_000.0, &cfg), LifecycleState::Dormant);
        assert_eq!(LifecycleState::classify(&node, 5_000.0, &cfg), LifecycleState::Dormant);
        node.strength = 0.05;
        assert_eq!(LifecycleState::classify(&node, 3_000.0, &cfg), LifecycleState::Dormant);

        node.strength = 0.005;
        assert_eq!(LifecycleState::classify(&node, 5_000.0, &cfg), LifecycleState::Archived);
    }
}
