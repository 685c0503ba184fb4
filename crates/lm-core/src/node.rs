use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{CreationConfig, LifecycleConfig, MemoryConfig};
use crate::constants::{BASE_CONFIDENCE, EPSILON};
use crate::decay::DecayResult;
use crate::error::{EvidenceError, Result, ensure_non_negative};
use crate::evidence::{Aggressor, LiquidationSide};
use crate::history::{BoundedHistory, CheckpointCause, StrengthCheckpoint, gap_statistics};
use crate::motif::MotifIndex;
use crate::sequence::SequenceBuffer;
use crate::tokenizer::{EvidenceToken, TokenFamily};

/// Which side of the book a band was observed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSide {
    Bid,
    Ask,
    Both,
}

impl NodeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
            Self::Both => "both",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationReason {
    OrderbookPersistence,
    ExecutedLiquidity,
    LiquidationProximity,
    PriceRejection,
}

impl CreationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderbookPersistence => "orderbook_persistence",
            Self::ExecutedLiquidity => "executed_liquidity",
            Self::LiquidationProximity => "liquidation_proximity",
            Self::PriceRejection => "price_rejection",
        }
    }
}

/// Evidence that may justify creating a node.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trigger", rename_all = "snake_case")]
pub enum CreationTrigger {
    OrderbookPersistence { persistence_secs: f64 },
    ExecutedLiquidity { volume_usd: f64 },
    LiquidationProximity { distance_bps: f64, liquidation_count: u32 },
    PriceRejection { visit_count: u32 },
}

impl CreationTrigger {
    pub fn reason(&self) -> CreationReason {
        match self {
            Self::OrderbookPersistence { .. } => CreationReason::OrderbookPersistence,
            Self::ExecutedLiquidity { .. } => CreationReason::ExecutedLiquidity,
            Self::LiquidationProximity { .. } => CreationReason::LiquidationProximity,
            Self::PriceRejection { .. } => CreationReason::PriceRejection,
        }
    }

    pub fn qualifies(&self, cfg: &CreationConfig) -> bool {
        match *self {
            Self::OrderbookPersistence { persistence_secs } => {
                persistence_secs >= cfg.orderbook_persist_min_secs
            }
            Self::ExecutedLiquidity { volume_usd } => volume_usd >= cfg.executed_liquidity_min_usd,
            Self::LiquidationProximity {
                distance_bps,
                liquidation_count,
            } => liquidation_count > 0 && distance_bps <= cfg.liquidation_proximity_bps,
            Self::PriceRejection { visit_count } => visit_count >= cfg.rejection_min_visits,
        }
    }

    pub fn initial_strength(&self) -> f64 {
        let s = match *self {
            Self::OrderbookPersistence { persistence_secs } => 0.3 + 0.01 * persistence_secs,
            Self::ExecutedLiquidity { volume_usd } => 0.4 + 0.05 * (volume_usd / 1_000.0),
            Self::LiquidationProximity {
                liquidation_count, ..
            } => 0.3 + 0.05 * liquidation_count as f64,
            Self::PriceRejection { .. } => 0.3,
        };
        s.clamp(0.0, 1.0)
    }

    pub fn initial_confidence(&self) -> f64 {
        let c = match *self {
            Self::PriceRejection { visit_count } => 0.5 + 0.05 * visit_count as f64,
            _ => BASE_CONFIDENCE,
        };
        c.clamp(0.0, 1.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceCounters {
    /// Always `orderbook_count + trade_count + liquidation_count`.
    pub interaction_count: u64,
    pub orderbook_count: u64,
    pub trade_count: u64,
    pub liquidation_count: u64,
    /// Price touches are tracked separately and are not interactions.
    pub price_touch_count: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeCounters {
    pub total: f64,
    pub largest_event: f64,
    pub buyer_initiated: f64,
    pub seller_initiated: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationCounters {
    pub in_band: u64,
    pub long: u64,
    pub short: u64,
    pub largest_cascade: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalStats {
    pub interaction_times: BoundedHistory<f64>,
    pub gap_median: Option<f64>,
    pub gap_variance: Option<f64>,
}

impl TemporalStats {
    fn new(capacity: usize) -> Self {
        Self {
            interaction_times: BoundedHistory::new(capacity),
            gap_median: None,
            gap_variance: None,
        }
    }

    fn record(&mut self, ts: f64) {
        self.interaction_times.push(ts);
        if let Some((median, variance)) = gap_statistics(self.interaction_times.iter()) {
            self.gap_median = Some(median);
            self.gap_variance = Some(variance);
        }
    }
}

/// Since-when the price has been continuously away from, or inside, the band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InvalidationTracking {
    pub away_since: Option<f64>,
    pub inside_since: Option<f64>,
}

/// Belief entity for one price band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: Uuid,
    pub price_center: f64,
    pub half_width: f64,
    pub side: NodeSide,
    pub first_seen_ts: f64,
    pub last_interaction_ts: f64,
    pub strength: f64,
    pub confidence: f64,
    pub creation_reason: CreationReason,
    /// Current regime rate per second (active, dormant, or 0 when archived).
    pub decay_rate: f64,
    pub active: bool,
    pub archived: bool,
    pub evidence: EvidenceCounters,
    pub volume: VolumeCounters,
    pub liquidations: LiquidationCounters,
    pub temporal: TemporalStats,
    pub strength_history: BoundedHistory<StrengthCheckpoint>,
    pub sequence: SequenceBuffer,
    pub motifs: MotifIndex,
    pub sequences_observed: u64,
    /// Time up to which decay has been applied.
    pub decayed_through: f64,
    /// Timestamp of the newest accepted evidence of any category.
    pub latest_evidence_ts: f64,
    pub tracking: InvalidationTracking,
}

impl MemoryNode {
    pub fn new(
        trigger: &CreationTrigger,
        price_center: f64,
        half_width: f64,
        side: NodeSide,
        ts: f64,
        config: &MemoryConfig,
    ) -> Self {
        let strength = trigger.initial_strength();
        let mut strength_history = BoundedHistory::new(config.sequence.strength_history_len);
        strength_history.push(StrengthCheckpoint {
            ts,
            strength,
            cause: CheckpointCause::Created,
        });

        Self {
            id: Uuid::new_v4(),
            price_center,
            half_width,
            side,
            first_seen_ts: ts,
            last_interaction_ts: ts,
            strength,
            confidence: trigger.initial_confidence(),
            creation_reason: trigger.reason(),
            decay_rate: config.decay.active_rate,
            active: true,
            archived: false,
            evidence: EvidenceCounters::default(),
            volume: VolumeCounters::default(),
            liquidations: LiquidationCounters::default(),
            temporal: TemporalStats::new(config.sequence.interaction_history_len),
            strength_history,
            sequence: SequenceBuffer::new(config.sequence.max_len, config.sequence.window_secs),
            motifs: MotifIndex::new(crate::constants::MAX_MOTIFS_PER_NODE, ts),
            sequences_observed: 0,
            decayed_through: ts,
            latest_evidence_ts: ts,
            tracking: InvalidationTracking::default(),
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        (price - self.price_center).abs() <= self.half_width + EPSILON
    }

    /// Distance from the band edge in basis points of the center (0 inside).
    pub fn distance_bps(&self, price: f64) -> f64 {
        if self.price_center <= 0.0 {
            return f64::INFINITY;
        }
        let outside = ((price - self.price_center).abs() - self.half_width).max(0.0);
        outside / self.price_center * 10_000.0
    }

    pub fn age(&self, now: f64) -> f64 {
        (now - self.first_seen_ts).max(0.0)
    }

    pub fn seconds_since_interaction(&self, now: f64) -> f64 {
        (now - self.last_interaction_ts).max(0.0)
    }

    // --- Evidence recording ---

    pub fn record_orderbook_appearance(
        &mut self,
        ts: f64,
        token: EvidenceToken,
        cfg: &LifecycleConfig,
    ) -> Result<()> {
        self.check_recordable(ts, token, TokenFamily::Orderbook)?;
        self.evidence.orderbook_count += 1;
        self.register_interaction(ts, cfg);
        self.append_token(token, ts);
        self.debug_check();
        Ok(())
    }

    pub fn record_trade_execution(
        &mut self,
        ts: f64,
        volume_usd: f64,
        aggressor: Aggressor,
        token: EvidenceToken,
        cfg: &LifecycleConfig,
    ) -> Result<()> {
        ensure_non_negative("volume_usd", volume_usd)?;
        self.check_recordable(ts, token, TokenFamily::Trade)?;

        self.evidence.trade_count += 1;
        self.volume.total += volume_usd;
        self.volume.largest_event = self.volume.largest_event.max(volume_usd);
        match aggressor {
            Aggressor::Buyer => self.volume.buyer_initiated += volume_usd,
            Aggressor::Seller => self.volume.seller_initiated += volume_usd,
            Aggressor::Unknown => {}
        }
        self.register_interaction(ts, cfg);
        self.append_token(token, ts);
        self.debug_check();
        Ok(())
    }

    pub fn record_liquidation(
        &mut self,
        ts: f64,
        side: LiquidationSide,
        cascade_size: u32,
        token: EvidenceToken,
        cfg: &LifecycleConfig,
    ) -> Result<()> {
        self.check_recordable(ts, token, TokenFamily::Liquidation)?;

        self.evidence.liquidation_count += 1;
        self.liquidations.in_band += 1;
        match side {
            LiquidationSide::Long => self.liquidations.long += 1,
            LiquidationSide::Short => self.liquidations.short += 1,
        }
        self.liquidations.largest_cascade = self.liquidations.largest_cascade.max(cascade_size);
        self.register_interaction(ts, cfg);
        self.append_token(token, ts);
        self.debug_check();
        Ok(())
    }

    /// Price touches raise confidence only; they are not interactions.
    pub fn record_price_touch(
        &mut self,
        ts: f64,
        token: EvidenceToken,
        cfg: &LifecycleConfig,
    ) -> Result<()> {
        self.check_recordable(ts, token, TokenFamily::Price)?;

        self.evidence.price_touch_count += 1;
        self.confidence = (self.confidence + cfg.touch_confidence_boost).clamp(0.0, 1.0);
        self.append_token(token, ts);
        self.debug_check();
        Ok(())
    }

    /// Everything that can make a record call fail, checked before any mutation.
    fn check_recordable(&self, ts: f64, token: EvidenceToken, family: TokenFamily) -> Result<()> {
        if self.archived {
            return Err(EvidenceError::Archived(self.id));
        }
        ensure_non_negative("ts", ts)?;
        if ts < self.latest_evidence_ts {
            return Err(EvidenceError::TimestampRegression {
                ts,
                latest: self.latest_evidence_ts,
            });
        }
        if token.family() != family {
            return Err(EvidenceError::Broken(format!(
                "token {token} does not belong to {family:?} evidence"
            )));
        }
        Ok(())
    }

    fn register_interaction(&mut self, ts: f64, cfg: &LifecycleConfig) {
        let revisit = self.evidence.interaction_count > 0;
        self.evidence.interaction_count += 1;
        self.last_interaction_ts = self.last_interaction_ts.max(ts);
        self.temporal.record(ts);

        if revisit {
            self.strength = (self.strength + cfg.revisit_boost).clamp(0.0, 1.0);
        }
        self.strength_history.push(StrengthCheckpoint {
            ts,
            strength: self.strength,
            cause: CheckpointCause::Evidence,
        });
    }

    fn append_token(&mut self, token: EvidenceToken, ts: f64) {
        self.sequence.push(token, ts);
        self.sequences_observed += 1;
        self.latest_evidence_ts = ts;
        let tokens = self.sequence.tokens();
        self.motifs.observe(&tokens, ts, self.decay_rate);
    }

    fn debug_check(&self) {
        debug_assert!(
            self.check_invariants().is_ok(),
            "node {} broke an invariant: {:?}",
            self.id,
            self.check_invariants()
        );
    }

    // --- Decay and lifecycle transitions ---

    /// Write back a decay result. Counters, buffer and interaction
    /// timestamps are never touched; archived nodes ignore the call.
    pub fn apply_decay_result(&mut self, result: &DecayResult) {
        if self.archived {
            return;
        }
        self.strength = result.strength_after.clamp(0.0, 1.0);
        self.decayed_through = self.decayed_through.max(result.now);
        self.tracking = result.tracking;
        self.motifs.decay(result.now, result.rate_applied);
    }

    pub(crate) fn enter_dormancy(&mut self, dormant_rate: f64) {
        self.active = false;
        self.decay_rate = dormant_rate;
    }

    pub(crate) fn archive(&mut self) {
        self.active = false;
        self.archived = true;
        self.decay_rate = 0.0;
    }

    pub(crate) fn revive(&mut self, strength: f64, ts: f64, active_rate: f64) {
        self.strength = strength.clamp(0.0, 1.0);
        self.active = true;
        self.decay_rate = active_rate;
        self.strength_history.push(StrengthCheckpoint {
            ts,
            strength: self.strength,
            cause: CheckpointCause::Revived,
        });
    }

    /// Verify every counter, bound and ordering invariant.
    pub fn check_invariants(&self) -> Result<()> {
        let e = &self.evidence;
        if e.interaction_count != e.orderbook_count + e.trade_count + e.liquidation_count {
            return Err(EvidenceError::Broken(format!(
                "interaction_count {} != {} + {} + {}",
                e.interaction_count, e.orderbook_count, e.trade_count, e.liquidation_count
            )));
        }
        let v = &self.volume;
        if v.total + EPSILON < v.largest_event {
            return Err(EvidenceError::Broken(format!(
                "volume total {} < largest event {}",
                v.total, v.largest_event
            )));
        }
        // Per-side sums accumulate in a different order than the total.
        if v.buyer_initiated + v.seller_initiated > v.total * (1.0 + 1e-9) + EPSILON {
            return Err(EvidenceError::Broken(format!(
                "buyer {} + seller {} > total {}",
                v.buyer_initiated, v.seller_initiated, v.total
            )));
        }
        let l = &self.liquidations;
        if l.long + l.short != l.in_band {
            return Err(EvidenceError::Broken(format!(
                "long {} + short {} != in-band {}",
                l.long, l.short, l.in_band
            )));
        }
        if !(0.0..=1.0).contains(&self.strength) {
            return Err(EvidenceError::Broken(format!(
                "strength {} outside [0, 1]",
                self.strength
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EvidenceError::Broken(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.last_interaction_ts < self.first_seen_ts {
            return Err(EvidenceError::Broken(format!(
                "last interaction {} before first seen {}",
                self.last_interaction_ts, self.first_seen_ts
            )));
        }
        if self.sequence.len() > self.sequence.capacity() {
            return Err(EvidenceError::Broken(format!(
                "sequence buffer holds {} > capacity {}",
                self.sequence.len(),
                self.sequence.capacity()
            )));
        }
        if let (Some(oldest), Some(newest)) = (self.sequence.oldest_ts(), self.sequence.newest_ts())
            && newest - oldest > self.sequence.window_secs() + EPSILON
        {
            return Err(EvidenceError::Broken(format!(
                "sequence buffer spans {}s > window {}s",
                newest - oldest,
                self.sequence.window_secs()
            )));
        }
        if self.motifs.len() > self.motifs.capacity() {
            return Err(EvidenceError::Broken(format!(
                "motif index holds {} > cap {}",
                self.motifs.len(),
                self.motifs.capacity()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::EvidenceToken::*;

    fn cfg() -> MemoryConfig {
        MemoryConfig::default()
    }

    fn make_node(ts: f64) -> MemoryNode {
        MemoryNode::new(
            &CreationTrigger::ExecutedLiquidity { volume_usd: 2_000.0 },
            100.0,
            0.05,
            NodeSide::Both,
            ts,
            &cfg(),
        )
    }

    #[test]
    fn test_initial_strengths() {
        let cases = [
            (CreationTrigger::OrderbookPersistence { persistence_secs: 20.0 }, 0.5),
            (CreationTrigger::ExecutedLiquidity { volume_usd: 2_000.0 }, 0.5),
            (
                CreationTrigger::LiquidationProximity {
                    distance_bps: 1.0,
                    liquidation_count: 2,
                },
                0.4,
            ),
            (CreationTrigger::PriceRejection { visit_count: 4 }, 0.3),
            (CreationTrigger::ExecutedLiquidity { volume_usd: 30_000.0 }, 1.0),
        ];
        for (trigger, expected) in cases {
            let s = trigger.initial_strength();
            assert!((s - expected).abs() < 1e-10, "{trigger:?}: expected {expected}, got {s}");
        }
        let c = CreationTrigger::PriceRejection { visit_count: 4 }.initial_confidence();
        assert!((c - 0.7).abs() < 1e-10);
    }

    #[test]
    fn test_creation_thresholds() {
        let c = CreationConfig::default();
        assert!(!CreationTrigger::OrderbookPersistence { persistence_secs: 9.9 }.qualifies(&c));
        assert!(CreationTrigger::OrderbookPersistence { persistence_secs: 10.0 }.qualifies(&c));
        assert!(!CreationTrigger::ExecutedLiquidity { volume_usd: 999.0 }.qualifies(&c));
        assert!(CreationTrigger::ExecutedLiquidity { volume_usd: 1_000.0 }.qualifies(&c));
        assert!(
            !CreationTrigger::LiquidationProximity {
                distance_bps: 5.1,
                liquidation_count: 1
            }
            .qualifies(&c)
        );
        assert!(!CreationTrigger::PriceRejection { visit_count: 2 }.qualifies(&c));
        assert!(CreationTrigger::PriceRejection { visit_count: 3 }.qualifies(&c));
    }

    #[test]
    fn test_first_interaction_keeps_initial_strength() {
        let mut node = make_node(0.0);
        node.record_trade_execution(1.0, 2_000.0, Aggressor::Buyer, TradeExec, &cfg().lifecycle)
            .unwrap();
        assert!((node.strength - 0.5).abs() < 1e-10);

        node.record_trade_execution(2.0, 500.0, Aggressor::Seller, TradeExec, &cfg().lifecycle)
            .unwrap();
        assert!((node.strength - 0.6).abs() < 1e-10, "revisit should add 0.1");
    }

    #[test]
    fn test_boost_clamped_at_one() {
        let mut node = make_node(0.0);
        for i in 0..20 {
            node.record_orderbook_appearance(i as f64, ObAppear, &cfg().lifecycle)
                .unwrap();
        }
        assert_eq!(node.strength, 1.0);
    }

    #[test]
    fn test_orderbook_never_touches_volume() {
        let mut node = make_node(0.0);
        node.record_orderbook_appearance(1.0, ObPersist, &cfg().lifecycle)
            .unwrap();
        assert_eq!(node.volume, VolumeCounters::default());
        assert_eq!(node.liquidations, LiquidationCounters::default());
        assert_eq!(node.evidence.orderbook_count, 1);
        assert_eq!(node.evidence.interaction_count, 1);
    }

    #[test]
    fn test_trade_volume_counters() {
        let mut node = make_node(0.0);
        let lc = cfg().lifecycle;
        node.record_trade_execution(1.0, 3_000.0, Aggressor::Buyer, TradeExec, &lc).unwrap();
        node.record_trade_execution(2.0, 12_000.0, Aggressor::Seller, TradeVolumeHigh, &lc)
            .unwrap();
        node.record_trade_execution(3.0, 1_000.0, Aggressor::Unknown, TradeExec, &lc).unwrap();
        assert_eq!(node.volume.total, 16_000.0);
        assert_eq!(node.volume.largest_event, 12_000.0);
        assert_eq!(node.volume.buyer_initiated, 3_000.0);
        assert_eq!(node.volume.seller_initiated, 12_000.0);
        assert!(node.check_invariants().is_ok());
    }

    #[test]
    fn test_liquidation_counters() {
        let mut node = make_node(0.0);
        let lc = cfg().lifecycle;
        node.record_liquidation(1.0, LiquidationSide::Long, 1, LiqOccur, &lc).unwrap();
        node.record_liquidation(2.0, LiquidationSide::Short, 5, LiqCascade, &lc).unwrap();
        assert_eq!(node.liquidations.in_band, 2);
        assert_eq!(node.liquidations.long, 1);
        assert_eq!(node.liquidations.short, 1);
        assert_eq!(node.liquidations.largest_cascade, 5);
        assert_eq!(node.volume.total, 0.0);
    }

    #[test]
    fn test_price_touch_is_not_an_interaction() {
        let mut node = make_node(0.0);
        node.record_price_touch(5.0, PriceTouch, &cfg().lifecycle).unwrap();
        assert_eq!(node.evidence.interaction_count, 0);
        assert_eq!(node.evidence.price_touch_count, 1);
        assert_eq!(node.last_interaction_ts, 0.0);
        assert!((node.confidence - 0.55).abs() < 1e-10);
        assert_eq!(node.sequence.len(), 1);
    }

    #[test]
    fn test_negative_volume_leaves_node_untouched() {
        let mut node = make_node(0.0);
        let before = node.clone();
        let err = node
            .record_trade_execution(1.0, -10.0, Aggressor::Buyer, TradeExec, &cfg().lifecycle)
            .unwrap_err();
        assert!(matches!(err, EvidenceError::Negative { .. }));
        assert_eq!(node, before);
    }

    #[test]
    fn test_timestamp_regression_rejected() {
        let mut node = make_node(10.0);
        let lc = cfg().lifecycle;
        node.record_orderbook_appearance(20.0, ObAppear, &lc).unwrap();
        let before = node.clone();
        let err = node.record_orderbook_appearance(15.0, ObVanish, &lc).unwrap_err();
        assert!(matches!(err, EvidenceError::TimestampRegression { .. }));
        assert_eq!(node, before);
    }

    #[test]
    fn test_wrong_family_token_rejected() {
        let mut node = make_node(0.0);
        let err = node
            .record_orderbook_appearance(1.0, TradeExec, &cfg().lifecycle)
            .unwrap_err();
        assert!(matches!(err, EvidenceError::Broken(_)));
        assert_eq!(node.evidence.interaction_count, 0);
    }

    #[test]
    fn test_archived_node_rejects_evidence() {
        let mut node = make_node(0.0);
        node.archive();
        let err = node
            .record_orderbook_appearance(1.0, ObAppear, &cfg().lifecycle)
            .unwrap_err();
        assert_eq!(err, EvidenceError::Archived(node.id));
    }

    #[test]
    fn test_gap_statistics_follow_interactions() {
        let mut node = make_node(0.0);
        let lc = cfg().lifecycle;
        for ts in [10.0, 20.0, 40.0] {
            node.record_orderbook_appearance(ts, ObPersist, &lc).unwrap();
        }
        assert_eq!(node.temporal.gap_median, Some(15.0));
        assert_eq!(node.temporal.gap_variance, Some(25.0));
    }

    #[test]
    fn test_band_geometry() {
        let node = make_node(0.0);
        assert!(node.contains(100.05));
        assert!(!node.contains(100.06));
        assert_eq!(node.distance_bps(100.0), 0.0);
        // 0.05 past the edge on a 100.0 center = 5 bps
        assert!((node.distance_bps(100.10) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_sequences_observed_counts_every_append() {
        let mut node = make_node(0.0);
        let lc = cfg().lifecycle;
        node.record_orderbook_appearance(1.0, ObAppear, &lc).unwrap();
        node.record_price_touch(2.0, PriceTouch, &lc).unwrap();
        node.record_liquidation(3.0, LiquidationSide::Long, 1, LiqOccur, &lc).unwrap();
        assert_eq!(node.sequences_observed, 3);
        assert_eq!(node.motifs.summary().distinct_trigrams, 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut node = make_node(0.0);
        let lc = cfg().lifecycle;
        node.record_trade_execution(1.0, 1_234.5, Aggressor::Buyer, TradeExec, &lc).unwrap();
        node.record_price_touch(2.0, PriceTouch, &lc).unwrap();
        let json = serde_json::to_string(&node).unwrap();
        let back: MemoryNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
