use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::continuity::{ContinuityStore, NodeEntry, Partition};
use crate::decay::LifecycleState;
use crate::motif::{MotifKey, MotifStats, MotifSummary};
use crate::node::{CreationReason, MemoryNode, NodeSide};
use crate::sequence::TokenEvent;
use crate::tokenizer::EvidenceToken;

/// Factual view of one node for list results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: Uuid,
    pub partition: Partition,
    pub price_center: f64,
    pub half_width: f64,
    pub side: NodeSide,
    pub creation_reason: CreationReason,
    pub first_seen_ts: f64,
    pub last_interaction_ts: f64,
    pub strength: f64,
    pub confidence: f64,
    pub interaction_count: u64,
    pub volume_total: f64,
    pub buffer_len: usize,
    pub motif_count: usize,
}

impl NodeSummary {
    fn from_entry(entry: &NodeEntry) -> Self {
        let n = &entry.node;
        Self {
            id: n.id,
            partition: entry.partition,
            price_center: n.price_center,
            half_width: n.half_width,
            side: n.side,
            creation_reason: n.creation_reason,
            first_seen_ts: n.first_seen_ts,
            last_interaction_ts: n.last_interaction_ts,
            strength: n.strength,
            confidence: n.confidence,
            interaction_count: n.evidence.interaction_count,
            volume_total: n.volume.total,
            buffer_len: n.sequence.len(),
            motif_count: n.motifs.len(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BufferMetadata {
    pub len: usize,
    pub capacity: usize,
    pub window_secs: f64,
    pub oldest_ts: Option<f64>,
    pub newest_ts: Option<f64>,
    /// `newest_ts - oldest_ts`, 0 for an empty buffer.
    pub span_secs: f64,
    pub sequences_observed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayState {
    pub strength: f64,
    pub decay_rate: f64,
    pub decayed_through: f64,
    pub seconds_since_interaction: f64,
    pub partition: Partition,
    pub state: LifecycleState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotifEntry {
    pub motif: MotifKey,
    #[serde(flatten)]
    pub stats: MotifStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotifOccurrence {
    pub id: Uuid,
    pub count: u64,
}

/// Read-only accessors over a [`ContinuityStore`].
///
/// Every result is an owned copy. Lists are ordered chronologically, by
/// price, lexicographically or by identifier; never by a magnitude.
/// Unknown ids and patterns give `None` or an empty result.
pub struct QueryEngine;

impl QueryEngine {
    pub fn node(store: &ContinuityStore, id: Uuid) -> Option<MemoryNode> {
        store.node(id).cloned()
    }

    pub fn summary(store: &ContinuityStore, id: Uuid) -> Option<NodeSummary> {
        store.get(id).map(NodeSummary::from_entry)
    }

    pub fn active_nodes(store: &ContinuityStore) -> Vec<NodeSummary> {
        Self::partition(store, Partition::Active)
    }

    pub fn dormant_nodes(store: &ContinuityStore) -> Vec<NodeSummary> {
        Self::partition(store, Partition::Dormant)
    }

    pub fn archived_nodes(store: &ContinuityStore) -> Vec<NodeSummary> {
        Self::partition(store, Partition::Archived)
    }

    /// Nodes in `partition`, by first-seen time then id.
    pub fn partition(store: &ContinuityStore, partition: Partition) -> Vec<NodeSummary> {
        let mut out: Vec<NodeSummary> = store
            .entries()
            .iter()
            .filter(|e| e.partition == partition)
            .map(NodeSummary::from_entry)
            .collect();
        out.sort_by(|a, b| {
            a.first_seen_ts
                .total_cmp(&b.first_seen_ts)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    /// Non-archived nodes whose band overlaps `[low, high]`, by price center
    /// then id.
    pub fn nodes_in_price_range(store: &ContinuityStore, low: f64, high: f64) -> Vec<NodeSummary> {
        if low.is_nan() || high.is_nan() || low > high {
            return Vec::new();
        }
        let mut out: Vec<NodeSummary> = store
            .entries()
            .iter()
            .filter(|e| e.partition != Partition::Archived)
            .filter(|e| {
                let n = &e.node;
                n.price_center + n.half_width >= low && n.price_center - n.half_width <= high
            })
            .map(NodeSummary::from_entry)
            .collect();
        out.sort_by(|a, b| {
            a.price_center
                .total_cmp(&b.price_center)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }

    // --- Sequence buffer ---

    /// Full buffer contents, chronological.
    pub fn buffer(store: &ContinuityStore, id: Uuid) -> Vec<TokenEvent> {
        store
            .node(id)
            .map(|n| n.sequence.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn recent_tokens(store: &ContinuityStore, id: Uuid, n: usize) -> Vec<TokenEvent> {
        store
            .node(id)
            .map(|node| node.sequence.recent(n))
            .unwrap_or_default()
    }

    pub fn tokens_in_range(store: &ContinuityStore, id: Uuid, start: f64, end: f64) -> Vec<TokenEvent> {
        store
            .node(id)
            .map(|n| n.sequence.range(start, end))
            .unwrap_or_default()
    }

    pub fn token_histogram(store: &ContinuityStore, id: Uuid) -> BTreeMap<EvidenceToken, usize> {
        store
            .node(id)
            .map(|n| n.sequence.histogram())
            .unwrap_or_default()
    }

    pub fn buffer_metadata(store: &ContinuityStore, id: Uuid) -> Option<BufferMetadata> {
        let node = store.node(id)?;
        let seq = &node.sequence;
        let span_secs = match (seq.oldest_ts(), seq.newest_ts()) {
            (Some(o), Some(n)) => n - o,
            _ => 0.0,
        };
        Some(BufferMetadata {
            len: seq.len(),
            capacity: seq.capacity(),
            window_secs: seq.window_secs(),
            oldest_ts: seq.oldest_ts(),
            newest_ts: seq.newest_ts(),
            span_secs,
            sequences_observed: node.sequences_observed,
        })
    }

    // --- Motifs ---

    pub fn motif(store: &ContinuityStore, id: Uuid, pattern: &[EvidenceToken]) -> Option<MotifStats> {
        store.node(id)?.motifs.get(pattern).copied()
    }

    pub fn motifs_with_min_count(store: &ContinuityStore, id: Uuid, min_count: u64) -> Vec<MotifEntry> {
        let Some(node) = store.node(id) else {
            return Vec::new();
        };
        node.motifs
            .iter()
            .filter(|(_, s)| s.count >= min_count)
            .map(|(k, s)| MotifEntry {
                motif: k.clone(),
                stats: *s,
            })
            .collect()
    }

    /// Nodes holding at least `min_count` occurrences of `pattern`, by id.
    pub fn nodes_with_motif(
        store: &ContinuityStore,
        pattern: &[EvidenceToken],
        min_count: u64,
    ) -> Vec<MotifOccurrence> {
        let mut out: Vec<MotifOccurrence> = store
            .entries()
            .iter()
            .filter_map(|e| {
                let stats = e.node.motifs.get(pattern)?;
                (stats.count >= min_count).then_some(MotifOccurrence {
                    id: e.node.id,
                    count: stats.count,
                })
            })
            .collect();
        out.sort_by_key(|o| o.id);
        out
    }

    pub fn motif_statistics(store: &ContinuityStore, id: Uuid) -> Option<MotifSummary> {
        store.node(id).map(|n| n.motifs.summary())
    }

    /// Totals across every node, archived ones included.
    pub fn global_motif_statistics(store: &ContinuityStore) -> MotifSummary {
        let mut total = MotifSummary::default();
        for entry in store.entries() {
            total.merge(&entry.node.motifs.summary());
        }
        total
    }

    // --- Decay ---

    pub fn decay_state(store: &ContinuityStore, id: Uuid, now: f64) -> Option<DecayState> {
        let entry = store.get(id)?;
        let node = &entry.node;
        Some(DecayState {
            strength: node.strength,
            decay_rate: node.decay_rate,
            decayed_through: node.decayed_through,
            seconds_since_interaction: node.seconds_since_interaction(now),
            partition: entry.partition,
            state: LifecycleState::classify(node, now, &store.config().lifecycle),
        })
    }

    pub fn lifecycle(store: &ContinuityStore, id: Uuid, now: f64) -> Option<LifecycleState> {
        store
            .node(id)
            .map(|n| LifecycleState::classify(n, now, &store.config().lifecycle))
    }
}
