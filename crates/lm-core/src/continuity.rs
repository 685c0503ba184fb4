//! Partitioned node collection: active, dormant and archived nodes, with
//! dormancy snapshots and revival from historical evidence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MemoryConfig;
use crate::constants::{
    REVIVAL_HISTORY_CAP, REVIVAL_INTERACTION_WEIGHT, REVIVAL_VOLUME_CAP, REVIVAL_VOLUME_SCALE,
};
use crate::decay::{Invalidation, apply_decay};
use crate::error::{EvidenceError, Result, ensure_non_negative};
use crate::evidence::{BookSide, EvidenceCategory, EvidenceEvent, EvidenceKind};
use crate::node::{CreationReason, CreationTrigger, MemoryNode, NodeSide};
use crate::tokenizer::{EvidenceToken, tokenize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Active,
    Dormant,
    Archived,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Dormant => "dormant",
            Self::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "dormant" => Some(Self::Dormant),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Historical evidence captured when a node goes dormant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DormantSnapshot {
    pub dormant_since: f64,
    pub strength_at_dormancy: f64,
    pub interaction_count: u64,
    pub volume_total: f64,
    pub liquidations_in_band: u64,
}

impl DormantSnapshot {
    fn capture(node: &MemoryNode, now: f64) -> Self {
        Self {
            dormant_since: now,
            strength_at_dormancy: node.strength,
            interaction_count: node.evidence.interaction_count,
            volume_total: node.volume.total,
            liquidations_in_band: node.liquidations.in_band,
        }
    }
}

/// Strength a dormant node resumes at when fresh evidence arrives.
///
/// History and volume factors are capped; the sum is clamped to [0, 1].
pub fn revival_strength(snapshot: &DormantSnapshot, category: EvidenceCategory) -> f64 {
    let history = (snapshot.interaction_count as f64 * REVIVAL_INTERACTION_WEIGHT)
        .min(REVIVAL_HISTORY_CAP);
    let volume = (snapshot.volume_total / REVIVAL_VOLUME_SCALE).min(REVIVAL_VOLUME_CAP);
    (history + volume + category.revival_strength()).clamp(0.0, 1.0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub node: MemoryNode,
    pub partition: Partition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<DormantSnapshot>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCounts {
    pub active: usize,
    pub dormant: usize,
    pub archived: usize,
}

impl PartitionCounts {
    pub fn total(&self) -> usize {
        self.active + self.dormant + self.archived
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Dormant { id: Uuid, strength: f64 },
    Archived { id: Uuid, from: Partition },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub now: f64,
    pub decayed: usize,
    pub invalidated: Vec<(Uuid, Invalidation)>,
    pub transitions: Vec<Transition>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub id: Uuid,
    /// `None` when the observation matched no token and nothing was recorded.
    pub token: Option<EvidenceToken>,
    pub revived: bool,
    pub strength: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Recorded(RecordOutcome),
    Created {
        reason: CreationReason,
        record: RecordOutcome,
    },
    /// No band covers the price and the event does not justify a new one.
    Ignored,
}

impl IngestOutcome {
    pub fn node_id(&self) -> Option<Uuid> {
        match self {
            Self::Recorded(r) | Self::Created { record: r, .. } => Some(r.id),
            Self::Ignored => None,
        }
    }
}

/// Owns every node. Nodes move between partitions; none is ever dropped.
#[derive(Clone, Debug, Default)]
pub struct ContinuityStore {
    config: MemoryConfig,
    entries: Vec<NodeEntry>,
    index: HashMap<Uuid, usize>,
}

impl ContinuityStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild from persisted entries, re-checking every node.
    pub fn from_entries(config: MemoryConfig, entries: Vec<NodeEntry>) -> Result<Self> {
        let mut store = Self::new(config);
        for entry in entries {
            entry.node.check_invariants()?;
            let id = entry.node.id;
            if store.index.contains_key(&id) {
                return Err(EvidenceError::Broken(format!("duplicate node id {id}")));
            }
            if (entry.partition == Partition::Archived) != entry.node.archived {
                return Err(EvidenceError::Broken(format!(
                    "node {id} archived flag disagrees with partition {}",
                    entry.partition.as_str()
                )));
            }
            if (entry.partition == Partition::Active) != entry.node.active {
                return Err(EvidenceError::Broken(format!(
                    "node {id} active flag disagrees with partition {}",
                    entry.partition.as_str()
                )));
            }
            if (entry.partition == Partition::Dormant) != entry.snapshot.is_some() {
                return Err(EvidenceError::Broken(format!(
                    "node {id} in partition {} has {} dormancy snapshot",
                    entry.partition.as_str(),
                    if entry.snapshot.is_some() { "a" } else { "no" }
                )));
            }
            store.index.insert(id, store.entries.len());
            store.entries.push(entry);
        }
        Ok(store)
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in creation order.
    pub fn entries(&self) -> &[NodeEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<NodeEntry> {
        self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&NodeEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn node(&self, id: Uuid) -> Option<&MemoryNode> {
        self.get(id).map(|e| &e.node)
    }

    pub fn partition_of(&self, id: Uuid) -> Option<Partition> {
        self.get(id).map(|e| e.partition)
    }

    pub fn counts(&self) -> PartitionCounts {
        let mut counts = PartitionCounts::default();
        for entry in &self.entries {
            match entry.partition {
                Partition::Active => counts.active += 1,
                Partition::Dormant => counts.dormant += 1,
                Partition::Archived => counts.archived += 1,
            }
        }
        counts
    }

    fn slot(&self, id: Uuid) -> Result<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(EvidenceError::UnknownNode(id))
    }

    // --- Creation ---

    /// Create a node if `trigger` meets its threshold. Returns `None` when
    /// it does not.
    pub fn create_node(
        &mut self,
        trigger: CreationTrigger,
        price_center: f64,
        half_width: f64,
        side: NodeSide,
        ts: f64,
    ) -> Result<Option<Uuid>> {
        ensure_non_negative("price_center", price_center)?;
        ensure_non_negative("half_width", half_width)?;
        ensure_non_negative("ts", ts)?;
        if half_width <= 0.0 {
            return Err(EvidenceError::Broken(format!(
                "band half-width must be positive, got {half_width}"
            )));
        }
        if !trigger.qualifies(&self.config.creation) {
            return Ok(None);
        }

        let node = MemoryNode::new(&trigger, price_center, half_width, side, ts, &self.config);
        let id = node.id;
        self.index.insert(id, self.entries.len());
        self.entries.push(NodeEntry {
            node,
            partition: Partition::Active,
            snapshot: None,
        });
        Ok(Some(id))
    }

    // --- Evidence ---

    /// Record one observation against node `id`.
    ///
    /// The node is decayed to the event time first and moved between
    /// partitions exactly as [`tick`](Self::tick) would. A node that decays
    /// below the archive threshold is archived and the event is rejected.
    /// Interaction evidence on a dormant node revives it. Validation runs
    /// before any mutation.
    pub fn record_evidence(&mut self, id: Uuid, event: &EvidenceEvent) -> Result<RecordOutcome> {
        event.validate()?;
        let slot = self.slot(id)?;
        let entry = &self.entries[slot];
        if entry.partition == Partition::Archived {
            return Err(EvidenceError::Archived(id));
        }
        if event.ts < entry.node.latest_evidence_ts {
            return Err(EvidenceError::TimestampRegression {
                ts: event.ts,
                latest: entry.node.latest_evidence_ts,
            });
        }

        let Some(token) = tokenize(event, &self.config.tokenizer) else {
            return Ok(RecordOutcome {
                id,
                token: None,
                revived: false,
                strength: entry.node.strength,
            });
        };

        let config = &self.config;
        let entry = &mut self.entries[slot];
        let result = apply_decay(&entry.node, event.ts, None, &config.decay, &config.lifecycle);
        entry.node.apply_decay_result(&result);
        settle(entry, event.ts, config);
        if entry.partition == Partition::Archived {
            return Err(EvidenceError::Archived(id));
        }

        let lc = &config.lifecycle;
        match event.kind {
            EvidenceKind::Orderbook { .. } => {
                entry.node.record_orderbook_appearance(event.ts, token, lc)?
            }
            EvidenceKind::Trade {
                volume_usd,
                aggressor,
            } => entry
                .node
                .record_trade_execution(event.ts, volume_usd, aggressor, token, lc)?,
            EvidenceKind::Liquidation {
                side, cascade_size, ..
            } => entry
                .node
                .record_liquidation(event.ts, side, cascade_size, token, lc)?,
            EvidenceKind::PriceCrossing { .. } => {
                entry.node.record_price_touch(event.ts, token, lc)?
            }
        }

        let category = event.category();
        let mut revived = false;
        if entry.partition == Partition::Dormant
            && category.is_interaction()
            && let Some(snapshot) = entry.snapshot.take()
        {
            let strength = revival_strength(&snapshot, category);
            entry.node.revive(strength, event.ts, config.decay.active_rate);
            entry.partition = Partition::Active;
            revived = true;
        }

        Ok(RecordOutcome {
            id,
            token: Some(token),
            revived,
            strength: entry.node.strength,
        })
    }

    // --- Decay ---

    /// Decay every non-archived node to `now` and move nodes between
    /// partitions. Archived nodes are not touched.
    pub fn tick(&mut self, now: f64, current_price: Option<f64>) -> TickReport {
        let mut report = TickReport {
            now,
            ..TickReport::default()
        };
        let config = &self.config;

        for entry in &mut self.entries {
            if entry.partition == Partition::Archived {
                continue;
            }
            let id = entry.node.id;
            let result = apply_decay(
                &entry.node,
                now,
                current_price,
                &config.decay,
                &config.lifecycle,
            );
            entry.node.apply_decay_result(&result);
            report.decayed += 1;
            if let Some(inv) = result.invalidation {
                report.invalidated.push((id, inv));
            }

            if let Some(transition) = settle(entry, now, config) {
                report.transitions.push(transition);
            }
        }

        report
    }

    // --- Routing ---

    /// Best non-archived band containing `price`: active before dormant,
    /// then nearest center, then lowest id.
    pub fn find_band(&self, price: f64) -> Option<Uuid> {
        self.best_match(price, |node| node.contains(price))
    }

    /// Best non-archived band whose edge lies within `bps` of `price`.
    pub fn find_within_bps(&self, price: f64, bps: f64) -> Option<Uuid> {
        self.best_match(price, |node| node.distance_bps(price) <= bps)
    }

    fn best_match(&self, price: f64, accept: impl Fn(&MemoryNode) -> bool) -> Option<Uuid> {
        self.entries
            .iter()
            .filter(|e| e.partition != Partition::Archived && accept(&e.node))
            .min_by(|a, b| {
                a.partition
                    .cmp(&b.partition)
                    .then_with(|| {
                        let da = (a.node.price_center - price).abs();
                        let db = (b.node.price_center - price).abs();
                        da.total_cmp(&db)
                    })
                    .then_with(|| a.node.id.cmp(&b.node.id))
            })
            .map(|e| e.node.id)
    }

    /// Route an observation to an existing band, or create one when the
    /// event qualifies and no band covers its price.
    pub fn ingest(&mut self, event: &EvidenceEvent) -> Result<IngestOutcome> {
        event.validate()?;
        let target = match event.kind {
            EvidenceKind::Liquidation { .. } => self.find_within_bps(
                event.price,
                self.config.creation.liquidation_proximity_bps,
            ),
            _ => self.find_band(event.price),
        };
        if let Some(id) = target {
            match self.record_evidence(id, event) {
                Ok(record) => return Ok(IngestOutcome::Recorded(record)),
                // The band decayed out from under the event; route again.
                Err(EvidenceError::Archived(_)) => return self.ingest(event),
                Err(e) => return Err(e),
            }
        }

        let Some((trigger, side)) = creation_trigger(event) else {
            return Ok(IngestOutcome::Ignored);
        };
        let half_width = event.price * self.config.creation.default_half_width_bps / 10_000.0;
        if half_width <= 0.0 {
            return Ok(IngestOutcome::Ignored);
        }
        let Some(id) = self.create_node(trigger, event.price, half_width, side, event.ts)? else {
            return Ok(IngestOutcome::Ignored);
        };
        let record = self.record_evidence(id, event)?;
        Ok(IngestOutcome::Created {
            reason: trigger.reason(),
            record,
        })
    }
}

/// Move a freshly decayed entry to the partition its strength calls for.
fn settle(entry: &mut NodeEntry, now: f64, config: &MemoryConfig) -> Option<Transition> {
    let id = entry.node.id;
    let strength = entry.node.strength;
    let partition = entry.partition;
    match partition {
        Partition::Archived => None,
        from if strength < config.lifecycle.archive_threshold => {
            entry.node.archive();
            entry.partition = Partition::Archived;
            entry.snapshot = None;
            Some(Transition::Archived { id, from })
        }
        Partition::Active if strength < config.lifecycle.dormancy_threshold => {
            entry.snapshot = Some(DormantSnapshot::capture(&entry.node, now));
            entry.node.enter_dormancy(config.decay.dormant_rate());
            entry.partition = Partition::Dormant;
            Some(Transition::Dormant { id, strength })
        }
        _ => None,
    }
}

fn creation_trigger(event: &EvidenceEvent) -> Option<(CreationTrigger, NodeSide)> {
    match event.kind {
        EvidenceKind::Orderbook {
            side,
            size,
            resting_secs,
            ..
        } if size > 0.0 => {
            let side = match side {
                BookSide::Bid => NodeSide::Bid,
                BookSide::Ask => NodeSide::Ask,
            };
            Some((
                CreationTrigger::OrderbookPersistence {
                    persistence_secs: resting_secs,
                },
                side,
            ))
        }
        EvidenceKind::Orderbook { .. } => None,
        EvidenceKind::Trade { volume_usd, .. } => Some((
            CreationTrigger::ExecutedLiquidity { volume_usd },
            NodeSide::Both,
        )),
        EvidenceKind::Liquidation { cascade_size, .. } => Some((
            CreationTrigger::LiquidationProximity {
                distance_bps: 0.0,
                liquidation_count: cascade_size,
            },
            NodeSide::Both,
        )),
        EvidenceKind::PriceCrossing {
            visits_without_break,
            ..
        } => Some((
            CreationTrigger::PriceRejection {
                visit_count: visits_without_break,
            },
            NodeSide::Both,
        )),
    }
}
