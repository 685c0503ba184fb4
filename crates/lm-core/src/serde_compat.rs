//! Versioned JSON export of a whole continuity store.
//!
//! Each entry carries the complete node record (counters, histories,
//! sequence buffer, motif map) plus its partition and dormant snapshot, so
//! an import reproduces the exported state exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MemoryConfig;
use crate::continuity::{ContinuityStore, NodeEntry};
use crate::error::EvidenceError;
use crate::time::now_iso8601;

pub const CURRENT_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed export: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported export version {found}")]
    Version { found: String },

    #[error("export rejected: {0}")]
    Invalid(#[from] EvidenceError),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WireExport {
    pub version: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub config: MemoryConfig,
    pub nodes: Vec<NodeEntry>,
}

impl WireExport {
    pub fn from_store(store: &ContinuityStore) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            timestamp: now_iso8601(),
            config: store.config().clone(),
            nodes: store.entries().to_vec(),
        }
    }

    pub fn into_store(self) -> Result<ContinuityStore, WireError> {
        if major(&self.version) != major(CURRENT_VERSION) {
            return Err(WireError::Version {
                found: self.version,
            });
        }
        Ok(ContinuityStore::from_entries(self.config, self.nodes)?)
    }
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

pub fn import_json(json: &str) -> Result<ContinuityStore, WireError> {
    let wire: WireExport = serde_json::from_str(json)?;
    wire.into_store()
}

pub fn export_json(store: &ContinuityStore) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&WireExport::from_store(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuity::Partition;
    use crate::evidence::{Aggressor, EvidenceEvent, EvidenceKind, LiquidationSide};

    fn populated() -> ContinuityStore {
        let mut store = ContinuityStore::new(MemoryConfig::default());
        let events = [
            EvidenceEvent::new(
                0.0,
                42_000.0,
                EvidenceKind::Trade {
                    volume_usd: 3_333.33,
                    aggressor: Aggressor::Buyer,
                },
            ),
            EvidenceEvent::new(
                1.5,
                42_001.0,
                EvidenceKind::Liquidation {
                    volume_usd: 12_000.0,
                    side: LiquidationSide::Short,
                    cascade_size: 3,
                },
            ),
            EvidenceEvent::new(
                2.25,
                42_002.0,
                EvidenceKind::PriceCrossing {
                    was_inside: true,
                    is_inside: false,
                    dwell_secs: 0.0,
                    visits_without_break: 0,
                },
            ),
            EvidenceEvent::new(
                10.0,
                50_000.0,
                EvidenceKind::Trade {
                    volume_usd: 1_000.1,
                    aggressor: Aggressor::Seller,
                },
            ),
        ];
        for ev in &events {
            store.ingest(ev).unwrap();
        }
        store.tick(7_777.7, Some(50_000.0));
        store
    }

    #[test]
    fn test_roundtrip_is_exact() {
        let store = populated();
        let json = export_json(&store).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.entries(), store.entries());
        assert_eq!(back.config(), store.config());
        assert_eq!(back.counts(), store.counts());
    }

    #[test]
    fn test_roundtrip_preserves_partitions() {
        let store = populated();
        let back = import_json(&export_json(&store).unwrap()).unwrap();
        for entry in store.entries() {
            assert_eq!(back.partition_of(entry.node.id), Some(entry.partition));
        }
        assert!(store.counts().dormant + store.counts().archived > 0);
        assert!(
            back.entries()
                .iter()
                .filter(|e| e.partition == Partition::Dormant)
                .all(|e| e.snapshot.is_some())
        );
    }

    #[test]
    fn test_version_field() {
        let json = export_json(&ContinuityStore::default()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["version"], CURRENT_VERSION);
        assert!(v["nodes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_rejects_future_major_version() {
        let json = r#"{"version": "2.0", "nodes": []}"#;
        assert!(matches!(import_json(json), Err(WireError::Version { .. })));
    }

    #[test]
    fn test_minimal_document_uses_default_config() {
        let store = import_json(r#"{"version": "1.3", "nodes": []}"#).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.config(), &MemoryConfig::default());
    }

    #[test]
    fn test_rejects_broken_counters() {
        let store = populated();
        let mut v: serde_json::Value = serde_json::from_str(&export_json(&store).unwrap()).unwrap();
        v["nodes"][0]["node"]["evidence"]["interaction_count"] = serde_json::json!(999);
        let err = import_json(&v.to_string()).unwrap_err();
        assert!(matches!(err, WireError::Invalid(EvidenceError::Broken(_))));
    }

    #[test]
    fn test_rejects_dormant_without_snapshot() {
        let store = populated();
        let mut v: serde_json::Value = serde_json::from_str(&export_json(&store).unwrap()).unwrap();
        let dormant = v["nodes"]
            .as_array_mut()
            .unwrap()
            .iter_mut()
            .find(|n| n["partition"] == "dormant")
            .expect("populated store has a dormant node");
        dormant.as_object_mut().unwrap().remove("snapshot");
        let err = import_json(&v.to_string()).unwrap_err();
        assert!(matches!(err, WireError::Invalid(EvidenceError::Broken(_))));
    }

    #[test]
    fn test_garbage_is_a_json_error() {
        assert!(matches!(import_json("not json"), Err(WireError::Json(_))));
    }
}
