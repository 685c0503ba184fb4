//! Liquidity memory engine.
//!
//! Keeps a decaying, evidence-weighted record of which price bands have
//! mattered historically. Market observations become neutral tokens,
//! accumulate on per-band memory nodes, form short motifs, and weaken with
//! time until the node goes dormant or is archived. Nothing here predicts,
//! ranks or signals; the query interface returns factual aggregates only.
//!
//! Zero I/O: no persistence, transport or logging opinions.

pub mod config;
pub mod constants;
pub mod continuity;
pub mod decay;
pub mod error;
pub mod evidence;
pub mod history;
pub mod motif;
pub mod node;
pub mod query;
pub mod sequence;
pub mod serde_compat;
pub mod time;
pub mod tokenizer;

pub use config::{
    CreationConfig, DecayConfig, LifecycleConfig, MemoryConfig, SequenceConfig, TokenizerConfig,
};
pub use continuity::{
    ContinuityStore, DormantSnapshot, IngestOutcome, NodeEntry, Partition, PartitionCounts,
    RecordOutcome, TickReport, Transition, revival_strength,
};
pub use decay::{DecayResult, Invalidation, LifecycleState, apply_decay};
pub use error::EvidenceError;
pub use evidence::{
    Aggressor, BookSide, EvidenceCategory, EvidenceEvent, EvidenceKind, LiquidationSide,
};
pub use history::{BoundedHistory, CheckpointCause, StrengthCheckpoint};
pub use motif::{MotifIndex, MotifKey, MotifStats, MotifSummary};
pub use node::{CreationReason, CreationTrigger, MemoryNode, NodeSide};
pub use query::{BufferMetadata, DecayState, MotifEntry, MotifOccurrence, NodeSummary, QueryEngine};
pub use sequence::{SequenceBuffer, TokenEvent};
pub use serde_compat::{CURRENT_VERSION, WireError, WireExport, export_json, import_json};
pub use tokenizer::{EvidenceToken, TokenFamily, tokenize};
