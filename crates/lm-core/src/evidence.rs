use serde::{Deserialize, Serialize};

use crate::error::{Result, ensure_non_negative};

/// Resting side of an orderbook level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

/// Initiating side of an executed trade, when the feed reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggressor {
    Buyer,
    Seller,
    #[default]
    Unknown,
}

/// Position side that was liquidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidationSide {
    Long,
    Short,
}

/// One timestamped market observation as delivered by the upstream pipeline.
///
/// Wire shape (one JSON object per line when replayed):
/// `{"ts": 1700000000.0, "price": 42000.0, "type": "trade", "volume_usd": 2500.0}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceEvent {
    pub ts: f64,
    pub price: f64,
    #[serde(flatten)]
    pub kind: EvidenceKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvidenceKind {
    Orderbook {
        side: BookSide,
        size: f64,
        #[serde(default)]
        prev_size: f64,
        #[serde(default)]
        resting_secs: f64,
    },
    Trade {
        volume_usd: f64,
        #[serde(default)]
        aggressor: Aggressor,
    },
    Liquidation {
        volume_usd: f64,
        side: LiquidationSide,
        #[serde(default = "default_cascade")]
        cascade_size: u32,
    },
    PriceCrossing {
        was_inside: bool,
        is_inside: bool,
        #[serde(default)]
        dwell_secs: f64,
        #[serde(default)]
        visits_without_break: u32,
    },
}

fn default_cascade() -> u32 {
    1
}

impl EvidenceEvent {
    pub fn new(ts: f64, price: f64, kind: EvidenceKind) -> Self {
        Self { ts, price, kind }
    }

    /// Reject payloads that could corrupt node counters.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("ts", self.ts)?;
        ensure_non_negative("price", self.price)?;
        match &self.kind {
            EvidenceKind::Orderbook {
                size,
                prev_size,
                resting_secs,
                ..
            } => {
                ensure_non_negative("size", *size)?;
                ensure_non_negative("prev_size", *prev_size)?;
                ensure_non_negative("resting_secs", *resting_secs)
            }
            EvidenceKind::Trade { volume_usd, .. } => ensure_non_negative("volume_usd", *volume_usd),
            EvidenceKind::Liquidation { volume_usd, .. } => {
                ensure_non_negative("volume_usd", *volume_usd)
            }
            EvidenceKind::PriceCrossing { dwell_secs, .. } => {
                ensure_non_negative("dwell_secs", *dwell_secs)
            }
        }
    }

    pub fn category(&self) -> EvidenceCategory {
        match self.kind {
            EvidenceKind::Orderbook { .. } => EvidenceCategory::Orderbook,
            EvidenceKind::Trade { .. } => EvidenceCategory::Trade,
            EvidenceKind::Liquidation { .. } => EvidenceCategory::Liquidation,
            EvidenceKind::PriceCrossing { .. } => EvidenceCategory::PriceTouch,
        }
    }
}

/// Counter family an event updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceCategory {
    Orderbook,
    Trade,
    Liquidation,
    PriceTouch,
}

impl EvidenceCategory {
    /// Whether evidence of this category counts as an interaction and can
    /// revive a dormant node.
    pub fn is_interaction(&self) -> bool {
        !matches!(self, Self::PriceTouch)
    }

    /// Contribution of one fresh piece of evidence when a dormant node revives.
    pub fn revival_strength(&self) -> f64 {
        match self {
            Self::Orderbook => 0.3,
            Self::Trade => 0.4,
            Self::Liquidation => 0.3,
            Self::PriceTouch => 0.0,
        }
    }
}
