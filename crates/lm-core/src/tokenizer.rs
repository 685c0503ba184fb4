use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::TokenizerConfig;
use crate::evidence::{EvidenceEvent, EvidenceKind};

/// Closed vocabulary of neutral evidence tokens.
///
/// Each token names an observable event (existence, threshold crossing,
/// duration). None encodes direction or intent. Declaration order defines
/// the lexicographic ordering used for motif keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceToken {
    ObAppear,
    ObPersist,
    ObVanish,
    TradeExec,
    TradeVolumeHigh,
    LiqOccur,
    LiqCascade,
    PriceTouch,
    PriceExit,
    PriceDwell,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenFamily {
    Orderbook,
    Trade,
    Liquidation,
    Price,
}

impl EvidenceToken {
    pub const ALL: [EvidenceToken; 10] = [
        Self::ObAppear,
        Self::ObPersist,
        Self::ObVanish,
        Self::TradeExec,
        Self::TradeVolumeHigh,
        Self::LiqOccur,
        Self::LiqCascade,
        Self::PriceTouch,
        Self::PriceExit,
        Self::PriceDwell,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ObAppear => "OB_APPEAR",
            Self::ObPersist => "OB_PERSIST",
            Self::ObVanish => "OB_VANISH",
            Self::TradeExec => "TRADE_EXEC",
            Self::TradeVolumeHigh => "TRADE_VOLUME_HIGH",
            Self::LiqOccur => "LIQ_OCCUR",
            Self::LiqCascade => "LIQ_CASCADE",
            Self::PriceTouch => "PRICE_TOUCH",
            Self::PriceExit => "PRICE_EXIT",
            Self::PriceDwell => "PRICE_DWELL",
        }
    }

    pub fn family(&self) -> TokenFamily {
        match self {
            Self::ObAppear | Self::ObPersist | Self::ObVanish => TokenFamily::Orderbook,
            Self::TradeExec | Self::TradeVolumeHigh => TokenFamily::Trade,
            Self::LiqOccur | Self::LiqCascade => TokenFamily::Liquidation,
            Self::PriceTouch | Self::PriceExit | Self::PriceDwell => TokenFamily::Price,
        }
    }
}

impl fmt::Display for EvidenceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceToken {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| format!("unknown evidence token '{s}'"))
    }
}

/// Map one observation to at most one token.
///
/// Observations matching no trigger (a resting level that changed size but
/// has not persisted yet, a price that stayed outside) produce `None`.
pub fn tokenize(event: &EvidenceEvent, config: &TokenizerConfig) -> Option<EvidenceToken> {
    match event.kind {
        EvidenceKind::Orderbook {
            size,
            prev_size,
            resting_secs,
            ..
        } => {
            if prev_size <= 0.0 && size > 0.0 {
                Some(EvidenceToken::ObAppear)
            } else if prev_size > 0.0 && size <= 0.0 {
                Some(EvidenceToken::ObVanish)
            } else if size > 0.0 && resting_secs >= config.persist_secs {
                Some(EvidenceToken::ObPersist)
            } else {
                None
            }
        }
        EvidenceKind::Trade { volume_usd, .. } => {
            if volume_usd >= config.high_volume_usd {
                Some(EvidenceToken::TradeVolumeHigh)
            } else {
                Some(EvidenceToken::TradeExec)
            }
        }
        EvidenceKind::Liquidation { cascade_size, .. } => {
            if cascade_size >= config.cascade_min_size {
                Some(EvidenceToken::LiqCascade)
            } else {
                Some(EvidenceToken::LiqOccur)
            }
        }
        EvidenceKind::PriceCrossing {
            was_inside,
            is_inside,
            dwell_secs,
            ..
        } => match (was_inside, is_inside) {
            (false, true) => Some(EvidenceToken::PriceTouch),
            (true, false) => Some(EvidenceToken::PriceExit),
            (true, true) if dwell_secs >= config.dwell_secs => Some(EvidenceToken::PriceDwell),
            _ => None,
        },
    }
}
