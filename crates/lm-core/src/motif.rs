use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::MOTIF_OCCURRENCE_BOOST;
use crate::tokenizer::EvidenceToken;

/// A consecutive 2- or 3-token subsequence. Ordered lexicographically by
/// token; serialized as `"TRADE_EXEC>PRICE_TOUCH"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MotifKey(Vec<EvidenceToken>);

impl MotifKey {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 3;

    /// `None` unless the pattern has 2 or 3 tokens.
    pub fn new(tokens: &[EvidenceToken]) -> Option<Self> {
        if (Self::MIN_LEN..=Self::MAX_LEN).contains(&tokens.len()) {
            Some(Self(tokens.to_vec()))
        } else {
            None
        }
    }

    pub fn tokens(&self) -> &[EvidenceToken] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[EvidenceToken]> for MotifKey {
    fn borrow(&self) -> &[EvidenceToken] {
        &self.0
    }
}

impl fmt::Display for MotifKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.0.iter().map(|t| t.as_str()).collect();
        f.write_str(&parts.join(">"))
    }
}

impl FromStr for MotifKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = s
            .split(['>', ','])
            .map(str::parse::<EvidenceToken>)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(&tokens).ok_or_else(|| format!("motif must have 2 or 3 tokens: '{s}'"))
    }
}

impl Serialize for MotifKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MotifKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotifStats {
    /// Occurrences counted so far. Never decreases.
    pub count: u64,
    pub last_seen: f64,
    /// Decayed scalar in [0, 1].
    pub strength: f64,
}

/// Per-node motif counts, owned by and decayed with its node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotifIndex {
    max_motifs: usize,
    decayed_through: f64,
    /// Occurrences of new patterns not inserted because the cap was reached.
    overflow: u64,
    motifs: BTreeMap<MotifKey, MotifStats>,
}

impl MotifIndex {
    pub fn new(max_motifs: usize, created_at: f64) -> Self {
        Self {
            max_motifs,
            decayed_through: created_at,
            overflow: 0,
            motifs: BTreeMap::new(),
        }
    }

    /// Re-extract every bigram and trigram from the full buffer contents.
    ///
    /// Existing strengths are first decayed to `ts` at `rate`; then every
    /// occurrence (overlapping ones included) adds 1 to its motif's count.
    pub fn observe(&mut self, tokens: &[EvidenceToken], ts: f64, rate: f64) {
        self.decay(ts, rate);
        for len in MotifKey::MIN_LEN..=MotifKey::MAX_LEN {
            for window in tokens.windows(len) {
                self.bump(window, ts);
            }
        }
    }

    fn bump(&mut self, window: &[EvidenceToken], ts: f64) {
        if let Some(stats) = self.motifs.get_mut(window) {
            stats.count += 1;
            stats.last_seen = ts;
            stats.strength = (stats.strength + MOTIF_OCCURRENCE_BOOST).min(1.0);
            return;
        }

        if self.motifs.len() >= self.max_motifs {
            self.overflow += 1;
            return;
        }

        if let Some(key) = MotifKey::new(window) {
            self.motifs.insert(
                key,
                MotifStats {
                    count: 1,
                    last_seen: ts,
                    strength: MOTIF_OCCURRENCE_BOOST.min(1.0),
                },
            );
        }
    }

    /// Strength-only decay to `now`. Counts and `last_seen` are untouched;
    /// a rate of zero freezes the index.
    pub fn decay(&mut self, now: f64, rate: f64) {
        let dt = now - self.decayed_through;
        if dt <= 0.0 {
            return;
        }
        if rate > 0.0 {
            let factor = (1.0 - rate * dt).max(0.0);
            for stats in self.motifs.values_mut() {
                stats.strength = (stats.strength * factor).clamp(0.0, 1.0);
            }
        }
        self.decayed_through = now;
    }

    pub fn get(&self, tokens: &[EvidenceToken]) -> Option<&MotifStats> {
        self.motifs.get(tokens)
    }

    /// Motifs in lexicographic key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MotifKey, &MotifStats)> {
        self.motifs.iter()
    }

    pub fn len(&self) -> usize {
        self.motifs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motifs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_motifs
    }

    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    pub fn decayed_through(&self) -> f64 {
        self.decayed_through
    }

    pub fn summary(&self) -> MotifSummary {
        let mut summary = MotifSummary::default();
        for (key, stats) in &self.motifs {
            match key.len() {
                2 => summary.distinct_bigrams += 1,
                _ => summary.distinct_trigrams += 1,
            }
            summary.total_occurrences += stats.count;
        }
        summary.overflow = self.overflow;
        summary
    }
}

/// Factual totals over one or more motif indexes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotifSummary {
    pub distinct_bigrams: usize,
    pub distinct_trigrams: usize,
    pub total_occurrences: u64,
    pub overflow: u64,
}

impl MotifSummary {
    pub fn merge(&mut self, other: &MotifSummary) {
        self.distinct_bigrams += other.distinct_bigrams;
        self.distinct_trigrams += other.distinct_trigrams;
        self.total_occurrences += other.total_occurrences;
        self.overflow += other.overflow;
    }
}
