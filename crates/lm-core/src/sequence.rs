use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::tokenizer::EvidenceToken;

/// A token stamped with the time of the evidence that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenEvent {
    pub token: EvidenceToken,
    pub ts: f64,
}

/// Per-node insertion-ordered token queue bounded by count and time span.
///
/// Every append trims the front until both bounds hold again. Trimming only
/// removes entries, so the buffer never exceeds `max_len` and never spans
/// more than `window_secs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceBuffer {
    max_len: usize,
    window_secs: f64,
    entries: VecDeque<TokenEvent>,
}

impl SequenceBuffer {
    pub fn new(max_len: usize, window_secs: f64) -> Self {
        let max_len = max_len.max(1);
        Self {
            max_len,
            window_secs: window_secs.max(0.0),
            entries: VecDeque::with_capacity(max_len),
        }
    }

    /// Append and trim. Returns how many entries were dropped.
    pub fn push(&mut self, token: EvidenceToken, ts: f64) -> usize {
        self.entries.push_back(TokenEvent { token, ts });
        let mut dropped = 0;

        while self.entries.len() > self.max_len {
            self.entries.pop_front();
            dropped += 1;
        }

        let cutoff = ts - self.window_secs;
        while self.entries.front().is_some_and(|e| e.ts < cutoff) {
            self.entries.pop_front();
            dropped += 1;
        }

        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_len
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TokenEvent> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn tokens(&self) -> Vec<EvidenceToken> {
        self.entries.iter().map(|e| e.token).collect()
    }

    pub fn oldest_ts(&self) -> Option<f64> {
        self.entries.front().map(|e| e.ts)
    }

    pub fn newest_ts(&self) -> Option<f64> {
        self.entries.back().map(|e| e.ts)
    }

    /// Last `n` tokens in chronological order.
    pub fn recent(&self, n: usize) -> Vec<TokenEvent> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).copied().collect()
    }

    /// Entries with `start <= ts <= end`, chronological.
    pub fn range(&self, start: f64, end: f64) -> Vec<TokenEvent> {
        self.entries
            .iter()
            .filter(|e| e.ts >= start && e.ts <= end)
            .copied()
            .collect()
    }

    pub fn histogram(&self) -> BTreeMap<EvidenceToken, usize> {
        let mut counts = BTreeMap::new();
        for e in &self.entries {
            *counts.entry(e.token).or_insert(0) += 1;
        }
        counts
    }
}
