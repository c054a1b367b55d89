//! Detection results shared between the poller, the sequencer and the GUI.
//!
//! Each poller cycle builds one immutable `DetectionSnapshot` holding both
//! the rank counts and the object list, and swaps it in by reference. Readers
//! therefore never observe counts from one frame paired with objects from
//! another.

#[cfg(any(windows, test))]
use std::sync::{Arc, RwLock};

use crate::automation::settings::AutomationSettings;
use crate::detection::{DetectedObject, RankTable};

/// Per-rank object counts, in rank-table order. Every rank is present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankCounts {
    counts: Vec<(String, u32)>,
}

impl RankCounts {
    /// All ranks at zero.
    pub fn zeroed(ranks: &RankTable) -> Self {
        Self {
            counts: ranks.iter().map(|r| (r.name.clone(), 0)).collect(),
        }
    }

    pub fn from_objects(ranks: &RankTable, objects: &[DetectedObject]) -> Self {
        let mut counts = Self::zeroed(ranks);
        for object in objects {
            if let Some(entry) = counts.counts.get_mut(object.ordinal as usize) {
                entry.1 += 1;
            }
        }
        counts
    }

    /// Count for a rank; unknown ranks count zero.
    #[cfg(test)]
    pub fn get(&self, rank: &str) -> u32 {
        self.counts
            .iter()
            .find(|(name, _)| name == rank)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().map(|(_, n)| n).sum()
    }

    /// Objects whose rank ordinal is at least `min_ordinal`.
    pub fn at_least(&self, min_ordinal: u8) -> u32 {
        self.counts
            .iter()
            .skip(min_ordinal as usize)
            .map(|(_, n)| n)
            .sum()
    }

    /// Objects of the highest rank.
    pub fn top(&self) -> u32 {
        self.counts.last().map(|(_, n)| *n).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(name, n)| (name.as_str(), *n))
    }
}

/// Result of one detection cycle.
#[derive(Clone, Debug)]
pub struct DetectionSnapshot {
    pub counts: RankCounts,
    pub objects: Vec<DetectedObject>,
}

impl DetectionSnapshot {
    pub fn new(ranks: &RankTable, objects: Vec<DetectedObject>) -> Self {
        Self {
            counts: RankCounts::from_objects(ranks, &objects),
            objects,
        }
    }

    #[cfg(any(windows, test))]
    pub fn empty(ranks: &RankTable) -> Self {
        Self {
            counts: RankCounts::zeroed(ranks),
            objects: Vec::new(),
        }
    }
}

/// Latest published snapshot.
#[cfg(any(windows, test))]
pub struct DetectionCell {
    latest: RwLock<Arc<DetectionSnapshot>>,
}

#[cfg(any(windows, test))]
impl DetectionCell {
    pub fn new(ranks: &RankTable) -> Self {
        Self {
            latest: RwLock::new(Arc::new(DetectionSnapshot::empty(ranks))),
        }
    }

    /// Replaces the current snapshot. The lock is held only for the swap.
    pub fn publish(&self, snapshot: Arc<DetectionSnapshot>) {
        let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
        *latest = snapshot;
    }

    pub fn latest(&self) -> Arc<DetectionSnapshot> {
        let latest = self.latest.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&latest)
    }
}

/// Operator thresholds at which rerolling stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopCondition {
    pub min_rank_ordinal: u8,
    pub min_objects: u32,
    /// 0 disables the top-rank clause
    pub stop_at_top: u32,
}

impl StopCondition {
    /// An unknown minimum rank falls back to the lowest rank.
    pub fn from_settings(settings: &AutomationSettings, ranks: &RankTable) -> Self {
        Self {
            min_rank_ordinal: ranks.ordinal_of(&settings.min_rank).unwrap_or(0),
            min_objects: settings.min_objects,
            stop_at_top: settings.stop_at_top,
        }
    }

    pub fn eligible(&self, counts: &RankCounts) -> u32 {
        counts.at_least(self.min_rank_ordinal)
    }

    pub fn is_met(&self, counts: &RankCounts) -> bool {
        let top_reached = self.stop_at_top > 0 && counts.top() >= self.stop_at_top;
        top_reached || self.eligible(counts) >= self.min_objects
    }
}
