//! Per-tick hit aggregation.
//!
//! Any number of attackers may land on the same victim within one tick; the victim sees a
//! single `got_hit` flag in the next snapshot. Damage and parry resolution stay on the
//! clients.

use fixedbitset::FixedBitSet;
use protocol::PlayerId;

/// The set of player ids reported hit during the current tick.
#[derive(Debug, Clone)]
pub struct CombatAggregator {
    hit: FixedBitSet,
}

impl CombatAggregator {
    pub fn new() -> Self {
        Self {
            hit: FixedBitSet::with_capacity(PlayerId::MAX as usize + 1),
        }
    }

    /// Forget every report. Called once at the start of each tick.
    pub fn reset(&mut self) {
        self.hit.clear();
    }

    /// Record that `target` was hit. Id 0 means "hit nobody" and is ignored.
    pub fn report_hit(&mut self, target: PlayerId) {
        if target != 0 {
            self.hit.insert(target as usize);
        }
    }

    pub fn was_hit(&self, target: PlayerId) -> bool {
        target != 0 && self.hit.contains(target as usize)
    }

    /// Number of distinct players hit this tick.
    pub fn hit_count(&self) -> usize {
        self.hit.count_ones(..)
    }
}

impl Default for CombatAggregator {
    fn default() -> Self {
        Self::new()
    }
}
