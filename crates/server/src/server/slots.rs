//! Player id allocation.

use fixedbitset::FixedBitSet;
use protocol::PlayerId;

/// Hands out the smallest free id in `1..=capacity` and takes ids back on release.
///
/// Bit `id - 1` is set while `id` is held.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    used: FixedBitSet,
}

impl SlotAllocator {
    /// Create an allocator for `capacity` ids. Capacity is clamped to the one-byte id space.
    pub fn new(capacity: usize) -> Self {
        Self {
            used: FixedBitSet::with_capacity(capacity.min(PlayerId::MAX as usize)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// Number of ids currently held.
    pub fn in_use(&self) -> usize {
        self.used.count_ones(..)
    }

    pub fn is_in_use(&self, id: PlayerId) -> bool {
        id != 0 && self.used.contains(id as usize - 1)
    }

    /// Take the smallest free id, or `None` when every id is held.
    pub fn acquire(&mut self) -> Option<PlayerId> {
        let index = self.used.zeroes().next()?;
        self.used.insert(index);
        Some((index + 1) as PlayerId)
    }

    /// Return `id` to the pool. Ids that are not held are ignored.
    pub fn release(&mut self, id: PlayerId) {
        if self.is_in_use(id) {
            self.used.set(id as usize - 1, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_is_smallest_free() {
        let mut slots = SlotAllocator::new(3);
        assert_eq!(slots.acquire(), Some(1));
        assert_eq!(slots.acquire(), Some(2));
        assert_eq!(slots.acquire(), Some(3));
        assert_eq!(slots.acquire(), None);
        assert_eq!(slots.in_use(), 3);

        slots.release(2);
        assert!(!slots.is_in_use(2));
        assert_eq!(slots.acquire(), Some(2));
        assert_eq!(slots.acquire(), None);
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let mut slots = SlotAllocator::new(2);
        slots.release(0);
        slots.release(1);
        slots.release(200);
        assert_eq!(slots.in_use(), 0);

        assert_eq!(slots.acquire(), Some(1));
        slots.release(2);
        assert_eq!(slots.in_use(), 1);
        assert!(slots.is_in_use(1));
    }

    #[test]
    fn test_ids_stay_distinct_under_churn() {
        let mut slots = SlotAllocator::new(8);
        let mut held = Vec::new();
        for round in 0..50usize {
            if round % 3 == 2 && !held.is_empty() {
                let id = held.remove(round % held.len());
                slots.release(id);
            } else if let Some(id) = slots.acquire() {
                assert!(!held.contains(&id));
                assert!((1..=8).contains(&id));
                held.push(id);
            }
            assert_eq!(slots.in_use(), held.len());
        }
    }

    #[test]
    fn test_capacity_clamped_to_id_space() {
        let slots = SlotAllocator::new(1000);
        assert_eq!(slots.capacity(), 255);
    }
}
