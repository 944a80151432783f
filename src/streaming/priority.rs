//! Work queues for chunk creation and destruction
//!
//! Creations pop nearest-first within a priority tier; destructions pop
//! farthest-first so the chunks least likely to come back go first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::chunk::partition::ChunkKey;

/// Tier for chunks that must exist right now (core neighbourhood on a forced tick)
pub const TIER_CORE: u8 = 0;

/// Tier for everything else in the load window
pub const TIER_NORMAL: u8 = 1;

/// Pending creation
#[derive(Clone, Copy, Debug)]
pub struct CreatePriority {
    pub key: ChunkKey,
    pub tier: u8,
    /// Squared XZ distance from the viewpoint to the chunk centre
    pub distance_sq: f32,
}

impl Eq for CreatePriority {}

impl PartialEq for CreatePriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for CreatePriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: "greater" pops first, so every comparison is reversed
        other.tier.cmp(&self.tier)
            .then_with(|| other.distance_sq.total_cmp(&self.distance_sq))
            .then_with(|| other.key.cmp(&self.key))
    }
}

impl PartialOrd for CreatePriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending destruction
#[derive(Clone, Copy, Debug)]
pub struct DestroyPriority {
    pub key: ChunkKey,
    pub distance_sq: f32,
}

impl Eq for DestroyPriority {}

impl PartialEq for DestroyPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for DestroyPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_sq.total_cmp(&other.distance_sq)
            .then_with(|| other.key.cmp(&self.key))
    }
}

impl PartialOrd for DestroyPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of chunks to create
#[derive(Debug, Default)]
pub struct CreateQueue {
    heap: BinaryHeap<CreatePriority>,
}

impl CreateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: CreatePriority) {
        self.heap.push(priority);
    }

    /// Highest priority entry
    pub fn pop(&mut self) -> Option<CreatePriority> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&CreatePriority> {
        self.heap.peek()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.heap.iter().any(|p| p.key == key)
    }

    pub fn remove(&mut self, key: ChunkKey) {
        self.heap.retain(|p| p.key != key);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Priority queue of chunks to release
#[derive(Debug, Default)]
pub struct DestroyQueue {
    heap: BinaryHeap<DestroyPriority>,
}

impl DestroyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: DestroyPriority) {
        self.heap.push(priority);
    }

    /// Farthest entry
    pub fn pop(&mut self) -> Option<DestroyPriority> {
        self.heap.pop()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.heap.iter().any(|p| p.key == key)
    }

    pub fn remove(&mut self, key: ChunkKey) {
        self.heap.retain(|p| p.key != key);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(row: u32, col: u32, tier: u8, distance_sq: f32) -> CreatePriority {
        CreatePriority { key: ChunkKey::new(row, col), tier, distance_sq }
    }

    #[test]
    fn test_create_queue_nearest_first() {
        let mut queue = CreateQueue::new();
        queue.push(create(0, 2, TIER_NORMAL, 400.0));
        queue.push(create(0, 0, TIER_NORMAL, 4.0));
        queue.push(create(0, 1, TIER_NORMAL, 100.0));

        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(0, 0));
        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(0, 1));
        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(0, 2));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_core_tier_beats_distance() {
        let mut queue = CreateQueue::new();
        queue.push(create(0, 0, TIER_NORMAL, 1.0));
        queue.push(create(5, 5, TIER_CORE, 900.0));
        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(5, 5));
        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(0, 0));
    }

    #[test]
    fn test_equal_distance_is_deterministic() {
        let mut a = CreateQueue::new();
        let mut b = CreateQueue::new();
        let entries = [create(1, 0, TIER_NORMAL, 9.0), create(0, 1, TIER_NORMAL, 9.0)];
        for e in entries {
            a.push(e);
        }
        for e in entries.iter().rev() {
            b.push(*e);
        }
        assert_eq!(a.pop().unwrap().key, b.pop().unwrap().key);
    }

    #[test]
    fn test_destroy_queue_farthest_first() {
        let mut queue = DestroyQueue::new();
        queue.push(DestroyPriority { key: ChunkKey::new(0, 0), distance_sq: 10.0 });
        queue.push(DestroyPriority { key: ChunkKey::new(9, 9), distance_sq: 1000.0 });
        queue.push(DestroyPriority { key: ChunkKey::new(4, 4), distance_sq: 200.0 });

        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(9, 9));
        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(4, 4));
        assert_eq!(queue.pop().unwrap().key, ChunkKey::new(0, 0));
    }

    #[test]
    fn test_contains_and_remove() {
        let mut queue = CreateQueue::new();
        queue.push(create(1, 1, TIER_NORMAL, 1.0));
        queue.push(create(2, 2, TIER_NORMAL, 2.0));
        assert!(queue.contains(ChunkKey::new(1, 1)));
        queue.remove(ChunkKey::new(1, 1));
        assert!(!queue.contains(ChunkKey::new(1, 1)));
        assert_eq!(queue.len(), 1);

        let mut destroy = DestroyQueue::new();
        destroy.push(DestroyPriority { key: ChunkKey::new(3, 3), distance_sq: 5.0 });
        destroy.remove(ChunkKey::new(3, 3));
        assert!(destroy.is_empty());
    }

    #[test]
    fn test_nan_distance_does_not_panic() {
        let mut queue = CreateQueue::new();
        queue.push(create(0, 0, TIER_NORMAL, f32::NAN));
        queue.push(create(0, 1, TIER_NORMAL, 1.0));
        assert_eq!(queue.len(), 2);
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_some());
    }
}
