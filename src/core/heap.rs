//! Min-heap of pending tasks keyed by effective priority.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::task::TaskId;

/// Items stored in a [`PriorityHeap`] expose their identity and submission time.
pub trait Schedulable {
    /// Unique task identifier.
    fn id(&self) -> TaskId;
    /// Submission timestamp in milliseconds since epoch.
    fn submitted_at_ms(&self) -> u64;
}

/// Wrapper ordering items by (effective priority, submission time, id), smallest first.
struct HeapEntry<I> {
    priority: f64,
    submitted_at_ms: u64,
    id: TaskId,
    item: I,
}

impl<I> PartialEq for HeapEntry<I> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<I> Eq for HeapEntry<I> {}

impl<I> PartialOrd for HeapEntry<I> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<I> Ord for HeapEntry<I> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse every component so the lowest
        // effective priority, then the earliest submission, pops first.
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.submitted_at_ms.cmp(&self.submitted_at_ms))
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Binary min-heap over pending tasks.
///
/// The effective priority is captured when an item is pushed. Callers that need
/// fresher keys (the aging sweep) drain the heap and push items back with
/// recomputed priorities.
pub struct PriorityHeap<I> {
    entries: BinaryHeap<HeapEntry<I>>,
}

impl<I> Default for PriorityHeap<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> PriorityHeap<I> {
    /// Create an empty heap.
    pub fn new() -> Self {
        Self {
            entries: BinaryHeap::new(),
        }
    }

    /// Number of items in the heap.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the heap holds no items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every item in arbitrary order.
    pub fn drain(&mut self) -> Vec<I> {
        self.entries.drain().map(|entry| entry.item).collect()
    }
}

impl<I: Schedulable> PriorityHeap<I> {
    /// Insert an item keyed by its effective priority. O(log n).
    pub fn push(&mut self, item: I, effective_priority: f64) {
        self.entries.push(HeapEntry {
            priority: effective_priority,
            submitted_at_ms: item.submitted_at_ms(),
            id: item.id(),
            item,
        });
    }

    /// Remove and return the most urgent item. O(log n).
    pub fn pop(&mut self) -> Option<I> {
        self.entries.pop().map(|entry| entry.item)
    }

    /// Most urgent item and the priority it was keyed with.
    pub fn peek(&self) -> Option<(&I, f64)> {
        self.entries.peek().map(|entry| (&entry.item, entry.priority))
    }

    /// Whether an item with `id` is queued.
    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Ids of all queued items in arbitrary order.
    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Items and the priority each was keyed with, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&I, f64)> {
        self.entries.iter().map(|entry| (&entry.item, entry.priority))
    }

    /// Remove the item with `id`, rebuilding the heap from the remaining items. O(n).
    pub fn remove(&mut self, id: TaskId) -> Option<I> {
        if !self.contains(id) {
            return None;
        }
        let mut removed = None;
        let entries: Vec<_> = self.entries.drain().collect();
        self.entries = entries
            .into_iter()
            .filter_map(|entry| {
                if entry.id == id {
                    removed = Some(entry.item);
                    None
                } else {
                    Some(entry)
                }
            })
            .collect();
        removed
    }

    /// Remove every item matching `predicate`, keeping the rest in heap order. O(n).
    pub fn extract_if<F>(&mut self, mut predicate: F) -> Vec<I>
    where
        F: FnMut(&I) -> bool,
    {
        let mut extracted = Vec::new();
        let entries: Vec<_> = self.entries.drain().collect();
        self.entries = entries
            .into_iter()
            .filter_map(|entry| {
                if predicate(&entry.item) {
                    extracted.push(entry.item);
                    None
                } else {
                    Some(entry)
                }
            })
            .collect();
        extracted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[derive(Debug)]
    struct Item {
        id: TaskId,
        submitted_at_ms: u64,
    }

    impl Schedulable for Item {
        fn id(&self) -> TaskId {
            self.id
        }

        fn submitted_at_ms(&self) -> u64 {
            self.submitted_at_ms
        }
    }

    fn item(id: TaskId, submitted_at_ms: u64) -> Item {
        Item { id, submitted_at_ms }
    }

    #[test]
    fn test_lowest_priority_first() {
        let mut heap = PriorityHeap::new();
        heap.push(item(1, 100), 5.0);
        heap.push(item(2, 200), -3.0);
        heap.push(item(3, 300), 0.0);
        heap.push(item(4, 400), 12.5);

        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|i| i.id).collect();
        assert_eq!(order, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut heap = PriorityHeap::new();
        heap.push(item(1, 300), 1.0);
        heap.push(item(2, 100), 1.0);
        heap.push(item(3, 200), 1.0);

        assert_eq!(heap.pop().unwrap().id, 2);
        assert_eq!(heap.pop().unwrap().id, 3);
        assert_eq!(heap.pop().unwrap().id, 1);
    }

    #[test]
    fn test_same_timestamp_falls_back_to_id() {
        let mut heap = PriorityHeap::new();
        heap.push(item(9, 100), 1.0);
        heap.push(item(4, 100), 1.0);
        assert_eq!(heap.pop().unwrap().id, 4);
    }

    #[test]
    fn test_random_insertion_order_pops_sorted() {
        let mut keys: Vec<(TaskId, i32)> = (0..200).map(|i| (i, (i as i32 % 17) - 8)).collect();
        keys.shuffle(&mut rand::rng());

        let mut heap = PriorityHeap::new();
        for (id, priority) in &keys {
            heap.push(item(*id, *id), f64::from(*priority));
        }
        assert_eq!(heap.len(), 200);

        let mut last: Option<(f64, u64)> = None;
        while let Some((top, priority)) = heap.peek().map(|(i, p)| (i.submitted_at_ms, p)) {
            if let Some(prev) = last {
                assert!(prev.0 < priority || (prev.0 == priority && prev.1 < top));
            }
            last = Some((priority, top));
            heap.pop();
        }
        assert!(heap.is_empty());
    }

    #[test]
    fn test_remove_by_id() {
        let mut heap = PriorityHeap::new();
        heap.push(item(1, 100), 1.0);
        heap.push(item(2, 200), 2.0);
        heap.push(item(3, 300), 3.0);

        assert_eq!(heap.remove(2).map(|i| i.id), Some(2));
        assert!(heap.remove(2).is_none());
        assert!(!heap.contains(2));
        assert_eq!(heap.len(), 2);
        assert_eq!(heap.pop().unwrap().id, 1);
        assert_eq!(heap.pop().unwrap().id, 3);
    }

    #[test]
    fn test_extract_if_keeps_order() {
        let mut heap = PriorityHeap::new();
        for id in 1..=6 {
            heap.push(item(id, id * 10), f64::from(u32::try_from(7 - id).unwrap()));
        }
        let mut old: Vec<_> = heap
            .extract_if(|i| i.submitted_at_ms <= 30)
            .into_iter()
            .map(|i| i.id)
            .collect();
        old.sort_unstable();
        assert_eq!(old, vec![1, 2, 3]);
        assert_eq!(heap.pop().unwrap().id, 6);
        assert_eq!(heap.pop().unwrap().id, 5);
        assert_eq!(heap.pop().unwrap().id, 4);
    }

    #[test]
    fn test_drain_empties_heap() {
        let mut heap = PriorityHeap::new();
        heap.push(item(1, 1), 0.0);
        heap.push(item(2, 2), 0.0);
        let mut ids: Vec<_> = heap.drain().into_iter().map(|i| i.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
        assert!(heap.is_empty());
        assert!(heap.pop().is_none());
    }
}
