use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::scheduler::work_item::{OrderId, WorkItem};

#[derive(Debug)]
struct QueueEntry {
    seq: u64,
    item: WorkItem,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // BinaryHeap is a max-heap: reverse both keys so the smallest estimate,
    // then the earliest insertion, sits on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .item
            .estimate
            .total_cmp(&self.item.estimate)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending work ordered by ascending estimate, FIFO among equal estimates.
#[derive(Debug, Default)]
pub struct WorkQueue {
    heap: BinaryHeap<QueueEntry>,
    next_seq: u64,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: WorkItem) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry { seq, item });
    }

    /// Remove the highest-priority item.
    pub fn pop(&mut self) -> Option<WorkItem> {
        self.heap.pop().map(|entry| entry.item)
    }

    /// Take a specific item out of the queue.
    pub fn remove(&mut self, order_id: OrderId) -> Option<WorkItem> {
        if !self.contains(order_id) {
            return None;
        }
        let mut removed = None;
        let entries = std::mem::take(&mut self.heap).into_vec();
        for entry in entries {
            if entry.item.id == order_id {
                removed = Some(entry.item);
            } else {
                self.heap.push(entry);
            }
        }
        removed
    }

    pub fn contains(&self, order_id: OrderId) -> bool {
        self.heap.iter().any(|entry| entry.item.id == order_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
