//! Priority queue of pending utterances.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::classifier::PriorityClass;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedSpeech {
    pub sequence: u64,
    pub priority: PriorityClass,
    pub text: String,
}

impl Ord for QueuedSpeech {
    // Max-heap: higher priority first, then lower sequence (older) first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedSpeech {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered by priority descending, then arrival order.
#[derive(Debug, Default)]
pub struct SpeechQueue {
    heap: BinaryHeap<QueuedSpeech>,
    next_sequence: u64,
}

impl SpeechQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue and return the item's sequence number. Urgent items first
    /// discard everything queued below urgent.
    pub fn push(&mut self, text: String, priority: PriorityClass) -> u64 {
        if priority == PriorityClass::Urgent {
            self.purge_below(PriorityClass::Urgent);
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedSpeech {
            sequence,
            priority,
            text,
        });
        sequence
    }

    pub fn pop(&mut self) -> Option<QueuedSpeech> {
        self.heap.pop()
    }

    /// Drop queued items below `priority`; returns how many were dropped.
    fn purge_below(&mut self, priority: PriorityClass) -> usize {
        let before = self.heap.len();
        self.heap.retain(|item| item.priority >= priority);
        before - self.heap.len()
    }

    pub fn clear(&mut self) -> usize {
        let n = self.heap.len();
        self.heap.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
