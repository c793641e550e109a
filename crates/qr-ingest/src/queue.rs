//! Bounded ingestion queue
//!
//! FIFO with a drop-oldest overflow policy: a burst that outruns the decoder
//! keeps the newest fragments, since an animated code will cycle back to the
//! dropped ones anyway.

use std::collections::VecDeque;

/// Bounded FIFO of fragments awaiting decode
#[derive(Debug)]
pub struct IngestionQueue<T = String> {
    items: VecDeque<T>,
    capacity: usize,
    peak: usize,
}

impl<T> IngestionQueue<T> {
    /// Create a queue holding at most `capacity` fragments
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
            peak: 0,
        }
    }

    /// Append a fragment. Returns the evicted head on overflow.
    pub fn enqueue(&mut self, fragment: T) -> Option<T> {
        self.items.push_back(fragment);
        let evicted = if self.items.len() > self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.peak = self.peak.max(self.items.len());
        evicted
    }

    /// Take the oldest fragment
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Queued fragment count
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Highest depth observed
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Queued fragments, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Discard everything queued. Returns how many fragments were abandoned.
    pub fn clear(&mut self) -> usize {
        let abandoned = self.items.len();
        self.items.clear();
        abandoned
    }
}
