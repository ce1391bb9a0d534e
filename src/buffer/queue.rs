//! Lock-free playback queue for sealed batches
//!
//! One queue per stream: the session pushes, the stream's playback loop pops.
//! The queue is bounded; when full, the oldest batch is evicted so playback
//! stays close to live instead of falling further behind.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::batch::Sequenced;
use crate::error::BufferError;

/// Bounded FIFO of batches
pub struct BatchQueue<T> {
    queue: ArrayQueue<T>,
    overflow_count: AtomicUsize,
    underrun_count: AtomicUsize,
}

impl<T: Sequenced> BatchQueue<T> {
    /// Create a new queue holding at most `capacity` batches
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            overflow_count: AtomicUsize::new(0),
            underrun_count: AtomicUsize::new(0),
        }
    }

    /// Push a batch. The batch is always enqueued; on overflow the oldest
    /// batch is dropped and reported.
    pub fn push(&self, batch: T) -> Result<(), BufferError> {
        match self.queue.force_push(batch) {
            None => Ok(()),
            Some(evicted) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                Err(BufferError::Overflow {
                    capacity: self.queue.capacity(),
                    dropped_sequence: evicted.sequence(),
                })
            }
        }
    }

    /// Pop the oldest batch, counting an underrun when empty
    pub fn pop(&self) -> Option<T> {
        match self.queue.pop() {
            Some(batch) => Some(batch),
            None => {
                self.underrun_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Pop without counting an underrun
    pub fn try_pop(&self) -> Option<T> {
        self.queue.pop()
    }

    /// Drop everything queued. Returns the number of batches removed.
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        while self.queue.pop().is_some() {
            removed += 1;
        }
        removed
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get number of queued batches
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Get queue capacity
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Get overflow count (batches evicted to make room)
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Get underrun count (pops on an empty queue)
    pub fn underrun_count(&self) -> usize {
        self.underrun_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a batch queue
pub type SharedBatchQueue<T> = Arc<BatchQueue<T>>;

/// Create a new shared batch queue
pub fn create_shared_queue<T: Sequenced>(capacity: usize) -> SharedBatchQueue<T> {
    Arc::new(BatchQueue::new(capacity))
}
