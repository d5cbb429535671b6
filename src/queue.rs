//! FIFO buffering between readers, writers and viewers.
//!
//! Save queues decouple acquisition from disk latency; plot queues decouple
//! acquisition from frame rate. Both need non-blocking drains: the writer
//! takes everything in order, an image viewer keeps only the most recent
//! frame and drops the backlog.

use crossbeam::channel::{unbounded, Receiver, Sender};

/// Unbounded FIFO with non-blocking accessors. Clones share the same
/// underlying channel.
pub struct DataQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> DataQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn put(&self, item: T) {
        // The queue holds both endpoints, so the channel can never be
        // disconnected while `self` is alive.
        let _ = self.tx.send(item);
    }

    /// Non-blocking pop; `None` signals an empty queue.
    pub fn try_get(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discards all pending elements, returning the most recent one.
    /// `None` means no element was present.
    pub fn drain_last(&self) -> Option<T> {
        self.rx.try_iter().last()
    }

    /// Returns the complete ordered list of pending elements, emptying the
    /// queue.
    pub fn drain_all(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }
}

impl<T> Clone for DataQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for DataQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
