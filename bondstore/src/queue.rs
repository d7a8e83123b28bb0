//! Deferred task queue between the radio callback and the main loop
//!
//! The producer side never blocks: it runs inside the radio stack's
//! callback. The main loop drains the queue and runs each task to
//! completion, in FIFO order.

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

/// Bounded, non-blocking FIFO of deferred tasks
#[derive(Debug)]
pub struct TaskQueue<T> {
    tx: mpsc::Sender<T>,
    rx: mpsc::Receiver<T>,
}

impl<T> TaskQueue<T> {
    pub fn new(depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        Self { tx, rx }
    }

    /// Enqueue without blocking. Returns `false` if the queue is full.
    pub fn schedule(&self, task: T) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // both halves live in self
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Take every queued task, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        let mut tasks = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(task) => tasks.push(task),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        tasks
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
