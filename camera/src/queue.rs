//! Serial task queues.
//!
//! A [`SerialQueue`] owns a piece of state on a dedicated thread and runs
//! submitted closures against it one at a time, in submission order. All
//! mutation of capture state happens this way, so the state itself needs no
//! locks.
//!
//! # Example
//!
//! ```ignore
//! let queue = SerialQueue::new("counter", 0_u32)?;
//! queue.dispatch(|count| *count += 1);
//! assert_eq!(queue.dispatch_sync(|count| *count), Some(1));
//! ```

use std::cell::Cell;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use async_channel::Sender;
use log::{debug, warn};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_QUEUE: Cell<u64> = const { Cell::new(0) };
}

/// A FIFO of closures run on one thread against state `S`.
///
/// Cloning yields another handle to the same queue. The worker thread exits
/// once every handle is dropped and the backlog is drained.
pub struct SerialQueue<S> {
    id: u64,
    label: Arc<str>,
    sender: Sender<Job<S>>,
}

/// A queue with no state of its own, for plain serial work such as file I/O.
pub type DispatchQueue = SerialQueue<()>;

impl<S: Send + 'static> SerialQueue<S> {
    /// Spawn the worker thread and hand it `state`.
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be spawned.
    pub fn new(label: impl Into<String>, state: S) -> io::Result<Self> {
        let label: Arc<str> = label.into().into();
        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = async_channel::unbounded::<Job<S>>();

        let thread_label = Arc::clone(&label);
        thread::Builder::new().name(label.to_string()).spawn(move || {
            CURRENT_QUEUE.with(|current| current.set(id));
            let mut state = state;
            while let Ok(job) = receiver.recv_blocking() {
                job(&mut state);
            }
            debug!("queue {thread_label} drained");
        })?;

        Ok(Self { id, label, sender })
    }

    /// Run `job` asynchronously after everything already queued.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        if self.sender.try_send(Box::new(job)).is_err() {
            warn!("queue {} is closed, dropping task", self.label);
        }
    }

    /// Run `job` and block until it returns its result.
    ///
    /// Returns `None` if the queue shut down before running it. Must not be
    /// called from the queue's own thread.
    pub fn dispatch_sync<F, R>(&self, job: F) -> Option<R>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        debug_assert!(!self.is_current(), "dispatch_sync onto the current queue deadlocks");
        let (reply, result) = async_channel::bounded(1);
        self.dispatch(move |state| {
            let _ = reply.try_send(job(state));
        });
        result.recv_blocking().ok()
    }
}

impl<S> SerialQueue<S> {
    /// Whether the calling thread is this queue's worker.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT_QUEUE.with(|current| current.get() == self.id)
    }

    /// The label given at creation.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl DispatchQueue {
    /// Run a stateless closure on the queue.
    pub fn run<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.dispatch(move |_: &mut ()| job());
    }
}

impl<S> Clone for SerialQueue<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            label: Arc::clone(&self.label),
            sender: self.sender.clone(),
        }
    }
}

impl<S> fmt::Debug for SerialQueue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_jobs_in_order() {
        let queue = SerialQueue::new("test.order", Vec::new()).unwrap();
        for value in 0..100 {
            queue.dispatch(move |seen: &mut Vec<i32>| seen.push(value));
        }
        let seen = queue.dispatch_sync(|seen| seen.clone()).unwrap();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn knows_its_own_thread() {
        let queue = DispatchQueue::new("test.current", ()).unwrap();
        assert!(!queue.is_current());

        let inner = queue.clone();
        let on_queue = queue.dispatch_sync(move |_: &mut ()| inner.is_current()).unwrap();
        assert!(on_queue);
    }

    #[test]
    fn distinct_queues_are_not_current_for_each_other() {
        let first = DispatchQueue::new("test.first", ()).unwrap();
        let second = DispatchQueue::new("test.second", ()).unwrap();

        let other = second.clone();
        assert_eq!(first.dispatch_sync(move |_: &mut ()| other.is_current()), Some(false));
    }
}
