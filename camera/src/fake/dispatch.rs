use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::{CaptureEngine, EngineDispatcher, EngineTask};

/// An [`EngineDispatcher`] whose tasks run only when the test says so.
///
/// Lets a test own the engine directly and still drive the work that the
/// engine posts back to its own queue, such as photo completions.
#[derive(Clone, Default)]
pub struct ManualDispatcher {
    tasks: Arc<Mutex<VecDeque<EngineTask>>>,
}

impl ManualDispatcher {
    /// A dispatcher feeding this queue.
    #[must_use]
    pub fn dispatcher(&self) -> EngineDispatcher {
        let tasks = Arc::clone(&self.tasks);
        EngineDispatcher::new(move |task| {
            tasks.lock().expect("poisoned manual dispatcher mutex").push_back(task);
        })
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks.lock().expect("poisoned manual dispatcher mutex").len()
    }

    /// Run queued tasks, including ones they enqueue, until none remain.
    pub fn run_pending(&self, engine: &mut CaptureEngine) -> usize {
        let mut ran = 0;
        loop {
            let next = self.tasks.lock().expect("poisoned manual dispatcher mutex").pop_front();
            let Some(task) = next else {
                return ran;
            };
            task(engine);
            ran += 1;
        }
    }

    /// Keep running tasks until `done` holds or `timeout` passes.
    ///
    /// Returns whether `done` was reached.
    pub fn run_until<F>(&self, engine: &mut CaptureEngine, mut done: F, timeout: Duration) -> bool
    where
        F: FnMut(&CaptureEngine) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending(engine);
            if done(engine) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl fmt::Debug for ManualDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualDispatcher")
            .field("pending", &self.pending())
            .finish()
    }
}
