//! Timer host backed by tokio tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use viewbeacon_observe::{TimerCallback, TimerHandle, TimerHost};

/// Runs each timer as a sleeping task; clearing a timer aborts its task.
pub struct TokioTimerHost {
    runtime: Handle,
    next_id: AtomicU64,
    tasks: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
}

impl TokioTimerHost {
    /// Creates a timer host on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new() -> Self {
        Self {
            runtime: Handle::current(),
            next_id: AtomicU64::new(1),
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of timers that have neither fired nor been cleared.
    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for TokioTimerHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerHost for TokioTimerHost {
    fn set_timer(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let tasks = Arc::clone(&self.tasks);

        // Held across the spawn so the task cannot deregister before it is
        // registered.
        let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let task = self.runtime.spawn(async move {
            sleep(delay).await;
            tasks.lock().unwrap_or_else(|e| e.into_inner()).remove(&id);
            callback();
        });
        guard.insert(id, task);
        tracing::trace!(id, delay_ms = delay.as_millis() as u64, "timer scheduled");
        TimerHandle(id)
    }

    fn clear_timer(&self, handle: TimerHandle) {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle.0);
        if let Some(task) = task {
            task.abort();
            tracing::trace!(id = handle.0, "timer cleared");
        }
    }
}
