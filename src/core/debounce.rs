/// Keyed debouncer
///
/// Each key owns one pending slot. Scheduling replaces whatever is pending for
/// that key; when the window elapses only the latest task runs. Superseded
/// tasks resolve to `None` without running.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Arc<Mutex<HashMap<String, u64>>>,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `task` for `key`, superseding anything already pending
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F, Fut, T>(&self, key: &str, task: F) -> JoinHandle<Option<T>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.pending).insert(key.to_string(), generation);

        let pending = Arc::clone(&self.pending);
        let window = self.window;
        let key = key.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(window).await;

            {
                let mut slots = lock(&pending);
                if slots.get(&key) != Some(&generation) {
                    tracing::debug!(key = %key, generation, "debounced task superseded");
                    return None;
                }
                slots.remove(&key);
            }

            Some(task().await)
        })
    }

    /// Drop the pending task for `key`, if any
    pub fn cancel(&self, key: &str) -> bool {
        lock(&self.pending).remove(key).is_some()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

// A panicking task never holds this lock, so poisoning carries no broken state
fn lock(pending: &Mutex<HashMap<String, u64>>) -> MutexGuard<'_, HashMap<String, u64>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
