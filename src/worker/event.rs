//! Lifetime extension for worker events.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio_util::task::TaskTracker;

use crate::error::{Error, Result};

/// An event whose handlers may keep the worker alive past their return.
///
/// Work registered with [`wait_until`](Self::wait_until) is spawned
/// immediately; the host awaits [`settled`](Self::settled) before it is
/// allowed to recycle the worker. A failed install event must not be
/// followed by activation.
#[derive(Debug, Clone, Default)]
pub struct ExtendableEvent {
    tracker: TaskTracker,
    failure: Arc<Mutex<Option<Error>>>,
}

impl ExtendableEvent {
    /// Creates an event with no pending work.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the event until `work` completes.
    ///
    /// The first error returned by any registered work is reported by
    /// [`settled`](Self::settled). Must be called from within a tokio runtime.
    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let failure = Arc::clone(&self.failure);
        self.tracker.spawn(async move {
            if let Err(e) = work.await {
                if let Ok(mut failure) = failure.lock() {
                    failure.get_or_insert(e);
                }
            }
        });
    }

    /// Number of registered tasks still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every registered task to finish.
    ///
    /// # Errors
    ///
    /// Returns the first error any registered work failed with.
    pub async fn settled(&self) -> Result<()> {
        self.tracker.close();
        self.tracker.wait().await;
        let failure = self
            .failure
            .lock()
            .map_err(|_| Error::Platform("event state lock poisoned".to_string()))?
            .take();
        failure.map_or(Ok(()), Err)
    }
}
