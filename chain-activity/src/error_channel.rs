//! Single-slot, self-clearing error notification.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SessionError;
use crate::store::StateStore;
use crate::types::ErrorState;

#[derive(Default)]
struct Timer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

/// Writes the `error` field of the snapshot and clears it after a delay.
///
/// A new error replaces the current one and restarts the delay.
#[derive(Clone)]
pub struct ErrorChannel {
    store: StateStore,
    display: Duration,
    timer: Arc<Mutex<Timer>>,
}

impl ErrorChannel {
    pub fn new(store: StateStore, display: Duration) -> Self {
        Self {
            store,
            display,
            timer: Arc::new(Mutex::new(Timer::default())),
        }
    }

    /// Show `message`, replacing any current error.
    pub fn set(&self, message: impl Into<String>) {
        let error = ErrorState::new(message);
        debug!("Error shown: {}", error.message);

        // An expiry still holding the old generation must not clear this error.
        let mut timer = self.timer.lock();
        timer.generation += 1;
        if let Some(task) = timer.task.take() {
            task.abort();
        }
        self.store.update(|s| s.error = Some(error));

        // Without a runtime the error stays until cleared explicitly.
        if let Ok(handle) = Handle::try_current() {
            let generation = timer.generation;
            let channel = self.clone();
            timer.task = Some(handle.spawn(async move {
                tokio::time::sleep(channel.display).await;
                channel.expire(generation);
            }));
        }
    }

    /// Show `err` unless it is a suppressed user rejection.
    pub fn report(&self, err: &SessionError) {
        if err.is_silent() {
            debug!("Suppressed error: {}", err);
            return;
        }
        self.set(err.to_string());
    }

    pub fn clear(&self) {
        let mut timer = self.timer.lock();
        timer.generation += 1;
        if let Some(task) = timer.task.take() {
            task.abort();
        }
        drop(timer);
        self.store.update(|s| s.error = None);
    }

    fn expire(&self, generation: u64) {
        let mut timer = self.timer.lock();
        if timer.generation != generation {
            return;
        }
        timer.task = None;
        self.store.update(|s| s.error = None);
    }
}
