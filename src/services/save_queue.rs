//! Ordered fire-and-forget saves.
//!
//! Owners tag each whole-state save with a sequence number taken while they
//! hold their state lock. Saves run on the tokio blocking pool when a runtime
//! is available and inline otherwise. A save keeps the queue lock for the
//! whole write, and a save older than one already attempted is dropped, so
//! the gateway only ever moves forward.

use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

#[derive(Default)]
pub(crate) struct SaveQueue {
    last_attempted: Arc<Mutex<u64>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl SaveQueue {
    /// Schedules `save` as the write for sequence number `seq`.
    pub(crate) fn schedule<F>(&self, seq: u64, save: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let last_attempted = Arc::clone(&self.last_attempted);
        let run = move || save_in_order(&last_attempted, seq, save);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn_blocking(run);
                match self.pending.lock() {
                    Ok(mut pending) => {
                        pending.retain(|h| !h.is_finished());
                        pending.push(handle);
                    },
                    Err(e) => tracing::warn!(error = %e, "Save queue lock poisoned"),
                }
            },
            Err(_) => run(),
        }
    }

    /// Waits for every scheduled save to finish.
    pub(crate) async fn flush(&self) {
        let handles = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(e) => {
                tracing::warn!(error = %e, "Save queue lock poisoned");
                return;
            },
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Save task did not complete");
            }
        }
    }
}

fn save_in_order(last_attempted: &Mutex<u64>, seq: u64, save: impl FnOnce()) {
    let Ok(mut last) = last_attempted.lock() else {
        tracing::warn!(seq, "Save sequencer lock poisoned, skipping save");
        return;
    };
    if seq <= *last {
        tracing::debug!(seq, newest = *last, "Skipping stale save");
        return;
    }
    *last = seq;
    save();
}
