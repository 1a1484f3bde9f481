//! Batch coordinator for independent concurrent tasks.
//!
//! A [`Batch`] launches N tasks that do not wait on one another and
//! completes only once all N have settled. Each launched task carries a
//! settlement guard: a task that finishes reports its value, and a task that
//! never finishes (panic, runtime shutdown) reports an empty outcome when the
//! guard is dropped. Exactly one settlement arrives per launch, so the
//! settlement count always reaches the launch count.
//!
//! No ordering between tasks is assumed or provided.

use std::future::Future;
use tokio::sync::mpsc;

/// Terminal resolution of one launched task.
#[derive(Debug)]
pub struct Settlement<T> {
    /// Label the task was launched with.
    pub label: String,
    /// The task's value, or `None` if it stopped before producing one.
    pub outcome: Option<T>,
}

/// Progress of a batch at the moment one task settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Tasks settled so far, including this one.
    pub settled: usize,
    /// Tasks launched.
    pub total: usize,
}

struct SettlementGuard<T> {
    label: Option<String>,
    sender: mpsc::UnboundedSender<Settlement<T>>,
}

impl<T> SettlementGuard<T> {
    fn settle(mut self, value: T) {
        if let Some(label) = self.label.take() {
            // The receiver only goes away if the batch itself was dropped.
            let _ = self.sender.send(Settlement {
                label,
                outcome: Some(value),
            });
        }
    }
}

impl<T> Drop for SettlementGuard<T> {
    fn drop(&mut self) {
        if let Some(label) = self.label.take() {
            tracing::warn!(task = %label, "Batch task stopped before settling");
            let _ = self.sender.send(Settlement {
                label,
                outcome: None,
            });
        }
    }
}

/// Launches independent tasks and waits until every one has settled.
///
/// Must be used from within a tokio runtime.
pub struct Batch<T> {
    sender: mpsc::UnboundedSender<Settlement<T>>,
    receiver: mpsc::UnboundedReceiver<Settlement<T>>,
    launched: usize,
}

impl<T: Send + 'static> Batch<T> {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver,
            launched: 0,
        }
    }

    /// Returns how many tasks have been launched.
    #[must_use]
    pub const fn launched(&self) -> usize {
        self.launched
    }

    /// Spawns `task` immediately; it runs without waiting for any other task.
    pub fn launch<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let guard = SettlementGuard {
            label: Some(label.into()),
            sender: self.sender.clone(),
        };
        self.launched += 1;
        tokio::spawn(async move {
            let value = task.await;
            guard.settle(value);
        });
    }

    /// Waits for every launched task to settle.
    ///
    /// `on_settled` runs once per settlement, in settlement order, before the
    /// next one is awaited. Returns all settlements in settlement order.
    pub async fn settle<C>(self, mut on_settled: C) -> Vec<Settlement<T>>
    where
        C: FnMut(&Settlement<T>, BatchProgress),
    {
        let Self {
            sender,
            mut receiver,
            launched,
        } = self;
        drop(sender);

        let mut settled = Vec::with_capacity(launched);
        while settled.len() < launched {
            let Some(settlement) = receiver.recv().await else {
                break;
            };
            on_settled(
                &settlement,
                BatchProgress {
                    settled: settled.len() + 1,
                    total: launched,
                },
            );
            settled.push(settlement);
        }
        settled
    }
}

impl<T: Send + 'static> Default for Batch<T> {
    fn default() -> Self {
        Self::new()
    }
}
