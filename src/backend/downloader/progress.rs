//! Aggregates per-item outcomes into running totals.

use tokio::sync::Mutex;

use super::events::{EventSink, SessionEvent};
use super::models::{Outcome, ProgressSnapshot};

#[derive(Debug, Default)]
struct Counters {
    total: usize,
    completed: usize,
    failed: usize,
    cancelled: usize,
    current_file: Option<String>,
}

impl Counters {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total,
            completed: self.completed,
            failed: self.failed,
            current_file: self.current_file.clone(),
        }
    }
}

/// Serializes outcome updates from concurrently running workers.
#[derive(Debug)]
pub struct ProgressAggregator {
    counters: Mutex<Counters>,
    events: EventSink,
}

impl ProgressAggregator {
    pub fn new(events: EventSink) -> Self {
        Self {
            counters: Mutex::new(Counters::default()),
            events,
        }
    }

    /// Clears all counts for a new run.
    pub async fn reset(&self) {
        *self.counters.lock().await = Counters::default();
    }

    /// Sets the planned item count. Called once per run, after planning.
    pub async fn set_total(&self, total: usize) {
        self.counters.lock().await.total = total;
    }

    /// Records one terminal outcome and publishes the new totals.
    ///
    /// Cancelled items are tallied separately and do not move
    /// `completed`/`failed`, but still republish a snapshot.
    pub async fn record(&self, filename: &str, outcome: Outcome) -> ProgressSnapshot {
        let snapshot = {
            let mut counters = self.counters.lock().await;
            match outcome {
                Outcome::Succeeded => counters.completed += 1,
                Outcome::Failed => counters.failed += 1,
                Outcome::Cancelled => counters.cancelled += 1,
            }
            counters.current_file = Some(filename.to_string());
            counters.snapshot()
        };

        self.events.emit(SessionEvent::Progress(snapshot.clone()));
        snapshot
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        self.counters.lock().await.snapshot()
    }

    /// Items settled as cancelled; the run summary reports these as stopped.
    pub async fn cancelled(&self) -> usize {
        self.counters.lock().await.cancelled
    }
}
