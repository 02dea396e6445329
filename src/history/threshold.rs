use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::thread;

use crate::config::{
    HistoryConfig, OnThreshold, OnThresholdWithFetch, DEFAULT_HISTORY_SIZE,
    DEFAULT_HISTORY_THRESHOLD,
};
use crate::history::Snapshot;

/// Decides when history pressure is reported and how the callbacks run.
pub struct ThresholdTrigger {
    trigger_bytes: usize,
    on_threshold: Option<OnThreshold>,
    on_threshold_with_fetch: Option<OnThresholdWithFetch>,
    /// Queue of the delivery thread, started on first dispatch.
    delivery: Mutex<Option<Sender<Snapshot>>>,
}

/// History options with defaults applied.
pub struct NormalizedHistory {
    pub capacity: usize,
    pub trigger: ThresholdTrigger,
}

impl HistoryConfig {
    /// Applies defaults and derives the trigger level.
    pub fn normalize(self) -> NormalizedHistory {
        let capacity = if self.size == 0 {
            DEFAULT_HISTORY_SIZE
        } else {
            self.size
        };
        // NaN fails the comparison too.
        let threshold = if self.threshold > 0.0 {
            self.threshold
        } else {
            DEFAULT_HISTORY_THRESHOLD
        };

        let trigger = if threshold >= 1.0 {
            ThresholdTrigger {
                trigger_bytes: capacity + 1,
                on_threshold: None,
                on_threshold_with_fetch: None,
                delivery: Mutex::new(None),
            }
        } else {
            ThresholdTrigger {
                trigger_bytes: (threshold * capacity as f32) as usize,
                on_threshold: self.on_threshold,
                on_threshold_with_fetch: self.on_threshold_with_fetch,
                delivery: Mutex::new(None),
            }
        };

        NormalizedHistory { capacity, trigger }
    }
}

impl ThresholdTrigger {
    /// Occupancy above which the callbacks fire.
    pub fn trigger_bytes(&self) -> usize {
        self.trigger_bytes
    }

    pub fn is_crossed(&self, occupied: usize) -> bool {
        occupied > self.trigger_bytes
    }

    pub fn wants_fetch(&self) -> bool {
        self.on_threshold_with_fetch.is_some()
    }

    /// Runs the synchronous callback, if any, on the caller's thread.
    pub fn notify(&self) {
        if let Some(callback) = &self.on_threshold {
            callback();
        }
    }

    /// Queues `snapshot` for the fetch callback.
    ///
    /// Deliveries run on a dedicated thread, one at a time and in dispatch
    /// order. The thread exits once the trigger is dropped and its queue is empty.
    pub fn dispatch(&self, snapshot: Snapshot) {
        let Some(callback) = &self.on_threshold_with_fetch else {
            return;
        };
        let mut delivery = self.delivery.lock();
        if delivery.is_none() {
            *delivery = spawn_delivery(OnThresholdWithFetch::clone(callback));
        }
        let Some(queue) = delivery.as_ref() else {
            tracing::error!(
                history_bytes = snapshot.history.len(),
                missed = snapshot.missed,
                "No threshold delivery thread; snapshot dropped"
            );
            return;
        };
        if let Err(mpsc::SendError(snapshot)) = queue.send(snapshot) {
            tracing::error!(
                history_bytes = snapshot.history.len(),
                missed = snapshot.missed,
                "Threshold delivery thread is gone; snapshot dropped"
            );
            *delivery = None;
        }
    }
}

fn spawn_delivery(callback: OnThresholdWithFetch) -> Option<Sender<Snapshot>> {
    let (queue, pending) = mpsc::channel::<Snapshot>();
    let spawned = thread::Builder::new()
        .name("scrollterm-threshold".to_string())
        .spawn(move || {
            for snapshot in pending {
                if panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                    tracing::error!("Threshold callback panicked");
                }
            }
        });
    match spawned {
        Ok(_) => Some(queue),
        Err(e) => {
            tracing::error!(error = %e, "Failed to spawn threshold delivery thread");
            None
        }
    }
}
