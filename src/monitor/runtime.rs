//! Bounded worker pool for pair evaluations.
//!
//! Pairs are independent, so they run on a fixed number of threads fed by a
//! bounded channel. The pool size should track what the position source and
//! alert sink can absorb, not the number of pairs.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tracing::error;

use crate::error::{ExecutionError, FenceError, FenceResult};
use crate::fence::{Fence, FenceId};
use crate::position::ObjectId;

use super::runner::{PairEvaluator, PairOutcome};

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

type PairKey = (FenceId, ObjectId);

/// Pairs currently queued or running on a worker.
///
/// A pair stays claimed until its worker finishes, even after the collector
/// has timed out on it, so a later cycle cannot evaluate the same pair
/// against a state snapshot the straggler is about to supersede.
#[derive(Clone, Default)]
pub(crate) struct InFlight(Arc<Mutex<HashSet<PairKey>>>);

impl InFlight {
    /// Claims a pair. Returns `None` if it is already in flight.
    pub(crate) fn claim(&self, fence_id: &FenceId, object_id: &ObjectId) -> Option<InFlightClaim> {
        let key = (fence_id.clone(), object_id.clone());
        let mut pairs = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !pairs.insert(key.clone()) {
            return None;
        }
        Some(InFlightClaim {
            registry: self.clone(),
            key: Some(key),
        })
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, fence_id: &FenceId, object_id: &ObjectId) -> bool {
        let pairs = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        pairs.contains(&(fence_id.clone(), object_id.clone()))
    }
}

/// Releases its pair on drop.
pub(crate) struct InFlightClaim {
    registry: InFlight,
    key: Option<PairKey>,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut pairs = self.registry.0.lock().unwrap_or_else(PoisonError::into_inner);
            pairs.remove(&key);
        }
    }
}

pub(crate) enum Job {
    Evaluate {
        fence: Arc<Fence>,
        object_id: ObjectId,
        now: DateTime<Utc>,
        claim: InFlightClaim,
        reply: Sender<FenceResult<PairOutcome>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

pub(crate) struct WorkerPool {
    name: &'static str,
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
    in_flight: InFlight,
}

impl WorkerPool {
    pub(crate) fn start(
        name: &'static str,
        workers: usize,
        queue_capacity: usize,
        evaluator: Arc<PairEvaluator>,
    ) -> FenceResult<Self> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let evaluator = Arc::clone(&evaluator);
            let handle = thread::Builder::new()
                .name(format!("fencewatch-{name}-{idx}"))
                .spawn(move || worker_loop(&rx, &evaluator))
                .map_err(|e| FenceError::internal(format!("failed to spawn fencewatch worker: {e}")))?;
            handles.push(handle);
        }

        Ok(Self {
            name,
            tx: Some(tx),
            workers: handles,
            queue_capacity,
            in_flight: InFlight::default(),
        })
    }

    /// Queues a job, waiting up to `timeout` for space.
    pub(crate) fn submit(&self, job: Job, timeout: Duration) -> Result<(), ExecutionError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(ExecutionError::Disconnected {
                path: self.name.to_string(),
            });
        };
        match tx.send_timeout(job, timeout) {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => Err(ExecutionError::QueueFull {
                path: self.name.to_string(),
                capacity: self.queue_capacity,
            }),
            Err(SendTimeoutError::Disconnected(_)) => Err(ExecutionError::Disconnected {
                path: self.name.to_string(),
            }),
        }
    }

    /// Queues a pair evaluation and returns the handle to wait on.
    ///
    /// The handle's deadline is `timeout` from now, so queueing time counts
    /// against it. Fails with [`ExecutionError::PairInFlight`] if an earlier
    /// evaluation of the same pair has not finished.
    pub(crate) fn evaluate(
        &self,
        fence: Arc<Fence>,
        object_id: ObjectId,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<PairHandle, ExecutionError> {
        let deadline = Instant::now() + timeout;
        let Some(claim) = self.in_flight.claim(&fence.id, &object_id) else {
            return Err(ExecutionError::PairInFlight {
                fence_id: fence.id.clone(),
                object_id,
            });
        };
        let (reply, rx) = bounded::<FenceResult<PairOutcome>>(1);
        // A rejected job is dropped here, which releases the claim.
        self.submit(
            Job::Evaluate {
                fence,
                object_id,
                now,
                claim,
                reply,
            },
            timeout,
        )?;
        Ok(PairHandle {
            path: self.name,
            rx,
            deadline,
            budget: timeout,
        })
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    #[cfg(test)]
    pub(crate) fn submit_sleep(&self, duration: Duration) -> Result<Receiver<()>, ExecutionError> {
        let (reply, rx) = bounded::<()>(1);
        self.submit(Job::Sleep { duration, reply }, Duration::from_secs(1))?;
        Ok(rx)
    }
}

fn worker_loop(rx: &Receiver<Job>, evaluator: &PairEvaluator) {
    while let Ok(job) = rx.recv() {
        match job {
            Job::Evaluate {
                fence,
                object_id,
                now,
                claim,
                reply,
            } => {
                let result = panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(&fence, &object_id, now)))
                    .unwrap_or_else(|_| {
                        error!(fence = %fence.id, object = %object_id, "pair evaluation panicked");
                        Err(FenceError::Execution(ExecutionError::PairFailed {
                            fence_id: fence.id.clone(),
                            object_id: object_id.clone(),
                            reason: "evaluation panicked".to_string(),
                        }))
                    });
                // Release before replying: once the collector sees the result,
                // the next cycle must be able to claim the pair.
                drop(claim);
                // The collector may have given up on this pair already.
                let _ = reply.send(result);
            }

            #[cfg(test)]
            Job::Sleep { duration, reply } => {
                thread::sleep(duration);
                let _ = reply.send(());
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Close the channel: workers drain queued jobs then exit.
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Pending result of one pair evaluation.
pub(crate) struct PairHandle {
    path: &'static str,
    rx: Receiver<FenceResult<PairOutcome>>,
    deadline: Instant,
    budget: Duration,
}

impl PairHandle {
    /// Waits for the evaluation until the deadline set at submission.
    ///
    /// On timeout the worker keeps running and keeps its in-flight claim;
    /// the pair is refused by later cycles until the worker finishes.
    pub(crate) fn join(self) -> FenceResult<PairOutcome> {
        self.rx.recv_deadline(self.deadline).map_err(|err| match err {
            RecvTimeoutError::Timeout => FenceError::Execution(ExecutionError::Timeout {
                duration_ms: duration_ms(self.budget),
            }),
            RecvTimeoutError::Disconnected => FenceError::Execution(ExecutionError::Disconnected {
                path: self.path.to_string(),
            }),
        })?
    }
}
