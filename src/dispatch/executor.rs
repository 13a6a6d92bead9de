// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded pool of threads that run user callbacks.
//!
//! Every job is routed to a lane chosen from its exchange token, so all
//! callbacks of one exchange run in order on one thread while different
//! exchanges run in parallel. Lanes are bounded: when a lane is full the
//! pump waits instead of queueing without limit.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Task {
    Run(Job),
    Barrier(oneshot::Sender<()>),
}

/// Worker threads that run callbacks, one bounded lane per thread.
///
/// A job goes to lane `key % workers`, so exchanges whose tokens share a
/// lane share its thread. A callback that blocks delays every exchange on
/// its lane, and once that lane is full the pump waits for it as well.
/// Raise `callback_workers` when callbacks may block for long.
pub(crate) struct CallbackExecutor {
    lanes: Mutex<Option<Vec<mpsc::Sender<Task>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CallbackExecutor {
    /// Starts `workers` threads, each with a lane of `capacity` jobs.
    pub(crate) fn start(workers: usize, capacity: usize) -> Result<Self> {
        let mut lanes = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = mpsc::channel(capacity);
            let handle = std::thread::Builder::new()
                .name(format!("oic-callback-{index}"))
                .spawn(move || run_lane(index, rx))?;
            lanes.push(tx);
            handles.push(handle);
        }
        Ok(Self {
            lanes: Mutex::new(Some(lanes)),
            workers: Mutex::new(handles),
        })
    }

    fn lane(&self, key: u64) -> Option<mpsc::Sender<Task>> {
        let lanes = self.lanes.lock();
        let lanes = lanes.as_ref()?;
        let len = u64::try_from(lanes.len()).ok()?;
        let index = usize::try_from(key % len).ok()?;
        lanes.get(index).cloned()
    }

    /// Queues `job` on the lane for `key`, waiting for room if the lane is full.
    pub(crate) async fn dispatch<F>(&self, key: u64, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(lane) = self.lane(key) else {
            tracing::warn!(key, "Callback dropped, executor is shut down");
            return;
        };
        if lane.send(Task::Run(Box::new(job))).await.is_err() {
            tracing::warn!(key, "Callback dropped, worker has exited");
        }
    }

    /// Waits until every job queued before this call has run.
    pub(crate) async fn flush(&self) {
        let lanes = self.lanes.lock().clone().unwrap_or_default();
        let mut barriers = Vec::with_capacity(lanes.len());
        for lane in lanes {
            let (tx, rx) = oneshot::channel();
            if lane.send(Task::Barrier(tx)).await.is_ok() {
                barriers.push(rx);
            }
        }
        for rx in barriers {
            let _ = rx.await;
        }
    }

    /// Closes the lanes and waits for the workers to finish queued jobs.
    pub(crate) async fn shutdown(&self) {
        drop(self.lanes.lock().take());
        let handles: Vec<_> = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            return;
        }
        let joined = tokio::task::spawn_blocking(move || {
            for handle in handles {
                if handle.join().is_err() {
                    tracing::warn!("Callback worker panicked");
                }
            }
        })
        .await;
        if let Err(e) = joined {
            tracing::warn!(error = %e, "Failed to join callback workers");
        }
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}

impl std::fmt::Debug for CallbackExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackExecutor")
            .field("workers", &self.worker_count())
            .finish_non_exhaustive()
    }
}

fn run_lane(index: usize, mut rx: mpsc::Receiver<Task>) {
    while let Some(task) = rx.blocking_recv() {
        match task {
            Task::Run(job) => {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::warn!(lane = index, "Callback panicked");
                }
            }
            Task::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::trace!(lane = index, "Callback worker stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn jobs_on_one_lane_run_in_order() {
        let executor = CallbackExecutor::start(3, 4).unwrap();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..20 {
            let seen = Arc::clone(&seen);
            executor.dispatch(7, move || seen.lock().push(i)).await;
        }
        executor.flush().await;

        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn panicking_job_does_not_kill_lane() {
        let executor = CallbackExecutor::start(1, 4).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        executor.dispatch(0, || panic!("boom")).await;
        let counter = Arc::clone(&count);
        executor
            .dispatch(0, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        executor.flush().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        executor.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_runs_queued_jobs_then_drops_new_ones() {
        let executor = CallbackExecutor::start(2, 8).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        for key in 0..4 {
            let counter = Arc::clone(&count);
            executor
                .dispatch(key, move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }
        executor.shutdown().await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        assert_eq!(executor.worker_count(), 0);

        let counter = Arc::clone(&count);
        executor
            .dispatch(0, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }
}
