//! Asynchronous task runner for disk operations.
//!
//! [`TaskRunner`] spawns each submitted task on the tokio runtime, so the
//! pool grows with demand and `submit` never waits. Tasks carry a key:
//!
//! - tasks for the same key run one at a time, in submission order;
//! - tasks for different keys run concurrently with no ordering guarantee.
//!
//! Per-key ordering uses lanes. Submitting a task swaps the key's lane tail
//! for the new task's completion signal, and the new task waits on the
//! previous tail before running. A lane disappears once its last task ends.
//!
//! Results travel back through a [`TaskHandle`]. A task that panics is
//! contained by tokio; its handle resolves to [`StoreError::TaskAborted`]
//! and the next task in its lane still runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify, Semaphore};

use crate::error::{StoreError, StoreResult};

/// Tail of a key's lane: the sequence number of the last submitted task and
/// the signal it fires when finished.
struct Lane {
    seq: u64,
    done: oneshot::Receiver<()>,
}

struct RunnerInner {
    handle: Handle,
    lanes: DashMap<String, Lane>,
    next_seq: AtomicU64,
    pending: AtomicUsize,
    idle: Notify,
    limit: Option<Semaphore>,
}

/// Unbounded (optionally bounded) pool executing keyed tasks.
///
/// Cheap to clone; clones share lanes and the in-flight count.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<RunnerInner>,
}

impl TaskRunner {
    /// Creates a runner on the current tokio runtime.
    ///
    /// `max_concurrent` bounds how many tasks execute at once; `None` keeps
    /// the pool unbounded. Queued tasks never block `submit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] when called outside a tokio runtime or
    /// with a bound of zero.
    pub fn new(max_concurrent: Option<usize>) -> StoreResult<Self> {
        let handle = Handle::try_current().map_err(|_| {
            StoreError::Config("task runner must be created inside a tokio runtime".to_string())
        })?;
        Self::with_handle(handle, max_concurrent)
    }

    /// Creates a runner that spawns onto `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for a bound of zero.
    pub fn with_handle(handle: Handle, max_concurrent: Option<usize>) -> StoreResult<Self> {
        if max_concurrent == Some(0) {
            return Err(StoreError::Config(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(RunnerInner {
                handle,
                lanes: DashMap::new(),
                next_seq: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                limit: max_concurrent.map(Semaphore::new),
            }),
        })
    }

    /// Queues `task` behind every earlier task for `key`.
    ///
    /// Returns immediately. The task starts once its predecessor in the lane
    /// has finished (and a permit is free, when bounded).
    pub fn submit<T, F, Fut>(&self, key: &str, task: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = StoreResult<T>> + Send + 'static,
    {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let previous = self.inner.lanes.insert(
            key.to_string(),
            Lane {
                seq,
                done: done_rx,
            },
        );
        let (result_tx, result_rx) = oneshot::channel();
        self.inner.pending.fetch_add(1, Ordering::AcqRel);

        let guard = InFlight {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            seq,
        };
        tracing::trace!(key, seq, "task submitted");

        self.inner.handle.spawn(async move {
            let guard = guard;
            if let Some(previous) = previous {
                // Err means the predecessor panicked; its slot is still over.
                let _ = previous.done.await;
            }
            let _permit = match guard.inner.limit.as_ref() {
                Some(limit) => limit.acquire().await.ok(),
                None => None,
            };

            let result = task().await;
            let _ = result_tx.send(result);
            let _ = done_tx.send(());
        });

        TaskHandle {
            key: key.to_string(),
            rx: result_rx,
        }
    }

    /// Number of submitted tasks that have not finished.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Number of keys with at least one unfinished task.
    #[must_use]
    pub fn active_lanes(&self) -> usize {
        self.inner.lanes.len()
    }

    /// Waits until no task is in flight.
    ///
    /// Tasks submitted while draining are waited for as well.
    pub async fn drain(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Bookkeeping released when a task ends, including by panic.
struct InFlight {
    inner: Arc<RunnerInner>,
    key: String,
    seq: u64,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::warn!(key = %self.key, seq = self.seq, "background task panicked");
        }
        let seq = self.seq;
        self.inner
            .lanes
            .remove_if(&self.key, |_, lane| lane.seq == seq);
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Result of a submitted task.
///
/// Await it to get the task's result. Dropping it does not cancel the task.
#[must_use = "dropping a TaskHandle detaches the task; its result is then only visible to observers"]
pub struct TaskHandle<T> {
    key: String,
    rx: oneshot::Receiver<StoreResult<T>>,
}

impl<T> TaskHandle<T> {
    /// Key the task was submitted under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Lets the task finish in the background without waiting for it.
    pub fn detach(self) {}
}

impl<T> Future for TaskHandle<T> {
    type Output = StoreResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(result) => result,
            Err(_) => Err(StoreError::TaskAborted {
                key: self.key.clone(),
            }),
        })
    }
}
