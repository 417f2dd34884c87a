use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Bounded admission for monitor dispatch, plus a completion barrier over a
/// pre-declared batch of jobs.
///
/// Admission is a semaphore: a [`JobSlot`] is acquired before a container is
/// dispatched and held until the monitor's stats subscription is open, so the
/// bound applies to subscriptions in flight rather than fully delivered
/// samples. The barrier tracks the batch declared at construction: counted
/// slots mark one declared job done when released (or dropped, for abandoned
/// containers), and [`wait_all`] blocks until the whole batch is done.
/// Event-driven dispatch acquires untracked slots, which take a permit but
/// leave the barrier alone.
///
/// [`wait_all`]: WorkerPool::wait_all
#[derive(Debug)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    batch: Arc<Batch>,
}

#[derive(Debug)]
struct Batch {
    pending: AtomicUsize,
    done: Notify,
}

impl Batch {
    fn mark_done(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_waiters();
        }
    }
}

impl WorkerPool {
    /// Creates a pool with `workers` concurrent slots and a declared batch of
    /// `jobs` counted jobs.
    pub fn new(workers: usize, jobs: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            batch: Arc::new(Batch {
                pending: AtomicUsize::new(jobs),
                done: Notify::new(),
            }),
        }
    }

    /// Acquires a slot for one job of the declared batch.
    ///
    /// Must be called at most `jobs` times over the pool's lifetime.
    pub async fn acquire(&self) -> JobSlot {
        JobSlot {
            _permit: self.acquire_permit().await,
            batch: Some(Arc::clone(&self.batch)),
        }
    }

    /// Acquires a slot outside the declared batch (event-driven dispatch).
    pub async fn acquire_untracked(&self) -> JobSlot {
        JobSlot {
            _permit: self.acquire_permit().await,
            batch: None,
        }
    }

    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("pool semaphore never closes")
    }

    /// Blocks until every job of the declared batch has released its slot.
    pub async fn wait_all(&self) {
        loop {
            let done = self.batch.done.notified();
            tokio::pin!(done);
            // Register for the wakeup before re-checking, so a release
            // between the check and the await cannot be missed.
            done.as_mut().enable();
            if self.batch.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            done.await;
        }
    }
}

/// One occupied pool slot.
///
/// Dropping the slot frees its worker permit; for counted slots it also marks
/// the declared job done. [`release`] is the explicit form used at the
/// subscription-open point of a monitor cycle.
///
/// [`release`]: JobSlot::release
#[derive(Debug)]
pub struct JobSlot {
    _permit: OwnedSemaphorePermit,
    batch: Option<Arc<Batch>>,
}

impl JobSlot {
    /// Releases the slot.
    pub fn release(self) {}
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            batch.mark_done();
        }
    }
}
