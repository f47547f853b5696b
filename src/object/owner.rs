//! Owning-thread executor
//!
//! Inspected objects may only be mutated by the thread that owns them. Work that
//! touches them is sent as a job over a bounded queue and run by an [`OwnerLoop`] on
//! that thread; the sender awaits the result.
//!
//! The loop can run on a dedicated thread ([`OwnerExecutor::spawn`]) or be driven by
//! the host's own thread ([`OwnerExecutor::channel`] plus [`OwnerLoop::run_pending`]
//! from its event loop).
//!
//! A caller that gives up waiting marks its job abandoned. Abandoned jobs that have not
//! started are skipped; a job that has already started always runs to completion and the
//! caller waits for it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, trace};

type Job = Box<dyn FnOnce() + Send + 'static>;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const ABANDONED: u8 = 2;

/// Failure to get a result back from the owning thread
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerError {
    #[error("Timed out waiting for the owning thread")]
    Timeout,
    #[error("Owning thread is no longer accepting work")]
    Unavailable,
}

/// Sending side of the owning-thread queue
#[derive(Clone)]
pub struct OwnerHandle {
    tx: mpsc::Sender<Job>,
}

/// Receiving side; runs jobs on whichever thread drives it
pub struct OwnerLoop {
    rx: mpsc::Receiver<Job>,
}

/// Constructors for the owning-thread queue
pub struct OwnerExecutor;

impl OwnerExecutor {
    /// Create a queue whose loop the caller drives
    pub fn channel(capacity: usize) -> (OwnerHandle, OwnerLoop) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (OwnerHandle { tx }, OwnerLoop { rx })
    }

    /// Create a queue served by a dedicated thread.
    ///
    /// The thread exits once every [`OwnerHandle`] has been dropped.
    pub fn spawn(capacity: usize) -> std::io::Result<(OwnerHandle, thread::JoinHandle<()>)> {
        let (handle, owner_loop) = Self::channel(capacity);
        let join = thread::Builder::new()
            .name("inspector-owner".into())
            .spawn(move || owner_loop.run())?;
        Ok((handle, join))
    }
}

impl OwnerLoop {
    /// Run jobs until every handle is dropped.
    ///
    /// Blocks the calling thread; must not be called from inside an async runtime.
    pub fn run(mut self) {
        debug!("Owner loop started");
        while let Some(job) = self.rx.blocking_recv() {
            run_job(job);
        }
        debug!("Owner loop finished");
    }

    /// Run every job that is already queued, without blocking. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.rx.try_recv() {
            run_job(job);
            count += 1;
        }
        count
    }
}

fn run_job(job: Job) {
    // A panicking job must not take the owning thread down with it
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Job panicked on the owning thread");
    }
}

impl OwnerHandle {
    /// Run `f` on the owning thread and wait for its result, for at most `timeout`.
    pub async fn run<F, R>(&self, timeout: Duration, f: F) -> Result<R, OwnerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let deadline = Instant::now() + timeout;
        let state = Arc::new(AtomicU8::new(PENDING));
        let (done_tx, mut done_rx) = oneshot::channel();

        let job_state = state.clone();
        let job: Job = Box::new(move || {
            if job_state
                .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                trace!("Skipping abandoned job");
                return;
            }
            let _ = done_tx.send(f());
        });

        match timeout_at(deadline, self.tx.send(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(OwnerError::Unavailable),
            Err(_) => return Err(OwnerError::Timeout),
        }

        match timeout_at(deadline, &mut done_rx).await {
            Ok(result) => result.map_err(|_| OwnerError::Unavailable),
            Err(_) => {
                let abandoned = state
                    .compare_exchange(PENDING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok();
                if abandoned {
                    debug!(timeout_ms = timeout.as_millis() as u64, "Abandoned queued job");
                    Err(OwnerError::Timeout)
                } else {
                    // Already running; it is bounded, so wait for the real outcome
                    done_rx.await.map_err(|_| OwnerError::Unavailable)
                }
            }
        }
    }

    /// Whether the loop side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
