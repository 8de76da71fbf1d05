//! The mutation-affinity execution context.
//!
//! World mutations (entity removal, block edits committed by the services)
//! must run on a single designated executor. `SyncContext` models that
//! executor as an actor task draining boxed jobs from a channel; callers hop
//! a closure over with [`SyncContext::run`] and await the result on a oneshot
//! reply.

use crate::error::ContextError;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
pub struct SyncContext {
    tx: mpsc::UnboundedSender<Job>,
}

impl SyncContext {
    /// Spawns the executor task and returns a handle to it. The task runs
    /// until every handle is dropped.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            debug!("🧵 Sync context started");
            while let Some(job) = rx.recv().await {
                job();
            }
            debug!("🧵 Sync context stopped");
        });
        Self { tx }
    }

    /// Runs a job on the context and awaits its result.
    pub async fn run<F, R>(&self, f: F) -> Result<R, ContextError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Box::new(move || {
                let _ = reply.send(f());
            }))
            .map_err(|_| ContextError::Closed)?;
        rx.await.map_err(|_| ContextError::Closed)
    }

    /// Runs a job on the context with a hard wait limit. The job itself is
    /// not interrupted on timeout; only the wait ends.
    pub async fn run_timeout<F, R>(&self, limit: Duration, f: F) -> Result<R, ContextError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match tokio::time::timeout(limit, self.run(f)).await {
            Ok(result) => result,
            Err(_) => Err(ContextError::TimedOut(limit)),
        }
    }
}
