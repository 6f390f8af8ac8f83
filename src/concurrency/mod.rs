//! Bounded concurrency for per-stage fan-out
//!
//! A [`WorkPool`] runs a pre-registered batch of [`Task`]s with at most N of
//! them in flight, where N is supplied by the caller. Every submitted task ends
//! with exactly one [`TaskOutcome`]; the pool itself never fails and never
//! short-circuits on a failing task.
//!
//! ## Usage Example
//!
//! ```no_run
//! use registry_sync::RegistryError;
//! use registry_sync::concurrency::{TaskOutcome, WorkPool};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() {
//! let mut pool = WorkPool::new(3);
//! for i in 0..10u32 {
//!     pool.submit(move |_cancel: CancellationToken| async move {
//!         Ok::<_, RegistryError>(i * 2)
//!     });
//! }
//! let outcomes = pool.run(&CancellationToken::new()).await;
//! assert!(outcomes.iter().all(TaskOutcome::is_succeeded));
//! # }
//! ```

pub mod pool;

pub use pool::WorkPool;

use crate::error::{RegistryError, Result};
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// A unit of work that executes against a cancellation token and produces one outcome
#[async_trait]
pub trait Task: Send + 'static {
    type Output: Send + 'static;

    async fn execute(self: Box<Self>, cancel: CancellationToken) -> Result<Self::Output>;
}

#[async_trait]
impl<F, Fut, O> Task for F
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
    O: Send + 'static,
{
    type Output = O;

    async fn execute(self: Box<Self>, cancel: CancellationToken) -> Result<O> {
        (*self)(cancel).await
    }
}

/// Terminal state of one submitted task
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Succeeded(T),
    Failed(RegistryError),
    /// Never launched because cancellation fired first
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    /// Convert into a result, treating a task that never ran as cancelled
    pub fn into_result(self) -> Result<T> {
        match self {
            TaskOutcome::Succeeded(value) => Ok(value),
            TaskOutcome::Failed(err) => Err(err),
            TaskOutcome::Cancelled => Err(RegistryError::Cancelled),
        }
    }
}
