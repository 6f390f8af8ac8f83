//! Semaphore-bounded work pool

use super::{Task, TaskOutcome};
use crate::error::{RegistryError, Result};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Runs a batch of tasks with at most `width` in flight
pub struct WorkPool<T> {
    width: usize,
    semaphore: Arc<Semaphore>,
    tasks: Vec<Box<dyn Task<Output = T>>>,
}

impl<T: Send + 'static> WorkPool<T> {
    /// A width of zero is treated as one
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            semaphore: Arc::new(Semaphore::new(width)),
            tasks: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Append a task to the pending batch
    pub fn submit<K>(&mut self, task: K)
    where
        K: Task<Output = T>,
    {
        self.tasks.push(Box::new(task));
    }

    /// Launch every pending task as permits free up and wait for all launched tasks.
    ///
    /// Returns one outcome per submitted task, in submission order. Once `cancel`
    /// fires no further task is launched; those tasks report [`TaskOutcome::Cancelled`].
    pub async fn run(self, cancel: &CancellationToken) -> Vec<TaskOutcome<T>> {
        let total = self.tasks.len();
        let mut handles: Vec<JoinHandle<Result<T>>> = Vec::with_capacity(total);

        for task in self.tasks {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = self.semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                break;
            };

            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                task.execute(cancel).await
            }));
        }

        let mut outcomes: Vec<TaskOutcome<T>> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(Ok(value)) => TaskOutcome::Succeeded(value),
                Ok(Err(err)) => TaskOutcome::Failed(err),
                Err(join_err) => TaskOutcome::Failed(RegistryError::Task(join_err.to_string())),
            })
            .collect();
        outcomes.resize_with(total, || TaskOutcome::Cancelled);
        outcomes
    }
}
