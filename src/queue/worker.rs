//! The single worker draining the task queue

use super::{Task, TaskConsumer};
use crate::command::{Flow, OperationExecutor};
use crate::error::{ProtocolError, TaskError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why the worker stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Stop was requested; `abandoned` queued tasks were never started
    Stopped { abandoned: usize },
    /// A task asked to end the session
    Terminated(ProtocolError),
    /// Every producer went away
    QueueClosed,
}

/// Drains the queue, one task at a time, to completion
pub struct Worker {
    consumer: TaskConsumer,
    executor: OperationExecutor,
    stop: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(consumer: TaskConsumer, executor: OperationExecutor, stop: watch::Receiver<bool>) -> Self {
        Self {
            consumer,
            executor,
            stop,
        }
    }

    pub fn spawn(self) -> JoinHandle<WorkerExit> {
        tokio::spawn(self.run())
    }

    /// Run until stopped, terminated, or the queue closes.
    ///
    /// The stop signal is only observed between tasks, so a running task
    /// always completes.
    pub async fn run(mut self) -> WorkerExit {
        info!("[WORKER] Started");

        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = stop_requested(&mut self.stop) => None,
                task = self.consumer.dequeue() => Some(task),
            };

            let task = match next {
                None => break WorkerExit::Stopped { abandoned: 0 },
                Some(None) => break WorkerExit::QueueClosed,
                Some(Some(task)) => task,
            };

            if let Flow::Terminate(reason) = self.execute(task).await {
                break WorkerExit::Terminated(reason);
            }
        };

        let abandoned = self.abandon_pending();
        info!("[WORKER] Stopped");

        match exit {
            WorkerExit::Stopped { .. } => WorkerExit::Stopped { abandoned },
            other => other,
        }
    }

    /// Execute one task, containing its errors and panics
    async fn execute(&mut self, task: Task) -> Flow {
        let identity = task.to_string();
        debug!("[WORKER] Running {}", identity);

        match AssertUnwindSafe(self.executor.run(task)).catch_unwind().await {
            Ok(Ok(flow)) => flow,
            Ok(Err(e)) => {
                error!("[WORKER] Task '{}' failed: {}", identity, e);
                Flow::Continue
            }
            Err(panic) => {
                let e = TaskError::Panicked(panic_message(panic.as_ref()));
                error!("[WORKER] Task '{}' failed: {}", identity, e);
                Flow::Continue
            }
        }
    }

    fn abandon_pending(&mut self) -> usize {
        let pending = self.consumer.close();
        for task in &pending {
            warn!("[WORKER] Abandoning queued task '{}'", task);
        }
        pending.len()
    }
}

/// Resolves once the stop flag is set or its sender is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".into()
    }
}
