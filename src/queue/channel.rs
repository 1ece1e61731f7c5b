//! Multi-producer, single-consumer FIFO of tasks

use super::Task;
use crate::error::QueueError;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Capacity policy of the task queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Producers never wait
    #[default]
    Unbounded,
    /// Producers wait while `capacity` tasks are queued
    Bounded { capacity: usize },
}

/// Create a task queue; the consumer half is meant for exactly one worker
pub fn task_queue(policy: QueuePolicy) -> (TaskProducer, TaskConsumer) {
    match policy {
        QueuePolicy::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                TaskProducer {
                    inner: ProducerInner::Unbounded(tx),
                },
                TaskConsumer {
                    inner: ConsumerInner::Unbounded(rx),
                },
            )
        }
        QueuePolicy::Bounded { capacity } => {
            let (tx, rx) = mpsc::channel(capacity);
            (
                TaskProducer {
                    inner: ProducerInner::Bounded(tx),
                },
                TaskConsumer {
                    inner: ConsumerInner::Bounded(rx),
                },
            )
        }
    }
}

#[derive(Debug, Clone)]
enum ProducerInner {
    Unbounded(mpsc::UnboundedSender<Task>),
    Bounded(mpsc::Sender<Task>),
}

/// Producer half, cloned for every context that submits work
#[derive(Debug, Clone)]
pub struct TaskProducer {
    inner: ProducerInner,
}

impl TaskProducer {
    /// Append a task; waits only when a bounded queue is full
    pub async fn enqueue(&self, task: Task) -> Result<(), QueueError> {
        match &self.inner {
            ProducerInner::Unbounded(tx) => tx.send(task).map_err(|_| QueueError::Closed),
            ProducerInner::Bounded(tx) => tx.send(task).await.map_err(|_| QueueError::Closed),
        }
    }

    /// Append a task without waiting; a full bounded queue rejects it
    pub fn try_enqueue(&self, task: Task) -> Result<(), QueueError> {
        match &self.inner {
            ProducerInner::Unbounded(tx) => tx.send(task).map_err(|_| QueueError::Closed),
            ProducerInner::Bounded(tx) => tx.try_send(task).map_err(|e| match e {
                TrySendError::Full(_) => QueueError::Full,
                TrySendError::Closed(_) => QueueError::Closed,
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.inner {
            ProducerInner::Unbounded(tx) => tx.is_closed(),
            ProducerInner::Bounded(tx) => tx.is_closed(),
        }
    }
}

#[derive(Debug)]
enum ConsumerInner {
    Unbounded(mpsc::UnboundedReceiver<Task>),
    Bounded(mpsc::Receiver<Task>),
}

/// Consumer half, owned by the worker
#[derive(Debug)]
pub struct TaskConsumer {
    inner: ConsumerInner,
}

impl TaskConsumer {
    /// Wait for the next task; `None` once every producer is gone
    pub async fn dequeue(&mut self) -> Option<Task> {
        match &mut self.inner {
            ConsumerInner::Unbounded(rx) => rx.recv().await,
            ConsumerInner::Bounded(rx) => rx.recv().await,
        }
    }

    /// Refuse further tasks and hand back the ones not yet started
    pub fn close(&mut self) -> Vec<Task> {
        let mut pending = Vec::new();
        match &mut self.inner {
            ConsumerInner::Unbounded(rx) => {
                rx.close();
                while let Ok(task) = rx.try_recv() {
                    pending.push(task);
                }
            }
            ConsumerInner::Bounded(rx) => {
                rx.close();
                while let Ok(task) = rx.try_recv() {
                    pending.push(task);
                }
            }
        }
        pending
    }
}
