//! Task queue and worker
//!
//! Producers (the inbound message handler and the periodic reporter) only
//! enqueue. A single worker dequeues and runs each task to completion, so
//! blocking protocol handshakes never run on the transport's receive path.

mod channel;
mod task;
mod worker;

pub use channel::{task_queue, QueuePolicy, TaskConsumer, TaskProducer};
pub use task::Task;
pub use worker::{Worker, WorkerExit};
