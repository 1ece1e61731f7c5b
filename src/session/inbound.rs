//! Receive-path handler registered with the transport

use crate::command::{CommandDispatcher, Dispatch};
use crate::queue::TaskProducer;
use crate::transport::EventSink;
use async_trait::async_trait;
use bytes::Bytes;
use c8y_smartrest::topics;
use tracing::{debug, info, warn};

/// Turns downstream messages into queued tasks.
///
/// Runs on the transport's receive context, so it only parses and enqueues
/// without waiting. A message that finds a bounded queue full is dropped.
pub struct InboundHandler {
    dispatcher: CommandDispatcher,
    producer: TaskProducer,
}

impl InboundHandler {
    pub fn new(dispatcher: CommandDispatcher, producer: TaskProducer) -> Self {
        Self {
            dispatcher,
            producer,
        }
    }
}

#[async_trait]
impl EventSink for InboundHandler {
    async fn on_connect(&self) {
        info!("[SESSION] Broker accepted connection");
    }

    async fn on_message(&self, topic: &str, payload: Bytes) {
        if topic != topics::DOWNSTREAM {
            debug!("[SESSION] Ignoring message on {}", topic);
            return;
        }
        info!(
            "[SESSION] Received on {}: {}",
            topic,
            String::from_utf8_lossy(&payload)
        );

        match self.dispatcher.dispatch(&payload) {
            Dispatch::Enqueue(task) => {
                let identity = task.to_string();
                if let Err(e) = self.producer.try_enqueue(task) {
                    warn!("[SESSION] Dropping task '{}': {}", identity, e);
                }
            }
            Dispatch::Drop => {}
        }
    }

    async fn on_publish_ack(&self, packet_id: u16) {
        info!("[SESSION] Publish {} acknowledged", packet_id);
    }
}
