//! Transport trait abstraction for the publish/subscribe connection

use crate::error::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use c8y_smartrest::{topics, OutboundMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// A message to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    /// Publish with an acknowledged QoS and hand back a waitable delivery
    pub ack_required: bool,
}

impl PublishRequest {
    /// A SmartREST message on the upstream topic
    pub fn upstream(message: &OutboundMessage, ack_required: bool) -> Self {
        Self {
            topic: topics::UPSTREAM.into(),
            payload: message.encode(),
            ack_required,
        }
    }
}

/// Delivery confirmation of a single publish
#[derive(Debug)]
pub struct Delivery {
    payload: String,
    ack: Option<oneshot::Receiver<()>>,
}

impl Delivery {
    /// Nothing to wait for (QoS 0)
    pub fn fire_and_forget(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            ack: None,
        }
    }

    /// Completes when the sender side is signalled by the transport
    pub fn pending(payload: impl Into<String>, ack: oneshot::Receiver<()>) -> Self {
        Self {
            payload: payload.into(),
            ack: Some(ack),
        }
    }

    /// Block until the broker acknowledged the publish, at most `timeout`
    pub async fn wait_for_publish(self, timeout: Duration) -> Result<(), TransportError> {
        let Some(ack) = self.ack else {
            return Ok(());
        };

        match tokio::time::timeout(timeout, ack).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::ConnectionLost {
                payload: self.payload,
            }),
            Err(_) => Err(TransportError::AckTimeout {
                payload: self.payload,
                timeout,
            }),
        }
    }
}

/// Receiver of transport callbacks.
///
/// Called from the transport's receive context: implementations must return
/// quickly and never run a protocol handshake themselves.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Broker accepted the connection
    async fn on_connect(&self);

    /// A message arrived on a subscribed topic
    async fn on_message(&self, topic: &str, payload: Bytes);

    /// Broker acknowledged the publish with this packet id
    async fn on_publish_ack(&self, packet_id: u16);
}

/// An open publish/subscribe connection
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue a publish; the returned delivery resolves on broker acknowledgment
    async fn publish(&self, request: PublishRequest) -> Result<Delivery, TransportError>;

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Close the connection and stop the receive loop
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Resolves once the connection is gone and will not come back
    async fn closed(&self);

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;

    /// Publish and, if an ack is required, wait for it
    async fn send(&self, request: PublishRequest, ack_timeout: Duration) -> Result<(), TransportError> {
        let delivery = self.publish(request).await?;
        delivery.wait_for_publish(ack_timeout).await
    }
}

/// Factory for transport connections
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Connect and register `sink` for all callbacks of this connection.
    ///
    /// Returns once the broker accepted the connection.
    async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<Arc<dyn Transport>, TransportError>;

    /// Human-readable name for this transport
    fn name(&self) -> &'static str;
}
