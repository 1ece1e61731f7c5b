//! In-memory transport recording everything the agent sends

use crate::error::TransportError;
use crate::transport::traits::{Delivery, EventSink, PublishRequest, Transport, TransportConnector};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

/// How the fake broker answers ack-required publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckBehavior {
    Immediate,
    Never,
}

/// Observable side effects, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Published(PublishRequest),
    Subscribed(String),
    Disconnected,
}

pub struct RecordingTransport {
    ack: AckBehavior,
    events: Mutex<Vec<TransportEvent>>,
    /// Held so that `AckBehavior::Never` deliveries time out instead of failing
    unacked: Mutex<Vec<oneshot::Sender<()>>>,
    fail_prefix: Mutex<Option<String>>,
    panic_prefix: Mutex<Option<String>>,
    disconnected: AtomicBool,
    closed: watch::Sender<bool>,
}

impl RecordingTransport {
    pub fn new(ack: AckBehavior) -> Self {
        Self {
            ack,
            events: Mutex::new(Vec::new()),
            unacked: Mutex::new(Vec::new()),
            fail_prefix: Mutex::new(None),
            panic_prefix: Mutex::new(None),
            disconnected: AtomicBool::new(false),
            closed: watch::Sender::new(false),
        }
    }

    /// Publishes whose payload starts with `prefix` fail
    pub fn fail_publishes_starting_with(&self, prefix: &str) {
        *self.fail_prefix.lock().unwrap() = Some(prefix.into());
    }

    /// Publishes whose payload starts with `prefix` panic
    pub fn panic_on_publishes_starting_with(&self, prefix: &str) {
        *self.panic_prefix.lock().unwrap() = Some(prefix.into());
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Payloads of all successful publishes, in order
    pub fn payloads(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Published(request) => Some(request.payload),
                _ => None,
            })
            .collect()
    }

    pub fn requests(&self) -> Vec<PublishRequest> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Published(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TransportEvent::Subscribed(topic) => Some(topic),
                _ => None,
            })
            .collect()
    }

    /// The broker went away for good, as after exhausted reconnection attempts
    pub fn lose_connection(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    fn matches(prefix: &Mutex<Option<String>>, payload: &str) -> bool {
        prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| payload.starts_with(prefix))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn publish(&self, request: PublishRequest) -> Result<Delivery, TransportError> {
        if Self::matches(&self.panic_prefix, &request.payload) {
            panic!("simulated panic while publishing {}", request.payload);
        }
        if Self::matches(&self.fail_prefix, &request.payload) {
            return Err(TransportError::Publish {
                topic: request.topic,
                reason: "simulated failure".into(),
            });
        }

        let payload = request.payload.clone();
        let ack_required = request.ack_required;
        self.events
            .lock()
            .unwrap()
            .push(TransportEvent::Published(request));

        if !ack_required {
            return Ok(Delivery::fire_and_forget(payload));
        }

        let (tx, rx) = oneshot::channel();
        match self.ack {
            AckBehavior::Immediate => {
                let _ = tx.send(());
            }
            AckBehavior::Never => self.unacked.lock().unwrap().push(tx),
        }
        Ok(Delivery::pending(payload, rx))
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.events
            .lock()
            .unwrap()
            .push(TransportEvent::Subscribed(topic.into()));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnected.store(true, Ordering::SeqCst);
        self.events.lock().unwrap().push(TransportEvent::Disconnected);
        self.closed.send_replace(true);
        Ok(())
    }

    async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    fn name(&self) -> &'static str {
        "Recording"
    }
}

/// Connector handing out one shared `RecordingTransport`
#[derive(Clone)]
pub struct MockConnector {
    transport: Arc<RecordingTransport>,
    sink: Arc<Mutex<Option<Arc<dyn EventSink>>>>,
    refuse: bool,
}

impl MockConnector {
    pub fn new(transport: Arc<RecordingTransport>) -> Self {
        Self {
            transport,
            sink: Arc::new(Mutex::new(None)),
            refuse: false,
        }
    }

    /// A connector whose broker refuses every connection
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new(Arc::new(RecordingTransport::new(AckBehavior::Immediate)))
        }
    }

    pub fn transport(&self) -> Arc<RecordingTransport> {
        self.transport.clone()
    }

    /// The sink registered by the last successful connect
    pub fn sink(&self) -> Option<Arc<dyn EventSink>> {
        self.sink.lock().unwrap().clone()
    }

    /// Deliver a downstream message as the broker would
    pub async fn deliver(&self, topic: &str, payload: &str) {
        let sink = self.sink().expect("not connected");
        sink.on_message(topic, Bytes::copy_from_slice(payload.as_bytes()))
            .await;
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<Arc<dyn Transport>, TransportError> {
        if self.refuse {
            return Err(TransportError::Connect("connection refused".into()));
        }
        *self.sink.lock().unwrap() = Some(sink.clone());
        sink.on_connect().await;
        Ok(self.transport.clone())
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
