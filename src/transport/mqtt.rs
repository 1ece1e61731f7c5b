//! MQTT transport implementation over rumqttc
//!
//! rumqttc does not hand out a per-publish token, so acknowledgments are
//! matched by order: publishes leave the event loop in request order, each
//! `Outgoing::Publish(pkid)` is paired with the oldest unmatched request, and
//! the waiter of that request is released on `PubAck`/`PubComp` for the pkid.
//! After a reconnect rumqttc resends unacknowledged publishes under their
//! original pkid; those are recognized by the pkid and keep their waiter.

use crate::config::{AgentConfig, TlsConfig};
use crate::error::TransportError;
use crate::transport::traits::{Delivery, EventSink, PublishRequest, Transport, TransportConnector};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, TlsConfiguration};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Plain TCP port
pub const MQTT_PORT: u16 = 1883;

/// TLS port
pub const MQTTS_PORT: u16 = 8883;

/// Capacity of the request channel between client and event loop
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Time given to the event loop to flush the DISCONNECT packet
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// Everything needed to open a broker connection
#[derive(Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    /// QoS of publishes that require an acknowledgment
    pub ack_qos: QoS,
    pub tls: Option<TlsConfig>,
    /// Pause between reconnection attempts
    pub reconnect_delay: Duration,
    /// Failed reconnections in a row before the connection is given up
    pub max_reconnect_attempts: u32,
}

impl MqttSettings {
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        let (host, port) = parse_server_url(&config.server_url, config.tls.is_some())?;
        let ack_qos = match config.agent.ack_qos {
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => bail!("Unsupported acknowledgment QoS {}", other),
        };

        Ok(Self {
            host,
            port,
            client_id: config.client_id.clone(),
            username: config.broker_username(),
            password: config.password.clone(),
            keep_alive: config.agent.keep_alive(),
            connect_timeout: config.agent.connect_timeout(),
            ack_qos,
            tls: config.tls.clone(),
            reconnect_delay: config.agent.reconnect_delay(),
            max_reconnect_attempts: config.agent.max_reconnect_attempts,
        })
    }

    fn mqtt_options(&self) -> Result<MqttOptions, TransportError> {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_credentials(&self.username, &self.password);

        if let Some(tls) = &self.tls {
            options.set_transport(rumqttc::Transport::tls_with_config(tls_configuration(tls)?));
        }

        Ok(options)
    }
}

fn tls_configuration(tls: &TlsConfig) -> Result<TlsConfiguration, TransportError> {
    let read = |path: &std::path::Path| {
        std::fs::read(path).map_err(|e| TransportError::Tls(format!("{}: {}", path.display(), e)))
    };

    let ca = read(tls.ca_certs.as_path())?;
    let client_auth = match (&tls.certfile, &tls.keyfile) {
        (Some(cert), Some(key)) => Some((read(cert.as_path())?, read(key.as_path())?)),
        _ => None,
    };

    Ok(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth,
    })
}

/// Split a server URL into host and port.
///
/// Accepts a bare host, `host:port`, or either with an `mqtt://`/`mqtts://`
/// scheme. The default port depends on whether TLS is configured.
pub fn parse_server_url(url: &str, tls: bool) -> Result<(String, u16)> {
    let (scheme_tls, rest) = if let Some(rest) = url.strip_prefix("mqtts://") {
        (Some(true), rest)
    } else if let Some(rest) = url.strip_prefix("ssl://") {
        (Some(true), rest)
    } else if let Some(rest) = url.strip_prefix("mqtt://") {
        (Some(false), rest)
    } else if let Some(rest) = url.strip_prefix("tcp://") {
        (Some(false), rest)
    } else {
        (None, url)
    };

    if scheme_tls == Some(true) && !tls {
        bail!("{} requires a [tls] section", url);
    }

    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| anyhow!("Invalid port in server URL {}", url))?;
            (host, port)
        }
        None => (rest, if tls { MQTTS_PORT } else { MQTT_PORT }),
    };

    if host.is_empty() {
        bail!("Missing host in server URL {}", url);
    }

    Ok((host.to_string(), port))
}

/// Matches outgoing publishes to their acknowledgment waiters
#[derive(Debug, Default)]
struct AckTracker {
    /// One entry per publish handed to the client, oldest first
    queued: VecDeque<Option<oneshot::Sender<()>>>,
    /// Waiters of publishes on the wire, by packet id
    inflight: HashMap<u16, oneshot::Sender<()>>,
}

impl AckTracker {
    fn register(&mut self, waiter: Option<oneshot::Sender<()>>) {
        self.queued.push_back(waiter);
    }

    /// Undo the last `register` when the client refused the request
    fn unregister_last(&mut self) {
        self.queued.pop_back();
    }

    fn on_outgoing_publish(&mut self, pkid: u16) {
        if pkid != 0 && self.inflight.contains_key(&pkid) {
            debug!("[MQTT] Publish pkid={} resent", pkid);
            return;
        }

        match self.queued.pop_front() {
            Some(Some(waiter)) if pkid == 0 => {
                // QoS 0 publishes are never acknowledged
                let _ = waiter.send(());
            }
            Some(Some(waiter)) => {
                self.inflight.insert(pkid, waiter);
            }
            Some(None) => {}
            None => debug!("[MQTT] Untracked outgoing publish pkid={}", pkid),
        }
    }

    /// Returns true if a waiter was released
    fn on_ack(&mut self, pkid: u16) -> bool {
        match self.inflight.remove(&pkid) {
            Some(waiter) => {
                let _ = waiter.send(());
                true
            }
            None => false,
        }
    }

    fn pending(&self) -> usize {
        self.queued.iter().filter(|w| w.is_some()).count() + self.inflight.len()
    }

    /// Drop every waiter; their deliveries fail with `ConnectionLost`
    fn fail_all(&mut self) -> usize {
        let count = self.pending();
        self.queued.clear();
        self.inflight.clear();
        count
    }
}

/// Topics to restore when the broker starts a fresh session
#[derive(Debug, Default)]
struct Subscriptions {
    topics: Vec<String>,
    connections: u32,
}

impl Subscriptions {
    fn add(&mut self, topic: &str) {
        if !self.topics.iter().any(|t| t == topic) {
            self.topics.push(topic.to_string());
        }
    }

    /// Topics to subscribe again after this connection acknowledgment
    fn on_connack(&mut self, session_present: bool) -> Vec<String> {
        self.connections += 1;
        if self.connections == 1 || session_present {
            return Vec::new();
        }
        self.topics.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Connector producing rumqttc-backed transports
pub struct MqttConnector {
    settings: MqttSettings,
}

impl MqttConnector {
    pub fn new(settings: MqttSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TransportConnector for MqttConnector {
    async fn connect(&self, sink: Arc<dyn EventSink>) -> Result<Arc<dyn Transport>, TransportError> {
        let options = self.settings.mqtt_options()?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let tracker = Arc::new(Mutex::new(AckTracker::default()));
        let subscriptions = Arc::new(Mutex::new(Subscriptions::default()));
        let (connack_tx, connack_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        info!(
            "[MQTT] Connecting to {}:{} as {}",
            self.settings.host, self.settings.port, self.settings.client_id
        );

        let receive_loop = tokio::spawn(
            ReceiveLoop {
                eventloop,
                client: client.clone(),
                sink,
                tracker: tracker.clone(),
                subscriptions: subscriptions.clone(),
                reconnect_delay: self.settings.reconnect_delay,
                max_reconnect_attempts: self.settings.max_reconnect_attempts,
            }
            .run(connack_tx, closed_tx),
        );

        match timeout(self.settings.connect_timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(reason))) => {
                return Err(TransportError::Connect(reason));
            }
            Ok(Err(_)) => {
                return Err(TransportError::Connect("receive loop stopped".into()));
            }
            Err(_) => {
                receive_loop.abort();
                return Err(TransportError::ConnectTimeout(self.settings.connect_timeout));
            }
        }

        Ok(Arc::new(MqttTransport {
            client,
            ack_qos: self.settings.ack_qos,
            tracker,
            subscriptions,
            publish_order: tokio::sync::Mutex::new(()),
            receive_loop: Mutex::new(Some(receive_loop)),
            closed: closed_rx,
        }))
    }

    fn name(&self) -> &'static str {
        "MQTT"
    }
}

/// Drives the rumqttc event loop and forwards events to the sink
struct ReceiveLoop {
    eventloop: EventLoop,
    /// Used only to restore subscriptions after a reconnect
    client: AsyncClient,
    sink: Arc<dyn EventSink>,
    tracker: Arc<Mutex<AckTracker>>,
    subscriptions: Arc<Mutex<Subscriptions>>,
    reconnect_delay: Duration,
    max_reconnect_attempts: u32,
}

impl ReceiveLoop {
    async fn run(
        mut self,
        connack_tx: oneshot::Sender<Result<(), String>>,
        closed_tx: watch::Sender<bool>,
    ) {
        let mut connack_tx = Some(connack_tx);
        let mut error_count = 0;

        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                    error_count = 0;
                    info!("[MQTT] Connection acknowledged ({:?})", connack.code);
                    if let Some(tx) = connack_tx.take() {
                        let _ = tx.send(Ok(()));
                    }
                    self.restore_subscriptions(connack.session_present);
                    self.sink.on_connect().await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("[MQTT] < {} ({} bytes)", publish.topic, publish.payload.len());
                    self.sink.on_message(&publish.topic, publish.payload).await;
                }
                Ok(Event::Incoming(Packet::PubAck(ack))) => {
                    lock(&self.tracker).on_ack(ack.pkid);
                    self.sink.on_publish_ack(ack.pkid).await;
                }
                Ok(Event::Incoming(Packet::PubComp(comp))) => {
                    lock(&self.tracker).on_ack(comp.pkid);
                    self.sink.on_publish_ack(comp.pkid).await;
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    info!("[MQTT] Subscription acknowledged (pkid={})", ack.pkid);
                }
                Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                    debug!("[MQTT] Publish sent (pkid={})", pkid);
                    lock(&self.tracker).on_outgoing_publish(pkid);
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("[MQTT] Disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    if let Some(tx) = connack_tx.take() {
                        let _ = tx.send(Err(e.to_string()));
                        break;
                    }

                    error_count += 1;
                    if error_count > self.max_reconnect_attempts {
                        error!(
                            "[MQTT] Giving up after {} failed reconnections: {}",
                            self.max_reconnect_attempts, e
                        );
                        break;
                    }

                    let pending = lock(&self.tracker).pending();
                    warn!(
                        "[MQTT] Connection error ({}/{}), {} publish(es) awaiting acknowledgment: {}",
                        error_count, self.max_reconnect_attempts, pending, e
                    );
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }

        let failed = lock(&self.tracker).fail_all();
        if failed > 0 {
            warn!("[MQTT] {} publish(es) lost their acknowledgment", failed);
        }
        closed_tx.send_replace(true);
        info!("[MQTT] Receive loop stopped");
    }

    fn restore_subscriptions(&self, session_present: bool) {
        let topics = lock(&self.subscriptions).on_connack(session_present);
        for topic in topics {
            match self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                Ok(()) => info!("[MQTT] Resubscribing to {}", topic),
                Err(e) => warn!("[MQTT] Failed to resubscribe to {}: {}", topic, e),
            }
        }
    }
}

/// An open rumqttc connection
pub struct MqttTransport {
    client: AsyncClient,
    ack_qos: QoS,
    tracker: Arc<Mutex<AckTracker>>,
    subscriptions: Arc<Mutex<Subscriptions>>,
    /// Keeps tracker registration and request submission in the same order
    publish_order: tokio::sync::Mutex<()>,
    receive_loop: Mutex<Option<JoinHandle<()>>>,
    /// Set once the receive loop has stopped
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, request: PublishRequest) -> Result<Delivery, TransportError> {
        let qos = if request.ack_required {
            self.ack_qos
        } else {
            QoS::AtMostOnce
        };

        let _order = self.publish_order.lock().await;

        let (waiter, delivery) = if request.ack_required {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Delivery::pending(request.payload.clone(), rx))
        } else {
            (None, Delivery::fire_and_forget(request.payload.clone()))
        };
        lock(&self.tracker).register(waiter);

        if let Err(e) = self
            .client
            .publish(request.topic.as_str(), qos, false, request.payload.clone())
            .await
        {
            lock(&self.tracker).unregister_last();
            return Err(TransportError::Publish {
                topic: request.topic,
                reason: e.to_string(),
            });
        }

        info!("[MQTT] > {} {} ({:?})", request.topic, request.payload, qos);
        Ok(delivery)
    }

    async fn subscribe(&self, topic: &str) -> Result<(), TransportError> {
        lock(&self.subscriptions).add(topic);
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe {
                topic: topic.into(),
                reason: e.to_string(),
            })?;
        info!("[MQTT] Subscribed to {}", topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let handle = lock(&self.receive_loop).take();

        let result = self
            .client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()));

        if let Some(mut handle) = handle {
            if timeout(DISCONNECT_GRACE, &mut handle).await.is_err() {
                warn!("[MQTT] Receive loop did not stop in time, aborting");
                handle.abort();
            }
        }

        result
    }

    async fn closed(&self) {
        let mut closed = self.closed.clone();
        // A dropped sender means the receive loop is gone as well
        let _ = closed.wait_for(|closed| *closed).await;
    }

    fn name(&self) -> &'static str {
        "MQTT"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_broker::{ReceivedPacket, TestBroker};
    use bytes::Bytes;

    struct QuietSink;

    #[async_trait]
    impl EventSink for QuietSink {
        async fn on_connect(&self) {}
        async fn on_message(&self, _topic: &str, _payload: Bytes) {}
        async fn on_publish_ack(&self, _packet_id: u16) {}
    }

    fn local_settings(broker: &TestBroker) -> MqttSettings {
        let mut config = AgentConfig::default();
        config.server_url = format!("127.0.0.1:{}", broker.port());
        config.agent.reconnect_delay_ms = 200;
        config.agent.max_reconnect_attempts = 2;
        MqttSettings::from_config(&config).unwrap()
    }

    async fn connect(settings: MqttSettings) -> Arc<dyn Transport> {
        MqttConnector::new(settings)
            .connect(Arc::new(QuietSink))
            .await
            .unwrap()
    }

    fn ack_request(payload: &str) -> PublishRequest {
        PublishRequest {
            topic: "s/us".into(),
            payload: payload.into(),
            ack_required: true,
        }
    }

    #[test]
    fn test_parse_bare_host() {
        assert_eq!(
            parse_server_url("mqtt.example.com", false).unwrap(),
            ("mqtt.example.com".to_string(), MQTT_PORT)
        );
        assert_eq!(
            parse_server_url("mqtt.example.com", true).unwrap(),
            ("mqtt.example.com".to_string(), MQTTS_PORT)
        );
    }

    #[test]
    fn test_parse_scheme_and_port() {
        assert_eq!(
            parse_server_url("mqtt://localhost:1884/", false).unwrap(),
            ("localhost".to_string(), 1884)
        );
        assert_eq!(
            parse_server_url("mqtts://tenant.example.com:8883", true).unwrap(),
            ("tenant.example.com".to_string(), 8883)
        );
    }

    #[test]
    fn test_parse_rejects_bad_urls() {
        assert!(parse_server_url("localhost:notaport", false).is_err());
        assert!(parse_server_url("mqtt://:1883", false).is_err());
        assert!(parse_server_url("mqtts://secure.example.com", false).is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = AgentConfig::default();
        config.server_url = "broker.local:1999".into();
        config.tenant = "t7".into();
        config.username = "bob".into();
        config.agent.ack_qos = 2;
        config.agent.reconnect_delay_ms = 250;
        config.agent.max_reconnect_attempts = 3;

        let settings = MqttSettings::from_config(&config).unwrap();
        assert_eq!(settings.host, "broker.local");
        assert_eq!(settings.port, 1999);
        assert_eq!(settings.username, "t7/bob");
        assert_eq!(settings.ack_qos, QoS::ExactlyOnce);
        assert_eq!(settings.reconnect_delay, Duration::from_millis(250));
        assert_eq!(settings.max_reconnect_attempts, 3);
    }

    #[test]
    fn test_missing_ca_file_is_tls_error() {
        let tls = TlsConfig {
            ca_certs: "/nonexistent/ca.pem".into(),
            certfile: None,
            keyfile: None,
        };
        assert!(matches!(tls_configuration(&tls), Err(TransportError::Tls(_))));
    }

    #[test]
    fn test_tracker_matches_in_order() {
        let mut tracker = AckTracker::default();
        let (first_tx, mut first_rx) = oneshot::channel();
        let (second_tx, mut second_rx) = oneshot::channel();

        tracker.register(Some(first_tx));
        tracker.register(None);
        tracker.register(Some(second_tx));

        tracker.on_outgoing_publish(7);
        tracker.on_outgoing_publish(0);
        tracker.on_outgoing_publish(8);

        assert!(tracker.on_ack(8));
        assert!(second_rx.try_recv().is_ok());
        assert!(first_rx.try_recv().is_err());

        assert!(tracker.on_ack(7));
        assert!(first_rx.try_recv().is_ok());

        // Unknown or repeated acks are ignored
        assert!(!tracker.on_ack(7));
        assert!(!tracker.on_ack(99));
    }

    #[test]
    fn test_tracker_unregister_last() {
        let mut tracker = AckTracker::default();
        let (tx, _rx) = oneshot::channel();
        tracker.register(None);
        tracker.register(Some(tx));
        tracker.unregister_last();

        assert_eq!(tracker.queued.len(), 1);
        assert!(tracker.queued[0].is_none());
    }

    #[test]
    fn test_tracker_fail_all_drops_waiters() {
        let mut tracker = AckTracker::default();
        let (queued_tx, mut queued_rx) = oneshot::channel::<()>();
        let (inflight_tx, mut inflight_rx) = oneshot::channel::<()>();

        tracker.register(Some(inflight_tx));
        tracker.on_outgoing_publish(1);
        tracker.register(Some(queued_tx));
        tracker.register(None);

        assert_eq!(tracker.fail_all(), 2);
        assert!(matches!(
            queued_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(matches!(
            inflight_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_tracker_resent_publish_keeps_its_waiter() {
        let mut tracker = AckTracker::default();
        let (first_tx, mut first_rx) = oneshot::channel();
        let (second_tx, mut second_rx) = oneshot::channel();

        tracker.register(Some(first_tx));
        tracker.on_outgoing_publish(1);
        // Connection dropped; a newer publish is queued before the resend
        tracker.register(Some(second_tx));
        tracker.on_outgoing_publish(1);
        tracker.on_outgoing_publish(2);

        assert!(tracker.on_ack(1));
        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_err());
        assert_eq!(tracker.pending(), 1);

        assert!(tracker.on_ack(2));
        assert!(second_rx.try_recv().is_ok());
    }

    #[test]
    fn test_subscriptions_restored_only_on_fresh_sessions() {
        let mut subscriptions = Subscriptions::default();
        subscriptions.add("s/ds");
        subscriptions.add("s/ds");

        assert!(subscriptions.on_connack(false).is_empty());
        assert_eq!(subscriptions.on_connack(false), vec!["s/ds".to_string()]);
        assert!(subscriptions.on_connack(true).is_empty());
    }

    #[tokio::test]
    async fn test_subscription_survives_reconnect() {
        let broker = TestBroker::start().await;
        let transport = connect(local_settings(&broker)).await;

        transport.subscribe("s/ds").await.unwrap();
        broker
            .wait_until(|c| c[0].contains(&ReceivedPacket::Subscribe { topics: vec!["s/ds".into()] }))
            .await;

        broker.drop_connections();
        broker
            .wait_until(|c| {
                c.len() >= 2
                    && c[1].contains(&ReceivedPacket::Subscribe { topics: vec!["s/ds".into()] })
            })
            .await;

        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_resent_publish_does_not_release_newer_waiter() {
        let broker = TestBroker::start().await;
        broker.withhold_acks_for(Some(""));
        let mut settings = local_settings(&broker);
        settings.reconnect_delay = Duration::from_millis(500);
        let transport = connect(settings).await;

        let executing = transport.publish(ack_request("501,c8y_Command")).await.unwrap();
        broker
            .wait_until(|c| c[0].iter().any(|p| matches!(p, ReceivedPacket::Publish { .. })))
            .await;

        broker.drop_connections();
        broker.withhold_acks_for(Some("503"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let result = transport
            .publish(ack_request("503,c8y_Command,Success"))
            .await
            .unwrap();

        assert!(executing.wait_for_publish(Duration::from_secs(5)).await.is_ok());
        assert!(matches!(
            result.wait_for_publish(Duration::from_millis(500)).await,
            Err(TransportError::AckTimeout { .. })
        ));

        transport.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_after_reconnection_attempts_run_out() {
        let broker = TestBroker::start().await;
        let mut settings = local_settings(&broker);
        settings.reconnect_delay = Duration::from_millis(50);
        let transport = connect(settings).await;

        broker.shutdown();

        timeout(Duration::from_secs(5), transport.closed())
            .await
            .expect("transport still open");
    }

    #[tokio::test]
    async fn test_disconnect_closes_transport() {
        let broker = TestBroker::start().await;
        let transport = connect(local_settings(&broker)).await;

        transport.disconnect().await.unwrap();

        timeout(Duration::from_secs(1), transport.closed())
            .await
            .expect("transport still open");
    }
}
