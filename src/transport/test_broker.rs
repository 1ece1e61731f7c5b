//! Minimal MQTT 3.1.1 broker for driving the rumqttc transport in tests
//!
//! Accepts any client, acknowledges everything it is not told to withhold,
//! and records every packet per connection. No routing between clients.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A packet as the broker saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedPacket {
    Connect,
    Publish {
        topic: String,
        payload: String,
        pkid: u16,
        qos: u8,
    },
    Subscribe {
        topics: Vec<String>,
    },
    Disconnect,
    Other(u8),
}

#[derive(Default)]
struct BrokerState {
    connections: Mutex<Vec<Vec<ReceivedPacket>>>,
    withhold: Mutex<Option<String>>,
}

impl BrokerState {
    fn record(&self, connection: usize, packet: ReceivedPacket) {
        self.connections.lock().unwrap()[connection].push(packet);
    }

    fn withholds(&self, payload: &str) -> bool {
        self.withhold
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| payload.starts_with(prefix))
    }
}

pub struct TestBroker {
    port: u16,
    state: Arc<BrokerState>,
    drop_tx: Arc<watch::Sender<u64>>,
    accept: JoinHandle<()>,
}

impl TestBroker {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(BrokerState::default());
        let drop_tx = Arc::new(watch::Sender::new(0u64));

        let accept = tokio::spawn({
            let state = state.clone();
            let drop_tx = drop_tx.clone();
            async move {
                while let Ok((socket, _)) = listener.accept().await {
                    let connection = {
                        let mut connections = state.connections.lock().unwrap();
                        connections.push(Vec::new());
                        connections.len() - 1
                    };
                    tokio::spawn(serve(socket, connection, state.clone(), drop_tx.subscribe()));
                }
            }
        });

        Self {
            port,
            state,
            drop_tx,
            accept,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Packets received so far, one list per accepted connection
    pub fn connections(&self) -> Vec<Vec<ReceivedPacket>> {
        self.state.connections.lock().unwrap().clone()
    }

    /// Payloads of every publish received, across connections
    pub fn payloads(&self) -> Vec<String> {
        self.connections()
            .into_iter()
            .flatten()
            .filter_map(|packet| match packet {
                ReceivedPacket::Publish { payload, .. } => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Stop acknowledging publishes whose payload starts with `prefix`;
    /// `Some("")` withholds all of them, `None` acknowledges everything
    pub fn withhold_acks_for(&self, prefix: Option<&str>) {
        *self.state.withhold.lock().unwrap() = prefix.map(String::from);
    }

    /// Close every open client connection; new ones are still accepted
    pub fn drop_connections(&self) {
        self.drop_tx.send_modify(|generation| *generation += 1);
    }

    /// Stop listening and close every connection
    pub fn shutdown(&self) {
        self.accept.abort();
        self.drop_connections();
    }

    /// Poll until `condition` holds for the recorded connections
    pub async fn wait_until(&self, condition: impl Fn(&[Vec<ReceivedPacket>]) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition(&self.connections()) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("broker condition not met in time");
    }
}

impl Drop for TestBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn serve(
    mut socket: TcpStream,
    connection: usize,
    state: Arc<BrokerState>,
    mut dropped: watch::Receiver<u64>,
) {
    loop {
        let packet = tokio::select! {
            _ = dropped.changed() => return,
            packet = read_packet(&mut socket) => packet,
        };
        let Ok((header, body)) = packet else {
            return;
        };

        let reply = match header >> 4 {
            1 => {
                state.record(connection, ReceivedPacket::Connect);
                Some(vec![0x20, 0x02, 0x00, 0x00])
            }
            3 => {
                let qos = (header >> 1) & 0x03;
                let (topic, mut offset) = read_string(&body, 0);
                let pkid = if qos > 0 {
                    offset += 2;
                    u16::from_be_bytes([body[offset - 2], body[offset - 1]])
                } else {
                    0
                };
                let payload = String::from_utf8_lossy(&body[offset..]).into_owned();
                let withheld = state.withholds(&payload);
                state.record(
                    connection,
                    ReceivedPacket::Publish {
                        topic,
                        payload,
                        pkid,
                        qos,
                    },
                );
                let [hi, lo] = pkid.to_be_bytes();
                match qos {
                    1 if !withheld => Some(vec![0x40, 0x02, hi, lo]),
                    2 if !withheld => Some(vec![0x50, 0x02, hi, lo]),
                    _ => None,
                }
            }
            6 => Some(vec![0x70, 0x02, body[0], body[1]]),
            8 => {
                let mut topics = Vec::new();
                let mut offset = 2;
                while offset < body.len() {
                    let (topic, next) = read_string(&body, offset);
                    topics.push(topic);
                    // Skip the requested QoS byte
                    offset = next + 1;
                }
                let mut suback = vec![0x90, 2 + topics.len() as u8, body[0], body[1]];
                suback.extend(std::iter::repeat(0x01).take(topics.len()));
                state.record(connection, ReceivedPacket::Subscribe { topics });
                Some(suback)
            }
            12 => Some(vec![0xD0, 0x00]),
            14 => {
                state.record(connection, ReceivedPacket::Disconnect);
                return;
            }
            other => {
                state.record(connection, ReceivedPacket::Other(other));
                None
            }
        };

        if let Some(reply) = reply {
            if socket.write_all(&reply).await.is_err() {
                return;
            }
        }
    }
}

async fn read_packet(socket: &mut TcpStream) -> std::io::Result<(u8, Vec<u8>)> {
    let header = socket.read_u8().await?;

    let mut length = 0usize;
    let mut shift = 0;
    loop {
        let byte = socket.read_u8().await?;
        length |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; length];
    socket.read_exact(&mut body).await?;
    Ok((header, body))
}

/// Length-prefixed UTF-8 string at `offset`; returns it and the next offset
fn read_string(body: &[u8], offset: usize) -> (String, usize) {
    let len = u16::from_be_bytes([body[offset], body[offset + 1]]) as usize;
    let start = offset + 2;
    let text = String::from_utf8_lossy(&body[start..start + len]).into_owned();
    (text, start + len)
}
