//! Agent configuration
//!
//! Loaded once at startup from a TOML file and read-only afterwards:
//! ```toml
//! server_url = "mqtt.eu-latest.cumulocity.com"
//! client_id = "rust-agent-01"
//! device_name = "rust-agent-01"
//! tenant = "t12345"
//! username = "device_user"
//! password = "secret"
//!
//! [tls]
//! ca_certs = "/etc/ssl/certs/ca-certificates.crt"
//!
//! [agent]
//! measurement_interval_ms = 7000
//! unrecognized_policy = "terminate"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use c8y_smartrest::{defaults, OperationKind};
use serde::Deserialize;

use crate::queue::QueuePolicy;
use crate::reporter::MeasurementRange;

/// Environment variable holding the path of the configuration file
pub const CONFIG_PATH_ENV: &str = "C8Y_AGENT_CONFIG";

/// Configuration file used when the environment variable is not set
pub const DEFAULT_CONFIG_PATH: &str = "agent.toml";

/// Connection identity and agent tuning
#[derive(Clone, Deserialize)]
pub struct AgentConfig {
    /// Broker host, optionally with scheme and port (`mqtts://host:8883`)
    pub server_url: String,
    pub client_id: String,
    pub device_name: String,
    pub tenant: String,
    pub username: String,
    pub password: String,
    /// TLS material; plain TCP when absent
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub agent: AgentSettings,
}

/// Certificate paths for secured connections
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TlsConfig {
    pub ca_certs: PathBuf,
    #[serde(default)]
    pub certfile: Option<PathBuf>,
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
}

/// What to do with a downstream payload that matches no known operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnrecognizedPolicy {
    /// Reply with an executing/success pair of empty operation type
    #[default]
    Acknowledge,
    /// Stop the session and exit with status 1
    Terminate,
    /// Log and drop
    Ignore,
}

/// Whether the `503` result publish waits for the broker, per operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResultAckPolicy {
    pub restart: bool,
    pub command: bool,
    pub configuration: bool,
    pub unknown: bool,
}

impl Default for ResultAckPolicy {
    fn default() -> Self {
        Self {
            restart: true,
            command: false,
            configuration: false,
            unknown: false,
        }
    }
}

impl ResultAckPolicy {
    pub fn awaits(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Restart => self.restart,
            OperationKind::Command => self.command,
            OperationKind::Configuration => self.configuration,
            OperationKind::Unknown => self.unknown,
        }
    }
}

/// Tuning of the reporter, executor and transport
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub measurement_interval_ms: u64,
    pub measurement_min: i64,
    pub measurement_max: i64,
    pub ack_timeout_ms: u64,
    pub restart_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    /// Consecutive failed reconnections before the session ends
    pub max_reconnect_attempts: u32,
    /// QoS used for publishes that wait for an acknowledgment (1 or 2)
    pub ack_qos: u8,
    pub unrecognized_policy: UnrecognizedPolicy,
    pub supported_operations: Vec<String>,
    pub await_supported_operations_ack: bool,
    pub result_ack: ResultAckPolicy,
    /// Bounded queue capacity; unbounded when absent
    pub queue_capacity: Option<usize>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            measurement_interval_ms: defaults::MEASUREMENT_INTERVAL_MS,
            measurement_min: defaults::MEASUREMENT_MIN,
            measurement_max: defaults::MEASUREMENT_MAX,
            ack_timeout_ms: defaults::ACK_TIMEOUT_MS,
            restart_delay_ms: defaults::RESTART_DELAY_MS,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            keep_alive_secs: defaults::KEEP_ALIVE_SECS,
            reconnect_delay_ms: defaults::RECONNECT_DELAY_MS,
            max_reconnect_attempts: defaults::MAX_RECONNECT_ATTEMPTS,
            ack_qos: 1,
            unrecognized_policy: UnrecognizedPolicy::default(),
            supported_operations: vec![
                OperationKind::Command.fragment().into(),
                OperationKind::Configuration.fragment().into(),
            ],
            await_supported_operations_ack: true,
            result_ack: ResultAckPolicy::default(),
            queue_capacity: None,
        }
    }
}

impl AgentSettings {
    pub fn measurement_interval(&self) -> Duration {
        Duration::from_millis(self.measurement_interval_ms)
    }

    pub fn measurement_range(&self) -> MeasurementRange {
        MeasurementRange::new(self.measurement_min, self.measurement_max)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        match self.queue_capacity {
            Some(capacity) => QueuePolicy::Bounded { capacity },
            None => QueuePolicy::Unbounded,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            server_url: "localhost".into(),
            client_id: "c8y-agent-001".into(),
            device_name: "c8y-agent-001".into(),
            tenant: "t0".into(),
            username: "device".into(),
            password: String::new(),
            tls: None,
            agent: AgentSettings::default(),
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("server_url", &self.server_url)
            .field("client_id", &self.client_id)
            .field("device_name", &self.device_name)
            .field("tenant", &self.tenant)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("agent", &self.agent)
            .finish()
    }
}

impl AgentConfig {
    /// Load from the path named by `C8Y_AGENT_CONFIG`, or `agent.toml`
    pub fn load_default() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }

    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate a configuration document
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AgentConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Broker login in the `<tenant>/<username>` form
    pub fn broker_username(&self) -> String {
        format!("{}/{}", self.tenant, self.username)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("server_url", &self.server_url),
            ("client_id", &self.client_id),
            ("device_name", &self.device_name),
            ("tenant", &self.tenant),
            ("username", &self.username),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }

        let agent = &self.agent;
        if agent.measurement_min > agent.measurement_max {
            bail!(
                "measurement_min ({}) is greater than measurement_max ({})",
                agent.measurement_min,
                agent.measurement_max
            );
        }
        if agent.measurement_interval_ms == 0 {
            bail!("measurement_interval_ms must be greater than zero");
        }
        if agent.ack_timeout_ms == 0 {
            bail!("ack_timeout_ms must be greater than zero");
        }
        if agent.connect_timeout_ms == 0 {
            bail!("connect_timeout_ms must be greater than zero");
        }
        if agent.max_reconnect_attempts == 0 {
            bail!("max_reconnect_attempts must be greater than zero");
        }
        for operation in &agent.supported_operations {
            if OperationKind::from_fragment(operation).is_none() {
                bail!("Unsupported operation type '{}' in supported_operations", operation);
            }
        }
        if !matches!(agent.ack_qos, 1 | 2) {
            bail!("ack_qos must be 1 or 2, got {}", agent.ack_qos);
        }
        if agent.queue_capacity == Some(0) {
            bail!("queue_capacity must be greater than zero");
        }
        if let Some(tls) = &self.tls {
            if tls.certfile.is_some() != tls.keyfile.is_some() {
                bail!("tls.certfile and tls.keyfile must be set together");
            }
        }

        Ok(())
    }
}
