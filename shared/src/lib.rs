//! Cumulocity SmartREST protocol types
//!
//! This crate provides the message codec and the session state machine used by
//! the device agent to talk to the Cumulocity MQTT endpoint.

pub mod codec;
pub mod state_machine;

use std::fmt;

pub use codec::{decode, parse, Command, CodecError, OutboundMessage};
pub use state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult};

/// MQTT topics of the SmartREST static templates
pub mod topics {
    /// Upstream topic (device -> platform)
    pub const UPSTREAM: &str = "s/us";

    /// Downstream topic (platform -> device)
    pub const DOWNSTREAM: &str = "s/ds";
}

/// Default timings and ranges for the agent
pub mod defaults {
    /// Interval between two measurement reports
    pub const MEASUREMENT_INTERVAL_MS: u64 = 1000;

    /// Lower bound of the simulated measurement (inclusive)
    pub const MEASUREMENT_MIN: i64 = 0;

    /// Upper bound of the simulated measurement (inclusive)
    pub const MEASUREMENT_MAX: i64 = 10;

    /// Time to wait for the broker to acknowledge a publish
    pub const ACK_TIMEOUT_MS: u64 = 1000;

    /// Simulated restart duration
    pub const RESTART_DELAY_MS: u64 = 1000;

    /// Time to wait for the broker to accept the connection
    pub const CONNECT_TIMEOUT_MS: u64 = 5000;

    /// Pause between two reconnection attempts
    pub const RECONNECT_DELAY_MS: u64 = 1000;

    /// Consecutive failed reconnection attempts before the connection is given up
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

    /// MQTT keep alive
    pub const KEEP_ALIVE_SECS: u64 = 60;

    /// Device type announced on registration
    pub const DEVICE_TYPE: &str = "c8y_MQTTDevice";
}

/// Operation types the platform can send to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Restart,
    Command,
    Configuration,
    /// Placeholder used when acknowledging a payload we do not understand
    Unknown,
}

impl OperationKind {
    /// The fragment name used on the wire (empty for `Unknown`)
    pub fn fragment(&self) -> &'static str {
        match self {
            OperationKind::Restart => "c8y_Restart",
            OperationKind::Command => "c8y_Command",
            OperationKind::Configuration => "c8y_Configuration",
            OperationKind::Unknown => "",
        }
    }

    /// Look up a kind by its fragment name
    pub fn from_fragment(fragment: &str) -> Option<Self> {
        match fragment {
            "c8y_Restart" => Some(OperationKind::Restart),
            "c8y_Command" => Some(OperationKind::Command),
            "c8y_Configuration" => Some(OperationKind::Configuration),
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Unknown => write!(f, "<unknown>"),
            other => write!(f, "{}", other.fragment()),
        }
    }
}

/// Final status reported in a `503` message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::Failure => "Failure",
        }
    }
}
