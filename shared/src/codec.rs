//! SmartREST codec
//!
//! SmartREST messages are single CSV lines:
//! ```text
//! <code>,<field>,<field>,...
//! ```
//!
//! Inbound operations are recognised by the leading characters of the payload
//! only. Outbound fields that contain a separator or a quote are wrapped in
//! double quotes with inner quotes doubled.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::{OperationKind, Outcome};

/// Prefix of a restart request
pub const RESTART_PREFIX: &str = "510";

/// Prefix of a shell command request
pub const SHELL_COMMAND_PREFIX: &str = "511";

/// Prefix of a configuration change request
pub const CONFIGURATION_PREFIX: &str = "513";

/// Errors that can occur while decoding an inbound payload
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// An operation request received from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Restart,
    ShellCommand { text: String },
    ConfigurationChange { config: String },
    Unrecognized { payload: String },
}

impl Command {
    /// The operation type this command is completed as
    pub fn kind(&self) -> OperationKind {
        match self {
            Command::Restart => OperationKind::Restart,
            Command::ShellCommand { .. } => OperationKind::Command,
            Command::ConfigurationChange { .. } => OperationKind::Configuration,
            Command::Unrecognized { .. } => OperationKind::Unknown,
        }
    }
}

/// Parse an inbound payload into a command.
///
/// Pure: the same payload always yields the same command. Anything that does
/// not start with a known prefix, including the empty string, is
/// `Command::Unrecognized`.
pub fn parse(payload: &str) -> Command {
    if payload.starts_with(SHELL_COMMAND_PREFIX) {
        Command::ShellCommand {
            text: arguments(payload).to_string(),
        }
    } else if payload.starts_with(CONFIGURATION_PREFIX) {
        Command::ConfigurationChange {
            config: arguments(payload).to_string(),
        }
    } else if payload.starts_with(RESTART_PREFIX) {
        Command::Restart
    } else {
        Command::Unrecognized {
            payload: payload.to_string(),
        }
    }
}

/// Decode a raw MQTT payload.
///
/// Fails only when the bytes are not UTF-8; callers treat that as an
/// unrecognized command.
pub fn decode(bytes: &[u8]) -> Result<Command, CodecError> {
    let payload = std::str::from_utf8(bytes)?;
    Ok(parse(payload))
}

/// Everything after the first separator
fn arguments(payload: &str) -> &str {
    payload.split_once(',').map(|(_, rest)| rest).unwrap_or("")
}

/// A message published by the device on the upstream topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// 100: create the device if it does not exist yet
    Register {
        device_name: String,
        device_type: String,
    },
    /// 114: declare the operation types the device handles
    SupportedOperations(Vec<String>),
    /// 211: temperature measurement
    Measurement(i64),
    /// 501: operation is being executed
    Executing(OperationKind),
    /// 503: operation finished
    Completed {
        kind: OperationKind,
        outcome: Option<Outcome>,
    },
}

impl OutboundMessage {
    /// Registration message for a device of the default type
    pub fn register(device_name: impl Into<String>) -> Self {
        OutboundMessage::Register {
            device_name: device_name.into(),
            device_type: crate::defaults::DEVICE_TYPE.into(),
        }
    }

    /// The SmartREST template code
    pub fn code(&self) -> u16 {
        match self {
            OutboundMessage::Register { .. } => 100,
            OutboundMessage::SupportedOperations(_) => 114,
            OutboundMessage::Measurement(_) => 211,
            OutboundMessage::Executing(_) => 501,
            OutboundMessage::Completed { .. } => 503,
        }
    }

    /// Encode to the CSV line sent on the wire
    pub fn encode(&self) -> String {
        let mut fields: Vec<Cow<'_, str>> = vec![Cow::Owned(self.code().to_string())];

        match self {
            OutboundMessage::Register {
                device_name,
                device_type,
            } => {
                fields.push(quote_field(device_name));
                fields.push(quote_field(device_type));
            }
            OutboundMessage::SupportedOperations(operations) => {
                fields.extend(operations.iter().map(|op| quote_field(op)));
            }
            OutboundMessage::Measurement(value) => {
                fields.push(Cow::Owned(value.to_string()));
            }
            OutboundMessage::Executing(kind) => {
                fields.push(Cow::Borrowed(kind.fragment()));
            }
            OutboundMessage::Completed { kind, outcome } => {
                fields.push(Cow::Borrowed(kind.fragment()));
                if let Some(outcome) = outcome {
                    fields.push(Cow::Borrowed(outcome.as_str()));
                }
            }
        }

        fields.join(",")
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Quote a field if it would otherwise break the CSV line
pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
