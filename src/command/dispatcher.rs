//! Command dispatcher - turns downstream payloads into queued tasks

use crate::config::UnrecognizedPolicy;
use crate::queue::Task;
use c8y_smartrest::{codec, Command, OperationKind};
use tracing::{error, info, warn};

/// What the receive path should do with a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Hand the task to the worker
    Enqueue(Task),
    /// Nothing to do
    Drop,
}

/// Routes parsed commands according to the unrecognized-command policy
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    policy: UnrecognizedPolicy,
}

impl CommandDispatcher {
    pub fn new(policy: UnrecognizedPolicy) -> Self {
        Self { policy }
    }

    /// Decode a raw payload and route it
    pub fn dispatch(&self, payload: &[u8]) -> Dispatch {
        let command = match codec::decode(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Undecodable payload: {}", e);
                Command::Unrecognized {
                    payload: String::from_utf8_lossy(payload).into_owned(),
                }
            }
        };
        self.route(command)
    }

    /// Map a command to the task that completes it
    pub fn route(&self, command: Command) -> Dispatch {
        match command {
            Command::Restart => {
                info!("Received restart request");
                Dispatch::Enqueue(Task::Restart)
            }
            Command::ShellCommand { text } => {
                info!("Received shell command: {}", text);
                Dispatch::Enqueue(Task::CompleteCommand {
                    kind: OperationKind::Command,
                    argument: text,
                })
            }
            Command::ConfigurationChange { config } => {
                info!("Received configuration change ({} bytes)", config.len());
                Dispatch::Enqueue(Task::CompleteCommand {
                    kind: OperationKind::Configuration,
                    argument: config,
                })
            }
            Command::Unrecognized { payload } => match self.policy {
                UnrecognizedPolicy::Acknowledge => {
                    warn!("Received unrecognized payload: {}", payload);
                    Dispatch::Enqueue(Task::AcknowledgeUnknown { payload })
                }
                UnrecognizedPolicy::Terminate => {
                    error!("Received unrecognized payload, terminating: {}", payload);
                    Dispatch::Enqueue(Task::Terminate { payload })
                }
                UnrecognizedPolicy::Ignore => {
                    warn!("Ignoring unrecognized payload: {}", payload);
                    Dispatch::Drop
                }
            },
        }
    }
}
