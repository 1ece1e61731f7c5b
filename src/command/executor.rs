//! Operation executor - runs queued tasks and drives the operation handshake
//!
//! Every operation is reported in two steps:
//! ```text
//! 501,<type>              (acknowledged, blocking)
//! <effect>
//! 503,<type>[,<outcome>]  (acknowledgment per operation kind)
//! ```

use super::handlers::{self, HandlerContext};
use crate::config::{AgentSettings, ResultAckPolicy};
use crate::error::{ProtocolError, TaskError};
use crate::queue::Task;
use crate::reporter::{MeasurementRange, SimulatedSensor};
use crate::transport::{PublishRequest, Transport};
use c8y_smartrest::{OperationKind, OutboundMessage, Outcome};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Result of command execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command completed successfully
    Completed { message: String },
    /// Command was attempted but failed
    Failed { message: String },
}

/// What the worker does after a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Stop draining and end the session
    Terminate(ProtocolError),
}

/// Executor tuning taken from the agent settings
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub device_name: String,
    pub ack_timeout: Duration,
    pub restart_delay: Duration,
    pub result_ack: ResultAckPolicy,
    pub measurement_range: MeasurementRange,
}

impl ExecutorSettings {
    pub fn new(device_name: impl Into<String>, settings: &AgentSettings) -> Self {
        Self {
            device_name: device_name.into(),
            ack_timeout: settings.ack_timeout(),
            restart_delay: settings.restart_delay(),
            result_ack: settings.result_ack,
            measurement_range: settings.measurement_range(),
        }
    }
}

/// Executes tasks one at a time on the worker
pub struct OperationExecutor {
    transport: Arc<dyn Transport>,
    settings: ExecutorSettings,
    sensor: SimulatedSensor,
    /// Last configuration accepted from the platform
    configuration: Option<String>,
}

impl OperationExecutor {
    /// Create a new operation executor
    pub fn new(transport: Arc<dyn Transport>, settings: ExecutorSettings) -> Self {
        let sensor = SimulatedSensor::new(settings.measurement_range);
        Self {
            transport,
            settings,
            sensor,
            configuration: None,
        }
    }

    /// The configuration applied by the last configuration change
    pub fn configuration(&self) -> Option<&str> {
        self.configuration.as_deref()
    }

    /// Run a task to completion
    pub async fn run(&mut self, task: Task) -> Result<Flow, TaskError> {
        match task {
            Task::SendMeasurement => {
                self.send_measurement().await;
                Ok(Flow::Continue)
            }
            Task::Restart => self.handshake(OperationKind::Restart, "").await,
            Task::CompleteCommand { kind, argument } => self.handshake(kind, &argument).await,
            Task::AcknowledgeUnknown { .. } => self.handshake(OperationKind::Unknown, "").await,
            Task::Terminate { payload } => {
                Ok(Flow::Terminate(ProtocolError::UnrecognizedCommand { payload }))
            }
        }
    }

    /// Publish one reading; failures are logged and the reading dropped
    async fn send_measurement(&mut self) {
        let value = self.sensor.read();
        info!("Sending measurement: {}", value);

        let request = PublishRequest::upstream(&OutboundMessage::Measurement(value), false);
        if let Err(e) = self.transport.send(request, self.settings.ack_timeout).await {
            warn!("Measurement {} dropped: {}", value, e);
        }
    }

    async fn handshake(&mut self, kind: OperationKind, argument: &str) -> Result<Flow, TaskError> {
        let ack_timeout = self.settings.ack_timeout;

        let executing = PublishRequest::upstream(&OutboundMessage::Executing(kind), true);
        self.transport.send(executing, ack_timeout).await?;
        info!("Operation {} executing", kind);

        let result = self.perform(kind, argument).await;
        let outcome = match (&result, kind) {
            (CommandResult::Completed { .. }, OperationKind::Restart) => None,
            (CommandResult::Completed { .. }, _) => Some(Outcome::Success),
            (CommandResult::Failed { .. }, _) => Some(Outcome::Failure),
        };

        let completed = PublishRequest::upstream(
            &OutboundMessage::Completed { kind, outcome },
            self.settings.result_ack.awaits(kind),
        );
        self.transport.send(completed, ack_timeout).await?;

        match result {
            CommandResult::Completed { message } => info!("Operation {} completed: {}", kind, message),
            CommandResult::Failed { message } => warn!("Operation {} failed: {}", kind, message),
        }
        Ok(Flow::Continue)
    }

    /// The actual effect of the operation
    async fn perform(&mut self, kind: OperationKind, argument: &str) -> CommandResult {
        let ctx = HandlerContext {
            device_name: self.settings.device_name.clone(),
            restart_delay: self.settings.restart_delay,
        };

        match kind {
            OperationKind::Restart => handlers::handle_restart(&ctx).await,
            OperationKind::Command => handlers::handle_shell_command(&ctx, argument).await,
            OperationKind::Configuration => {
                handlers::handle_configuration_change(&ctx, argument, &mut self.configuration).await
            }
            OperationKind::Unknown => CommandResult::Completed {
                message: "Acknowledged unrecognized operation".into(),
            },
        }
    }
}
