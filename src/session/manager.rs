//! Device session - connects, registers and owns the worker and reporter

use super::InboundHandler;
use crate::command::{CommandDispatcher, ExecutorSettings, OperationExecutor};
use crate::config::AgentConfig;
use crate::error::ProtocolError;
use crate::queue::{task_queue, Worker, WorkerExit};
use crate::reporter::PeriodicReporter;
use crate::transport::{PublishRequest, Transport, TransportConnector};
use anyhow::{bail, ensure, Context, Result};
use c8y_smartrest::{
    state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionResult},
    topics, OutboundMessage,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{error, info, warn};

/// What ended the Ready phase
enum StopCause {
    Interrupt,
    ConnectionLost,
    Worker(Result<WorkerExit, JoinError>),
}

/// How a session that reached Ready ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// External interrupt
    Interrupted,
    /// An unrecognized payload under the terminate policy
    Terminated(ProtocolError),
    /// The worker ended on its own
    WorkerStopped,
    /// The transport gave up reconnecting
    ConnectionLost,
}

impl SessionExit {
    /// Process exit status for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionExit::Interrupted => 0,
            SessionExit::Terminated(_) => 1,
            SessionExit::WorkerStopped => 1,
            SessionExit::ConnectionLost => 1,
        }
    }
}

impl fmt::Display for SessionExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionExit::Interrupted => write!(f, "interrupted"),
            SessionExit::Terminated(reason) => write!(f, "terminated: {}", reason),
            SessionExit::WorkerStopped => write!(f, "worker stopped unexpectedly"),
            SessionExit::ConnectionLost => write!(f, "connection to broker lost"),
        }
    }
}

/// One connection lifetime of the agent
pub struct DeviceSession<C: TransportConnector> {
    config: AgentConfig,
    connector: C,
    fsm: SessionStateMachine,
}

impl<C: TransportConnector> DeviceSession<C> {
    pub fn new(config: AgentConfig, connector: C) -> Self {
        Self {
            config,
            connector,
            fsm: SessionStateMachine::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.fsm.state()
    }

    /// Run the session until `shutdown` resolves or the worker ends it.
    ///
    /// Errors are startup failures; once Ready the session always winds down
    /// through ShuttingDown and returns a `SessionExit`.
    pub async fn run<F>(mut self, shutdown: F) -> Result<SessionExit>
    where
        F: Future<Output = ()> + Send,
    {
        let settings = self.config.agent.clone();
        let (producer, consumer) = task_queue(settings.queue_policy());
        let sink = Arc::new(InboundHandler::new(
            CommandDispatcher::new(settings.unrecognized_policy),
            producer.clone(),
        ));

        self.transition(SessionEvent::Start)?;
        info!(
            "[SESSION] Connecting to {} via {}",
            self.config.server_url,
            self.connector.name()
        );
        let transport = self
            .connector
            .connect(sink)
            .await
            .context("Failed to connect to broker")?;
        self.transition(SessionEvent::Connected)?;

        if let Err(e) = self.register(transport.as_ref()).await {
            if let Err(disconnect_err) = transport.disconnect().await {
                warn!("[SESSION] Disconnect after failed startup: {}", disconnect_err);
            }
            return Err(e);
        }
        self.transition(SessionEvent::Registered)?;
        ensure!(self.fsm.is_ready(), "Session not ready after registration");
        info!("[SESSION] Ready as '{}'", self.config.device_name);

        let (stop_tx, stop_rx) = watch::channel(false);
        let executor = OperationExecutor::new(
            transport.clone(),
            ExecutorSettings::new(self.config.device_name.clone(), &settings),
        );
        let mut worker = Worker::new(consumer, executor, stop_rx).spawn();
        let reporter = PeriodicReporter::new(settings.measurement_interval(), producer).start();

        tokio::pin!(shutdown);
        let cause = tokio::select! {
            _ = &mut shutdown => {
                info!("[SESSION] Interrupt received, shutting down");
                StopCause::Interrupt
            }
            _ = transport.closed() => {
                error!("[SESSION] Connection to broker lost, shutting down");
                StopCause::ConnectionLost
            }
            exit = &mut worker => StopCause::Worker(exit),
        };

        self.transition(SessionEvent::Shutdown)?;
        reporter.stop().await;
        let (worker_exit, connection_lost) = match cause {
            StopCause::Worker(exit) => (exit, false),
            cause => {
                let _ = stop_tx.send(true);
                (worker.await, matches!(cause, StopCause::ConnectionLost))
            }
        };

        if let Err(e) = transport.disconnect().await {
            warn!("[SESSION] Disconnect failed: {}", e);
        }
        self.transition(SessionEvent::Closed)?;

        let exit = match worker_exit {
            Ok(WorkerExit::Stopped { abandoned }) => {
                if abandoned > 0 {
                    info!("[SESSION] {} queued task(s) abandoned", abandoned);
                }
                if connection_lost {
                    SessionExit::ConnectionLost
                } else {
                    SessionExit::Interrupted
                }
            }
            Ok(WorkerExit::Terminated(reason)) => {
                error!("[SESSION] {}", reason);
                SessionExit::Terminated(reason)
            }
            Ok(WorkerExit::QueueClosed) => SessionExit::WorkerStopped,
            Err(e) => {
                error!("[SESSION] Worker task failed: {}", e);
                SessionExit::WorkerStopped
            }
        };

        info!("[SESSION] Disconnected ({})", exit);
        Ok(exit)
    }

    /// Registration, supported operations, then the downstream subscription
    async fn register(&self, transport: &dyn Transport) -> Result<()> {
        let settings = &self.config.agent;
        let ack_timeout = settings.ack_timeout();

        let registration = OutboundMessage::register(self.config.device_name.clone());
        transport
            .send(PublishRequest::upstream(&registration, true), ack_timeout)
            .await
            .context("Device registration failed")?;
        info!("[SESSION] Registered: {}", registration);

        let operations = OutboundMessage::SupportedOperations(settings.supported_operations.clone());
        transport
            .send(
                PublishRequest::upstream(&operations, settings.await_supported_operations_ack),
                ack_timeout,
            )
            .await
            .context("Supported operations declaration failed")?;
        info!("[SESSION] Declared: {}", operations);

        transport
            .subscribe(topics::DOWNSTREAM)
            .await
            .with_context(|| format!("Failed to subscribe to {}", topics::DOWNSTREAM))?;
        info!("[SESSION] Subscribed to {}", topics::DOWNSTREAM);

        Ok(())
    }

    fn transition(&mut self, event: SessionEvent) -> Result<SessionState> {
        let from = self.fsm.state();
        match self.fsm.process_event(event) {
            TransitionResult::Success(to) => {
                info!("[SESSION] {} -> {}", from, to);
                Ok(to)
            }
            TransitionResult::Invalid { from, event } => {
                bail!("Invalid session transition: {:?} in state {}", event, from)
            }
        }
    }
}
