use c8y_smartrest::OperationKind;
use std::fmt;

/// A unit of deferred work for the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Perform the restart handshake
    Restart,
    /// Take a reading and publish it
    SendMeasurement,
    /// Run the handshake for a command or configuration change
    CompleteCommand { kind: OperationKind, argument: String },
    /// Answer a payload we do not understand with an empty-type handshake
    AcknowledgeUnknown { payload: String },
    /// End the session because of an unrecognized payload
    Terminate { payload: String },
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Restart => write!(f, "restart"),
            Task::SendMeasurement => write!(f, "send measurement"),
            Task::CompleteCommand { kind, .. } => write!(f, "complete {}", kind),
            Task::AcknowledgeUnknown { payload } => write!(f, "acknowledge '{}'", payload),
            Task::Terminate { payload } => write!(f, "terminate on '{}'", payload),
        }
    }
}
