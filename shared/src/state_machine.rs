//! Device session state machine
//!
//! Defines the lifecycle of a connection to the platform:
//! ```text
//! Disconnected -> Connecting -> Registering -> Ready -> ShuttingDown -> Disconnected
//! ```
//! Every other transition is rejected.

use std::fmt;

/// Lifecycle state of the device session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Registering,
    Ready,
    ShuttingDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Registering => "registering",
            SessionState::Ready => "ready",
            SessionState::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

/// Events that drive the session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session start requested, transport is being opened
    Start,
    /// Broker accepted the connection
    Connected,
    /// Registration acknowledged, operations declared and downstream subscribed
    Registered,
    /// Interrupt received or a fatal protocol error occurred
    Shutdown,
    /// Workers stopped and transport closed
    Closed,
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// Transition was valid and state changed
    Success(SessionState),
    /// Transition was invalid from current state
    Invalid {
        from: SessionState,
        event: SessionEvent,
    },
}

impl TransitionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionResult::Success(_))
    }
}

/// The session state machine
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    current_state: SessionState,
}

impl SessionStateMachine {
    /// Create a new state machine in Disconnected state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.current_state
    }

    /// Whether the session may publish operation traffic
    pub fn is_ready(&self) -> bool {
        self.current_state == SessionState::Ready
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: SessionEvent) -> TransitionResult {
        match self.next_state(event) {
            Some(state) => {
                self.current_state = state;
                TransitionResult::Success(state)
            }
            None => TransitionResult::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    /// Get the next state for a given event, if the transition is valid
    fn next_state(&self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self.current_state, event) {
            (Disconnected, Start) => Some(Connecting),
            (Connecting, Connected) => Some(Registering),
            (Registering, Registered) => Some(Ready),
            (Ready, Shutdown) => Some(ShuttingDown),
            (ShuttingDown, Closed) => Some(Disconnected),
            _ => None,
        }
    }
}
