//! Command execution infrastructure for the device agent
//!
//! This module handles:
//! - Parsing downstream payloads and routing them to tasks
//! - Running the executing/result handshake for each operation
//! - Applying the effect of each operation type

mod dispatcher;
mod executor;
pub mod handlers;

pub use dispatcher::{CommandDispatcher, Dispatch};
pub use executor::{CommandResult, ExecutorSettings, Flow, OperationExecutor};
