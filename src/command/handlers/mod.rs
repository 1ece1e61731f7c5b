//! Command handlers for the supported operation types

mod configuration;
mod restart;
mod shell;

pub use configuration::handle_configuration_change;
pub use restart::handle_restart;
pub use shell::handle_shell_command;

use std::time::Duration;

/// Context passed to command handlers
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub device_name: String,
    pub restart_delay: Duration,
}
