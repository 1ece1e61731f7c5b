//! Shell command handler

use super::HandlerContext;
use crate::command::CommandResult;
use tracing::info;

/// Handle a shell command request (c8y_Command)
///
/// Commands are logged and reported as executed; nothing is run on the host.
pub async fn handle_shell_command(ctx: &HandlerContext, text: &str) -> CommandResult {
    let text = text.trim();
    // Agent rule: a blank argument completes as 503 with Failure
    if text.is_empty() {
        return CommandResult::Failed {
            message: "Empty command".into(),
        };
    }

    info!("  [COMMAND] {} <- {}", ctx.device_name, text);

    CommandResult::Completed {
        message: format!("Command '{}' accepted", text),
    }
}
