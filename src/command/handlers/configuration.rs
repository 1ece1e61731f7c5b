//! Configuration change command handler

use super::HandlerContext;
use crate::command::CommandResult;
use tracing::info;

/// Handle a configuration change request (c8y_Configuration)
///
/// The new configuration replaces `current` as a whole.
pub async fn handle_configuration_change(
    ctx: &HandlerContext,
    config: &str,
    current: &mut Option<String>,
) -> CommandResult {
    // Agent rule: a blank argument completes as 503 with Failure
    if config.trim().is_empty() {
        return CommandResult::Failed {
            message: "Empty configuration".into(),
        };
    }

    info!(
        "  [CONFIGURATION] {} received {} bytes",
        ctx.device_name,
        config.len()
    );
    for line in config.lines() {
        info!("    {}", line);
    }

    *current = Some(config.to_string());

    CommandResult::Completed {
        message: format!("Applied configuration ({} bytes)", config.len()),
    }
}
