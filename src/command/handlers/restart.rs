//! Restart command handler

use super::HandlerContext;
use crate::command::CommandResult;
use tracing::info;

/// Handle a restart request (c8y_Restart)
///
/// The restart is simulated: the handler only waits for the configured delay.
pub async fn handle_restart(ctx: &HandlerContext) -> CommandResult {
    info!("  [RESTART] Simulating restart of {}...", ctx.device_name);

    tokio::time::sleep(ctx.restart_delay).await;

    info!("  [RESTART] ...restart completed");
    CommandResult::Completed {
        message: "Restart completed".into(),
    }
}
