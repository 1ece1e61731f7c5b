mod command;
mod config;
mod error;
mod queue;
mod reporter;
mod session;
mod transport;

use anyhow::Result;
use config::AgentConfig;
use session::DeviceSession;
use transport::{MqttConnector, MqttSettings};

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("Agent failed: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let config = AgentConfig::load_default()?;

    info!("Device agent starting: {}", config.device_name);
    info!("  Broker: {}", config.server_url);
    info!("  Login: {}", config.broker_username());

    let connector = MqttConnector::new(MqttSettings::from_config(&config)?);
    let exit = DeviceSession::new(config, connector)
        .run(shutdown_signal())
        .await?;

    info!("Device agent stopped: {}", exit);
    Ok(exit.exit_code())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for interrupt: {}", e);
        std::future::pending::<()>().await;
    }
}
