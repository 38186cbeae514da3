//! Relaycast agent binary
//!
//! Headless entry point: loads configuration, wires the capture, input, and
//! relay components together, and runs the dispatch loop until shutdown.

use anyhow::Context;
use relaycast::capture::{ScreenCapture, StreamSettings};
use relaycast::config::{Config, ConfigManager};
use relaycast::input::InputController;
use relaycast::logging;
use relaycast::relay::{
    connect, ConnectorConfig, ConnectorEvent, RelayConnector, TransportConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn load_config() -> anyhow::Result<Config> {
    let manager = ConfigManager::new().context("resolving configuration directory")?;
    let config = manager
        .load_or_create_default()
        .context("loading configuration")?;
    info!(
        "Configuration loaded from {:?}",
        manager.config_directory()
    );
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_default_logging();
    info!("Starting relaycast agent v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    let capture = Arc::new(ScreenCapture::new(StreamSettings::new(
        config.capture.default_fps,
        config.capture.default_quality,
        config.capture.default_scale,
    )));
    match capture.displays() {
        Ok(displays) => {
            for disp in &displays {
                info!(
                    "Display {}: {} ({}x{}){}",
                    disp.id,
                    disp.name,
                    disp.width,
                    disp.height,
                    if disp.is_primary { " [primary]" } else { "" }
                );
            }
        }
        Err(e) => warn!("No displays available yet: {}", e),
    }

    let input = Arc::new(InputController::new(config.input.enabled));
    if !config.input.enabled {
        info!("Remote input injection is disabled by configuration");
    }

    let link = connect(TransportConfig {
        url: config.relay.url.clone(),
        connect_timeout: Duration::from_secs(config.relay.connect_timeout_secs),
        reconnect_base: Duration::from_secs(config.relay.reconnect_base_secs),
        reconnect_max: Duration::from_secs(config.relay.reconnect_max_secs),
    });

    let connector = RelayConnector::new(
        ConnectorConfig {
            name: config.agent.name.clone(),
            registration_timeout: Duration::from_secs(config.relay.registration_timeout_secs),
        },
        capture,
        input,
        link.outbound,
    );

    // Surface the pairing code to the operator as soon as it arrives
    let mut events = connector.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let ConnectorEvent::Registered {
                agent_id,
                pairing_code,
            } = event
            {
                info!("Registered as {}", agent_id);
                println!("Pairing code: {}", pairing_code);
            }
        }
    });

    connector.run(link.events).await;
    info!("Agent stopped");
    Ok(())
}
