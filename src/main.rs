//! greenhouse-hub - sensor reading relay.
//!
//! Accepts readings from the greenhouse controller and fans them out to
//! connected dashboards.

use greenhouse_hub::config::ServerConfig;
use greenhouse_hub::server::{run_server, state::AppState};
use std::sync::Arc;
use tokio::sync::watch;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("greenhouse_hub=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let port = config.port;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              greenhouse-hub - Sensor Relay                 ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("🚀 WebSocket        :{}/ws", port);
    println!("📊 Latest reading   :{}/api/sensor/latest", port);
    println!("🌱 Greenhouse push  :{}/api/sensor/push", port);
    println!("💚 Health check     :{}/health", port);
    println!();

    // Shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        println!("\n🛑 Shutdown signal received...");
        let _ = shutdown_tx.send(true);
    })?;

    let state = Arc::new(AppState::new(&config));
    tracing::info!(
        port,
        queue_capacity = config.queue_capacity,
        send_timeout_ms = config.send_timeout.as_millis() as u64,
        "HTTP server starting"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(&config, state, async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    }))?;

    println!("\n👋 greenhouse-hub has exited. Goodbye!");
    Ok(())
}
