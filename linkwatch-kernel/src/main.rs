/**
 * LINKWATCH KERNEL - service entry point
 *
 * ROLE : loads the config, registers the camera hosts, starts the watcher and
 * the suppression policy, then exposes MQTT (optional) and HTTP surfaces.
 * Runs until Ctrl-C.
 */

use anyhow::{Context, Result};
use linkwatch_kernel::config::{collect_hosts, load_config};
use linkwatch_kernel::health::HealthTracker;
use linkwatch_kernel::http::{build_router, AppState};
use linkwatch_kernel::hysteresis::{spawn_policy, HysteresisPolicy, LoggingController, ResourceController};
use linkwatch_kernel::mqtt::{create_mqtt_client, spawn_event_bridge, MqttFeedController};
use linkwatch_kernel::probe::PingExecutor;
use linkwatch_kernel::state::new_state;
use linkwatch_kernel::watcher::Watcher;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linkwatch_kernel=info")),
        )
        .init();

    info!("LinkWatch kernel starting...");

    let config = load_config().await;
    let prober = Arc::new(PingExecutor::new(config.ping_settings()));
    let watcher = Watcher::new(prober, config.watch_settings()).context("Failed to create watcher")?;

    let health = HealthTracker::new();
    let policy = new_state(HysteresisPolicy::new(config.suppress_threshold));

    let controller: Box<dyn ResourceController> = match &config.mqtt {
        Some(mqtt) => {
            let client = create_mqtt_client(mqtt, health.clone());
            spawn_event_bridge(client.clone(), watcher.subscribe());
            Box::new(MqttFeedController::new(client))
        }
        None => Box::new(LoggingController),
    };
    spawn_policy(watcher.subscribe(), policy.clone(), controller);

    let hosts = collect_hosts(&config).await;
    for (name, address) in &hosts {
        watcher.add_host(name, address);
    }
    if hosts.is_empty() {
        warn!("No hosts configured; waiting for registrations over HTTP");
    } else {
        watcher.start_watching();
        info!("Monitoring {} camera(s)", hosts.len());
    }

    if let Some(http) = &config.http {
        let app = build_router(AppState {
            watcher: watcher.clone(),
            policy: policy.clone(),
            health: health.clone(),
            api_key: std::env::var("LINKWATCH_API_KEY").ok().filter(|k| !k.is_empty()),
        });
        let listener = TcpListener::bind(&http.bind)
            .await
            .with_context(|| format!("Failed to bind {}", http.bind))?;
        info!("Listening on http://{}", http.bind);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server stopped: {}", e);
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    watcher.stop_watching();
    info!("LinkWatch kernel stopped");
    Ok(())
}
