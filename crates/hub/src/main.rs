mod config;
mod dispatch;
mod engine;
mod mqtt;
mod state;
mod topic;
mod web;

use anyhow::Result;
use rumqttc::{AsyncClient, MqttOptions};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ──────────────────────────────────────────────────────
    let cfg = config::from_env()?;
    let params = cfg.tuning.engine_params();
    info!(
        threshold = params.threshold,
        cooldown_sec = params.cooldown.whole_seconds(),
        max_history = cfg.tuning.max_history,
        "tuning loaded"
    );

    // ── Shared state (ephemeral, rebuilt from the message stream) ───
    let store = state::NodeStore::new(cfg.tuning.max_history);
    store.record_system("hub started".to_string()).await;

    // ── MQTT client ─────────────────────────────────────────────────
    let mut mqttoptions = MqttOptions::new("plantwatch-hub", cfg.mqtt_host.clone(), cfg.mqtt_port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));
    let (client, eventloop) = AsyncClient::new(mqttoptions, 20);

    info!(host = %cfg.mqtt_host, port = cfg.mqtt_port, "connecting to broker");

    // ── HTTP API ────────────────────────────────────────────────────
    let web_state = web::AppState {
        store: store.clone(),
        mqtt: client.clone(),
    };
    let web_port = cfg.web_port;
    tokio::spawn(async move {
        web::serve(web_state, web_port).await;
    });

    // ── Message router (owns the main task) ─────────────────────────
    mqtt::run(client, eventloop, store, params).await;

    Ok(())
}
