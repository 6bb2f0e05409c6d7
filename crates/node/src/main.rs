mod actuator;
mod agent;
mod sensor;

use anyhow::Result;
use rumqttc::{AsyncClient, MqttOptions};
use std::{env, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// BCM pin driving the pump relay.
const PUMP_PIN: u8 = 15;
/// BCM pin for the status LED.
const LED_PIN: u8 = 25;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Env config
    let broker = env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("MQTT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1883);
    let node_id = env::var("NODE_ID").unwrap_or_else(|_| "node-a".to_string());
    let sample_every_s: u64 = env::var("SAMPLE_EVERY_S")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60);

    let client_id = format!("plantwatch-node-{node_id}");
    let mut mqttoptions = MqttOptions::new(client_id, broker, port);
    mqttoptions.set_keep_alive(Duration::from_secs(30));

    let (client, eventloop) = AsyncClient::new(mqttoptions, 10);

    info!(%node_id, sample_every_s, "node starting");

    let mut agent = agent::Agent::new(
        &node_id,
        Duration::from_secs(sample_every_s),
        sensor::MoistureSensor::new(),
        actuator::Pump::new(PUMP_PIN)?,
        actuator::StatusLed::new(LED_PIN)?,
    );
    agent.run(client, eventloop).await;

    Ok(())
}
