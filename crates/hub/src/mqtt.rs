//! Message router: owns the broker event loop, classifies inbound publishes
//! by topic, and feeds the store and the automation engine.
//!
//! Per-message failures (bad topic shape, non-numeric payload) are logged
//! and recorded, never fatal. A transport error marks the link down and the
//! loop keeps polling; rumqttc re-establishes the session and the ConnAck
//! branch re-issues the subscriptions.

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::dispatch::{self, Command};
use crate::engine::{self, Decision, EngineParams};
use crate::state::{NodeStore, PumpStatus};
use crate::topic;

const SUBSCRIPTIONS: [&str; 2] = ["node/+/sensor/+", "node/+/pump/status"];
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// Decode a sensor payload as a decimal value (trims whitespace).
pub(crate) fn parse_sensor_payload(payload: &[u8]) -> Option<f64> {
    std::str::from_utf8(payload).ok()?.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Inbound dispatch
// ---------------------------------------------------------------------------

/// Classify and process one inbound publish.
pub(crate) async fn handle_publish(
    topic_str: &str,
    payload: &[u8],
    store: &NodeStore,
    mqtt: &AsyncClient,
    params: &EngineParams,
) {
    let Some(addr) = topic::parse(topic_str) else {
        warn!(topic = %topic_str, "malformed topic");
        store
            .record_error(format!("malformed topic: {topic_str}"))
            .await;
        return;
    };

    match (addr.category, addr.subkey) {
        ("sensor", kind) => {
            let Some(value) = parse_sensor_payload(payload) else {
                warn!(topic = %topic_str, "non-numeric sensor payload");
                store
                    .record_error(format!("{}: bad {kind} payload", addr.node_id))
                    .await;
                return;
            };

            let now = OffsetDateTime::now_utc();
            let pump = store
                .upsert_sensor_reading(addr.node_id, kind, value, now)
                .await;

            if engine::decide(value, &pump, now, params) == Decision::Trigger {
                info!(
                    node = %addr.node_id,
                    value,
                    "moisture low — auto-activating pump"
                );
                if let Err(e) = dispatch::send(mqtt, addr.node_id, Command::RunPump).await {
                    error!(node = %addr.node_id, "run command dispatch failed: {e}");
                    store
                        .record_error(format!("{}: run dispatch failed: {e}", addr.node_id))
                        .await;
                    return;
                }
                // Recorded immediately; the device never confirms.
                store
                    .set_pump_status(addr.node_id, PumpStatus::LastRunAt(now))
                    .await;
            }
        }
        ("pump", "status") => {
            let text = String::from_utf8_lossy(payload);
            match PumpStatus::parse(&text) {
                Some(status) => store.set_pump_status(addr.node_id, status).await,
                None => {
                    warn!(node = %addr.node_id, payload = %text, "bad pump status payload");
                    store
                        .record_error(format!("{}: bad pump status payload", addr.node_id))
                        .await;
                }
            }
        }
        // Unrecognized category/subkey combinations are ignored so newer
        // node firmware can add topics without breaking older hubs.
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the router until the process exits. Intended to own the main task.
pub async fn run(
    mqtt: AsyncClient,
    mut eventloop: EventLoop,
    store: NodeStore,
    params: EngineParams,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt connected");
                store.set_link(true).await;
                for pattern in SUBSCRIPTIONS {
                    if let Err(e) = mqtt.subscribe(pattern, QoS::AtLeastOnce).await {
                        error!(pattern, "subscribe failed: {e}");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Publish(p))) => {
                handle_publish(&p.topic, &p.payload, &store, &mqtt, &params).await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("mqtt disconnected");
                store.set_link(false).await;
            }
            Ok(_) => {}
            Err(e) => {
                error!("mqtt error: {e}. reconnecting...");
                store.set_link(false).await;
                sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
