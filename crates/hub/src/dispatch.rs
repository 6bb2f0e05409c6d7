//! Outbound node commands. Fire-and-forget: published at QoS 0 with no
//! acknowledgement or correlation, so delivery is at-most-once.

use anyhow::Result;
use rumqttc::{AsyncClient, QoS};
use tracing::debug;

use crate::topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RunPump,
    RequestSensorUpdate,
    ToggleIndicator,
}

impl Command {
    /// (category, subkey) under the node's topic prefix.
    fn route(self) -> (&'static str, &'static str) {
        match self {
            Self::RunPump => ("pump", "command"),
            Self::RequestSensorUpdate => ("sensor", "update"),
            Self::ToggleIndicator => ("led", "toggle"),
        }
    }

    /// Literal wire payload; the topic itself carries the selection.
    pub(crate) fn payload(self) -> &'static str {
        match self {
            Self::RunPump => "run",
            Self::RequestSensorUpdate => "update",
            Self::ToggleIndicator => "toggle",
        }
    }

    pub(crate) fn topic(self, node_id: &str) -> String {
        let (category, subkey) = self.route();
        topic::build(node_id, category, subkey)
    }
}

/// Publish `command` to `node_id`'s command topic. The store is not
/// consulted: commands to never-seen nodes go out like any other.
pub async fn send(mqtt: &AsyncClient, node_id: &str, command: Command) -> Result<()> {
    let topic = command.topic(node_id);
    debug!(%topic, payload = command.payload(), "dispatching command");
    mqtt.publish(topic, QoS::AtMostOnce, false, command.payload().as_bytes().to_vec())
        .await?;
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
