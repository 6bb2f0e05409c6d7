//! Supervised broker loop for one node.
//!
//! A single cooperative task drives everything: broker events and the
//! telemetry timer share one `select`, so a pump run intentionally pauses
//! polling and telemetry for its duration. Subscriptions and the `ready`
//! announcement are issued on every connection acknowledgement, which makes
//! reconnection just "keep polling": after a transport error the loop waits
//! a fixed delay, the transport redials, and the next ConnAck restores the
//! session state.

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use std::time::Duration;
use tokio::time::{sleep, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::actuator::{Pump, StatusLed, PUMP_RUN_DURATION};
use crate::sensor::MoistureSensor;

/// Fixed wait between reconnection attempts. Never gives up.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Command topics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    RunPump,
    PublishReading,
    ToggleLed,
}

/// The three command topics a node listens on. Inbound classification is an
/// exact string match against this table.
pub struct CommandTopics {
    run_pump: String,
    sensor_update: String,
    led_toggle: String,
}

impl CommandTopics {
    pub fn new(node_id: &str) -> Self {
        Self {
            run_pump: format!("node/{node_id}/pump/command"),
            sensor_update: format!("node/{node_id}/sensor/update"),
            led_toggle: format!("node/{node_id}/led/toggle"),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.run_pump, &self.sensor_update, &self.led_toggle]
    }

    pub fn classify(&self, topic: &str) -> Option<NodeCommand> {
        if topic == self.run_pump {
            Some(NodeCommand::RunPump)
        } else if topic == self.sensor_update {
            Some(NodeCommand::PublishReading)
        } else if topic == self.led_toggle {
            Some(NodeCommand::ToggleLed)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

pub struct Agent {
    topics: CommandTopics,
    telemetry_topic: String,
    status_topic: String,
    sample_every: Duration,
    sensor: MoistureSensor,
    pump: Pump,
    led: StatusLed,
    connected: bool,
}

impl Agent {
    pub fn new(
        node_id: &str,
        sample_every: Duration,
        sensor: MoistureSensor,
        pump: Pump,
        led: StatusLed,
    ) -> Self {
        Self {
            topics: CommandTopics::new(node_id),
            telemetry_topic: format!("node/{node_id}/sensor/moisture"),
            status_topic: format!("node/{node_id}/pump/status"),
            sample_every,
            sensor,
            pump,
            led,
            connected: false,
        }
    }

    /// Run the agent until the process exits.
    pub async fn run(&mut self, client: AsyncClient, mut eventloop: EventLoop) {
        let mut ticker = tokio::time::interval(self.sample_every);
        // A 5 s pump run can push ticks past due; don't burst to catch up.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        self.on_connected(&client).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        self.on_command(&client, &p.topic).await;
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("broker disconnected");
                        self.connected = false;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.connected = false;
                        error!(
                            "mqtt error: {e}. retrying in {}s",
                            RECONNECT_DELAY.as_secs()
                        );
                        sleep(RECONNECT_DELAY).await;
                    }
                },
                _ = ticker.tick() => {
                    if self.connected {
                        self.publish_reading(&client).await;
                    }
                }
            }
        }
    }

    async fn on_connected(&mut self, client: &AsyncClient) {
        info!("connected to broker");
        self.connected = true;

        for topic in self.topics.all() {
            if let Err(e) = client.subscribe(topic, QoS::AtMostOnce).await {
                error!(topic, "subscribe failed: {e}");
            }
        }
        if let Err(e) = client
            .publish(&self.status_topic, QoS::AtMostOnce, false, "ready")
            .await
        {
            error!("ready announcement failed: {e}");
        }
    }

    async fn on_command(&mut self, client: &AsyncClient, topic: &str) {
        match self.topics.classify(topic) {
            Some(NodeCommand::RunPump) => {
                info!("run command received");
                self.pump.run(PUMP_RUN_DURATION).await;
            }
            Some(NodeCommand::PublishReading) => {
                info!("sensor update requested");
                self.publish_reading(client).await;
            }
            Some(NodeCommand::ToggleLed) => {
                self.led.toggle();
            }
            // A publish we didn't subscribe to (or our own telemetry echo).
            None => {}
        }
    }

    async fn publish_reading(&mut self, client: &AsyncClient) {
        let pct = self.sensor.read();
        let payload = format!("{pct:.2}");
        match client
            .publish(&self.telemetry_topic, QoS::AtMostOnce, false, payload.clone())
            .await
        {
            Ok(()) => info!(value = %payload, "published moisture"),
            Err(e) => error!("publish error: {e}"),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- CommandTopics --------------------------------------------------------

    #[test]
    fn topics_follow_the_node_namespace() {
        let topics = CommandTopics::new("living-room");
        assert_eq!(
            topics.all(),
            [
                "node/living-room/pump/command",
                "node/living-room/sensor/update",
                "node/living-room/led/toggle",
            ]
        );
    }

    #[test]
    fn classify_run_pump() {
        let topics = CommandTopics::new("n1");
        assert_eq!(
            topics.classify("node/n1/pump/command"),
            Some(NodeCommand::RunPump)
        );
    }

    #[test]
    fn classify_sensor_update() {
        let topics = CommandTopics::new("n1");
        assert_eq!(
            topics.classify("node/n1/sensor/update"),
            Some(NodeCommand::PublishReading)
        );
    }

    #[test]
    fn classify_led_toggle() {
        let topics = CommandTopics::new("n1");
        assert_eq!(
            topics.classify("node/n1/led/toggle"),
            Some(NodeCommand::ToggleLed)
        );
    }

    #[test]
    fn classify_ignores_other_nodes() {
        let topics = CommandTopics::new("n1");
        assert_eq!(topics.classify("node/n2/pump/command"), None);
    }

    #[test]
    fn classify_ignores_own_telemetry_topic() {
        let topics = CommandTopics::new("n1");
        assert_eq!(topics.classify("node/n1/sensor/moisture"), None);
        assert_eq!(topics.classify("node/n1/pump/status"), None);
    }

    #[test]
    fn classify_ignores_garbage() {
        let topics = CommandTopics::new("n1");
        assert_eq!(topics.classify(""), None);
        assert_eq!(topics.classify("node/n1/pump"), None);
    }

    // -- Agent ----------------------------------------------------------------

    #[cfg(not(feature = "gpio"))]
    #[tokio::test(start_paused = true)]
    async fn run_pump_command_drives_the_actuator() {
        let opts = rumqttc::MqttOptions::new("test-agent", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(opts, 10);

        let mut agent = Agent::new(
            "n1",
            Duration::from_secs(60),
            MoistureSensor::new(),
            Pump::new(15).unwrap(),
            StatusLed::new(25).unwrap(),
        );

        agent.on_command(&client, "node/n1/pump/command").await;
        assert_eq!(agent.pump.runs, 1);
        assert!(!agent.pump.running);
    }

    #[cfg(not(feature = "gpio"))]
    #[tokio::test]
    async fn toggle_command_flips_the_led() {
        let opts = rumqttc::MqttOptions::new("test-agent-led", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(opts, 10);

        let mut agent = Agent::new(
            "n1",
            Duration::from_secs(60),
            MoistureSensor::new(),
            Pump::new(15).unwrap(),
            StatusLed::new(25).unwrap(),
        );

        agent.on_command(&client, "node/n1/led/toggle").await;
        assert!(agent.led.lit);
        agent.on_command(&client, "node/n1/led/toggle").await;
        assert!(!agent.led.lit);
    }

    #[cfg(not(feature = "gpio"))]
    #[tokio::test]
    async fn foreign_topic_does_nothing() {
        let opts = rumqttc::MqttOptions::new("test-agent-x", "127.0.0.1", 1883);
        let (client, _eventloop) = AsyncClient::new(opts, 10);

        let mut agent = Agent::new(
            "n1",
            Duration::from_secs(60),
            MoistureSensor::new(),
            Pump::new(15).unwrap(),
            StatusLed::new(25).unwrap(),
        );

        agent.on_command(&client, "node/other/pump/command").await;
        assert_eq!(agent.pump.runs, 0);
        assert!(!agent.led.lit);
    }
}
