use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::RwLock;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

/// Wire format for pump-status timestamps, e.g. "2026-08-05 14:02:33".
const WIRE_TS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Pump status as last reported or recorded for a node. A node announces
/// `Ready` when it comes online; every run command (automatic or manual)
/// overwrites it with the activation time. It never reverts on its own.
#[derive(Clone, Debug, PartialEq)]
pub enum PumpStatus {
    Ready,
    LastRunAt(OffsetDateTime),
}

impl PumpStatus {
    /// Parse the wire payload: the literal `ready` or a timestamp.
    pub fn parse(payload: &str) -> Option<Self> {
        let s = payload.trim();
        if s == "ready" {
            return Some(Self::Ready);
        }
        PrimitiveDateTime::parse(s, WIRE_TS)
            .ok()
            .map(|dt| Self::LastRunAt(dt.assume_utc()))
    }

    /// Wire/API representation, inverse of [`PumpStatus::parse`].
    pub fn as_wire(&self) -> String {
        match self {
            Self::Ready => "ready".to_string(),
            Self::LastRunAt(ts) => format_wire_ts(*ts),
        }
    }
}

/// Format an instant in the wire timestamp form (UTC, seconds precision).
pub fn format_wire_ts(ts: OffsetDateTime) -> String {
    // The format has no fallible components once the offset is fixed.
    ts.format(WIRE_TS).unwrap_or_default()
}

#[derive(Clone, Debug, PartialEq)]
pub struct SensorReading {
    pub value: f64,
    pub timestamp: OffsetDateTime,
}

struct SensorSlot {
    latest: SensorReading,
    history: VecDeque<SensorReading>,
}

struct NodeEntry {
    sensors: HashMap<String, SensorSlot>,
    pump: PumpStatus,
}

impl NodeEntry {
    fn new() -> Self {
        Self {
            sensors: HashMap::new(),
            pump: PumpStatus::Ready,
        }
    }
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Reading,
    Pump,
    Error,
    System,
}

#[derive(Clone)]
struct SystemEvent {
    ts: OffsetDateTime,
    kind: EventKind,
    detail: String,
}

struct StoreInner {
    started_at: Instant,
    mqtt_connected: bool,
    nodes: HashMap<String, NodeEntry>,
    events: VecDeque<SystemEvent>,
}

impl StoreInner {
    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            detail,
        });
    }
}

// ---------------------------------------------------------------------------
// Store handle
// ---------------------------------------------------------------------------

/// Shared per-node state. The map lives behind one lock and is reachable
/// only through these methods; readers get copies, never live references.
#[derive(Clone)]
pub struct NodeStore {
    max_history: usize,
    inner: Arc<RwLock<StoreInner>>,
}

impl NodeStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            inner: Arc::new(RwLock::new(StoreInner {
                started_at: Instant::now(),
                mqtt_connected: false,
                nodes: HashMap::new(),
                events: VecDeque::with_capacity(MAX_EVENTS),
            })),
        }
    }

    /// Record a sensor reading: replace the latest slot and append to the
    /// capped history, creating the node entry if this is the first message
    /// from it. Returns the node's pump status from the same critical
    /// section so the caller can evaluate automation without a second lock.
    pub async fn upsert_sensor_reading(
        &self,
        node_id: &str,
        kind: &str,
        value: f64,
        now: OffsetDateTime,
    ) -> PumpStatus {
        let mut st = self.inner.write().await;
        let entry = st
            .nodes
            .entry(node_id.to_string())
            .or_insert_with(NodeEntry::new);

        let reading = SensorReading {
            value,
            timestamp: now,
        };
        let slot = entry
            .sensors
            .entry(kind.to_string())
            .or_insert_with(|| SensorSlot {
                latest: reading.clone(),
                history: VecDeque::new(),
            });
        if slot.history.len() >= self.max_history {
            slot.history.pop_front();
        }
        slot.history.push_back(reading.clone());
        slot.latest = reading;

        let pump = entry.pump.clone();
        st.push_event(EventKind::Reading, format!("{node_id}: {kind}={value}"));
        pump
    }

    /// Overwrite a node's pump status, creating the entry if absent.
    pub async fn set_pump_status(&self, node_id: &str, status: PumpStatus) {
        let mut st = self.inner.write().await;
        let detail = format!("{node_id}: pump {}", status.as_wire());
        st.nodes
            .entry(node_id.to_string())
            .or_insert_with(NodeEntry::new)
            .pump = status;
        st.push_event(EventKind::Pump, detail);
    }

    /// Broker link state, maintained by the message router.
    pub async fn set_link(&self, up: bool) {
        let mut st = self.inner.write().await;
        st.mqtt_connected = up;
        let detail = if up { "mqtt connected" } else { "mqtt disconnected" };
        st.push_event(EventKind::System, detail.to_string());
    }

    pub async fn record_error(&self, detail: String) {
        self.inner.write().await.push_event(EventKind::Error, detail);
    }

    pub async fn record_system(&self, detail: String) {
        self.inner.write().await.push_event(EventKind::System, detail);
    }

    /// Build the JSON-serialisable snapshot for read-only consumers.
    /// Everything is copied out under the read lock; mutations after this
    /// call never show up in the returned value.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let st = self.inner.read().await;

        let nodes = st
            .nodes
            .iter()
            .map(|(id, entry)| {
                let sensors = entry
                    .sensors
                    .iter()
                    .map(|(kind, slot)| {
                        (
                            kind.clone(),
                            SensorView {
                                value: slot.latest.value,
                                timestamp: format_wire_ts(slot.latest.timestamp),
                                history: slot
                                    .history
                                    .iter()
                                    .map(|r| HistoryPoint {
                                        value: r.value,
                                        timestamp: format_wire_ts(r.timestamp),
                                    })
                                    .collect(),
                            },
                        )
                    })
                    .collect();
                (
                    id.clone(),
                    NodeView {
                        sensors,
                        pump: entry.pump.as_wire(),
                    },
                )
            })
            .collect();

        StatusSnapshot {
            uptime_secs: st.started_at.elapsed().as_secs(),
            mqtt_connected: st.mqtt_connected,
            nodes,
            events: st
                .events
                .iter()
                .rev()
                .map(|e| EventView {
                    ts: format_wire_ts(e.ts),
                    kind: e.kind.clone(),
                    detail: e.detail.clone(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot views (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusSnapshot {
    pub uptime_secs: u64,
    pub mqtt_connected: bool,
    pub nodes: HashMap<String, NodeView>,
    pub events: Vec<EventView>,
}

#[derive(Serialize)]
pub struct NodeView {
    pub sensors: HashMap<String, SensorView>,
    pub pump: String,
}

#[derive(Serialize)]
pub struct SensorView {
    pub value: f64,
    pub timestamp: String,
    pub history: Vec<HistoryPoint>,
}

#[derive(Serialize)]
pub struct HistoryPoint {
    pub value: f64,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct EventView {
    pub ts: String,
    pub kind: EventKind,
    pub detail: String,
}

// ===========================================================================
// Tests
// ===========================================================================
