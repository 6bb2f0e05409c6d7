//! Watering automation: turns one moisture reading into a pump decision.
//!
//! The decision is a pure function of the reading, the node's pump status,
//! and the clock. Dispatching the command and recording the new run time
//! are the router's job, so everything here is trivially testable.

use time::{Duration, OffsetDateTime};

use crate::state::PumpStatus;

/// Moisture percentage below which irrigation becomes eligible.
pub const DEFAULT_THRESHOLD: f64 = 30.0;

/// Minimum gap between two automatic activations of the same pump: 48 h.
pub const DEFAULT_COOLDOWN_SEC: i64 = 172_800;

#[derive(Debug, Clone, Copy)]
pub struct EngineParams {
    pub threshold: f64,
    pub cooldown: Duration,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            cooldown: Duration::seconds(DEFAULT_COOLDOWN_SEC),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Trigger,
    Skip,
}

/// Decide whether a new moisture reading should start the pump.
///
/// A node reporting `ready` has no recorded run to anchor the cooldown and
/// is left to manual control; automation takes over once a first run has
/// been recorded.
pub fn decide(
    value: f64,
    pump: &PumpStatus,
    now: OffsetDateTime,
    params: &EngineParams,
) -> Decision {
    let last_run = match pump {
        PumpStatus::Ready => return Decision::Skip,
        PumpStatus::LastRunAt(ts) => *ts,
    };

    if value >= params.threshold {
        return Decision::Skip;
    }
    if now - last_run < params.cooldown {
        return Decision::Skip;
    }
    Decision::Trigger
}

// ===========================================================================
// Tests
// ===========================================================================
