//! Hub configuration: broker and bind settings come from the environment,
//! automation tuning from an optional TOML file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use time::Duration;

use crate::engine::{EngineParams, DEFAULT_COOLDOWN_SEC, DEFAULT_THRESHOLD};

/// Default per-sensor history cap. At the node's 60 s telemetry cadence
/// this keeps a bit over eight hours of readings per sensor.
pub const DEFAULT_MAX_HISTORY: usize = 500;

// ---------------------------------------------------------------------------
// Config structures
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct HubConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub web_port: u16,
    pub tuning: Tuning,
}

#[derive(Debug, Deserialize)]
pub struct Tuning {
    #[serde(default = "default_threshold")]
    pub moisture_threshold: f64,
    #[serde(default = "default_cooldown_sec")]
    pub cooldown_sec: i64,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_cooldown_sec() -> i64 {
    DEFAULT_COOLDOWN_SEC
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            moisture_threshold: default_threshold(),
            cooldown_sec: default_cooldown_sec(),
            max_history: default_max_history(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Tuning {
    /// Validate all tuning values. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if !(0.0..=100.0).contains(&self.moisture_threshold) {
            errors.push(format!(
                "moisture_threshold {} out of range [0.0, 100.0]",
                self.moisture_threshold
            ));
        }
        if self.cooldown_sec <= 0 {
            errors.push(format!(
                "cooldown_sec must be positive, got {}",
                self.cooldown_sec
            ));
        }
        if self.max_history == 0 {
            errors.push("max_history must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    pub fn engine_params(&self) -> EngineParams {
        EngineParams {
            threshold: self.moisture_threshold,
            cooldown: Duration::seconds(self.cooldown_sec),
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML tuning file.
pub fn load_tuning(path: &str) -> Result<Tuning> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let tuning: Tuning =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    tuning
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;
    Ok(tuning)
}

/// Assemble the full hub configuration from the environment. A missing
/// tuning file is not an error; defaults apply.
pub fn from_env() -> Result<HubConfig> {
    let mqtt_host = env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let mqtt_port: u16 = env::var("MQTT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1883);
    let web_port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "hub.toml".to_string());
    let tuning = if Path::new(&config_path).exists() {
        load_tuning(&config_path)?
    } else {
        tracing::info!(path = %config_path, "no tuning file, using defaults");
        Tuning::default()
    };

    Ok(HubConfig {
        mqtt_host,
        mqtt_port,
        web_port,
        tuning,
    })
}

// ===========================================================================
// Tests
// ===========================================================================
