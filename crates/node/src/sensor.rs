//! Soil moisture sampling.
//!
//! The probe reads a 16-bit ADC word where a drier probe reads higher, so
//! the percentage is inverted: 0 = bone dry, 100 = saturated. The default
//! `sim` build produces a mean-reverting random walk over raw counts;
//! without it a fixed mid-range word stands in.

/// Full-scale raw ADC word.
const RAW_MAX: u16 = u16::MAX;

/// Convert a raw ADC word to an inverted moisture percentage, rounded to
/// two decimals (the wire precision).
pub fn raw_to_percent(raw: u16) -> f64 {
    let pct = 100.0 - (raw as f64 / RAW_MAX as f64) * 100.0;
    (pct * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Simulated probe (development — no hardware)
// ---------------------------------------------------------------------------

#[cfg(feature = "sim")]
pub struct MoistureSensor {
    /// Current "true" raw level; evolves with each sample.
    base: f64,
}

#[cfg(feature = "sim")]
impl MoistureSensor {
    /// Random walk tuning, in raw counts per sample.
    const WALK_STEP: f64 = 400.0;
    /// Slow drying drift toward the dry (high) end.
    const DRIFT: f64 = 40.0;
    const CENTER: f64 = RAW_MAX as f64 / 2.0;
    const MEAN_REVERSION: f64 = 0.01;

    pub fn new() -> Self {
        // Start somewhere mid-range so the first readings are unremarkable.
        let jitter = (fastrand::f64() - 0.5) * 8000.0;
        Self {
            base: Self::CENTER + jitter,
        }
    }

    fn sample_raw(&mut self) -> u16 {
        let pull = Self::MEAN_REVERSION * (Self::CENTER - self.base);
        let walk = (fastrand::f64() - 0.5) * 2.0 * Self::WALK_STEP;
        self.base = (self.base + Self::DRIFT + pull + walk).clamp(0.0, RAW_MAX as f64);
        self.base.round() as u16
    }

    /// Sample the probe and return the moisture percentage.
    pub fn read(&mut self) -> f64 {
        raw_to_percent(self.sample_raw())
    }
}

// ---------------------------------------------------------------------------
// Fallback probe (sim feature disabled, no ADC wired)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "sim"))]
pub struct MoistureSensor;

#[cfg(not(feature = "sim"))]
impl MoistureSensor {
    pub fn new() -> Self {
        Self
    }

    pub fn read(&mut self) -> f64 {
        raw_to_percent(RAW_MAX / 2)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
