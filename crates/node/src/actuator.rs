//! Pump and indicator control. The `gpio` feature gates the real rppal
//! driver; without it, a mock implementation logs state changes.

use std::time::Duration;
use tokio::time::sleep;

#[cfg(feature = "gpio")]
use rppal::gpio::{Gpio, OutputPin};

/// How long a run command drives the pump.
pub const PUMP_RUN_DURATION: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Real GPIO actuators (production — requires rppal + Raspberry Pi hardware)
// ---------------------------------------------------------------------------

/// The pump relay is active-low: the pin idles high and is pulled low for
/// the duration of a run.
#[cfg(feature = "gpio")]
pub struct Pump {
    pin: OutputPin,
}

#[cfg(feature = "gpio")]
impl Pump {
    pub fn new(pin_num: u8) -> anyhow::Result<Self> {
        let mut pin = Gpio::new()?.get(pin_num)?.into_output();
        pin.set_high(); // idle
        Ok(Self { pin })
    }

    pub async fn run(&mut self, duration: Duration) {
        tracing::info!(secs = duration.as_secs(), "pump on");
        self.pin.set_low();
        sleep(duration).await;
        self.pin.set_high();
        tracing::info!("pump off");
    }
}

#[cfg(feature = "gpio")]
pub struct StatusLed {
    pin: OutputPin,
    lit: bool,
}

#[cfg(feature = "gpio")]
impl StatusLed {
    pub fn new(pin_num: u8) -> anyhow::Result<Self> {
        let mut pin = Gpio::new()?.get(pin_num)?.into_output();
        pin.set_low();
        Ok(Self { pin, lit: false })
    }

    pub fn toggle(&mut self) {
        self.lit = !self.lit;
        if self.lit {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        tracing::info!(lit = self.lit, "led toggled");
    }
}

// ---------------------------------------------------------------------------
// Mock actuators (development — no hardware, logs state changes)
// ---------------------------------------------------------------------------

#[cfg(not(feature = "gpio"))]
pub struct Pump {
    pub(crate) runs: u32,
    pub(crate) running: bool,
}

#[cfg(not(feature = "gpio"))]
impl Pump {
    pub fn new(_pin_num: u8) -> anyhow::Result<Self> {
        tracing::info!("[mock-gpio] pump registered (not wired)");
        Ok(Self {
            runs: 0,
            running: false,
        })
    }

    pub async fn run(&mut self, duration: Duration) {
        tracing::info!(secs = duration.as_secs(), "[mock-gpio] pump on");
        self.running = true;
        sleep(duration).await;
        self.running = false;
        self.runs += 1;
        tracing::info!("[mock-gpio] pump off");
    }
}

#[cfg(not(feature = "gpio"))]
pub struct StatusLed {
    pub(crate) lit: bool,
}

#[cfg(not(feature = "gpio"))]
impl StatusLed {
    pub fn new(_pin_num: u8) -> anyhow::Result<Self> {
        tracing::info!("[mock-gpio] led registered (not wired)");
        Ok(Self { lit: false })
    }

    pub fn toggle(&mut self) {
        self.lit = !self.lit;
        tracing::info!(lit = self.lit, "[mock-gpio] led toggled");
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(all(test, not(feature = "gpio")))]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pump_run_completes_and_counts() {
        let mut pump = Pump::new(15).unwrap();
        pump.run(Duration::from_secs(5)).await;
        assert!(!pump.running);
        assert_eq!(pump.runs, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pump_runs_accumulate() {
        let mut pump = Pump::new(15).unwrap();
        pump.run(Duration::from_secs(5)).await;
        pump.run(Duration::from_secs(5)).await;
        assert_eq!(pump.runs, 2);
    }

    #[test]
    fn led_toggle_flips_state() {
        let mut led = StatusLed::new(25).unwrap();
        assert!(!led.lit);
        led.toggle();
        assert!(led.lit);
        led.toggle();
        assert!(!led.lit);
    }
}
