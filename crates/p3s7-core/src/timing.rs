//! Timing generator.
//!
//! The generator produces the sensor trigger. It is configured with a single
//! `SetTimingGenerator` call and can be inspected through its register block,
//! whose values are counted in 10 ns ticks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::ControlChannel;
use crate::error::ControlResult;
use crate::outcome::Outcome;
use crate::registers::{RegisterBank, TimingRegister, TimingSpace};

/// Timing block ticks per microsecond.
pub const TICKS_PER_US: f64 = 100.0;

/// `ctlControl` bit that enables the generator.
pub const CTL_CONTROL_ENABLE: u32 = 0x01;

/// Convert a tick count from the timing block to microseconds.
#[must_use]
pub fn ticks_to_us(ticks: u32) -> f32 {
    (f64::from(ticks) / TICKS_PER_US) as f32
}

/// Convert microseconds to timing block ticks, rounding to the nearest tick.
#[must_use]
pub fn us_to_ticks(us: f32) -> u32 {
    let ticks = (f64::from(us) * TICKS_PER_US).round();
    if ticks <= 0.0 {
        0
    } else if ticks >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// Requested trigger timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Trigger period in microseconds.
    pub period_us: f32,
    /// Exposure (trigger high time) in microseconds.
    pub exposure_us: f32,
}

impl TimingConfig {
    /// New timing request. Values are sent as given; the device clamps them.
    #[must_use]
    pub const fn new(period_us: f32, exposure_us: f32) -> Self {
        Self {
            period_us,
            exposure_us,
        }
    }

    /// Timing for a target frame rate with exposure as a fraction of the
    /// period. Returns `None` for a non-positive or non-finite rate.
    #[must_use]
    pub fn from_frame_rate(fps: f32, exposure_ratio: f32) -> Option<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return None;
        }
        let period_us = 1_000_000.0 / fps;
        let ratio = if exposure_ratio.is_finite() {
            exposure_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Some(Self::new(period_us, period_us * ratio))
    }

    /// Frame rate implied by the period.
    #[must_use]
    pub fn frame_rate(&self) -> f32 {
        if self.period_us > 0.0 {
            1_000_000.0 / self.period_us
        } else {
            0.0
        }
    }
}

/// Timing as read back from the generator's registers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedTiming {
    /// Trigger period in microseconds.
    pub period_us: f32,
    /// Trigger assert time within the period, in microseconds.
    pub trigger_start_us: f32,
    /// Trigger deassert time within the period, in microseconds.
    pub exposure_us: f32,
    /// Whether the generator is running.
    pub enabled: bool,
}

/// View of the timing generator over a borrowed channel.
pub struct TimingGenerator<'a, C: ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: ControlChannel + ?Sized> TimingGenerator<'a, C> {
    /// Create a generator view.
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }

    /// Program period and exposure. Nothing is read back.
    pub async fn configure(&mut self, config: TimingConfig) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.set_timing_generator(config).await?;
        debug!(
            period_us = config.period_us,
            exposure_us = config.exposure_us,
            ?outcome,
            "timing generator configured"
        );
        Ok(outcome)
    }

    /// Shorthand for [`configure`](Self::configure).
    pub async fn configure_with(
        &mut self,
        period_us: f32,
        exposure_us: f32,
    ) -> ControlResult<Outcome<()>> {
        self.configure(TimingConfig::new(period_us, exposure_us))
            .await
    }

    /// Read the programmed timing back from the register block.
    ///
    /// Rejected if any of the four registers cannot be read.
    pub async fn read_back(&mut self) -> ControlResult<Outcome<AppliedTiming>> {
        let mut bank = self.registers();
        let Outcome::Accepted(period) = bank.read(TimingRegister::ParamPeriod).await? else {
            return Ok(Outcome::Rejected);
        };
        let Outcome::Accepted(start) = bank.read(TimingRegister::ParamTrig0Start).await? else {
            return Ok(Outcome::Rejected);
        };
        let Outcome::Accepted(end) = bank.read(TimingRegister::ParamTrig0End).await? else {
            return Ok(Outcome::Rejected);
        };
        let Outcome::Accepted(control) = bank.read(TimingRegister::CtlControl).await? else {
            return Ok(Outcome::Rejected);
        };

        Ok(Outcome::Accepted(AppliedTiming {
            period_us: ticks_to_us(period),
            trigger_start_us: ticks_to_us(start),
            exposure_us: ticks_to_us(end),
            enabled: control & CTL_CONTROL_ENABLE != 0,
        }))
    }

    /// Timing core identification register.
    pub async fn core_id(&mut self) -> ControlResult<Outcome<u32>> {
        self.registers().read(TimingRegister::CoreId).await
    }

    /// Timing core version register.
    pub async fn core_version(&mut self) -> ControlResult<Outcome<u32>> {
        self.registers().read(TimingRegister::CoreVersion).await
    }

    fn registers(&mut self) -> RegisterBank<'_, C, TimingSpace> {
        RegisterBank::new(&mut *self.channel)
    }
}
