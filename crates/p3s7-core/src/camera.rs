//! Camera lifecycle and high-level settings.
//!
//! The controller is a thin view over the channel: state is always queried
//! from the device, never cached. Setters may be issued whether the camera is
//! open or closed; the device keeps the values and applies them on open.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::channel::ControlChannel;
use crate::error::ControlResult;
use crate::outcome::Outcome;

/// Lifecycle state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraState {
    /// Sensor unpowered. Initial and final state.
    Closed,
    /// Sensor powered and streaming into the receiver.
    Open,
}

impl CameraState {
    /// State for an `is_opened` answer.
    #[must_use]
    pub const fn from_opened(opened: bool) -> Self {
        if opened {
            Self::Open
        } else {
            Self::Closed
        }
    }
}

impl std::fmt::Display for CameraState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// Identity of the attached camera module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraInfo {
    /// Camera module id.
    pub module_id: u32,
    /// Camera module version.
    pub module_version: u32,
    /// Sensor chip id.
    pub sensor_id: u32,
}

/// Bundle of camera settings, typically loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Image width in samples.
    pub width: u32,
    /// Image height in samples.
    pub height: u32,
    /// Analog gain in dB.
    pub gain_db: f32,
    /// Exposure in microseconds.
    pub exposure_us: f32,
    /// Follow an external frame clock.
    pub slave_mode: bool,
    /// Start exposures on the trigger input.
    pub trigger_mode: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            gain_db: 1.0,
            exposure_us: 10_000.0,
            slave_mode: false,
            trigger_mode: false,
        }
    }
}

/// Camera controller over a borrowed channel.
pub struct CameraController<'a, C: ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: ControlChannel + ?Sized> CameraController<'a, C> {
    /// Create a controller view.
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }

    /// Open the camera. Opening an open camera succeeds.
    pub async fn open(&mut self) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_open().await?;
        if outcome.is_accepted() {
            info!("camera opened");
        } else {
            warn!("camera open rejected");
        }
        Ok(outcome)
    }

    /// Close the camera. Closing a closed camera succeeds.
    pub async fn close(&mut self) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_close().await?;
        if outcome.is_accepted() {
            info!("camera closed");
        } else {
            warn!("camera close rejected");
        }
        Ok(outcome)
    }

    /// Whether the device reports the camera as open.
    pub async fn is_opened(&mut self) -> ControlResult<bool> {
        self.channel.camera_is_opened().await
    }

    /// Current lifecycle state.
    pub async fn state(&mut self) -> ControlResult<CameraState> {
        Ok(CameraState::from_opened(self.is_opened().await?))
    }

    /// Camera module id.
    pub async fn module_id(&mut self) -> ControlResult<Outcome<u32>> {
        self.channel.camera_get_module_id().await
    }

    /// Camera module version.
    pub async fn module_version(&mut self) -> ControlResult<Outcome<u32>> {
        self.channel.camera_get_module_version().await
    }

    /// Sensor chip id.
    pub async fn sensor_id(&mut self) -> ControlResult<Outcome<u32>> {
        self.channel.camera_get_sensor_id().await
    }

    /// All three identity queries. Rejected as soon as one of them is.
    pub async fn info(&mut self) -> ControlResult<Outcome<CameraInfo>> {
        let Outcome::Accepted(module_id) = self.module_id().await? else {
            return Ok(Outcome::Rejected);
        };
        let Outcome::Accepted(module_version) = self.module_version().await? else {
            return Ok(Outcome::Rejected);
        };
        let Outcome::Accepted(sensor_id) = self.sensor_id().await? else {
            return Ok(Outcome::Rejected);
        };
        Ok(Outcome::Accepted(CameraInfo {
            module_id,
            module_version,
            sensor_id,
        }))
    }

    /// Configured image width.
    pub async fn image_width(&mut self) -> ControlResult<Outcome<u32>> {
        self.channel.camera_get_image_width().await
    }

    /// Configured image height.
    pub async fn image_height(&mut self) -> ControlResult<Outcome<u32>> {
        self.channel.camera_get_image_height().await
    }

    /// Gain in dB.
    pub async fn gain(&mut self) -> ControlResult<Outcome<f32>> {
        self.channel.camera_get_gain().await
    }

    /// Exposure in microseconds, after device quantization.
    pub async fn exposure(&mut self) -> ControlResult<Outcome<f32>> {
        self.channel.camera_get_exposure().await
    }

    /// Measured frame rate.
    pub async fn measure_fps(&mut self) -> ControlResult<Outcome<f32>> {
        self.channel.camera_measure_fps().await
    }

    /// Measured frame period in nanoseconds.
    pub async fn measure_frame_period(&mut self) -> ControlResult<Outcome<f32>> {
        self.channel.camera_measure_frame_period().await
    }

    /// Set the capture geometry.
    pub async fn set_image_size(&mut self, width: u32, height: u32) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_set_image_size(width, height).await?;
        debug!(width, height, ?outcome, "set image size");
        Ok(outcome)
    }

    /// Set analog gain in dB.
    pub async fn set_gain(&mut self, gain_db: f32) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_set_gain(gain_db).await?;
        debug!(gain_db, ?outcome, "set gain");
        Ok(outcome)
    }

    /// Set exposure in microseconds. The device rounds to its timer unit.
    pub async fn set_exposure(&mut self, exposure_us: f32) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_set_exposure(exposure_us).await?;
        debug!(exposure_us, ?outcome, "set exposure");
        Ok(outcome)
    }

    /// Enable or disable slave mode.
    pub async fn set_slave_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_set_slave_mode(enable).await?;
        debug!(enable, ?outcome, "set slave mode");
        Ok(outcome)
    }

    /// Enable or disable trigger mode.
    pub async fn set_trigger_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>> {
        let outcome = self.channel.camera_set_trigger_mode(enable).await?;
        debug!(enable, ?outcome, "set trigger mode");
        Ok(outcome)
    }

    /// Issue every setter in `settings`: size, gain, exposure, slave, trigger.
    ///
    /// Stops at the first rejected setter; later settings are not sent.
    pub async fn apply(&mut self, settings: &CameraSettings) -> ControlResult<Outcome<()>> {
        if self
            .set_image_size(settings.width, settings.height)
            .await?
            .is_rejected()
        {
            return Ok(Self::abandon("CameraSetImageSize"));
        }
        if self.set_gain(settings.gain_db).await?.is_rejected() {
            return Ok(Self::abandon("CameraSetGain"));
        }
        if self.set_exposure(settings.exposure_us).await?.is_rejected() {
            return Ok(Self::abandon("CameraSetExposure"));
        }
        if self.set_slave_mode(settings.slave_mode).await?.is_rejected() {
            return Ok(Self::abandon("CameraSetSlaveMode"));
        }
        if self
            .set_trigger_mode(settings.trigger_mode)
            .await?
            .is_rejected()
        {
            return Ok(Self::abandon("CameraSetTriggerMode"));
        }
        info!(?settings, "camera settings applied");
        Ok(Outcome::Accepted(()))
    }

    fn abandon(operation: &'static str) -> Outcome<()> {
        warn!(operation, "camera settings not applied: device rejected setter");
        Outcome::Rejected
    }
}
