//! The control channel contract.
//!
//! [`ControlChannel`] is the complete operation catalog of the camera control
//! service. Every method is one request/response round trip. Receivers are
//! `&mut self`, so a session can never have two calls in flight.
//!
//! Return types encode the two failure modes separately:
//!
//! - `Err(ControlError)`: the channel failed; the session is no longer usable.
//! - `Ok(Outcome::Rejected)`: the device answered and said no.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ControlResult;
use crate::frame::frame_len;
use crate::outcome::Outcome;
use crate::registers::RegisterPort;
use crate::timing::TimingConfig;

/// Capture channels backed by independent device buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureChannel {
    /// Active image frames.
    Image,
    /// Dark reference frames.
    Black,
}

impl CaptureChannel {
    /// Both channels.
    pub const ALL: [CaptureChannel; 2] = [CaptureChannel::Image, CaptureChannel::Black];

    /// Name of the record operation on the wire.
    #[must_use]
    pub const fn record_operation(self) -> &'static str {
        match self {
            Self::Image => "RecordImage",
            Self::Black => "RecordBlack",
        }
    }

    /// Name of the read operation on the wire.
    #[must_use]
    pub const fn read_operation(self) -> &'static str {
        match self {
            Self::Image => "ReadImage",
            Self::Black => "ReadBlack",
        }
    }
}

impl std::fmt::Display for CaptureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// Geometry and frame count of a record request.
///
/// The device decides how many frames actually fit in its buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Frame width in samples.
    pub width: u32,
    /// Frame height in samples.
    pub height: u32,
    /// Number of frames to record.
    pub frames: u32,
}

impl CaptureRequest {
    /// New request.
    #[must_use]
    pub const fn new(width: u32, height: u32, frames: u32) -> Self {
        Self {
            width,
            height,
            frames,
        }
    }

    /// Bytes in one frame of this geometry; `None` on overflow.
    #[must_use]
    pub fn frame_bytes(&self) -> Option<usize> {
        frame_len(self.width, self.height)
    }

    /// Bytes needed to hold every requested frame; `None` on overflow.
    #[must_use]
    pub fn total_bytes(&self) -> Option<u64> {
        u64::try_from(self.frame_bytes()?)
            .ok()?
            .checked_mul(u64::from(self.frames))
    }
}

/// Operation catalog of the camera control service.
#[async_trait]
pub trait ControlChannel: Send {
    /// `GetVersion`: version string of the device-side service.
    async fn get_version(&mut self) -> ControlResult<String>;

    /// `CameraOpen`: power up and initialize the camera.
    async fn camera_open(&mut self) -> ControlResult<Outcome<()>>;

    /// `CameraClose`: stop the sensor and power down.
    async fn camera_close(&mut self) -> ControlResult<Outcome<()>>;

    /// `CameraIsOpened`: live lifecycle state.
    async fn camera_is_opened(&mut self) -> ControlResult<bool>;

    /// `CameraGetModuleId`.
    async fn camera_get_module_id(&mut self) -> ControlResult<Outcome<u32>>;

    /// `CameraGetModuleVersion`.
    async fn camera_get_module_version(&mut self) -> ControlResult<Outcome<u32>>;

    /// `CameraGetSensorId`.
    async fn camera_get_sensor_id(&mut self) -> ControlResult<Outcome<u32>>;

    /// `CameraSetSlaveMode`.
    async fn camera_set_slave_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>>;

    /// `CameraSetTriggerMode`.
    async fn camera_set_trigger_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>>;

    /// `CameraSetImageSize`.
    async fn camera_set_image_size(&mut self, width: u32, height: u32)
        -> ControlResult<Outcome<()>>;

    /// `CameraGetImageWidth`.
    async fn camera_get_image_width(&mut self) -> ControlResult<Outcome<u32>>;

    /// `CameraGetImageHeight`.
    async fn camera_get_image_height(&mut self) -> ControlResult<Outcome<u32>>;

    /// `CameraSetGain`, in dB.
    async fn camera_set_gain(&mut self, gain_db: f32) -> ControlResult<Outcome<()>>;

    /// `CameraGetGain`, in dB.
    async fn camera_get_gain(&mut self) -> ControlResult<Outcome<f32>>;

    /// `CameraSetExposure`, in microseconds.
    async fn camera_set_exposure(&mut self, exposure_us: f32) -> ControlResult<Outcome<()>>;

    /// `CameraGetExposure`, in microseconds.
    async fn camera_get_exposure(&mut self) -> ControlResult<Outcome<f32>>;

    /// `CameraMeasureFps`.
    async fn camera_measure_fps(&mut self) -> ControlResult<Outcome<f32>>;

    /// `CameraMeasureFramePeriod`, in nanoseconds.
    async fn camera_measure_frame_period(&mut self) -> ControlResult<Outcome<f32>>;

    /// `RecordImage` / `RecordBlack`: capture into the device buffer.
    ///
    /// Blocks until the device has committed the frames. The value is the
    /// number of frames the device reports as committed.
    async fn record(
        &mut self,
        channel: CaptureChannel,
        request: CaptureRequest,
    ) -> ControlResult<Outcome<u32>>;

    /// `ReadImage` / `ReadBlack`: fetch one recorded frame as raw bytes.
    async fn read(&mut self, channel: CaptureChannel, index: u32)
        -> ControlResult<Outcome<Vec<u8>>>;

    /// `SetTimingGenerator`.
    async fn set_timing_generator(&mut self, config: TimingConfig) -> ControlResult<Outcome<()>>;

    /// `WriteSysReg` / `WriteCamReg` / `WriteSensorReg`.
    async fn write_register(
        &mut self,
        port: RegisterPort,
        address: u16,
        value: u32,
    ) -> ControlResult<Outcome<()>>;

    /// `ReadSysReg` / `ReadCamReg` / `ReadSensorReg`.
    async fn read_register(&mut self, port: RegisterPort, address: u16)
        -> ControlResult<Outcome<u32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_sizes() {
        let request = CaptureRequest::new(640, 320, 20);
        assert_eq!(request.frame_bytes(), Some(640 * 320 * 2));
        assert_eq!(request.total_bytes(), Some(640 * 320 * 2 * 20));

        let huge = CaptureRequest::new(u32::MAX, u32::MAX, u32::MAX);
        assert_eq!(huge.frame_bytes(), None);
        assert_eq!(huge.total_bytes(), None);
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(CaptureChannel::Image.record_operation(), "RecordImage");
        assert_eq!(CaptureChannel::Black.read_operation(), "ReadBlack");
        assert_eq!(RegisterPort::Sensor.write_operation(), "WriteSensorReg");
    }
}
