//! Simulated device implementing [`ControlChannel`].
//!
//! A [`MockDevice`] is a cheap handle: clones share one [`DeviceState`], so a
//! second clone behaves like a second session against the same board.
//!
//! # Example
//!
//! ```
//! use p3s7_core::{CaptureChannel, CaptureRequest, Session};
//! use p3s7_driver_mock::MockDevice;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(MockDevice::new());
//! assert!(session.camera().open().await?.is_accepted());
//! let frames = session
//!     .acquisition()
//!     .record_all(CaptureChannel::Image, CaptureRequest::new(64, 32, 4))
//!     .await?;
//! assert_eq!(frames.value().map(|f| f.len()), Some(4));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use p3s7_core::channel::{CaptureChannel, CaptureRequest, ControlChannel};
use p3s7_core::error::{ControlError, ControlResult};
use p3s7_core::outcome::Outcome;
use p3s7_core::registers::RegisterPort;
use p3s7_core::timing::TimingConfig;

use crate::common::{FaultConfig, InjectedFault, LatencyConfig, MockMode};
use crate::device::{DeviceIdentity, DeviceState};

/// Default capture buffer size per channel: 64 MiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024 * 1024;

/// Builder for [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockDeviceBuilder {
    mode: MockMode,
    latency: LatencyConfig,
    faults: FaultConfig,
    identity: DeviceIdentity,
    image_capacity: usize,
    black_capacity: usize,
    pattern_seed: u64,
}

impl Default for MockDeviceBuilder {
    fn default() -> Self {
        Self {
            mode: MockMode::Instant,
            latency: LatencyConfig::default(),
            faults: FaultConfig::none(),
            identity: DeviceIdentity::default(),
            image_capacity: DEFAULT_BUFFER_CAPACITY,
            black_capacity: DEFAULT_BUFFER_CAPACITY,
            pattern_seed: 0,
        }
    }
}

impl MockDeviceBuilder {
    /// Start from the defaults: instant mode, no faults, 64 MiB buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Operational mode.
    pub fn mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Delays used in [`MockMode::Realistic`].
    pub fn latency(mut self, latency: LatencyConfig) -> Self {
        self.latency = latency;
        self
    }

    /// Fault injection.
    pub fn faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }

    /// Identity values the device reports.
    pub fn identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Capture buffer size in bytes for both channels.
    pub fn buffer_capacity(mut self, bytes: usize) -> Self {
        self.image_capacity = bytes;
        self.black_capacity = bytes;
        self
    }

    /// Capture buffer size in bytes for one channel.
    pub fn channel_capacity(mut self, channel: CaptureChannel, bytes: usize) -> Self {
        match channel {
            CaptureChannel::Image => self.image_capacity = bytes,
            CaptureChannel::Black => self.black_capacity = bytes,
        }
        self
    }

    /// Seed for frame noise.
    pub fn pattern_seed(mut self, seed: u64) -> Self {
        self.pattern_seed = seed;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<MockDevice> {
        if self.image_capacity == 0 || self.black_capacity == 0 {
            bail!(
                "capture buffers must be non-empty (image {} bytes, black {} bytes)",
                self.image_capacity,
                self.black_capacity
            );
        }
        if self.identity.server_version.trim().is_empty() {
            bail!("server version string must not be empty");
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> MockDevice {
        let state = DeviceState::new(
            self.identity,
            self.image_capacity,
            self.black_capacity,
            self.pattern_seed,
        );
        MockDevice {
            state: Arc::new(Mutex::new(state)),
            mode: self.mode,
            latency: self.latency,
            faults: self.faults,
        }
    }
}

/// In-memory KV260 with an RTCL P3S7 module.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
    mode: MockMode,
    latency: LatencyConfig,
    faults: FaultConfig,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    /// Device with default settings.
    pub fn new() -> Self {
        MockDeviceBuilder::default().assemble()
    }

    /// Start configuring a device.
    pub fn builder() -> MockDeviceBuilder {
        MockDeviceBuilder::new()
    }

    /// Fault state shared by every clone of this device.
    pub fn faults(&self) -> &FaultConfig {
        &self.faults
    }

    /// Drop the link for every clone until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self) {
        self.faults.sever_link();
    }

    /// Restore a dropped link. Device state is kept.
    pub fn reconnect(&self) {
        self.faults.restore_link();
    }

    async fn delay(&self, millis: u64) {
        if self.mode.is_realistic() && millis > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
        }
    }

    /// Apply latency and injected faults. `Ok(true)` means reject the call.
    async fn gate(&self, operation: &'static str) -> ControlResult<bool> {
        self.delay(self.latency.round_trip_ms).await;
        match self.faults.check_operation(operation) {
            None => Ok(false),
            Some(InjectedFault::Reject) => {
                debug!(operation, "injected rejection");
                Ok(true)
            }
            Some(InjectedFault::CommunicationLoss) => Err(ControlError::Transport(format!(
                "link to simulated device lost during '{operation}'"
            ))),
            Some(InjectedFault::Timeout(after)) => {
                tokio::time::sleep(after).await;
                Err(ControlError::Timeout {
                    operation,
                    timeout: after,
                })
            }
        }
    }

    /// One round trip against the device model.
    async fn call<T, F>(&self, operation: &'static str, f: F) -> ControlResult<Outcome<T>>
    where
        T: Send,
        F: FnOnce(&mut DeviceState) -> Outcome<T> + Send,
    {
        if self.gate(operation).await? {
            return Ok(Outcome::Rejected);
        }
        let outcome = f(&mut *self.state.lock().await);
        trace!(operation, accepted = outcome.is_accepted(), "simulated call");
        Ok(outcome)
    }
}

#[async_trait]
impl ControlChannel for MockDevice {
    // ------------------------------------------------------------------
    // Service
    // ------------------------------------------------------------------

    async fn get_version(&mut self) -> ControlResult<String> {
        // no ok flag on this response, so an injected rejection has no effect
        self.gate("GetVersion").await?;
        Ok(self.state.lock().await.server_version())
    }

    // ------------------------------------------------------------------
    // Camera lifecycle
    // ------------------------------------------------------------------

    async fn camera_open(&mut self) -> ControlResult<Outcome<()>> {
        let outcome = self.call("CameraOpen", DeviceState::open).await?;
        self.delay(self.latency.power_sequence_ms).await;
        Ok(outcome)
    }

    async fn camera_close(&mut self) -> ControlResult<Outcome<()>> {
        let outcome = self.call("CameraClose", DeviceState::close).await?;
        self.delay(self.latency.power_sequence_ms).await;
        Ok(outcome)
    }

    async fn camera_is_opened(&mut self) -> ControlResult<bool> {
        self.gate("CameraIsOpened").await?;
        Ok(self.state.lock().await.is_opened())
    }

    async fn camera_get_module_id(&mut self) -> ControlResult<Outcome<u32>> {
        self.call("CameraGetModuleId", |dev| dev.module_id()).await
    }

    async fn camera_get_module_version(&mut self) -> ControlResult<Outcome<u32>> {
        self.call("CameraGetModuleVersion", |dev| dev.module_version())
            .await
    }

    async fn camera_get_sensor_id(&mut self) -> ControlResult<Outcome<u32>> {
        self.call("CameraGetSensorId", |dev| dev.sensor_id()).await
    }

    // ------------------------------------------------------------------
    // Camera settings
    // ------------------------------------------------------------------

    async fn camera_set_slave_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>> {
        self.call("CameraSetSlaveMode", move |dev| dev.set_slave_mode(enable))
            .await
    }

    async fn camera_set_trigger_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>> {
        self.call("CameraSetTriggerMode", move |dev| {
            dev.set_trigger_mode(enable)
        })
        .await
    }

    async fn camera_set_image_size(
        &mut self,
        width: u32,
        height: u32,
    ) -> ControlResult<Outcome<()>> {
        self.call("CameraSetImageSize", move |dev| {
            dev.set_image_size(width, height)
        })
        .await
    }

    async fn camera_get_image_width(&mut self) -> ControlResult<Outcome<u32>> {
        self.call("CameraGetImageWidth", |dev| dev.image_width()).await
    }

    async fn camera_get_image_height(&mut self) -> ControlResult<Outcome<u32>> {
        self.call("CameraGetImageHeight", |dev| dev.image_height())
            .await
    }

    async fn camera_set_gain(&mut self, gain_db: f32) -> ControlResult<Outcome<()>> {
        self.call("CameraSetGain", move |dev| dev.set_gain(gain_db))
            .await
    }

    async fn camera_get_gain(&mut self) -> ControlResult<Outcome<f32>> {
        self.call("CameraGetGain", |dev| dev.gain()).await
    }

    async fn camera_set_exposure(&mut self, exposure_us: f32) -> ControlResult<Outcome<()>> {
        self.call("CameraSetExposure", move |dev| dev.set_exposure(exposure_us))
            .await
    }

    async fn camera_get_exposure(&mut self) -> ControlResult<Outcome<f32>> {
        self.call("CameraGetExposure", |dev| dev.exposure()).await
    }

    async fn camera_measure_fps(&mut self) -> ControlResult<Outcome<f32>> {
        self.call("CameraMeasureFps", |dev| dev.measure_fps()).await
    }

    async fn camera_measure_frame_period(&mut self) -> ControlResult<Outcome<f32>> {
        self.call("CameraMeasureFramePeriod", |dev| dev.measure_frame_period())
            .await
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    async fn record(
        &mut self,
        channel: CaptureChannel,
        request: CaptureRequest,
    ) -> ControlResult<Outcome<u32>> {
        let outcome = self
            .call(channel.record_operation(), move |dev| dev.record(channel, request))
            .await?;
        if let Outcome::Accepted(frames) = outcome {
            let capture_ms = self.latency.frame_capture_ms.saturating_mul(u64::from(frames));
            self.delay(capture_ms).await;
        }
        Ok(outcome)
    }

    async fn read(
        &mut self,
        channel: CaptureChannel,
        index: u32,
    ) -> ControlResult<Outcome<Vec<u8>>> {
        self.call(channel.read_operation(), move |dev| dev.read(channel, index))
            .await
    }

    // ------------------------------------------------------------------
    // Timing generator
    // ------------------------------------------------------------------

    async fn set_timing_generator(&mut self, config: TimingConfig) -> ControlResult<Outcome<()>> {
        self.call("SetTimingGenerator", move |dev| {
            dev.set_timing_generator(config)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Registers
    // ------------------------------------------------------------------

    async fn write_register(
        &mut self,
        port: RegisterPort,
        address: u16,
        data: u32,
    ) -> ControlResult<Outcome<()>> {
        self.call(port.write_operation(), move |dev| {
            dev.write_register(port, address, data)
        })
        .await
    }

    async fn read_register(
        &mut self,
        port: RegisterPort,
        address: u16,
    ) -> ControlResult<Outcome<u32>> {
        self.call(port.read_operation(), move |dev| dev.read_register(port, address))
            .await
    }
}
