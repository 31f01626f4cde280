//! In-memory model of the KV260 peripheral window, camera module and sensor.
//!
//! Everything here is synchronous; [`MockDevice`](crate::MockDevice) wraps a
//! [`DeviceState`] in an async mutex and adds latency and fault injection.

use std::collections::BTreeMap;

use p3s7_core::channel::{CaptureChannel, CaptureRequest};
use p3s7_core::outcome::Outcome;
use p3s7_core::registers::{
    CameraRegister, RegisterPort, SensorRegister, SystemRegister, TimingRegister,
    SENSOR_CONFIG_ENABLE, SENSOR_CONFIG_SLAVE, SENSOR_CONFIG_TRIGGERED, SENSOR_REGISTER_COUNT,
    TIMING_WINDOW_BASE,
};
use p3s7_core::timing::{us_to_ticks, TimingConfig, CTL_CONTROL_ENABLE};

use crate::pattern::{encode_frame, generate_dark_frame, generate_test_pattern};

/// Largest image the PYTHON300 delivers.
pub const SENSOR_MAX_WIDTH: u32 = 640;
/// Largest image the PYTHON300 delivers.
pub const SENSOR_MAX_HEIGHT: u32 = 480;

/// Sensor timer multiplier at power-up; one exposure unit is 1 µs.
pub const DEFAULT_MULT_TIMER: u16 = 72;
/// Frame length register at power-up.
pub const DEFAULT_FR_LENGTH: u16 = 0;

/// Black channel line geometry programmed on open.
pub const BLACK_LINE_WIDTH: u32 = 1280;
/// Black channel line count programmed on open.
pub const BLACK_LINE_HEIGHT: u32 = 1;

/// Shortest trigger period the timing generator accepts, in µs.
pub const MIN_TIMING_PERIOD_US: f32 = 1000.0;
/// Minimum exposure and minimum gap to the period end, in µs.
pub const MIN_TIMING_MARGIN_US: f32 = 100.0;

/// `ctlControl` value written by `SetTimingGenerator`.
pub const TIMING_CONTROL_RUN: u32 = 0x03;

/// Frame interval counter clock.
pub const FPS_COUNTER_HZ: f64 = 250e6;
/// Free-running frame interval (1000 fps) in counter ticks.
pub const FREE_RUN_FPS_COUNT: u32 = 250_000;

const MASK_16: u32 = 0xFFFF;
const MASK_32: u32 = u32::MAX;

/// Identity values reported by the simulated hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// `GetVersion` string.
    pub server_version: String,
    /// System core id (`id` register).
    pub system_id: u32,
    /// Camera module id.
    pub module_id: u16,
    /// Camera module version.
    pub module_version: u16,
    /// Sensor chip id (sensor register 0).
    pub sensor_id: u16,
    /// Camera core id and version registers.
    pub camera_core: (u16, u16),
    /// Timing generator core id and version registers.
    pub timing_core: (u32, u32),
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            server_version: "rtcl-p3s7-sim 1.0.0".to_string(),
            system_id: 0x0000_5337,
            module_id: 0x0003,
            module_version: 0x0101,
            sensor_id: 0x5004,
            camera_core: (0x527A, 0x0100),
            timing_core: (0x0000_0211, 0x0000_0100),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    value: u32,
    writable: bool,
}

/// Sparse register file. Only defined addresses respond.
#[derive(Debug, Clone)]
struct RegisterFile {
    cells: BTreeMap<u16, Cell>,
    mask: u32,
}

impl RegisterFile {
    fn new(mask: u32) -> Self {
        Self {
            cells: BTreeMap::new(),
            mask,
        }
    }

    fn define(&mut self, address: u16, value: u32, writable: bool) {
        self.cells.insert(address, Cell { value, writable });
    }

    fn read(&self, address: u16) -> Option<u32> {
        self.cells.get(&address).map(|cell| cell.value)
    }

    /// Bus write; fails on undefined, read-only or too-wide data.
    fn write(&mut self, address: u16, value: u32) -> bool {
        if value & !self.mask != 0 {
            return false;
        }
        match self.cells.get_mut(&address) {
            Some(cell) if cell.writable => {
                cell.value = value;
                true
            }
            _ => false,
        }
    }

    /// Hardware-side update, ignores the read-only flag.
    fn set(&mut self, address: u16, value: u32) {
        if let Some(cell) = self.cells.get_mut(&address) {
            cell.value = value & self.mask;
        }
    }

    fn value(&self, address: u16) -> u32 {
        self.read(address).unwrap_or(0)
    }
}

fn timing_address(register: TimingRegister) -> u16 {
    TIMING_WINDOW_BASE + register.offset()
}

/// Settings held by the camera service, applied to the sensor on open.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CameraConfig {
    width: u32,
    height: u32,
    gain_db: f32,
    exposure_units: u16,
    mult_timer: u16,
    slave_mode: bool,
    trigger_mode: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: SENSOR_MAX_WIDTH,
            height: SENSOR_MAX_HEIGHT,
            gain_db: 1.0,
            exposure_units: 10_000,
            mult_timer: DEFAULT_MULT_TIMER,
            slave_mode: false,
            trigger_mode: false,
        }
    }
}

impl CameraConfig {
    fn exposure_unit_us(&self) -> f32 {
        f32::from(self.mult_timer) / 72.0
    }

    fn general_config(&self, sequencer: bool) -> u32 {
        let mut bits = 0;
        if sequencer {
            bits |= SENSOR_CONFIG_ENABLE;
        }
        if self.trigger_mode {
            bits |= SENSOR_CONFIG_TRIGGERED;
        }
        if self.slave_mode {
            bits |= SENSOR_CONFIG_SLAVE;
        }
        bits
    }
}

/// Descriptor of the frames committed to one capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Capture {
    width: u32,
    height: u32,
    frames: u32,
    sequence: u64,
}

/// Complete simulated device.
#[derive(Debug)]
pub struct DeviceState {
    identity: DeviceIdentity,
    opened: bool,
    config: CameraConfig,
    system: RegisterFile,
    camera: RegisterFile,
    sensor: RegisterFile,
    image_capacity: usize,
    black_capacity: usize,
    image: Option<Capture>,
    black: Option<Capture>,
    sequence: u64,
    pattern_seed: u64,
}

impl DeviceState {
    /// Power-on state: camera closed, both capture buffers empty.
    pub fn new(
        identity: DeviceIdentity,
        image_capacity: usize,
        black_capacity: usize,
        pattern_seed: u64,
    ) -> Self {
        let mut system = RegisterFile::new(MASK_32);
        system.define(SystemRegister::Id.offset(), identity.system_id, false);
        system.define(SystemRegister::DphySwReset.offset(), 1, true);
        system.define(SystemRegister::CamEnable.offset(), 0, true);
        system.define(SystemRegister::CsiDataType.offset(), 0x2B, true);
        system.define(SystemRegister::DphyInitDone.offset(), 0, false);
        system.define(SystemRegister::FpsCount.offset(), 0, false);
        system.define(SystemRegister::FrameCount.offset(), 0, false);
        system.define(SystemRegister::ImageWidth.offset(), 0, true);
        system.define(SystemRegister::ImageHeight.offset(), 0, true);
        system.define(SystemRegister::BlackWidth.offset(), 0, true);
        system.define(SystemRegister::BlackHeight.offset(), 0, true);

        let (timing_id, timing_version) = identity.timing_core;
        for register in TimingRegister::ALL {
            let (value, writable) = match register {
                TimingRegister::CoreId => (timing_id, false),
                TimingRegister::CoreVersion => (timing_version, false),
                TimingRegister::CtlStatus | TimingRegister::CtlTimer => (0, false),
                _ => (0, true),
            };
            system.define(timing_address(*register), value, writable);
        }

        let mut camera = RegisterFile::new(MASK_16);
        let (core_id, core_version) = identity.camera_core;
        for register in CameraRegister::ALL {
            let (value, writable) = match register {
                CameraRegister::CoreId => (u32::from(core_id), false),
                CameraRegister::CoreVersion => (u32::from(core_version), false),
                CameraRegister::SensorReady
                | CameraRegister::AlignStatus
                | CameraRegister::DphyInitDone => (0, false),
                _ => (0, true),
            };
            camera.define(register.offset(), value, writable);
        }

        let mut sensor = RegisterFile::new(MASK_16);
        for address in 0..SENSOR_REGISTER_COUNT {
            sensor.define(address, 0, address != SensorRegister::ChipId.offset());
        }
        sensor.set(SensorRegister::ChipId.offset(), u32::from(identity.sensor_id));

        Self {
            identity,
            opened: false,
            config: CameraConfig::default(),
            system,
            camera,
            sensor,
            image_capacity,
            black_capacity,
            image: None,
            black: None,
            sequence: 0,
            pattern_seed,
        }
    }

    /// `GetVersion`.
    pub fn server_version(&self) -> String {
        self.identity.server_version.clone()
    }

    // ------------------------------------------------------------------
    // Camera lifecycle
    // ------------------------------------------------------------------

    /// Power up the module and start the sensor sequencer. Idempotent.
    pub fn open(&mut self) -> Outcome<()> {
        if self.opened {
            return Outcome::Accepted(());
        }

        self.system.set(SystemRegister::CamEnable.offset(), 1);
        self.system.set(SystemRegister::DphySwReset.offset(), 0);
        self.camera.set(CameraRegister::SensorEnable.offset(), 1);
        self.camera.set(CameraRegister::SensorReady.offset(), 1);
        self.camera.set(CameraRegister::AlignStatus.offset(), 1);
        self.camera.set(CameraRegister::DphyInitDone.offset(), 1);
        self.system.set(SystemRegister::DphyInitDone.offset(), 1);

        self.system.set(SystemRegister::ImageWidth.offset(), self.config.width);
        self.system.set(SystemRegister::ImageHeight.offset(), self.config.height);
        self.system.set(SystemRegister::BlackWidth.offset(), BLACK_LINE_WIDTH);
        self.system.set(SystemRegister::BlackHeight.offset(), BLACK_LINE_HEIGHT);

        self.sensor.set(SensorRegister::MultTimer.offset(), u32::from(self.config.mult_timer));
        self.sensor.set(SensorRegister::FrLength.offset(), u32::from(DEFAULT_FR_LENGTH));
        self.sensor.set(SensorRegister::Exposure.offset(), u32::from(self.config.exposure_units));
        self.sensor.set(SensorRegister::GeneralConfig.offset(), self.config.general_config(true));

        self.opened = true;
        self.refresh_fps_count();
        Outcome::Accepted(())
    }

    /// Stop the sequencer and power the sensor down. Idempotent.
    pub fn close(&mut self) -> Outcome<()> {
        if !self.opened {
            return Outcome::Accepted(());
        }

        self.sensor.set(SensorRegister::GeneralConfig.offset(), self.config.general_config(false));
        self.camera.set(CameraRegister::SensorReady.offset(), 0);
        self.camera.set(CameraRegister::AlignStatus.offset(), 0);
        self.camera.set(CameraRegister::DphyInitDone.offset(), 0);
        self.camera.set(CameraRegister::SensorEnable.offset(), 0);
        self.system.set(SystemRegister::DphyInitDone.offset(), 0);

        self.opened = false;
        self.refresh_fps_count();
        Outcome::Accepted(())
    }

    /// `CameraIsOpened`.
    pub fn is_opened(&self) -> bool {
        self.opened
    }

    /// Camera module id, readable in either state.
    pub fn module_id(&self) -> Outcome<u32> {
        Outcome::Accepted(u32::from(self.identity.module_id))
    }

    /// Camera module version.
    pub fn module_version(&self) -> Outcome<u32> {
        Outcome::Accepted(u32::from(self.identity.module_version))
    }

    /// Read over SPI, so only while the sensor is powered.
    pub fn sensor_id(&self) -> Outcome<u32> {
        if !self.opened {
            return Outcome::Rejected;
        }
        Outcome::Accepted(self.sensor.value(SensorRegister::ChipId.offset()))
    }

    // ------------------------------------------------------------------
    // Setters: stored while closed, applied to the sensor while open
    // ------------------------------------------------------------------

    /// Sensor slave mode (general configuration bit 5).
    pub fn set_slave_mode(&mut self, enable: bool) -> Outcome<()> {
        self.config.slave_mode = enable;
        self.sync_general_config();
        Outcome::Accepted(())
    }

    /// Sensor triggered mode (general configuration bit 4).
    pub fn set_trigger_mode(&mut self, enable: bool) -> Outcome<()> {
        self.config.trigger_mode = enable;
        self.sync_general_config();
        Outcome::Accepted(())
    }

    fn sync_general_config(&mut self) {
        if self.opened {
            self.sensor
                .set(SensorRegister::GeneralConfig.offset(), self.config.general_config(true));
        }
    }

    /// Image size within the sensor's 640x480 array.
    pub fn set_image_size(&mut self, width: u32, height: u32) -> Outcome<()> {
        if width == 0 || height == 0 || width > SENSOR_MAX_WIDTH || height > SENSOR_MAX_HEIGHT {
            return Outcome::Rejected;
        }
        self.config.width = width;
        self.config.height = height;
        if self.opened {
            self.system.set(SystemRegister::ImageWidth.offset(), width);
            self.system.set(SystemRegister::ImageHeight.offset(), height);
        }
        Outcome::Accepted(())
    }

    /// Configured image width.
    pub fn image_width(&self) -> Outcome<u32> {
        Outcome::Accepted(self.config.width)
    }

    /// Configured image height.
    pub fn image_height(&self) -> Outcome<u32> {
        Outcome::Accepted(self.config.height)
    }

    /// Gain in dB, stored as given.
    pub fn set_gain(&mut self, gain_db: f32) -> Outcome<()> {
        if !gain_db.is_finite() {
            return Outcome::Rejected;
        }
        self.config.gain_db = gain_db;
        Outcome::Accepted(())
    }

    /// Gain in dB.
    pub fn gain(&self) -> Outcome<f32> {
        Outcome::Accepted(self.config.gain_db)
    }

    /// Quantized to whole sensor timer units.
    pub fn set_exposure(&mut self, exposure_us: f32) -> Outcome<()> {
        if !exposure_us.is_finite() || exposure_us < 0.0 {
            return Outcome::Rejected;
        }
        // float-to-int `as` saturates at u16::MAX
        self.config.exposure_units = (exposure_us / self.config.exposure_unit_us()) as u16;
        if self.opened {
            self.sensor.set(
                SensorRegister::Exposure.offset(),
                u32::from(self.config.exposure_units),
            );
        }
        Outcome::Accepted(())
    }

    /// Exposure in µs, as quantized.
    pub fn exposure(&self) -> Outcome<f32> {
        Outcome::Accepted(f32::from(self.config.exposure_units) * self.config.exposure_unit_us())
    }

    /// Frame rate from the frame interval counter; rejected while no frames flow.
    pub fn measure_fps(&self) -> Outcome<f32> {
        let count = self.system.value(SystemRegister::FpsCount.offset());
        Outcome::from_flag(count != 0, || (FPS_COUNTER_HZ / f64::from(count)) as f32)
    }

    /// Frame period in nanoseconds.
    pub fn measure_frame_period(&self) -> Outcome<f32> {
        let count = self.system.value(SystemRegister::FpsCount.offset());
        Outcome::from_flag(count != 0, || (f64::from(count) * 4.0) as f32)
    }

    fn refresh_fps_count(&mut self) {
        let control = self.system.value(timing_address(TimingRegister::CtlControl));
        let count = if !self.opened {
            0
        } else if control & CTL_CONTROL_ENABLE != 0 {
            // 10 ns period ticks to 4 ns counter ticks
            let ticks = u64::from(self.system.value(timing_address(TimingRegister::ParamPeriod)));
            u32::try_from(ticks * 5 / 2).unwrap_or(u32::MAX)
        } else {
            FREE_RUN_FPS_COUNT
        };
        self.system.set(SystemRegister::FpsCount.offset(), count);
    }

    // ------------------------------------------------------------------
    // Timing generator
    // ------------------------------------------------------------------

    /// Clamp, convert to ticks and start the generator.
    pub fn set_timing_generator(&mut self, config: TimingConfig) -> Outcome<()> {
        if !config.period_us.is_finite() || !config.exposure_us.is_finite() {
            return Outcome::Rejected;
        }
        let period_us = config.period_us.max(MIN_TIMING_PERIOD_US);
        let exposure_us = config
            .exposure_us
            .clamp(MIN_TIMING_MARGIN_US, period_us - MIN_TIMING_MARGIN_US);

        self.system
            .set(timing_address(TimingRegister::ParamPeriod), us_to_ticks(period_us));
        self.system.set(timing_address(TimingRegister::ParamTrig0Start), 1);
        self.system.set(
            timing_address(TimingRegister::ParamTrig0End),
            us_to_ticks(exposure_us).max(1),
        );
        self.system
            .set(timing_address(TimingRegister::CtlControl), TIMING_CONTROL_RUN);
        self.refresh_fps_count();
        Outcome::Accepted(())
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    fn capacity(&self, channel: CaptureChannel) -> usize {
        match channel {
            CaptureChannel::Image => self.image_capacity,
            CaptureChannel::Black => self.black_capacity,
        }
    }

    fn slot(&mut self, channel: CaptureChannel) -> &mut Option<Capture> {
        match channel {
            CaptureChannel::Image => &mut self.image,
            CaptureChannel::Black => &mut self.black,
        }
    }

    /// Commit up to `request.frames` frames; returns the committed count.
    pub fn record(&mut self, channel: CaptureChannel, request: CaptureRequest) -> Outcome<u32> {
        if !self.opened || request.width == 0 || request.height == 0 {
            return Outcome::Rejected;
        }
        let Some(frame_bytes) = request.frame_bytes() else {
            return Outcome::Rejected;
        };
        let fit = self.capacity(channel) / frame_bytes;
        let committed = u32::try_from(fit).unwrap_or(u32::MAX).min(request.frames);
        if committed == 0 && request.frames > 0 {
            return Outcome::Rejected;
        }

        let (width_reg, height_reg) = match channel {
            CaptureChannel::Image => (SystemRegister::ImageWidth, SystemRegister::ImageHeight),
            CaptureChannel::Black => (SystemRegister::BlackWidth, SystemRegister::BlackHeight),
        };
        self.system.set(width_reg.offset(), request.width);
        self.system.set(height_reg.offset(), request.height);

        let frame_count = self.system.value(SystemRegister::FrameCount.offset());
        self.system
            .set(SystemRegister::FrameCount.offset(), frame_count.wrapping_add(committed));

        self.sequence += 1;
        let capture = Capture {
            width: request.width,
            height: request.height,
            frames: committed,
            sequence: self.sequence,
        };
        *self.slot(channel) = Some(capture);
        Outcome::Accepted(committed)
    }

    /// Raw bytes of one committed frame.
    pub fn read(&mut self, channel: CaptureChannel, index: u32) -> Outcome<Vec<u8>> {
        let Some(capture) = *self.slot(channel) else {
            return Outcome::Rejected;
        };
        if index >= capture.frames {
            return Outcome::Rejected;
        }
        let seed = self.pattern_seed ^ capture.sequence;
        let samples = match channel {
            CaptureChannel::Image => generate_test_pattern(capture.width, capture.height, index, seed),
            CaptureChannel::Black => generate_dark_frame(capture.width, capture.height, index, seed),
        };
        Outcome::Accepted(encode_frame(&samples))
    }

    // ------------------------------------------------------------------
    // Raw register access
    // ------------------------------------------------------------------

    fn file(&self, port: RegisterPort) -> &RegisterFile {
        match port {
            RegisterPort::System => &self.system,
            RegisterPort::Camera => &self.camera,
            RegisterPort::Sensor => &self.sensor,
        }
    }

    /// `ReadSysReg` / `ReadCamReg` / `ReadSensorReg`.
    pub fn read_register(&self, port: RegisterPort, address: u16) -> Outcome<u32> {
        match self.file(port).read(address) {
            Some(value) => Outcome::Accepted(value),
            None => Outcome::Rejected,
        }
    }

    /// `WriteSysReg` / `WriteCamReg` / `WriteSensorReg`.
    pub fn write_register(&mut self, port: RegisterPort, address: u16, data: u32) -> Outcome<()> {
        let written = match port {
            RegisterPort::System => self.system.write(address, data),
            RegisterPort::Camera => self.camera.write(address, data),
            RegisterPort::Sensor => self.sensor.write(address, data),
        };
        if !written {
            return Outcome::Rejected;
        }

        match port {
            RegisterPort::System => self.refresh_fps_count(),
            RegisterPort::Sensor if self.opened => {
                // 16-bit mask already enforced by the write
                let value = data as u16;
                if address == SensorRegister::Exposure.offset() {
                    self.config.exposure_units = value;
                } else if address == SensorRegister::MultTimer.offset() {
                    self.config.mult_timer = value;
                }
            }
            _ => {}
        }
        Outcome::Accepted(())
    }
}
