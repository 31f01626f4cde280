//! A control session.
//!
//! [`Session`] owns one control channel. All views it hands out borrow the
//! session mutably, so at most one of them exists at a time and every call
//! is issued after the previous one completed.

use crate::acquisition::AcquisitionPipeline;
use crate::camera::CameraController;
use crate::channel::ControlChannel;
use crate::error::ControlResult;
use crate::registers::{CameraSpace, RegisterBank, SensorSpace, SystemSpace, TimingSpace};
use crate::timing::TimingGenerator;

/// One logical connection to one device.
#[derive(Debug)]
pub struct Session<C> {
    channel: C,
}

impl<C: ControlChannel> Session<C> {
    /// Take ownership of a connected channel.
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    /// Version string of the device-side service.
    pub async fn server_version(&mut self) -> ControlResult<String> {
        self.channel.get_version().await
    }

    /// Camera lifecycle and settings.
    pub fn camera(&mut self) -> CameraController<'_, C> {
        CameraController::new(&mut self.channel)
    }

    /// Timing generator.
    pub fn timing(&mut self) -> TimingGenerator<'_, C> {
        TimingGenerator::new(&mut self.channel)
    }

    /// Record/read pipeline.
    pub fn acquisition(&mut self) -> AcquisitionPipeline<'_, C> {
        AcquisitionPipeline::new(&mut self.channel)
    }

    /// System register bank.
    pub fn system_registers(&mut self) -> RegisterBank<'_, C, SystemSpace> {
        RegisterBank::new(&mut self.channel)
    }

    /// Camera module register bank.
    pub fn camera_registers(&mut self) -> RegisterBank<'_, C, CameraSpace> {
        RegisterBank::new(&mut self.channel)
    }

    /// Sensor SPI register bank.
    pub fn sensor_registers(&mut self) -> RegisterBank<'_, C, SensorSpace> {
        RegisterBank::new(&mut self.channel)
    }

    /// Timing generator register bank.
    pub fn timing_registers(&mut self) -> RegisterBank<'_, C, TimingSpace> {
        RegisterBank::new(&mut self.channel)
    }

    /// Direct access to the channel.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Release the channel.
    pub fn into_inner(self) -> C {
        self.channel
    }
}
