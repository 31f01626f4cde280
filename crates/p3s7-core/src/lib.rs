//! Control-plane core for the RTCL P3S7 high-speed camera.
//!
//! This crate defines the device contract ([`ControlChannel`]) and the
//! logic built on top of it:
//!
//! - [`registers`]: typed register namespaces and bank views,
//! - [`camera`]: lifecycle and settings,
//! - [`timing`]: trigger timing generator,
//! - [`acquisition`]: two-phase record/read capture,
//! - [`session`]: ownership of one channel and the views over it.
//!
//! Transports live elsewhere: `p3s7-client` speaks gRPC to a device and
//! `p3s7-driver-mock` simulates one in memory.

pub mod acquisition;
pub mod camera;
pub mod channel;
pub mod error;
pub mod frame;
pub mod outcome;
pub mod registers;
pub mod session;
pub mod timing;

pub use acquisition::{AcquisitionPipeline, Recording};
pub use camera::{CameraController, CameraInfo, CameraSettings, CameraState};
pub use channel::{CaptureChannel, CaptureRequest, ControlChannel};
pub use error::{ControlError, ControlResult, FrameError};
pub use frame::Frame;
pub use outcome::Outcome;
pub use registers::{
    CameraRegister, CameraSpace, Namespace, RegisterAddress, RegisterBank, RegisterPort,
    SensorRegister, SensorSpace, SystemRegister, SystemSpace, TimingRegister, TimingSpace,
};
pub use session::Session;
pub use timing::{AppliedTiming, TimingConfig, TimingGenerator};
