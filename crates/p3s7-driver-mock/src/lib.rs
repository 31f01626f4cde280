//! Simulated RTCL P3S7 camera board.
//!
//! [`MockDevice`] implements [`ControlChannel`](p3s7_core::ControlChannel)
//! against an in-memory model of the KV260 register window, the camera module
//! and the PYTHON300 sensor. It is what the control-plane tests run against.
//!
//! # Features
//!
//! - Register files with defined address sets, read-only identity registers
//!   and 16-bit camera/sensor ports
//! - Camera lifecycle with the power sequence reflected in the registers
//! - Timing generator with device-side clamping and a live frame counter
//! - Per-channel capture buffers holding deterministic 10-bit test frames
//! - Latency modes and fault injection (see [`common`])

pub mod common;
pub mod device;
pub mod mock_device;
pub mod pattern;

pub use common::{FaultConfig, FaultScenario, InjectedFault, LatencyConfig, MockMode};
pub use device::{DeviceIdentity, DeviceState};
pub use mock_device::{MockDevice, MockDeviceBuilder, DEFAULT_BUFFER_CAPACITY};
