//! gRPC client for the RTCL P3S7 camera control service.
//!
//! [`GrpcControlClient`] implements [`p3s7_core::ControlChannel`] over a
//! single HTTP/2 connection. Wrap it in a [`p3s7_core::Session`] to get the
//! camera, timing, acquisition and register views.
//!
//! ```no_run
//! use p3s7_client::{DeviceAddress, GrpcControlClient};
//! use p3s7_core::Session;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let address: DeviceAddress = "192.168.16.1:50051".parse()?;
//! let mut session = Session::new(GrpcControlClient::connect(&address).await?);
//! println!("device service {}", session.server_version().await?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;

pub use client::{ChannelConfig, GrpcControlClient};
pub use connection::{AddressError, AddressSource, DeviceAddress};
pub use error::{ClientError, Result};
