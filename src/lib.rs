//! RTCL P3S7 camera control plane.
//!
//! Facade over the workspace crates:
//!
//! - `p3s7-core`: register namespaces, camera controller, timing generator,
//!   acquisition pipeline and the [`ControlChannel`] contract,
//! - `p3s7-client`: the gRPC implementation of that contract,
//! - [`config`] and [`logging`]: the ambient setup an application needs.
//!
//! # Example
//! ```no_run
//! use rtcl_p3s7::{config::ClientConfig, CaptureChannel, CaptureRequest};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ClientConfig::load()?;
//! rtcl_p3s7::logging::init_from_config(&config).map_err(anyhow::Error::msg)?;
//!
//! let mut session = rtcl_p3s7::connect(&config).await?;
//! rtcl_p3s7::configure_session(&mut session, &config).await?;
//!
//! let frames = session
//!     .acquisition()
//!     .record_all(CaptureChannel::Image, CaptureRequest::new(640, 320, 20))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;

use anyhow::Context;
use tracing::{info, warn};

pub use p3s7_client::{ChannelConfig, ClientError, DeviceAddress, GrpcControlClient};
pub use p3s7_core::{
    AcquisitionPipeline, AppliedTiming, CameraController, CameraInfo, CameraRegister,
    CameraSettings, CameraSpace, CameraState, CaptureChannel, CaptureRequest, ControlChannel,
    ControlError, ControlResult, Frame, FrameError, Namespace, Outcome, Recording,
    RegisterAddress, RegisterBank, RegisterPort, SensorRegister, SensorSpace, Session,
    SystemRegister, SystemSpace, TimingConfig, TimingGenerator, TimingRegister, TimingSpace,
};

use config::ClientConfig;

/// Connect to the device named by `config` and wrap the channel in a
/// [`Session`].
pub async fn connect(config: &ClientConfig) -> anyhow::Result<Session<GrpcControlClient>> {
    config.validate()?;
    let address = config.device_address();
    let client = GrpcControlClient::connect_with_config(&address, config.channel.clone())
        .await
        .with_context(|| format!("connecting to camera control service at {address}"))?;
    let mut session = Session::new(client);
    let version = session
        .server_version()
        .await
        .context("querying control service version")?;
    info!(%address, %version, "connected");
    Ok(session)
}

/// Apply the `[camera]` settings and, when present, the `[timing]` section.
///
/// Stops at the first rejection; settings already applied stay in effect.
pub async fn configure_session<C>(
    session: &mut Session<C>,
    config: &ClientConfig,
) -> ControlResult<Outcome<()>>
where
    C: ControlChannel,
{
    if session.camera().apply(&config.camera).await?.is_rejected() {
        return Ok(Outcome::Rejected);
    }
    if let Some(timing) = config.timing {
        if session.timing().configure(timing).await?.is_rejected() {
            warn!(?timing, "timing generator rejected configured timing");
            return Ok(Outcome::Rejected);
        }
    }
    Ok(Outcome::Accepted(()))
}
