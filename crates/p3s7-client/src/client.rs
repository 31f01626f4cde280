//! gRPC control channel to a camera device.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tonic::transport::Channel;

use p3s7_core::{
    CaptureChannel, CaptureRequest, ControlChannel, ControlError, ControlResult, Outcome,
    RegisterPort, TimingConfig,
};
use p3s7_proto::convert::{ToDomain, TryToDomain};
use p3s7_proto::rtcl_p3s7_control_client::RtclP3s7ControlClient;
use p3s7_proto::{
    BoolRequest, Empty, F32Request, ImageSizeRequest, ReadImageRequest, ReadRegRequest,
    RecordImageRequest, SetTimingGeneratorRequest, WriteRegRequest,
};

use crate::connection::DeviceAddress;
use crate::error::{ClientError, Result};

/// gRPC channel configuration.
///
/// Deadlines are applied per call rather than on the channel, so a record of
/// many frames can be given more time than a register read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Connection timeout (how long to wait for initial connection)
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Deadline for every call except record
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// HTTP/2 keepalive interval (how often to send keepalive pings)
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Duration,
    /// Keepalive timeout (how long to wait for keepalive response)
    #[serde(with = "humantime_serde")]
    pub keepalive_timeout: Duration,
    /// Whether to send keepalive pings even when idle
    pub keepalive_while_idle: bool,
    /// Fixed part of the record deadline
    #[serde(with = "humantime_serde")]
    pub record_timeout_base: Duration,
    /// Record deadline added per requested frame
    #[serde(with = "humantime_serde")]
    pub record_timeout_per_frame: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(10),
            keepalive_timeout: Duration::from_secs(20),
            keepalive_while_idle: true,
            record_timeout_base: Duration::from_secs(10),
            record_timeout_per_frame: Duration::from_millis(50),
        }
    }
}

impl ChannelConfig {
    /// Configuration for a device on the local link with quick failure
    /// detection.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(3),
            keepalive_interval: Duration::from_secs(5),
            keepalive_timeout: Duration::from_secs(5),
            keepalive_while_idle: true,
            record_timeout_base: Duration::from_secs(5),
            record_timeout_per_frame: Duration::from_millis(20),
        }
    }

    /// Deadline for recording `frames` frames.
    #[must_use]
    pub fn record_timeout(&self, frames: u32) -> Duration {
        self.record_timeout_base
            .saturating_add(self.record_timeout_per_frame.saturating_mul(frames))
    }

    /// Reject zero timeouts.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("connect_timeout", self.connect_timeout),
            ("request_timeout", self.request_timeout),
            ("keepalive_interval", self.keepalive_interval),
            ("keepalive_timeout", self.keepalive_timeout),
            ("record_timeout_base", self.record_timeout_base),
        ];
        for (name, value) in checks {
            if value.is_zero() {
                return Err(ClientError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

/// Maximum message size for gRPC (64 MB, well above one full sensor frame)
const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

type Client = RtclP3s7ControlClient<Channel>;

/// [`ControlChannel`] over gRPC.
///
/// Holds one HTTP/2 connection. Every trait call is exactly one unary RPC
/// bounded by its own deadline. Nothing is retried.
#[derive(Debug, Clone)]
pub struct GrpcControlClient {
    client: Client,
    config: ChannelConfig,
    address: DeviceAddress,
}

impl GrpcControlClient {
    /// Connect with default channel configuration.
    pub async fn connect(address: &DeviceAddress) -> Result<Self> {
        Self::connect_with_config(address, ChannelConfig::default()).await
    }

    /// Connect with custom channel configuration.
    pub async fn connect_with_config(
        address: &DeviceAddress,
        config: ChannelConfig,
    ) -> Result<Self> {
        config.validate()?;

        // No .timeout() here: deadlines are chosen per call
        let endpoint = Channel::from_shared(address.as_str().to_string())
            .map_err(|e| ClientError::InvalidConfig(e.to_string()))?
            .connect_timeout(config.connect_timeout)
            .http2_keep_alive_interval(config.keepalive_interval)
            .keep_alive_timeout(config.keepalive_timeout)
            .keep_alive_while_idle(config.keepalive_while_idle)
            .tcp_nodelay(true);

        tracing::debug!(address = %address, source = %address.source(), "connecting to device");
        let channel = endpoint.connect().await?;
        tracing::info!(address = %address, "connected to device");

        Ok(Self::from_channel(channel, address.clone(), config))
    }

    /// Wrap an already established channel.
    #[must_use]
    pub fn from_channel(channel: Channel, address: DeviceAddress, config: ChannelConfig) -> Self {
        Self {
            client: RtclP3s7ControlClient::new(channel)
                .max_decoding_message_size(MAX_MESSAGE_SIZE)
                .max_encoding_message_size(MAX_MESSAGE_SIZE),
            config,
            address,
        }
    }

    /// Address this client is connected to.
    #[must_use]
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Channel configuration in use.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    async fn call<R, F, Fut>(
        &mut self,
        operation: &'static str,
        timeout: Duration,
        rpc: F,
    ) -> ControlResult<R>
    where
        F: FnOnce(Client) -> Fut + Send,
        Fut: Future<Output = std::result::Result<tonic::Response<R>, tonic::Status>> + Send,
        R: Send,
    {
        tracing::debug!(operation, ?timeout, "sending request");
        let started = Instant::now();

        match tokio::time::timeout(timeout, rpc(self.client.clone())).await {
            Ok(Ok(response)) => {
                tracing::debug!(
                    operation,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "received response"
                );
                Ok(response.into_inner())
            }
            Ok(Err(status)) => {
                tracing::warn!(operation, code = ?status.code(), error = %status.message(), "request failed");
                Err(status_to_error(operation, &status))
            }
            Err(_) => {
                tracing::warn!(operation, ?timeout, "request timed out");
                Err(ControlError::Timeout { operation, timeout })
            }
        }
    }

    async fn request<R, F, Fut>(&mut self, operation: &'static str, rpc: F) -> ControlResult<R>
    where
        F: FnOnce(Client) -> Fut + Send,
        Fut: Future<Output = std::result::Result<tonic::Response<R>, tonic::Status>> + Send,
        R: Send,
    {
        self.call(operation, self.config.request_timeout, rpc).await
    }
}

/// Map a status to a per-call error. Connection-level failures surface from
/// tonic as `Unavailable`.
fn status_to_error(operation: &'static str, status: &tonic::Status) -> ControlError {
    match status.code() {
        tonic::Code::Unavailable => {
            ControlError::Transport(format!("{operation}: {}", status.message()))
        }
        code => ControlError::Status {
            operation,
            code: format!("{code:?}"),
            message: status.message().to_string(),
        },
    }
}

#[async_trait]
impl ControlChannel for GrpcControlClient {
    async fn get_version(&mut self) -> ControlResult<String> {
        let response = self
            .request("GetVersion", |mut c| async move { c.get_version(Empty {}).await })
            .await?;
        Ok(response.to_domain())
    }

    // =========================================================================
    // Camera lifecycle
    // =========================================================================

    async fn camera_open(&mut self) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraOpen", |mut c| async move { c.camera_open(Empty {}).await })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_close(&mut self) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraClose", |mut c| async move { c.camera_close(Empty {}).await })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_is_opened(&mut self) -> ControlResult<bool> {
        let response = self
            .request("CameraIsOpened", |mut c| async move {
                c.camera_is_opened(Empty {}).await
            })
            .await?;
        Ok(response.result)
    }

    async fn camera_get_module_id(&mut self) -> ControlResult<Outcome<u32>> {
        let response = self
            .request("CameraGetModuleId", |mut c| async move {
                c.camera_get_module_id(Empty {}).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_get_module_version(&mut self) -> ControlResult<Outcome<u32>> {
        let response = self
            .request("CameraGetModuleVersion", |mut c| async move {
                c.camera_get_module_version(Empty {}).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_get_sensor_id(&mut self) -> ControlResult<Outcome<u32>> {
        let response = self
            .request("CameraGetSensorId", |mut c| async move {
                c.camera_get_sensor_id(Empty {}).await
            })
            .await?;
        Ok(response.to_domain())
    }

    // =========================================================================
    // Camera settings
    // =========================================================================

    async fn camera_set_slave_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraSetSlaveMode", move |mut c| async move {
                c.camera_set_slave_mode(BoolRequest { value: enable }).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_set_trigger_mode(&mut self, enable: bool) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraSetTriggerMode", move |mut c| async move {
                c.camera_set_trigger_mode(BoolRequest { value: enable }).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_set_image_size(
        &mut self,
        width: u32,
        height: u32,
    ) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraSetImageSize", move |mut c| async move {
                c.camera_set_image_size(ImageSizeRequest { width, height })
                    .await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_get_image_width(&mut self) -> ControlResult<Outcome<u32>> {
        const OP: &str = "CameraGetImageWidth";
        let response = self
            .request(OP, |mut c| async move { c.camera_get_image_width(Empty {}).await })
            .await?;
        response.try_to_domain(OP)
    }

    async fn camera_get_image_height(&mut self) -> ControlResult<Outcome<u32>> {
        const OP: &str = "CameraGetImageHeight";
        let response = self
            .request(OP, |mut c| async move {
                c.camera_get_image_height(Empty {}).await
            })
            .await?;
        response.try_to_domain(OP)
    }

    async fn camera_set_gain(&mut self, gain_db: f32) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraSetGain", move |mut c| async move {
                c.camera_set_gain(F32Request { value: gain_db }).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_get_gain(&mut self) -> ControlResult<Outcome<f32>> {
        let response = self
            .request("CameraGetGain", |mut c| async move { c.camera_get_gain(Empty {}).await })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_set_exposure(&mut self, exposure_us: f32) -> ControlResult<Outcome<()>> {
        let response = self
            .request("CameraSetExposure", move |mut c| async move {
                c.camera_set_exposure(F32Request { value: exposure_us })
                    .await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_get_exposure(&mut self) -> ControlResult<Outcome<f32>> {
        let response = self
            .request("CameraGetExposure", |mut c| async move {
                c.camera_get_exposure(Empty {}).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_measure_fps(&mut self) -> ControlResult<Outcome<f32>> {
        let response = self
            .request("CameraMeasureFps", |mut c| async move {
                c.camera_measure_fps(Empty {}).await
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn camera_measure_frame_period(&mut self) -> ControlResult<Outcome<f32>> {
        let response = self
            .request("CameraMeasureFramePeriod", |mut c| async move {
                c.camera_measure_frame_period(Empty {}).await
            })
            .await?;
        Ok(response.to_domain())
    }

    // =========================================================================
    // Acquisition
    // =========================================================================

    async fn record(
        &mut self,
        channel: CaptureChannel,
        request: CaptureRequest,
    ) -> ControlResult<Outcome<u32>> {
        let operation = channel.record_operation();
        let timeout = self.config.record_timeout(request.frames);
        let message = RecordImageRequest::from(request);
        let response = self
            .call(operation, timeout, move |mut c| async move {
                match channel {
                    CaptureChannel::Image => c.record_image(message).await,
                    CaptureChannel::Black => c.record_black(message).await,
                }
            })
            .await?;
        response.try_to_domain(operation)
    }

    async fn read(
        &mut self,
        channel: CaptureChannel,
        index: u32,
    ) -> ControlResult<Outcome<Vec<u8>>> {
        let message = ReadImageRequest { index };
        let response = self
            .request(channel.read_operation(), move |mut c| async move {
                match channel {
                    CaptureChannel::Image => c.read_image(message).await,
                    CaptureChannel::Black => c.read_black(message).await,
                }
            })
            .await?;
        Ok(response.to_domain())
    }

    // =========================================================================
    // Timing generator
    // =========================================================================

    async fn set_timing_generator(&mut self, config: TimingConfig) -> ControlResult<Outcome<()>> {
        let message = SetTimingGeneratorRequest::from(config);
        let response = self
            .request("SetTimingGenerator", move |mut c| async move {
                c.set_timing_generator(message).await
            })
            .await?;
        Ok(response.to_domain())
    }

    // =========================================================================
    // Registers
    // =========================================================================

    async fn write_register(
        &mut self,
        port: RegisterPort,
        address: u16,
        value: u32,
    ) -> ControlResult<Outcome<()>> {
        let message = WriteRegRequest {
            addr: u64::from(address),
            data: u64::from(value),
        };
        let response = self
            .request(port.write_operation(), move |mut c| async move {
                match port {
                    RegisterPort::System => c.write_sys_reg(message).await,
                    RegisterPort::Camera => c.write_cam_reg(message).await,
                    RegisterPort::Sensor => c.write_sensor_reg(message).await,
                }
            })
            .await?;
        Ok(response.to_domain())
    }

    async fn read_register(
        &mut self,
        port: RegisterPort,
        address: u16,
    ) -> ControlResult<Outcome<u32>> {
        let operation = port.read_operation();
        let message = ReadRegRequest {
            addr: u64::from(address),
        };
        let response = self
            .request(operation, move |mut c| async move {
                match port {
                    RegisterPort::System => c.read_sys_reg(message).await,
                    RegisterPort::Camera => c.read_cam_reg(message).await,
                    RegisterPort::Sensor => c.read_sensor_reg(message).await,
                }
            })
            .await?;
        response.try_to_domain(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_timeout_scales_with_frames() {
        let config = ChannelConfig::default();
        assert_eq!(config.record_timeout(0), Duration::from_secs(10));
        assert_eq!(
            config.record_timeout(100),
            Duration::from_secs(10) + Duration::from_millis(5000)
        );
        assert!(config.record_timeout(1000) > config.record_timeout(20));
    }

    #[test]
    fn test_record_timeout_saturates() {
        let config = ChannelConfig {
            record_timeout_per_frame: Duration::MAX,
            ..ChannelConfig::default()
        };
        assert_eq!(config.record_timeout(u32::MAX), Duration::MAX);
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let config = ChannelConfig {
            request_timeout: Duration::ZERO,
            ..ChannelConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("request_timeout"));
        assert!(ChannelConfig::fast().validate().is_ok());
    }

    #[test]
    fn test_status_mapping() {
        let err = status_to_error("ReadImage", &tonic::Status::unavailable("broken pipe"));
        assert!(matches!(err, ControlError::Transport(msg) if msg.contains("ReadImage")));

        let err = status_to_error("ReadImage", &tonic::Status::internal("dma fault"));
        assert_eq!(
            err,
            ControlError::Status {
                operation: "ReadImage",
                code: "Internal".to_string(),
                message: "dma fault".to_string(),
            }
        );
    }

    #[test]
    fn test_config_from_toml_uses_humantime() {
        let config: ChannelConfig = toml::from_str(
            r#"
            request_timeout = "2s"
            record_timeout_per_frame = "15ms"
            "#,
        )
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.record_timeout_per_frame, Duration::from_millis(15));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_lazy_channel_reports_transport_failure() {
        // Nothing listens on port 9; the first call must fail as a channel
        // error, not as a device rejection.
        let address = DeviceAddress::parse("127.0.0.1:9", crate::connection::AddressSource::UserInput)
            .unwrap();
        let channel = Channel::from_shared(address.as_str().to_string())
            .unwrap()
            .connect_timeout(Duration::from_millis(200))
            .connect_lazy();
        let config = ChannelConfig {
            request_timeout: Duration::from_secs(2),
            ..ChannelConfig::default()
        };
        let mut client = GrpcControlClient::from_channel(channel, address, config);

        let err = client.camera_open().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
