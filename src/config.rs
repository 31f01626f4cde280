//! Client configuration using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration; missing file means all defaults)
//! 2. Environment variables prefixed with `RTCL_P3S7_`, nested keys joined by
//!    `__` (e.g. `RTCL_P3S7_DEVICE__ADDRESS=10.0.0.2`)
//!
//! # Example
//! ```no_run
//! use rtcl_p3s7::config::ClientConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load()?;
//! config.validate()?;
//! println!("device: {}", config.device_address());
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use p3s7_client::connection::resolve_address;
use p3s7_client::{ChannelConfig, DeviceAddress};
use p3s7_core::{CameraSettings, TimingConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{parse_log_level, OutputFormat};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/rtcl_p3s7.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "RTCL_P3S7_";

/// Configuration failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File or environment could not be merged or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Values loaded but inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Configuration could not be written back as TOML.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Top-level client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Device address
    #[serde(default)]
    pub device: DeviceConfig,
    /// gRPC channel timeouts
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Camera settings applied by [`crate::configure_session`]
    #[serde(default)]
    pub camera: CameraSettings,
    /// Trigger timing; left untouched on the device when absent
    #[serde(default)]
    pub timing: Option<TimingConfig>,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the control service listens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host, `host:port` or full URL. Defaults to the camera link address.
    #[serde(default)]
    pub address: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: OutputFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::figment(path)
            .extract::<Self>()
            .map_err(Box::new)
            .map_err(Into::into)
    }

    /// The provider chain, for callers that want to merge more sources.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_log_level(&self.logging.level).map_err(ConfigError::Invalid)?;

        if let Some(address) = &self.device.address {
            p3s7_client::connection::normalize_url(address)
                .map_err(|e| ConfigError::Invalid(format!("device.address: {e}")))?;
        }

        self.channel
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera image size {}x{} must be non-zero",
                self.camera.width, self.camera.height
            )));
        }
        if !self.camera.exposure_us.is_finite() || self.camera.exposure_us < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "camera.exposure_us {} must be a non-negative number",
                self.camera.exposure_us
            )));
        }
        if !self.camera.gain_db.is_finite() {
            return Err(ConfigError::Invalid("camera.gain_db must be finite".into()));
        }

        if let Some(timing) = &self.timing {
            let valid = |v: f32| v.is_finite() && v > 0.0;
            if !valid(timing.period_us) || !valid(timing.exposure_us) {
                return Err(ConfigError::Invalid(format!(
                    "timing period {} us / exposure {} us must be positive",
                    timing.period_us, timing.exposure_us
                )));
            }
        }

        Ok(())
    }

    /// Resolved device address; falls back to the default when unset.
    pub fn device_address(&self) -> DeviceAddress {
        resolve_address(None, self.device.address.as_deref())
    }

    /// Render as TOML, e.g. to write a starting config file.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
