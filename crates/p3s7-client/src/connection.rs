//! Where the camera control service lives.
//!
//! The KV260 normally sits on a point-to-point link at `192.168.16.1` and
//! serves gRPC on port 50051. Users tend to type bare hosts or `host:port`,
//! so every address goes through [`normalize_url`] before a channel is built.
//!
//! Precedence in [`resolve_address`]: explicit user input, then the configured
//! address, then [`DEFAULT_DEVICE_URL`]. Candidates that fail to parse are
//! skipped with a warning.
//!
//! ```
//! use p3s7_client::connection::{AddressSource, DeviceAddress};
//!
//! let addr = DeviceAddress::parse("192.168.16.1", AddressSource::UserInput)?;
//! assert_eq!(addr.as_str(), "http://192.168.16.1:50051/");
//! # Ok::<(), p3s7_client::connection::AddressError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;
use url::Url;

/// gRPC port of the control service.
pub const DEFAULT_GRPC_PORT: u16 = 50051;

/// Control service on the default camera link.
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.16.1:50051";

/// Origin of a [`DeviceAddress`], kept for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSource {
    /// [`DEFAULT_DEVICE_URL`]
    Default,
    /// Configuration file or `RTCL_P3S7_*` override
    Config,
    /// Given explicitly by the caller
    UserInput,
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Config => "config",
            Self::UserInput => "user",
        })
    }
}

/// Rejected device address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Nothing but whitespace
    #[error("device address is empty")]
    Empty,
    /// Not parseable as a URL even after adding a scheme
    #[error("device address is not a valid URL: {0}")]
    Malformed(String),
    /// Parsed, but without a host
    #[error("device address has no host")]
    MissingHost,
    /// gRPC only runs over http or https
    #[error("unsupported scheme '{0}', use http or https")]
    UnsupportedScheme(String),
}

/// A normalized control service URL: always has a scheme, host and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    url: Url,
    source: AddressSource,
}

impl DeviceAddress {
    /// Normalize `input` and remember where it came from.
    pub fn parse(input: &str, source: AddressSource) -> Result<Self, AddressError> {
        Ok(Self {
            url: normalize_url(input)?,
            source,
        })
    }

    /// The URL as handed to the gRPC endpoint.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Where the address came from.
    #[must_use]
    pub fn source(&self) -> AddressSource {
        self.source
    }

    /// Host name or IP literal.
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or(DEFAULT_GRPC_PORT)
    }

    /// Whether the channel will use TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.url.scheme() == "https"
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl Default for DeviceAddress {
    #[allow(clippy::expect_used)] // constant, covered by test_default_address
    fn default() -> Self {
        let url = Url::parse(DEFAULT_DEVICE_URL).expect("DEFAULT_DEVICE_URL parses");
        Self {
            url,
            source: AddressSource::Default,
        }
    }
}

impl FromStr for DeviceAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, AddressSource::UserInput)
    }
}

/// Add `http://` and port 50051 where missing.
///
/// ```
/// use p3s7_client::connection::normalize_url;
///
/// assert_eq!(normalize_url("kv260")?.as_str(), "http://kv260:50051/");
/// assert_eq!(normalize_url("[::1]:8080")?.as_str(), "http://[::1]:8080/");
/// # Ok::<(), p3s7_client::connection::AddressError>(())
/// ```
pub fn normalize_url(input: &str) -> Result<Url, AddressError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AddressError::Empty);
    }

    let mut url = if input.contains("://") {
        Url::parse(input)
    } else {
        Url::parse(&format!("http://{input}"))
    }
    .map_err(|e| AddressError::Malformed(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AddressError::UnsupportedScheme(url.scheme().to_string()));
    }
    if url.host().is_none() {
        return Err(AddressError::MissingHost);
    }
    if url.port().is_none() {
        // http(s) URLs with a host always accept a port
        let _ = url.set_port(Some(DEFAULT_GRPC_PORT));
    }
    Ok(url)
}

/// First valid address among `user_input` and `configured`, else the default.
///
/// A non-empty candidate that does not parse is logged and skipped.
pub fn resolve_address(user_input: Option<&str>, configured: Option<&str>) -> DeviceAddress {
    let candidates = [
        (user_input, AddressSource::UserInput),
        (configured, AddressSource::Config),
    ];
    for (input, source) in candidates {
        let Some(input) = input.filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        match DeviceAddress::parse(input, source) {
            Ok(address) => return address,
            Err(error) => warn!(%source, input, %error, "ignoring invalid device address"),
        }
    }
    DeviceAddress::default()
}
