//! Client error types.

use p3s7_core::ControlError;
use thiserror::Error;

use crate::connection::AddressError;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur while setting up a device connection.
///
/// Per-call failures after the connection is up are reported as
/// [`ControlError`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// Device address failed validation.
    #[error("Invalid device address: {0}")]
    Address(#[from] AddressError),

    /// gRPC transport error (connection failed, TLS error, etc.).
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// gRPC status error (device returned an error status).
    #[error("gRPC status error: {0}")]
    RpcStatus(#[from] tonic::Status),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<ClientError> for ControlError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RpcStatus(status) => ControlError::Status {
                operation: "connect",
                code: format!("{:?}", status.code()),
                message: status.message().to_string(),
            },
            other => ControlError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_error_becomes_transport() {
        let err: ControlError = ClientError::Address(AddressError::Empty).into();
        assert!(matches!(err, ControlError::Transport(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_status_keeps_code() {
        let err: ControlError =
            ClientError::RpcStatus(tonic::Status::unavailable("device offline")).into();
        match err {
            ControlError::Status { code, message, .. } => {
                assert_eq!(code, "Unavailable");
                assert_eq!(message, "device offline");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
