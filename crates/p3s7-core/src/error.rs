//! Error types for the control plane.
//!
//! Two kinds of failure are kept strictly apart:
//!
//! - **Channel failures** ([`ControlError`]): the request never produced a
//!   trustworthy response. The connection was lost, the call timed out, or the
//!   response violated the wire contract. These are fatal to the session.
//! - **Device rejections**: the device answered with `ok = false`. These are
//!   not errors at this layer at all; they are carried as
//!   [`Outcome::Rejected`](crate::outcome::Outcome::Rejected) and the caller
//!   decides what to do. [`ControlError::Rejected`] only appears when a caller
//!   explicitly converts an outcome with
//!   [`Outcome::into_result`](crate::outcome::Outcome::into_result).

use std::time::Duration;

use thiserror::Error;

/// Result alias used by every control-plane call.
pub type ControlResult<T> = std::result::Result<T, ControlError>;

/// Failure of a single control-plane call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// The channel is unreachable or dropped mid-call.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The RPC layer returned a status instead of a response message.
    #[error("rpc status {code} during '{operation}': {message}")]
    Status {
        /// Operation that was in flight.
        operation: &'static str,
        /// Status code name as reported by the RPC layer.
        code: String,
        /// Status message.
        message: String,
    },

    /// No response arrived within the per-call deadline.
    #[error("'{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Operation that was in flight.
        operation: &'static str,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The device answered but the payload breaks the wire contract.
    #[error("malformed response to '{operation}': {reason}")]
    MalformedResponse {
        /// Operation whose response was malformed.
        operation: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The device rejected an operation and the caller asked for that to be
    /// treated as an error.
    #[error("device rejected '{operation}'")]
    Rejected {
        /// Operation that was rejected.
        operation: &'static str,
    },
}

impl ControlError {
    /// Returns `true` when the session can no longer be trusted.
    ///
    /// Everything except an explicit rejection is fatal: the channel either
    /// lost the response or cannot vouch for it.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Shorthand for a malformed-response error.
    pub fn malformed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation,
            reason: reason.into(),
        }
    }
}

/// Errors raised while interpreting a raw frame buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Width or height is zero.
    #[error("frame geometry {width}x{height} is empty")]
    EmptyGeometry {
        /// Frame width in samples.
        width: u32,
        /// Frame height in samples.
        height: u32,
    },

    /// `2 * width * height` does not fit in memory.
    #[error("frame geometry {width}x{height} is too large")]
    TooLarge {
        /// Frame width in samples.
        width: u32,
        /// Frame height in samples.
        height: u32,
    },

    /// Buffer length does not match `2 * width * height`.
    #[error("frame buffer holds {actual} bytes, expected {expected} for {width}x{height}")]
    LengthMismatch {
        /// Frame width in samples.
        width: u32,
        /// Frame height in samples.
        height: u32,
        /// Expected byte length.
        expected: usize,
        /// Received byte length.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_is_not_fatal() {
        let err = ControlError::Rejected {
            operation: "ReadImage",
        };
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "device rejected 'ReadImage'");
    }

    #[test]
    fn test_channel_failures_are_fatal() {
        assert!(ControlError::Transport("connection reset".into()).is_fatal());
        assert!(ControlError::Timeout {
            operation: "RecordImage",
            timeout: Duration::from_secs(5),
        }
        .is_fatal());
        assert!(ControlError::malformed("ReadSysReg", "data wider than 32 bits").is_fatal());
    }

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::LengthMismatch {
            width: 4,
            height: 2,
            expected: 16,
            actual: 10,
        };
        assert!(err.to_string().contains("expected 16"));
    }
}
