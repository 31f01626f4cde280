//! Wire types for the `rtcl_p3s7_control` gRPC service.
//!
//! This crate contains:
//! - Message types and the client stub generated from
//!   `proto/rtcl_p3s7_control.proto`
//! - Conversions between wire messages and `p3s7-core` domain types
//!
//! Every response of the service carries a `result` flag. The conversions
//! turn that flag and its payload into an [`Outcome`](p3s7_core::Outcome) so
//! the payload of a failed response is never observed.

#![allow(missing_docs)] // Generated code doesn't have docs

pub mod convert;

/// Generated `rtcl_p3s7_control` protocol buffer types.
pub mod rtcl_p3s7_control {
    tonic::include_proto!("rtcl_p3s7_control");
}

pub use rtcl_p3s7_control::*;
