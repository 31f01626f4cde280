//! Integration tests for p3s7-client against a live KV260.
//!
//! These tests are ignored by default. Run with:
//! ```
//! RTCL_P3S7_DEVICE_URL=http://192.168.16.1:50051 cargo test -p p3s7-client --test integration -- --ignored
//! ```

use std::str::FromStr;

use p3s7_client::{ChannelConfig, DeviceAddress, GrpcControlClient};
use p3s7_core::{CameraRegister, CaptureChannel, CaptureRequest, Outcome, Session};

/// Get device URL from environment or default to the camera link address
fn device_url() -> String {
    std::env::var("RTCL_P3S7_DEVICE_URL").unwrap_or_else(|_| "http://192.168.16.1:50051".to_string())
}

/// Helper to skip test gracefully if the device is unavailable
async fn try_connect() -> Option<Session<GrpcControlClient>> {
    let addr = DeviceAddress::from_str(&device_url()).ok()?;
    let client = GrpcControlClient::connect_with_config(&addr, ChannelConfig::fast())
        .await
        .ok()?;
    Some(Session::new(client))
}

#[tokio::test]
#[ignore]
async fn test_get_version() {
    let Some(mut session) = try_connect().await else {
        eprintln!("Skipping test: device not available at {}", device_url());
        return;
    };

    let version = session.server_version().await.expect("GetVersion failed");
    assert!(!version.is_empty(), "Version string should not be empty");
}

#[tokio::test]
#[ignore]
async fn test_connect_invalid_address() {
    let addr = DeviceAddress::from_str("http://invalid-host.invalid:50051")
        .expect("Failed to parse invalid URL");

    let result = GrpcControlClient::connect_with_config(&addr, ChannelConfig::fast()).await;

    assert!(result.is_err(), "Should fail to connect to invalid address");
}

#[tokio::test]
#[ignore]
async fn test_open_close_cycle() {
    let Some(mut session) = try_connect().await else {
        eprintln!("Skipping test: device not available");
        return;
    };

    let mut camera = session.camera();
    assert!(camera.open().await.unwrap().is_accepted());
    assert!(camera.is_opened().await.unwrap());
    assert!(camera.open().await.unwrap().is_accepted(), "open is idempotent");
    assert!(camera.close().await.unwrap().is_accepted());
    assert!(!camera.is_opened().await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_sensor_enable_round_trip() {
    let Some(mut session) = try_connect().await else {
        eprintln!("Skipping test: device not available");
        return;
    };

    let mut bank = session.camera_registers();
    let original = bank.read(CameraRegister::SensorEnable).await.unwrap();
    assert!(bank
        .write(CameraRegister::SensorEnable, 1)
        .await
        .unwrap()
        .is_accepted());
    assert_eq!(
        bank.read(CameraRegister::SensorEnable).await.unwrap(),
        Outcome::Accepted(1)
    );
    if let Outcome::Accepted(value) = original {
        bank.write(CameraRegister::SensorEnable, value).await.unwrap();
    }
}

#[tokio::test]
#[ignore]
async fn test_record_and_read_image() {
    let Some(mut session) = try_connect().await else {
        eprintln!("Skipping test: device not available");
        return;
    };

    assert!(session.camera().open().await.unwrap().is_accepted());

    let request = CaptureRequest::new(640, 320, 20);
    let mut acquisition = session.acquisition();
    let recording = acquisition
        .record(CaptureChannel::Image, request)
        .await
        .unwrap()
        .value()
        .expect("record rejected");

    for index in 0..recording.frames {
        let frame = acquisition
            .read_frame(&recording, index)
            .await
            .unwrap()
            .value()
            .expect("read rejected");
        assert_eq!(Some(frame.as_bytes().len()), request.frame_bytes());
    }

    let past_end = acquisition
        .read(CaptureChannel::Image, recording.frames)
        .await
        .unwrap();
    assert!(past_end.is_rejected());

    session.camera().close().await.unwrap();
}
