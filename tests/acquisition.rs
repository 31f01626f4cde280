//! Two-phase record/read capture against the simulated device.

use p3s7_driver_mock::{FaultConfig, FaultScenario, MockDevice};
use rtcl_p3s7::{
    CaptureChannel, CaptureRequest, ControlError, Outcome, Session, SystemRegister,
    TimingConfig,
};

async fn open_session(device: MockDevice) -> Session<MockDevice> {
    let mut session = Session::new(device);
    assert!(session.camera().open().await.unwrap().is_accepted());
    session
}

#[tokio::test]
async fn record_and_read_twenty_frames() {
    let mut session = open_session(MockDevice::new()).await;
    let request = CaptureRequest::new(640, 320, 20);

    let mut acquisition = session.acquisition();
    let recording = acquisition
        .record(CaptureChannel::Image, request)
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(recording.frames, 20);
    assert!(!recording.is_truncated());

    let mut frames = Vec::new();
    for index in 0..20 {
        let frame = acquisition
            .read_frame(&recording, index)
            .await
            .unwrap()
            .value()
            .unwrap();
        assert_eq!(frame.as_bytes().len(), 640 * 320 * 2);
        frames.push(frame);
    }

    for (i, a) in frames.iter().enumerate() {
        for b in &frames[i + 1..] {
            assert_ne!(a.as_bytes(), b.as_bytes(), "frames must differ");
        }
    }

    assert!(acquisition
        .read(CaptureChannel::Image, 20)
        .await
        .unwrap()
        .is_rejected());
}

#[tokio::test]
async fn frames_read_in_any_order() {
    let mut session = open_session(MockDevice::new()).await;
    let mut acquisition = session.acquisition();
    let recording = acquisition
        .record(CaptureChannel::Image, CaptureRequest::new(64, 48, 5))
        .await
        .unwrap()
        .value()
        .unwrap();

    let late = acquisition.read(CaptureChannel::Image, 4).await.unwrap();
    let early = acquisition.read(CaptureChannel::Image, 0).await.unwrap();
    let late_again = acquisition.read(CaptureChannel::Image, 4).await.unwrap();
    assert!(early.is_accepted());
    assert_eq!(late, late_again);
    assert_eq!(recording.frames, 5);
}

#[tokio::test]
async fn samples_use_the_upper_ten_bits() {
    let mut session = open_session(MockDevice::new()).await;
    let frames = session
        .acquisition()
        .record_all(CaptureChannel::Image, CaptureRequest::new(128, 64, 2))
        .await
        .unwrap()
        .value()
        .unwrap();

    for frame in &frames {
        for y in 0..frame.height() {
            for x in 0..frame.width() {
                let word = frame.word(x, y).unwrap();
                assert_eq!(word & 0x3F, 0, "low six bits are padding");
                assert_eq!(frame.sample(x, y), Some(word >> 6));
            }
        }
        assert!(frame.samples().all(|s| s <= 1023));
    }
    // frame index is stamped into the first sample
    assert_eq!(frames[1].sample(0, 0), Some(1));
}

#[tokio::test]
async fn black_recording_leaves_image_frames_alone() {
    let mut session = open_session(MockDevice::new()).await;
    let mut acquisition = session.acquisition();

    acquisition
        .record(CaptureChannel::Image, CaptureRequest::new(64, 64, 3))
        .await
        .unwrap()
        .value()
        .unwrap();
    let before = acquisition.read(CaptureChannel::Image, 2).await.unwrap();

    let black = acquisition
        .record_all(CaptureChannel::Black, CaptureRequest::new(1280, 1, 16))
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(black.len(), 16);
    assert!(black[0].mean() < 64.0);

    let after = acquisition.read(CaptureChannel::Image, 2).await.unwrap();
    assert!(after.is_accepted());
    assert_eq!(before, after);
    assert!(acquisition.read(CaptureChannel::Image, 3).await.unwrap().is_rejected());
}

#[tokio::test]
async fn black_reads_stop_at_the_recorded_count() {
    let mut session = open_session(MockDevice::new()).await;
    let mut acquisition = session.acquisition();

    let recording = acquisition
        .record(CaptureChannel::Black, CaptureRequest::new(1280, 1, 4))
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(recording.frames, 4);

    assert!(acquisition.read(CaptureChannel::Black, 3).await.unwrap().is_accepted());
    assert!(acquisition.read(CaptureChannel::Black, 4).await.unwrap().is_rejected());
    assert!(acquisition.read(CaptureChannel::Black, u32::MAX).await.unwrap().is_rejected());
}

#[tokio::test]
async fn shorter_recording_replaces_the_previous_one() {
    let mut session = open_session(MockDevice::new()).await;
    let mut acquisition = session.acquisition();

    for frames in [10, 3] {
        acquisition
            .record(CaptureChannel::Image, CaptureRequest::new(64, 48, frames))
            .await
            .unwrap()
            .value()
            .unwrap();
    }

    assert!(acquisition.read(CaptureChannel::Image, 2).await.unwrap().is_accepted());
    assert!(acquisition.read(CaptureChannel::Image, 3).await.unwrap().is_rejected());
    assert!(acquisition.read(CaptureChannel::Image, 5).await.unwrap().is_rejected());
}

#[tokio::test]
async fn oversized_geometry_is_rejected() {
    let mut session = open_session(MockDevice::new()).await;
    let outcome = session
        .acquisition()
        .record(CaptureChannel::Image, CaptureRequest::new(u32::MAX, u32::MAX, 1))
        .await
        .unwrap();
    assert!(outcome.is_rejected());
}

#[tokio::test]
async fn record_is_rejected_while_closed() {
    let mut session = Session::new(MockDevice::new());
    let request = CaptureRequest::new(64, 64, 1);

    let mut acquisition = session.acquisition();
    assert!(acquisition
        .record(CaptureChannel::Image, request)
        .await
        .unwrap()
        .is_rejected());
    assert!(acquisition
        .record(CaptureChannel::Black, request)
        .await
        .unwrap()
        .is_rejected());
    assert!(acquisition.read(CaptureChannel::Image, 0).await.unwrap().is_rejected());
}

#[tokio::test]
async fn record_is_limited_by_buffer_capacity() {
    let frame_bytes = 640 * 480 * 2;
    let device = MockDevice::builder()
        .channel_capacity(CaptureChannel::Image, frame_bytes * 8)
        .build()
        .unwrap();
    let mut session = open_session(device).await;

    let recording = session
        .acquisition()
        .record(CaptureChannel::Image, CaptureRequest::new(640, 480, 50))
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(recording.frames, 8);
    assert!(recording.is_truncated());

    let frames = session
        .acquisition()
        .record_all(CaptureChannel::Image, CaptureRequest::new(640, 480, 50))
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(frames.len(), 8);
}

#[tokio::test]
async fn record_counts_frames_on_the_device() {
    let mut session = open_session(MockDevice::new()).await;
    for _ in 0..2 {
        session
            .acquisition()
            .record(CaptureChannel::Image, CaptureRequest::new(32, 32, 10))
            .await
            .unwrap()
            .value()
            .unwrap();
    }
    assert_eq!(
        session.system_registers().read(SystemRegister::FrameCount).await.unwrap(),
        Outcome::Accepted(20)
    );
}

#[tokio::test]
async fn record_all_is_all_or_nothing() {
    let faults = FaultConfig::scenario(FaultScenario::RejectAfterN {
        operation: "ReadImage",
        count: 2,
    });
    let device = MockDevice::builder().faults(faults).build().unwrap();
    let mut session = open_session(device).await;

    let outcome = session
        .acquisition()
        .record_all(CaptureChannel::Image, CaptureRequest::new(32, 32, 4))
        .await
        .unwrap();
    assert!(outcome.is_rejected());
}

#[tokio::test]
async fn recording_aborts_when_timing_is_rejected() {
    let faults = FaultConfig::scenario(FaultScenario::Reject {
        operation: "SetTimingGenerator",
    });
    let device = MockDevice::builder().faults(faults).build().unwrap();
    let mut session = open_session(device).await;

    let outcome = session
        .acquisition()
        .record_with_timing(
            TimingConfig::new(2000.0, 500.0),
            CaptureChannel::Image,
            CaptureRequest::new(32, 32, 4),
        )
        .await
        .unwrap();
    assert!(outcome.is_rejected());
    // nothing was recorded
    assert_eq!(
        session.system_registers().read(SystemRegister::FrameCount).await.unwrap(),
        Outcome::Accepted(0)
    );
}

#[tokio::test]
async fn recording_with_timing() {
    let mut session = open_session(MockDevice::new()).await;
    let recording = session
        .acquisition()
        .record_with_timing(
            TimingConfig::new(2000.0, 500.0),
            CaptureChannel::Image,
            CaptureRequest::new(32, 32, 4),
        )
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(recording.frames, 4);
    assert_eq!(session.camera().measure_fps().await.unwrap(), Outcome::Accepted(500.0));
}

#[tokio::test(start_paused = true)]
async fn stalled_read_surfaces_as_timeout() {
    let after = std::time::Duration::from_secs(10);
    let faults = FaultConfig::scenario(FaultScenario::Timeout {
        operation: "ReadBlack",
        after,
    });
    let device = MockDevice::builder().faults(faults).build().unwrap();
    let mut session = open_session(device).await;

    session
        .acquisition()
        .record(CaptureChannel::Black, CaptureRequest::new(1280, 1, 1))
        .await
        .unwrap()
        .value()
        .unwrap();
    let err = session
        .acquisition()
        .read(CaptureChannel::Black, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Timeout { operation: "ReadBlack", .. }));
}
