//! Behavior of several sessions against one simulated board.

use p3s7_core::{
    CaptureChannel, CaptureRequest, ControlError, Outcome, Session, SystemRegister,
};
use p3s7_driver_mock::{FaultConfig, FaultScenario, MockDevice};

#[tokio::test]
async fn second_session_sees_first_sessions_effects() {
    let device = MockDevice::new();
    let mut first = Session::new(device.clone());
    let mut second = Session::new(device);

    assert!(first.camera().open().await.unwrap().is_accepted());
    assert!(second.camera().is_opened().await.unwrap());

    let recording = first
        .acquisition()
        .record(CaptureChannel::Image, CaptureRequest::new(32, 32, 3))
        .await
        .unwrap()
        .value()
        .unwrap();

    // The buffer belongs to the board, not to the session that filled it
    let frame = second
        .acquisition()
        .read_frame(&recording, 2)
        .await
        .unwrap()
        .value()
        .unwrap();
    assert_eq!(frame.index(), 2);
}

#[tokio::test]
async fn link_loss_hits_every_session() {
    let device = MockDevice::new();
    let mut first = Session::new(device.clone());
    let mut second = Session::new(device.clone());

    device.disconnect();
    assert!(matches!(
        first.server_version().await,
        Err(ControlError::Transport(_))
    ));
    assert!(second.camera().open().await.is_err());

    device.reconnect();
    assert!(second.camera().open().await.unwrap().is_accepted());
}

#[tokio::test]
async fn link_drops_after_budget_of_calls() {
    let faults = FaultConfig::scenario(FaultScenario::CommunicationLossAfterN { count: 3 });
    let device = MockDevice::builder().faults(faults).build().unwrap();
    let mut session = Session::new(device);

    let mut bank = session.system_registers();
    for _ in 0..3 {
        assert!(bank.read(SystemRegister::Id).await.unwrap().is_accepted());
    }
    let err = bank.read(SystemRegister::Id).await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn random_rejections_are_never_errors() {
    let faults = FaultConfig::random_rejections_seeded(0.5, Some(7));
    let device = MockDevice::builder().faults(faults).build().unwrap();
    let mut session = Session::new(device);

    let mut accepted = 0;
    let mut rejected = 0;
    for _ in 0..200 {
        match session.system_registers().read(SystemRegister::Id).await {
            Ok(Outcome::Accepted(_)) => accepted += 1,
            Ok(Outcome::Rejected) => rejected += 1,
            Err(e) => panic!("rejection surfaced as error: {e}"),
        }
    }
    assert!(accepted > 0 && rejected > 0);
}
