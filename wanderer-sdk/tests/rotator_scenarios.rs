//! End-to-end scenarios against simulated rotators

use std::sync::Arc;
use std::time::Duration;

use wanderer_hardware::protocol;
use wanderer_hardware::{MockConnector, SimulatedRotator};
use wanderer_sdk::{ConfigMask, ErrorKind, RotatorConfig, RotatorModel, RotatorSdk};

async fn open_single(rotator: SimulatedRotator) -> (RotatorSdk, Arc<SimulatedRotator>) {
    let rotator = Arc::new(rotator);
    let sdk = RotatorSdk::new(Arc::new(MockConnector::new(vec![rotator.clone()])));
    assert_eq!(sdk.scan().await.unwrap(), vec![0]);
    sdk.open(0).await.unwrap();
    (sdk, rotator)
}

async fn wait_until_stopped(sdk: &RotatorSdk) {
    for _ in 0..240 {
        if !sdk.get_status(0).await.unwrap().moving {
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("rotator never stopped");
}

fn move_commands(sent: &[String]) -> Vec<String> {
    sent.iter()
        .filter(|c| {
            c.parse::<i64>()
                .map(|v| (0..1_500_000).contains(&v))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[tokio::test(start_paused = true)]
async fn open_mini_loads_status() {
    let (sdk, _rotator) = open_single(
        SimulatedRotator::new("/dev/ttyUSB0", "Mini")
            .with_firmware(5)
            .with_mechanical_angle(3600)
            .with_backlash(2.0)
            .with_reverse(false),
    )
    .await;

    let status = sdk.get_status(0).await.unwrap();
    assert!((status.position - 3.6).abs() < 1e-9);
    assert!(!status.moving);
    assert_eq!(status.steps_per_revolution, 1142 * 360);

    let config = sdk.get_config(0).await.unwrap();
    assert_eq!(config.backlash, 2.0);
    assert!(!config.reverse_direction);

    let version = sdk.get_version(0).await.unwrap();
    assert_eq!(version.firmware, 5);
    assert_eq!(version.model, "Mini");
}

#[tokio::test(start_paused = true)]
async fn open_litev2_derives_calibration() {
    let (sdk, _rotator) =
        open_single(SimulatedRotator::new("/dev/ttyUSB0", "LiteV2").with_firmware(3)).await;

    let status = sdk.get_status(0).await.unwrap();
    assert_eq!(status.steps_per_revolution, 1199 * 360);
    assert!((status.step_size - 1.0 / 1199.0).abs() < 1e-9);
    assert_eq!(sdk.get_version(0).await.unwrap().firmware, 3);
}

#[tokio::test(start_paused = true)]
async fn open_succeeds_after_dropped_probes() {
    let rotator = Arc::new(SimulatedRotator::with_model("/dev/ttyUSB0", RotatorModel::Lite));
    let sdk = RotatorSdk::new(Arc::new(MockConnector::new(vec![rotator.clone()])));
    sdk.scan().await.unwrap();

    rotator.fail_handshakes(2).await;
    sdk.open(0).await.unwrap();
    assert!(sdk.is_open(0).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn open_fails_when_device_goes_silent() {
    let rotator = Arc::new(SimulatedRotator::with_model("/dev/ttyUSB0", RotatorModel::Mini));
    let sdk = RotatorSdk::new(Arc::new(MockConnector::new(vec![rotator.clone()])));
    sdk.scan().await.unwrap();

    rotator.set_silent(true).await;
    let err = sdk.open(0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Communication);
    assert!(!sdk.is_open(0).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn relative_move_completes() {
    let (sdk, rotator) =
        open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini").with_mechanical_angle(3600)).await;

    sdk.move_by(0, 10.0).await.unwrap();
    assert!(sdk.get_status(0).await.unwrap().moving);

    wait_until_stopped(&sdk).await;

    let status = sdk.get_status(0).await.unwrap();
    assert!((status.position - 13.6).abs() < 1e-9);
    assert_eq!(
        move_commands(&rotator.sent_commands().await),
        vec![protocol::move_command(10.0, 1142)]
    );
}

#[tokio::test(start_paused = true)]
async fn move_to_takes_shortest_path() {
    let (sdk, rotator) =
        open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini").with_mechanical_angle(350_000)).await;

    sdk.move_to(0, 10.0).await.unwrap();
    wait_until_stopped(&sdk).await;

    assert_eq!(
        move_commands(&rotator.sent_commands().await),
        vec![protocol::move_command(20.0, 1142)]
    );
    assert!((sdk.get_status(0).await.unwrap().position - 10.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn move_to_current_position_sends_no_move() {
    let (sdk, rotator) =
        open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini").with_mechanical_angle(45_000)).await;

    sdk.move_to(0, 45.0).await.unwrap();

    assert!(!sdk.get_status(0).await.unwrap().moving);
    assert!(move_commands(&rotator.sent_commands().await).is_empty());
}

#[tokio::test(start_paused = true)]
async fn move_to_rejects_out_of_range() {
    let (sdk, _rotator) = open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini")).await;

    for angle in [-0.1, 360.0, 720.0] {
        let err = sdk.move_to(0, angle).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }
}

#[tokio::test(start_paused = true)]
async fn find_home_returns_to_zero() {
    let (sdk, _rotator) =
        open_single(SimulatedRotator::new("/dev/ttyUSB0", "LiteV2").with_mechanical_angle(90_000)).await;

    sdk.find_home(0).await.unwrap();
    wait_until_stopped(&sdk).await;

    assert!(sdk.get_status(0).await.unwrap().position.abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_move() {
    let (sdk, rotator) = open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini")).await;

    sdk.move_by(0, 90.0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    sdk.stop_move(0).await.unwrap();

    assert!(!sdk.get_status(0).await.unwrap().moving);
    assert!(rotator.sent_commands().await.contains(&protocol::STOP.to_string()));

    // The partial report still updates the position
    tokio::time::sleep(Duration::from_millis(200)).await;
    let position = sdk.get_status(0).await.unwrap().position;
    assert!(position > 0.0 && position < 90.0);
}

#[tokio::test(start_paused = true)]
async fn set_config_writes_device() {
    let (sdk, rotator) = open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini")).await;

    let config = RotatorConfig {
        reverse_direction: true,
        backlash: 1.5,
        ..Default::default()
    };
    sdk.set_config(0, &config, ConfigMask::REVERSE_DIRECTION | ConfigMask::BACKLASH)
        .await
        .unwrap();

    let sent = rotator.sent_commands().await;
    assert!(sent.contains(&"1700001\n".to_string()));
    assert!(sent.contains(&"1600015\n".to_string()));
    assert!(rotator.reverse().await);
    assert_eq!(rotator.backlash().await, 1.5);

    let stored = sdk.get_config(0).await.unwrap();
    assert!(stored.reverse_direction);
    assert_eq!(stored.backlash, 1.5);
}

#[tokio::test(start_paused = true)]
async fn set_config_respects_mask() {
    let (sdk, rotator) = open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini")).await;
    let sent_before = rotator.sent_commands().await.len();

    let config = RotatorConfig {
        reverse_direction: true,
        backlash: 4.0,
        ..Default::default()
    };
    sdk.set_config(0, &config, ConfigMask::NONE).await.unwrap();

    assert_eq!(rotator.sent_commands().await.len(), sent_before);
    let stored = sdk.get_config(0).await.unwrap();
    assert!(!stored.reverse_direction);
    assert_eq!(stored.backlash, 0.0);
}

#[tokio::test(start_paused = true)]
async fn sync_position_zeroes_device() {
    let (sdk, rotator) =
        open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini").with_mechanical_angle(123_000)).await;

    assert_eq!(
        sdk.sync_position(0, 5.0).await.unwrap_err().kind(),
        ErrorKind::InvalidParameter
    );

    sdk.sync_position(0, 0.0).await.unwrap();
    assert_eq!(sdk.get_status(0).await.unwrap().position, 0.0);
    assert_eq!(rotator.mechanical_angle().await, 0);
}

#[tokio::test(start_paused = true)]
async fn commands_after_close_fail() {
    let (sdk, _rotator) = open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini")).await;

    sdk.close(0).await.unwrap();
    sdk.close(0).await.unwrap();

    let err = sdk.move_by(0, 1.0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Communication);

    // Pure reads keep working
    assert_eq!(sdk.get_version(0).await.unwrap().model, "Mini");
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_are_serialized() {
    let (sdk, _rotator) = open_single(SimulatedRotator::new("/dev/ttyUSB0", "Mini")).await;
    let sdk = Arc::new(sdk);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sdk = sdk.clone();
            tokio::spawn(async move { sdk.get_status(0).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}
