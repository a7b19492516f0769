//! Integration tests for CardDecoder in hardware mode
//!
//! These tests drive the decoder through the mock input backend: reader
//! detection, keystroke decoding, callback fan-out, and recovery after the
//! reader disappears.

use consultease_core::CardIdentifier;
use consultease_hardware::mock::{MockInputBackend, MockInputHandle};
use consultease_hardware::{
    AnyInputBackend, CardDecoder, DecoderConfig, DecoderMode, DeviceCapabilities,
    InputDeviceInfo, SimulationReason,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

const READER: &str = "/dev/input/event4";

fn fast_config() -> DecoderConfig {
    DecoderConfig {
        reopen_attempts: 3,
        reopen_delay: Duration::from_millis(10),
        join_timeout: Duration::from_millis(500),
        ..DecoderConfig::default()
    }
}

fn reader(path: &str) -> InputDeviceInfo {
    InputDeviceInfo::new(path, "USB RFID Reader", DeviceCapabilities::keyboard(40))
}

fn decoder_with_reader(config: DecoderConfig) -> (CardDecoder, MockInputHandle) {
    let (backend, handle) = MockInputBackend::new();
    handle.add_device(InputDeviceInfo::new(
        "/dev/input/event0",
        "Power Button",
        DeviceCapabilities::keyboard(1),
    ));
    handle.add_device(reader(READER));
    (
        CardDecoder::with_backend(config, AnyInputBackend::Mock(backend)),
        handle,
    )
}

/// Forward every emitted card into a channel.
fn collect(decoder: &CardDecoder) -> mpsc::UnboundedReceiver<CardIdentifier> {
    let (tx, rx) = mpsc::unbounded_channel();
    decoder
        .register_callback(move |card| {
            tx.send(card.clone())?;
            Ok(())
        })
        .detach();
    rx
}

async fn next_card(rx: &mut mpsc::UnboundedReceiver<CardIdentifier>) -> String {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("no card within 2s")
        .expect("callback channel closed")
        .into_inner()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached within 2s");
}

#[tokio::test]
async fn test_detects_reader_and_decodes_scans() {
    let (decoder, handle) = decoder_with_reader(fast_config());
    let mut cards = collect(&decoder);

    decoder.start();
    assert_eq!(
        decoder.mode(),
        DecoderMode::Hardware {
            path: PathBuf::from(READER),
            name: "USB RFID Reader".to_string(),
        }
    );

    handle.type_card("04ABCDEF").unwrap();
    assert_eq!(next_card(&mut cards).await, "04ABCDEF");

    // Same card twice: two separate emissions.
    handle.type_card("04ABCDEF").unwrap();
    handle.type_card("04ABCDEF").unwrap();
    assert_eq!(next_card(&mut cards).await, "04ABCDEF");
    assert_eq!(next_card(&mut cards).await, "04ABCDEF");

    decoder.stop().await;
    assert_eq!(decoder.mode(), DecoderMode::Stopped);
    assert!(!handle.is_open());
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let (decoder, handle) = decoder_with_reader(fast_config());

    decoder.start();
    decoder.start();
    assert_eq!(handle.open_count(), 1);

    decoder.stop().await;
    decoder.start();
    assert_eq!(handle.open_count(), 2);
    decoder.stop().await;
}

#[tokio::test]
async fn test_explicit_path_skips_detection() {
    let (backend, handle) = MockInputBackend::new();
    // Name gives no hint, but the configured path wins.
    handle.add_device(InputDeviceInfo::new(
        "/dev/input/event9",
        "Keyboard",
        DeviceCapabilities::keyboard(104),
    ));
    let decoder = CardDecoder::with_backend(
        DecoderConfig {
            device_path: Some(PathBuf::from("/dev/input/event9")),
            ..fast_config()
        },
        AnyInputBackend::Mock(backend),
    );

    decoder.start();
    assert!(decoder.mode().is_hardware());
    assert_eq!(handle.open_path(), Some(PathBuf::from("/dev/input/event9")));
    decoder.stop().await;
}

#[tokio::test]
async fn test_no_reader_falls_back_to_simulation() {
    let (backend, handle) = MockInputBackend::new();
    handle.add_device(InputDeviceInfo::new(
        "/dev/input/event0",
        "AT Translated Set 2 keyboard",
        DeviceCapabilities::keyboard(104),
    ));
    let decoder = CardDecoder::with_backend(fast_config(), AnyInputBackend::Mock(backend));
    let mut cards = collect(&decoder);

    decoder.start();
    assert_eq!(
        decoder.mode(),
        DecoderMode::Simulation {
            reason: SimulationReason::NoDeviceFound
        }
    );
    assert!(decoder.is_running());

    let card = decoder.simulate_card_read(None);
    assert_eq!(next_card(&mut cards).await, card.as_str());

    decoder.stop().await;
}

#[tokio::test]
async fn test_open_failure_falls_back_to_simulation() {
    let (decoder, handle) = decoder_with_reader(fast_config());
    handle.fail_next_opens(1);

    decoder.start();
    assert_eq!(
        decoder.mode(),
        DecoderMode::Simulation {
            reason: SimulationReason::OpenFailed
        }
    );
    decoder.stop().await;
}

#[tokio::test]
async fn test_transient_read_error_reopens_device() {
    let (decoder, handle) = decoder_with_reader(fast_config());
    let mut cards = collect(&decoder);

    decoder.start();
    handle.inject_fault("EIO").unwrap();
    wait_until(|| handle.open_count() == 2 && handle.is_open()).await;

    assert!(decoder.mode().is_hardware());
    handle.type_card("1234").unwrap();
    assert_eq!(next_card(&mut cards).await, "1234");

    decoder.stop().await;
}

#[tokio::test]
async fn test_replugged_reader_is_located_again() {
    let (decoder, handle) = decoder_with_reader(fast_config());
    let mut cards = collect(&decoder);

    decoder.start();
    handle.add_device(reader("/dev/input/event6"));
    handle.remove_device(READER);

    wait_until(|| handle.open_path() == Some(PathBuf::from("/dev/input/event6"))).await;
    assert_eq!(
        decoder.mode(),
        DecoderMode::Hardware {
            path: PathBuf::from("/dev/input/event6"),
            name: "USB RFID Reader".to_string(),
        }
    );

    handle.type_card("CAFE").unwrap();
    assert_eq!(next_card(&mut cards).await, "CAFE");

    decoder.stop().await;
}

#[tokio::test]
async fn test_lost_reader_degrades_to_simulation() {
    let (decoder, handle) = decoder_with_reader(DecoderConfig {
        device_path: Some(PathBuf::from(READER)),
        ..fast_config()
    });
    let mut cards = collect(&decoder);

    decoder.start();
    handle.remove_device(READER);

    let lost = DecoderMode::Simulation {
        reason: SimulationReason::DeviceLost,
    };
    wait_until(|| decoder.mode() == lost).await;

    // Initial open plus three reopen attempts.
    assert_eq!(handle.open_count(), 4);
    assert!(decoder.is_running());

    let card = CardIdentifier::new("DEADBEEF").unwrap();
    decoder.simulate_card_read(Some(card));
    assert_eq!(next_card(&mut cards).await, "DEADBEEF");

    decoder.stop().await;
}

#[tokio::test]
async fn test_failing_callback_does_not_block_others() {
    let (decoder, handle) = decoder_with_reader(fast_config());

    decoder
        .register_callback(|_| anyhow::bail!("database unavailable"))
        .detach();
    decoder
        .register_callback(|_| panic!("controller bug"))
        .detach();
    let mut cards = collect(&decoder);

    decoder.start();
    handle.type_card("99").unwrap();
    assert_eq!(next_card(&mut cards).await, "99");
    assert!(decoder.is_running());

    decoder.stop().await;
}

#[tokio::test]
async fn test_unregistered_callback_is_not_notified() {
    let (decoder, _handle) = decoder_with_reader(fast_config());
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let subscription = decoder.register_callback(move |card| {
        tx.send(card.to_string())?;
        Ok(())
    });
    assert_eq!(decoder.callback_count(), 1);

    decoder.simulate_card_read(Some(CardIdentifier::new("01").unwrap()));
    assert!(decoder.unregister_callback(subscription));
    decoder.simulate_card_read(Some(CardIdentifier::new("02").unwrap()));

    assert_eq!(rx.recv().await.as_deref(), Some("01"));
    // Sender was dropped with the callback.
    assert!(rx.recv().await.is_none());
    assert_eq!(decoder.callback_count(), 0);
}

#[tokio::test]
async fn test_stop_from_clone() {
    let (decoder, handle) = decoder_with_reader(fast_config());
    let other = decoder.clone();

    decoder.start();
    other.stop().await;

    assert!(!decoder.is_running());
    assert!(!handle.is_open());
}
