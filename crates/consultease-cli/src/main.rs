//! `consultease-bridge`: forwards card scans to the broker.
//!
//! Settings come from the environment (seeded from `.env` when present). The
//! bridge starts the card decoder and the messaging client, publishes every
//! scan to `consultease/rfid/scan`, and logs faculty status updates. Each
//! line typed on stdin is treated as a manual scan; an empty line produces a
//! random identifier. Ctrl-C stops both components.

use anyhow::Context;
use chrono::Utc;
use consultease_core::CardIdentifier;
use consultease_core::config::Settings;
use consultease_hardware::{CardDecoder, DecoderConfig};
use consultease_network::{ClientConfig, MessagingClient};
use serde::Serialize;
use serde_json::Value;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const SCAN_TOPIC: &str = "consultease/rfid/scan";
const FACULTY_STATUS_TOPIC: &str = "consultease/faculty/+/status";

/// Payload published for every scan.
#[derive(Debug, Serialize)]
struct ScanEvent<'a> {
    rfid_uid: &'a str,
    timestamp: i64,
}

impl<'a> ScanEvent<'a> {
    /// Event for `card`, stamped with the current Unix time in seconds.
    fn now(card: &'a CardIdentifier) -> Self {
        Self {
            rfid_uid: card.as_str(),
            timestamp: Utc::now().timestamp(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();
    init_logging();
    if let Ok(path) = &dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let settings = Settings::from_env().context("invalid configuration")?;
    info!(
        broker = %settings.broker.endpoint(),
        client_id = %settings.broker.client_id,
        simulation = settings.rfid.simulation_mode,
        "Starting ConsultEase bridge"
    );

    let client = MessagingClient::new(ClientConfig::from(&settings.broker));
    client
        .register_topic_handler(FACULTY_STATUS_TOPIC, log_faculty_status)
        .await?
        .detach();

    let decoder = CardDecoder::new(DecoderConfig::from(&settings.rfid));
    let (scan_tx, scan_rx) = mpsc::unbounded_channel();
    decoder
        .register_callback(move |card: &CardIdentifier| {
            scan_tx.send(card.clone()).context("scan publisher stopped")
        })
        .detach();

    if !client.connect().await {
        warn!("Broker unavailable at startup, retrying in the background");
    }
    decoder.start();
    info!(mode = ?decoder.mode(), "Card decoder started");

    let publisher = tokio::spawn(publish_scans(client.clone(), scan_rx));
    spawn_manual_scans(decoder.clone()).context("failed to start stdin reader")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    decoder.stop().await;
    client.disconnect().await;
    publisher.abort();

    info!("ConsultEase bridge stopped");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn publish_scans(client: MessagingClient, mut scans: mpsc::UnboundedReceiver<CardIdentifier>) {
    while let Some(card) = scans.recv().await {
        let event = ScanEvent::now(&card);
        if client.publish(SCAN_TOPIC, &event).await {
            info!(card = %card, "Card scan published");
        } else {
            warn!(card = %card, "Card scan dropped");
        }
    }
}

fn log_faculty_status(topic: &str, payload: &Value) -> anyhow::Result<()> {
    let Some(status) = payload.as_object() else {
        anyhow::bail!("expected a JSON object, got {payload}");
    };
    let faculty = topic.split('/').nth(2).unwrap_or("?");
    info!(faculty, ?status, "Faculty status update");
    Ok(())
}

/// Read manual scans on a plain thread; blocking stdin must not hold up
/// runtime shutdown.
fn spawn_manual_scans(decoder: CardDecoder) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("manual-scans".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Stopped reading manual scans");
                        return;
                    }
                };

                let input = line.trim();
                let identifier = if input.is_empty() {
                    None
                } else {
                    match CardIdentifier::new(input) {
                        Ok(id) => Some(id),
                        Err(e) => {
                            warn!(error = %e, "Ignoring manual scan");
                            continue;
                        }
                    }
                };
                decoder.simulate_card_read(identifier);
            }
            debug!("Stdin closed, manual scans disabled");
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scan_event_shape() {
        let event = ScanEvent {
            rfid_uid: "04ABCDEF",
            timestamp: 1_700_000_000,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"rfid_uid": "04ABCDEF", "timestamp": 1_700_000_000})
        );
    }

    #[test]
    fn test_scan_event_is_stamped_with_current_time() {
        let card = CardIdentifier::new("04ABCDEF").unwrap();
        let before = Utc::now().timestamp();
        let event = ScanEvent::now(&card);
        let after = Utc::now().timestamp();

        assert_eq!(event.rfid_uid, "04ABCDEF");
        assert!((before..=after).contains(&event.timestamp));
    }

    #[test]
    fn test_faculty_status_requires_object() {
        assert!(log_faculty_status("consultease/faculty/3/status", &json!({"present": true})).is_ok());
        assert!(log_faculty_status("consultease/faculty/3/status", &json!("present")).is_err());
    }
}
