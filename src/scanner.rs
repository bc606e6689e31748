//! # BLE Scanner Module
//!
//! Discovery source for the peer registry. Subscribes to the Bluetooth
//! central's event stream for the duration of a scan session and forwards
//! one `DiscoveryEvent` per discovered or updated peripheral to the scan
//! manager over a channel. The scanner owns no registry state; it is purely
//! the event producer, and the session loop is the only registry writer.
//!
//! Devices that advertise no local name are reported as "Unknown Device",
//! matching what the device picker shows for them.

use crate::error::ScanError;
use crate::registry::{DiscoveryEvent, PeerKey};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use crossbeam_channel::Sender;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Display name for peripherals that advertise no local name
const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// How often the feed loop checks the stop flag while the air is quiet
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn display_name(local_name: Option<String>) -> String {
    match local_name {
        Some(name) if !name.is_empty() => name,
        _ => UNKNOWN_DEVICE_NAME.to_string(),
    }
}

/// Resolve a central event's peripheral id to a peer key.
///
/// Returns `None` when the peripheral vanished between the event and the
/// lookup, which happens routinely near the edge of radio range.
async fn peer_key_for(central: &Adapter, id: &PeripheralId) -> Option<PeerKey> {
    let peripheral = central.peripheral(id).await.ok()?;
    let address = peripheral.address().to_string();
    let local_name = peripheral
        .properties()
        .await
        .ok()
        .flatten()
        .and_then(|props| props.local_name);
    Some(PeerKey::new(display_name(local_name), address))
}

/// Run a scan and feed discovery events into `events` until the stop flag
/// is raised or the event stream ends.
///
/// Each `DeviceDiscovered`/`DeviceUpdated` event becomes one `DiscoveryEvent`
/// stamped with the wall-clock time it was seen. The receiver side decides
/// what a repeat sighting means; no deduplication happens here.
pub async fn scan_feed(
    events: Sender<DiscoveryEvent>,
    should_stop: Arc<AtomicBool>,
) -> Result<(), ScanError> {
    let manager = Manager::new()
        .await
        .map_err(|e| ScanError::ManagerInit(e.to_string()))?;

    let adapters = manager
        .adapters()
        .await
        .map_err(|e| ScanError::ManagerInit(e.to_string()))?;

    let central = adapters.into_iter().next().ok_or(ScanError::NoAdapters)?;

    // Subscribe before starting the scan so no early advertisement is missed
    let mut central_events = central
        .events()
        .await
        .map_err(|e| ScanError::ScanFailed(e.to_string()))?;

    central
        .start_scan(ScanFilter::default())
        .await
        .map_err(|e| ScanError::ScanFailed(e.to_string()))?;

    log::info!("Scanner: scan started");

    loop {
        tokio::select! {
            maybe_event = central_events.next() => {
                match maybe_event {
                    Some(CentralEvent::DeviceDiscovered(id))
                    | Some(CentralEvent::DeviceUpdated(id)) => {
                        if let Some(key) = peer_key_for(&central, &id).await {
                            let event = DiscoveryEvent {
                                key,
                                at_ms: chrono::Utc::now().timestamp_millis(),
                            };
                            if events.send(event).is_err() {
                                // Session loop is gone; nothing left to feed
                                break;
                            }
                        }
                    }
                    Some(_) => {}
                    None => {
                        log::warn!("Scanner: central event stream ended");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep(STOP_POLL_INTERVAL) => {}
        }

        if should_stop.load(Ordering::Relaxed) {
            log::debug!("Scanner: stop flag raised");
            break;
        }
    }

    central
        .stop_scan()
        .await
        .map_err(|e| ScanError::ScanFailed(e.to_string()))?;

    log::info!("Scanner: scan stopped");
    Ok(())
}
