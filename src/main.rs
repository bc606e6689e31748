mod config;
mod error;
mod location;
mod registry;
mod scanner;
mod tracker;

use config::Config;
use location::{LocationRelay, LocationUpdate, SimulatedRoute};
use registry::PeerKey;
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracker::{ScanCommand, ScanManager, ScanStatus, TrackerUpdate};

fn print_devices(devices: &[PeerKey]) {
    println!("Nearby devices ({}):", devices.len());
    for (index, device) in devices.iter().enumerate() {
        println!("  {}. {}", index + 1, device);
    }
}

fn print_status(status: &ScanStatus) {
    match status {
        ScanStatus::Idle => println!("Scan stopped."),
        ScanStatus::Scanning => println!("Scanning for BLE devices..."),
        ScanStatus::Failed(reason) => println!("Scan failed: {}", reason),
    }
}

/// Drain both update channels without blocking. Returns false once the scan
/// manager reports Idle after a stop was requested.
fn drain_updates(
    tracker_receiver: &mpsc::Receiver<TrackerUpdate>,
    location_receiver: &mpsc::Receiver<LocationUpdate>,
    stop_requested: bool,
) -> bool {
    while let Ok(update) = tracker_receiver.try_recv() {
        match update {
            TrackerUpdate::Devices(devices) => print_devices(&devices),
            TrackerUpdate::Status(status) => {
                print_status(&status);
                if stop_requested && status == ScanStatus::Idle {
                    return false;
                }
            }
        }
    }

    while let Ok(update) = location_receiver.try_recv() {
        println!("{}", location::status_line(&update));
    }

    true
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }
    };

    // Optional first argument: session duration in seconds. No argument
    // means scan until interrupted.
    let session_duration = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<u64>().ok())
        .map(Duration::from_secs);

    // Channels between the worker threads and the render loop
    let (tracker_sender, tracker_receiver) = mpsc::channel::<TrackerUpdate>();
    let (location_sender, location_receiver) = mpsc::channel::<LocationUpdate>();

    let (manager, command_sender) = ScanManager::new(config.clone(), tracker_sender);
    std::thread::spawn(move || {
        manager.run();
    });

    if config.location_enabled {
        let (fix_sender, fix_receiver) = mpsc::channel();
        let relay = LocationRelay::new(
            location_sender,
            config.location_fastest_secs as i64 * 1_000,
        );
        std::thread::spawn(move || {
            relay.run(fix_receiver);
        });

        let interval = Duration::from_secs(config.location_interval_secs);
        std::thread::spawn(move || {
            SimulatedRoute::default_loop().run(fix_sender, interval);
        });
    } else {
        // Keep the receiver valid with no senders; try_recv just reports empty
        drop(location_sender);
    }

    if command_sender.send(ScanCommand::Start).is_err() {
        log::error!("Scan manager is gone, exiting");
        return;
    }

    let deadline = session_duration.map(|duration| Instant::now() + duration);
    let mut stop_requested = false;

    loop {
        if !drain_updates(&tracker_receiver, &location_receiver, stop_requested) {
            break;
        }

        if let Some(deadline) = deadline {
            if !stop_requested && Instant::now() >= deadline {
                log::info!("Session duration elapsed, stopping scan");
                if command_sender.send(ScanCommand::Stop).is_err() {
                    break;
                }
                stop_requested = true;
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }
}
