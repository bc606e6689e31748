//! # Scan Session Management Module
//!
//! Owns the lifecycle of BLE scan sessions and the single-writer rule for
//! the peer registry. Runs in a dedicated thread with its own Tokio runtime
//! so the blocking session loop and the async scan feed never touch the UI
//! thread.
//!
//! ## Key Components
//! - `ScanManager`: processes start/stop commands and runs session loops
//! - `ScanCommand`: commands sent from the UI to the manager thread
//! - `TrackerUpdate`: status and device-list updates sent back to the UI
//!
//! ## Why
//! The registry is not thread-safe by design; confining it to one session
//! loop makes that explicit. The scan feed hands observations off through a
//! channel instead of mutating shared state, and every mutation is followed
//! by a fresh snapshot pushed to the UI.

use crate::config::Config;
use crate::registry::{DiscoveryEvent, PeerKey, PeerRegistry};
use crate::scanner;
use crossbeam_channel::{never, tick, unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub enum ScanCommand {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanStatus {
    Idle,
    Scanning,
    Failed(String),
}

/// Updates pushed to the presentation sink.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerUpdate {
    Status(ScanStatus),
    Devices(Vec<PeerKey>),
}

/// Why a session loop returned.
#[derive(Debug, PartialEq)]
enum SessionEnd {
    /// Stop command received
    Stopped,
    /// Discovery feed channel closed (scan task exited or failed)
    FeedClosed,
    /// Command channel closed (UI is gone, manager should shut down)
    CommandsClosed,
}

/// One active scan session: the registry plus the UI channel it publishes to.
///
/// The session is the registry's single writer. `handle_event` and
/// `handle_tick` are the only mutation paths, which keeps them directly
/// drivable from tests with synthetic channels and timestamps.
struct Session {
    registry: PeerRegistry,
    ui_sender: mpsc::Sender<TrackerUpdate>,
}

impl Session {
    fn new(stale_after_ms: i64, ui_sender: mpsc::Sender<TrackerUpdate>) -> Self {
        Self {
            registry: PeerRegistry::new(stale_after_ms),
            ui_sender,
        }
    }

    /// Record one discovery event and publish the updated device list.
    fn handle_event(&mut self, event: DiscoveryEvent) {
        log::debug!("Scan manager: observed {} at {}", event.key, event.at_ms);
        self.registry.observe(event.key, event.at_ms);
        self.publish_devices();
    }

    /// Timer-driven sweep. Only publishes when something was actually
    /// evicted, so a quiet tick does not churn the UI.
    fn handle_tick(&mut self, now_ms: i64) {
        let evicted = self.registry.sweep(now_ms);
        if evicted > 0 {
            log::debug!("Scan manager: sweep evicted {} stale device(s)", evicted);
            self.publish_devices();
        }
    }

    fn publish_devices(&self) {
        let _ = self
            .ui_sender
            .send(TrackerUpdate::Devices(self.registry.snapshot()));
    }
}

/// Session loop: selects over discovery events, the optional sweep tick,
/// and commands until something ends the session.
fn run_session(
    session: &mut Session,
    events: &Receiver<DiscoveryEvent>,
    sweep_tick: &Receiver<std::time::Instant>,
    commands: &Receiver<ScanCommand>,
) -> SessionEnd {
    loop {
        crossbeam_channel::select! {
            recv(events) -> msg => match msg {
                Ok(event) => session.handle_event(event),
                Err(_) => return SessionEnd::FeedClosed,
            },
            recv(sweep_tick) -> _ => {
                session.handle_tick(chrono::Utc::now().timestamp_millis());
            }
            recv(commands) -> msg => match msg {
                Ok(ScanCommand::Stop) => return SessionEnd::Stopped,
                Ok(ScanCommand::Start) => {
                    log::warn!("Scan manager: Start ignored, session already running");
                }
                Err(_) => return SessionEnd::CommandsClosed,
            },
        }
    }
}

/// Manages scan sessions for the device picker.
///
/// Runs in a dedicated thread with its own Tokio runtime to avoid blocking
/// the UI thread. Each `Start` command opens a fresh registry and scan feed;
/// `Stop` tears both down and clears the device list.
pub struct ScanManager {
    command_receiver: Receiver<ScanCommand>,
    ui_sender: mpsc::Sender<TrackerUpdate>,
    config: Config,
}

impl ScanManager {
    /// Creates a new ScanManager.
    ///
    /// Returns the manager and a sender for issuing commands from the UI thread.
    pub fn new(
        config: Config,
        ui_sender: mpsc::Sender<TrackerUpdate>,
    ) -> (Self, Sender<ScanCommand>) {
        let (command_sender, command_receiver) = unbounded();

        let manager = ScanManager {
            command_receiver,
            ui_sender,
            config,
        };

        (manager, command_sender)
    }

    /// Runs the scan management loop.
    ///
    /// This should be called in a spawned thread. It will block until the
    /// command channel is closed.
    pub fn run(self) {
        let rt = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Scan manager: failed to create async runtime: {}", e);
                let _ = self.ui_sender.send(TrackerUpdate::Status(ScanStatus::Failed(
                    format!("Failed to create async runtime: {}", e),
                )));
                return;
            }
        };

        while let Ok(command) = self.command_receiver.recv() {
            match command {
                ScanCommand::Start => {
                    log::info!("Scan manager: starting scan session");
                    if self.run_one_session(&rt) == SessionEnd::CommandsClosed {
                        return;
                    }
                }
                ScanCommand::Stop => {
                    log::debug!("Scan manager: Stop ignored, no active session");
                }
            }
        }

        log::info!("Scan manager: command channel closed, shutting down");
    }

    /// Run a single scan session to completion.
    fn run_one_session(&self, rt: &Runtime) -> SessionEnd {
        let (event_sender, event_receiver) = unbounded();
        // Each session gets its own stop flag so a stale scan task can never
        // outlive its session
        let should_stop = Arc::new(AtomicBool::new(false));

        let feed_stop = should_stop.clone();
        let feed_ui = self.ui_sender.clone();
        rt.spawn(async move {
            if let Err(e) = scanner::scan_feed(event_sender, feed_stop).await {
                log::error!("{}", e);
                let _ = feed_ui.send(TrackerUpdate::Status(ScanStatus::Failed(e.to_string())));
            }
            // Dropping the sender ends the session loop via FeedClosed
        });

        let sweep_tick = if self.config.periodic_sweep {
            tick(Duration::from_secs(self.config.sweep_interval_secs))
        } else {
            never()
        };

        let mut session = Session::new(self.config.stale_after_ms(), self.ui_sender.clone());
        let _ = self
            .ui_sender
            .send(TrackerUpdate::Status(ScanStatus::Scanning));

        let end = run_session(
            &mut session,
            &event_receiver,
            &sweep_tick,
            &self.command_receiver,
        );
        log::info!("Scan manager: session ended ({:?})", end);

        // Tear down: stop the scan feed, discard the registry, clear the UI
        should_stop.store(true, Ordering::Relaxed);
        let _ = self.ui_sender.send(TrackerUpdate::Status(ScanStatus::Idle));
        let _ = self.ui_sender.send(TrackerUpdate::Devices(Vec::new()));

        end
    }
}
