//! # Location Relay Module
//!
//! Relays the host's own position fixes to the UI, the counterpart of the
//! BLE presence tracker. A source thread produces `LocationFix` values on a
//! channel; the relay forwards them as `LocationUpdate`s, throttled to a
//! minimum spacing so a chatty source cannot flood the UI. The relay emits
//! `Waiting` before the first fix and `Stopped` when the source closes.
//!
//! On headless hosts `SimulatedRoute` stands in for a platform fused
//! location provider: it walks a fixed loop of waypoints deterministically,
//! one fix per configured interval.

use std::fmt;
use std::sync::mpsc::{Receiver, Sender};
use std::time::Duration;

/// One position fix from the location source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Wall-clock milliseconds when the fix was produced.
    pub at_ms: i64,
}

/// Updates pushed to the UI by the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationUpdate {
    /// Relay started, no fix received yet
    Waiting,
    Fix(LocationFix),
    /// Source closed; no more fixes will arrive
    Stopped,
}

impl fmt::Display for LocationUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationUpdate::Waiting => write!(f, "Waiting for location..."),
            LocationUpdate::Fix(fix) => {
                write!(f, "Latitude: {}, Longitude: {}", fix.latitude, fix.longitude)
            }
            LocationUpdate::Stopped => write!(f, "Location updates stopped"),
        }
    }
}

/// The UI status line for a location update.
pub fn status_line(update: &LocationUpdate) -> String {
    update.to_string()
}

/// Enforces a minimum spacing between forwarded fixes.
///
/// The first fix always passes. After that a fix passes only when at least
/// `fastest_interval_ms` elapsed since the last *forwarded* fix; anything
/// sooner is dropped rather than queued.
#[derive(Debug)]
pub struct FixThrottle {
    fastest_interval_ms: i64,
    last_forwarded_ms: Option<i64>,
}

impl FixThrottle {
    pub fn new(fastest_interval_ms: i64) -> Self {
        Self {
            fastest_interval_ms,
            last_forwarded_ms: None,
        }
    }

    /// Whether this fix should be forwarded. Records it as forwarded if so.
    pub fn admit(&mut self, fix: &LocationFix) -> bool {
        match self.last_forwarded_ms {
            Some(last) if fix.at_ms - last < self.fastest_interval_ms => false,
            _ => {
                self.last_forwarded_ms = Some(fix.at_ms);
                true
            }
        }
    }
}

/// Forwards throttled fixes from a source channel to the UI.
pub struct LocationRelay {
    ui_sender: Sender<LocationUpdate>,
    throttle: FixThrottle,
}

impl LocationRelay {
    pub fn new(ui_sender: Sender<LocationUpdate>, fastest_interval_ms: i64) -> Self {
        Self {
            ui_sender,
            throttle: FixThrottle::new(fastest_interval_ms),
        }
    }

    /// Runs the relay loop.
    ///
    /// This should be called in a spawned thread. It blocks until the source
    /// channel closes, then emits `Stopped` and returns. The source hands
    /// fixes off through the channel; the relay is the only consumer.
    pub fn run(mut self, source: Receiver<LocationFix>) {
        let _ = self.ui_sender.send(LocationUpdate::Waiting);

        for fix in source.iter() {
            if self.throttle.admit(&fix) {
                if self.ui_sender.send(LocationUpdate::Fix(fix)).is_err() {
                    // UI is gone; keep draining would be pointless
                    break;
                }
            } else {
                log::debug!("Location relay: dropped fix inside throttle interval");
            }
        }

        log::info!("Location relay: source closed, shutting down");
        let _ = self.ui_sender.send(LocationUpdate::Stopped);
    }
}

/// Deterministic location source: walks a closed loop of waypoints, moving
/// one fixed fraction of a leg per emitted fix.
///
/// Stand-in for a platform fused location provider on hosts without one.
pub struct SimulatedRoute {
    waypoints: Vec<(f64, f64)>,
    /// Fraction of the current leg covered per fix, in (0, 1]
    step: f64,
    leg: usize,
    progress: f64,
}

impl SimulatedRoute {
    /// A short walking loop near the Helsinki harbor front.
    pub fn default_loop() -> Self {
        Self::new(
            vec![
                (60.1699, 24.9384),
                (60.1712, 24.9414),
                (60.1688, 24.9460),
                (60.1664, 24.9410),
            ],
            0.25,
        )
    }

    pub fn new(waypoints: Vec<(f64, f64)>, step: f64) -> Self {
        assert!(
            waypoints.len() >= 2,
            "a route needs at least two waypoints"
        );
        Self {
            waypoints,
            step,
            leg: 0,
            progress: 0.0,
        }
    }

    /// Produce the next fix along the route, stamped with `at_ms`.
    pub fn next_fix(&mut self, at_ms: i64) -> LocationFix {
        let (from_lat, from_lon) = self.waypoints[self.leg];
        let (to_lat, to_lon) = self.waypoints[(self.leg + 1) % self.waypoints.len()];

        let fix = LocationFix {
            latitude: from_lat + (to_lat - from_lat) * self.progress,
            longitude: from_lon + (to_lon - from_lon) * self.progress,
            at_ms,
        };

        self.progress += self.step;
        if self.progress >= 1.0 {
            self.progress = 0.0;
            self.leg = (self.leg + 1) % self.waypoints.len();
        }

        fix
    }

    /// Emit one fix per `interval` until the receiver side goes away.
    ///
    /// This should be called in a spawned thread.
    pub fn run(mut self, sender: Sender<LocationFix>, interval: Duration) {
        loop {
            let fix = self.next_fix(chrono::Utc::now().timestamp_millis());
            if sender.send(fix).is_err() {
                log::info!("Location source: relay gone, shutting down");
                return;
            }
            std::thread::sleep(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn fix(at_ms: i64) -> LocationFix {
        LocationFix {
            latitude: 60.0,
            longitude: 24.0,
            at_ms,
        }
    }

    #[test]
    fn test_throttle_first_fix_always_passes() {
        let mut throttle = FixThrottle::new(5_000);
        assert!(throttle.admit(&fix(0)));
    }

    #[test]
    fn test_throttle_drops_fix_inside_interval() {
        let mut throttle = FixThrottle::new(5_000);
        assert!(throttle.admit(&fix(0)));
        assert!(!throttle.admit(&fix(4_999)));
    }

    #[test]
    fn test_throttle_passes_fix_at_exact_interval() {
        let mut throttle = FixThrottle::new(5_000);
        assert!(throttle.admit(&fix(0)));
        assert!(throttle.admit(&fix(5_000)));
    }

    #[test]
    fn test_throttle_measures_from_last_forwarded_fix() {
        let mut throttle = FixThrottle::new(5_000);
        assert!(throttle.admit(&fix(0)));
        // Dropped fixes do not reset the clock
        assert!(!throttle.admit(&fix(3_000)));
        assert!(!throttle.admit(&fix(4_000)));
        assert!(throttle.admit(&fix(6_000)));
    }

    #[test]
    fn test_status_line_texts() {
        assert_eq!(
            status_line(&LocationUpdate::Waiting),
            "Waiting for location..."
        );
        let update = LocationUpdate::Fix(LocationFix {
            latitude: 60.1699,
            longitude: 24.9384,
            at_ms: 0,
        });
        assert_eq!(
            status_line(&update),
            "Latitude: 60.1699, Longitude: 24.9384"
        );
    }

    #[test]
    fn test_relay_wraps_fix_stream_in_waiting_and_stopped() {
        let (source_sender, source_receiver) = mpsc::channel();
        let (ui_sender, ui_receiver) = mpsc::channel();

        source_sender.send(fix(0)).unwrap();
        source_sender.send(fix(10_000)).unwrap();
        drop(source_sender);

        LocationRelay::new(ui_sender, 5_000).run(source_receiver);

        let updates: Vec<LocationUpdate> = ui_receiver.iter().collect();
        assert_eq!(
            updates,
            vec![
                LocationUpdate::Waiting,
                LocationUpdate::Fix(fix(0)),
                LocationUpdate::Fix(fix(10_000)),
                LocationUpdate::Stopped,
            ]
        );
    }

    #[test]
    fn test_relay_throttles_rapid_fixes() {
        let (source_sender, source_receiver) = mpsc::channel();
        let (ui_sender, ui_receiver) = mpsc::channel();

        source_sender.send(fix(0)).unwrap();
        source_sender.send(fix(1_000)).unwrap();
        source_sender.send(fix(2_000)).unwrap();
        source_sender.send(fix(5_000)).unwrap();
        drop(source_sender);

        LocationRelay::new(ui_sender, 5_000).run(source_receiver);

        let forwarded: Vec<i64> = ui_receiver
            .iter()
            .filter_map(|update| match update {
                LocationUpdate::Fix(f) => Some(f.at_ms),
                _ => None,
            })
            .collect();
        assert_eq!(forwarded, vec![0, 5_000]);
    }

    #[test]
    fn test_simulated_route_is_deterministic() {
        let mut a = SimulatedRoute::default_loop();
        let mut b = SimulatedRoute::default_loop();

        for i in 0..20 {
            assert_eq!(a.next_fix(i), b.next_fix(i));
        }
    }

    #[test]
    fn test_simulated_route_starts_at_first_waypoint() {
        let mut route = SimulatedRoute::new(vec![(1.0, 2.0), (3.0, 4.0)], 0.5);
        let first = route.next_fix(0);
        assert_eq!(first.latitude, 1.0);
        assert_eq!(first.longitude, 2.0);
    }

    #[test]
    fn test_simulated_route_interpolates_and_advances_legs() {
        let mut route = SimulatedRoute::new(vec![(0.0, 0.0), (1.0, 1.0)], 0.5);

        let start = route.next_fix(0);
        let halfway = route.next_fix(1);
        // Two-waypoint routes loop back and forth
        let back = route.next_fix(2);

        assert_eq!((start.latitude, start.longitude), (0.0, 0.0));
        assert_eq!((halfway.latitude, halfway.longitude), (0.5, 0.5));
        assert_eq!((back.latitude, back.longitude), (1.0, 1.0));
    }
}
