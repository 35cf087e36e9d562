// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Polling orchestration against the telemetry backend.
//!
//! Two independent recurring tasks: the position poll (balloon coordinates,
//! map forwarding, geocoding/bearing/graph triggers) and the status poll
//! (link indicators and validity flags). The polls share nothing but the
//! dashboard state and are cancelled together at shutdown. Every cycle is
//! self-contained: a failed backend command is written to the console area
//! and the next cycle proceeds as usual.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracker_link::Client;

use crate::bridge::{GraphSample, HostBridge};
use crate::geo;
use crate::geocode::ReverseGeocoder;
use crate::status::{DiagnosticLevel, SharedSystemStatus};

const SIGNIFICANT_MOVE_DEGREES: f64 = 0.01;

/// Treat non-finite backend values as absent.
fn validate(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Forward gate for the map: all three fields finite AND altitude non-zero,
/// so an all-zero "no fix yet" reading never moves the marker.
fn forwardable(
    lat: Option<f64>,
    lng: Option<f64>,
    alt: Option<f64>,
) -> Option<(f64, f64, f64)> {
    match (lat, lng, alt) {
        (Some(lat), Some(lng), Some(alt)) if alt != 0.0 => Some((lat, lng, alt)),
        _ => None,
    }
}

/// Remembers where the last city lookup happened.
#[derive(Debug, Default)]
pub struct MovementTracker {
    last_lookup: Option<(f64, f64)>,
}

impl MovementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Significant movement: either axis moved more than the threshold
    /// since the last lookup, or there has been no lookup yet.
    pub fn is_significant(&self, lat: f64, lng: f64) -> bool {
        match self.last_lookup {
            None => true,
            Some((p_lat, p_lng)) => {
                (lat - p_lat).abs() > SIGNIFICANT_MOVE_DEGREES
                    || (lng - p_lng).abs() > SIGNIFICANT_MOVE_DEGREES
            }
        }
    }

    pub fn record(&mut self, lat: f64, lng: f64) {
        self.last_lookup = Some((lat, lng));
    }
}

/// The position poll task state.
pub struct PositionPoller {
    client: Arc<Client>,
    status: SharedSystemStatus,
    bridge: HostBridge,
    graph_tx: mpsc::UnboundedSender<GraphSample>,
    geocoder: ReverseGeocoder,
    movement: MovementTracker,
    observer: Option<(f64, f64)>,
}

impl PositionPoller {
    pub fn new(
        client: Arc<Client>,
        status: SharedSystemStatus,
        bridge: HostBridge,
        graph_tx: mpsc::UnboundedSender<GraphSample>,
        observer: Option<(f64, f64)>,
    ) -> Self {
        Self {
            client,
            status,
            bridge,
            graph_tx,
            geocoder: ReverseGeocoder::new(),
            movement: MovementTracker::new(),
            observer,
        }
    }

    /// Run until cancelled.
    pub async fn run(mut self, interval: Duration, cancel_token: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = cancel_token.cancelled() => {
                    debug!("Position poll cancelled");
                    return;
                }
            }

            self.poll_cycle().await;
        }
    }

    async fn poll_cycle(&mut self) {
        self.bridge.pump();

        let lat = self.take_field("latitude", self.client.get_lat().await);
        let lng = self.take_field("longitude", self.client.get_long().await);
        let alt = self.take_field("altitude", self.client.get_alt().await);

        {
            let mut status = self.status.lock().expect("status lock poisoned");
            status.set_position(lat, lng, alt);
        }

        if let Some((lat, lng, alt)) = forwardable(lat, lng, alt) {
            self.bridge.send_position(lat, lng, alt);
        }

        // Movement triggers need both coordinates, but not the altitude
        let (Some(lat), Some(lng)) = (lat, lng) else {
            return;
        };

        if !self.movement.is_significant(lat, lng) {
            return;
        }
        self.movement.record(lat, lng);

        if let Some(locality) = self.geocoder.lookup(lat, lng).await {
            let mut status = self.status.lock().expect("status lock poisoned");
            status.city = locality.city;
            status.region = locality.region;
        }

        if let Some((obs_lat, obs_lon)) = self.observer {
            let bearing = geo::initial_bearing(obs_lat, obs_lon, lat, lng);
            if bearing.is_finite() {
                let mut status = self.status.lock().expect("status lock poisoned");
                status.bearing = Some(bearing);
            }
        }

        if let Some(alt) = alt {
            let time = Utc::now().format("%H:%M:%S").to_string();
            let _ = self.graph_tx.send(GraphSample { time, alt });
        }
    }

    fn take_field(&self, name: &str, result: Result<f64, tracker_link::LinkError>) -> Option<f64> {
        match result {
            Ok(value) => validate(value),
            Err(e) => {
                warn!("Error getting {}: {}", name, e);
                let mut status = self.status.lock().expect("status lock poisoned");
                status.add_diagnostic(
                    DiagnosticLevel::Error,
                    format!("Error getting {}: {}", name, e),
                );
                None
            }
        }
    }
}

/// Run the link status poll until cancelled.
pub async fn run_status_poll(
    client: Arc<Client>,
    status: SharedSystemStatus,
    interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = cancel_token.cancelled() => {
                debug!("Status poll cancelled");
                return;
            }
        }

        match client.is_aprs_active().await {
            Ok(active) => {
                status.lock().expect("status lock poisoned").aprs_active = active;
            }
            Err(e) => record_status_error(&status, "APRS status", &e),
        }

        match client.is_iridium_active().await {
            Ok(active) => {
                status.lock().expect("status lock poisoned").iridium_active = active;
            }
            Err(e) => record_status_error(&status, "Iridium status", &e),
        }

        // Validity flags keep their previous value on failure
        match client.get_aprs_validity().await {
            Ok(validity) => {
                status.lock().expect("status lock poisoned").aprs_validity = validity;
            }
            Err(e) => record_status_error(&status, "APRS validity", &e),
        }

        match client.get_iridium_validity().await {
            Ok(validity) => {
                status.lock().expect("status lock poisoned").iridium_validity = validity;
            }
            Err(e) => record_status_error(&status, "Iridium validity", &e),
        }
    }
}

fn record_status_error(status: &SharedSystemStatus, what: &str, e: &tracker_link::LinkError) {
    warn!("Error checking {}: {}", what, e);
    status
        .lock()
        .expect("status lock poisoned")
        .add_diagnostic(DiagnosticLevel::Error, format!("Error checking {}: {}", what, e));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_finite() {
        assert_eq!(validate(45.5), Some(45.5));
        assert_eq!(validate(f64::NAN), None);
        assert_eq!(validate(f64::INFINITY), None);
        assert_eq!(validate(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_forwardable_requires_all_fields() {
        assert_eq!(
            forwardable(Some(10.0), Some(20.0), Some(100.0)),
            Some((10.0, 20.0, 100.0))
        );
        assert_eq!(forwardable(None, Some(20.0), Some(100.0)), None);
        assert_eq!(forwardable(Some(10.0), None, Some(100.0)), None);
        assert_eq!(forwardable(Some(10.0), Some(20.0), None), None);
    }

    #[test]
    fn test_forwardable_blocks_zero_altitude() {
        // All-zero reading means no fix yet
        assert_eq!(forwardable(Some(0.0), Some(0.0), Some(0.0)), None);
        assert_eq!(forwardable(Some(10.0), Some(20.0), Some(0.0)), None);
    }

    #[test]
    fn test_movement_first_position_is_significant() {
        let tracker = MovementTracker::new();
        assert!(tracker.is_significant(10.0, 20.0));
    }

    #[test]
    fn test_movement_threshold() {
        let mut tracker = MovementTracker::new();
        tracker.record(10.0, 20.0);

        assert!(!tracker.is_significant(10.005, 20.0));
        assert!(!tracker.is_significant(10.0, 20.01));
        assert!(tracker.is_significant(10.02, 20.0));
        assert!(tracker.is_significant(10.0, 20.011));
    }

    #[test]
    fn test_movement_reference_is_last_lookup() {
        let mut tracker = MovementTracker::new();
        tracker.record(10.0, 20.0);

        // Creeping under the threshold never re-triggers until the
        // cumulative offset from the recorded lookup exceeds it
        assert!(!tracker.is_significant(10.008, 20.0));
        assert!(tracker.is_significant(10.012, 20.0));
    }
}
