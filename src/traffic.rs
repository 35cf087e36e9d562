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

//! Live aircraft traffic overlay feed.
//!
//! Polls an OpenSky-style state-vector endpoint bounded to the current map
//! viewport and reconciles the result into a registry keyed by ICAO24
//! identifier: known aircraft are updated in place, new ones created, and
//! every identifier absent from the latest successful response is removed.
//! A failed fetch leaves the previous registry untouched.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const DEFAULT_FEED_ENDPOINT: &str = "https://opensky-network.org/api/states/all";

/// Viewport bounding box used to limit the feed query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
}

/// Latest viewport published by the map pane for the feed task.
pub type SharedViewport = Arc<Mutex<Option<BoundingBox>>>;

/// Registry shared between the feed task and the map pane.
pub type SharedTrafficRegistry = Arc<Mutex<TrafficRegistry>>;

/// One aircraft seen in the traffic feed.
#[derive(Debug, Clone)]
pub struct AircraftTrack {
    /// ICAO24-style identifier (registry key).
    pub icao24: String,
    /// Callsign, if the feed reported one.
    pub callsign: Option<String>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Barometric altitude in meters, if reported.
    pub altitude: Option<f64>,
    /// True track in degrees, if reported.
    pub heading: Option<f64>,
    /// Last time this aircraft appeared in a feed response.
    #[allow(dead_code)]
    pub last_seen: DateTime<Utc>,
    /// Number of feed responses that carried this aircraft.
    #[allow(dead_code)]
    pub sightings: u32,
}

impl AircraftTrack {
    /// Marker label: callsign (or identifier) plus altitude rounded to the
    /// nearest meter, or "N/A" when the feed has no finite altitude.
    #[must_use]
    pub fn label(&self) -> String {
        let name = self.callsign.as_deref().unwrap_or(&self.icao24);
        match self.altitude {
            Some(alt) if alt.is_finite() => format!("{} {}m", name, alt.round() as i64),
            _ => format!("{} N/A", name),
        }
    }
}

/// A validated feed record, ready for reconciliation.
#[derive(Debug, Clone)]
pub struct StateRecord {
    pub icao24: String,
    pub callsign: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub heading: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    states: Option<Vec<Vec<serde_json::Value>>>,
}

/// Parse feed state vectors, skipping records without a usable identifier
/// or finite coordinates.
///
/// State-vector layout: `[icao24, callsign, ..., longitude(5), latitude(6),
/// baro_altitude(7), ..., true_track(10), ...]`.
fn parse_states(states: &[Vec<serde_json::Value>]) -> Vec<StateRecord> {
    let mut records = Vec::new();

    for state in states {
        let icao24 = match state.first().and_then(|v| v.as_str()) {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => continue,
        };

        let longitude = state.get(5).and_then(|v| v.as_f64());
        let latitude = state.get(6).and_then(|v| v.as_f64());
        let (Some(longitude), Some(latitude)) = (longitude, latitude) else {
            continue;
        };
        if !latitude.is_finite() || !longitude.is_finite() {
            continue;
        }

        let callsign = state
            .get(1)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        records.push(StateRecord {
            icao24,
            callsign,
            latitude,
            longitude,
            altitude: state.get(7).and_then(|v| v.as_f64()),
            heading: state.get(10).and_then(|v| v.as_f64()),
        });
    }

    records
}

/// Aircraft registry whose key set always equals the identifier set of the
/// most recent successful feed response.
#[derive(Debug, Default)]
pub struct TrafficRegistry {
    aircraft: HashMap<String, AircraftTrack>,
}

impl TrafficRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a feed snapshot: update known aircraft in place, create new
    /// ones, remove everything absent from the snapshot.
    pub fn reconcile(&mut self, records: Vec<StateRecord>) {
        let now = Utc::now();
        let seen: HashSet<String> = records.iter().map(|r| r.icao24.clone()).collect();

        for record in records {
            match self.aircraft.get_mut(&record.icao24) {
                Some(track) => {
                    track.callsign = record.callsign.or(track.callsign.take());
                    track.latitude = record.latitude;
                    track.longitude = record.longitude;
                    track.altitude = record.altitude;
                    track.heading = record.heading;
                    track.last_seen = now;
                    track.sightings += 1;
                }
                None => {
                    self.aircraft.insert(
                        record.icao24.clone(),
                        AircraftTrack {
                            icao24: record.icao24,
                            callsign: record.callsign,
                            latitude: record.latitude,
                            longitude: record.longitude,
                            altitude: record.altitude,
                            heading: record.heading,
                            last_seen: now,
                            sightings: 1,
                        },
                    );
                }
            }
        }

        // Absence from the snapshot means immediate removal, no TTL
        self.aircraft.retain(|icao24, _| seen.contains(icao24));
    }

    /// All tracked aircraft.
    pub fn aircraft(&self) -> impl Iterator<Item = &AircraftTrack> {
        self.aircraft.values()
    }

    #[allow(dead_code)]
    #[must_use]
    pub fn get(&self, icao24: &str) -> Option<&AircraftTrack> {
        self.aircraft.get(icao24)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    #[allow(dead_code)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}

/// Configuration for the traffic feed task.
#[derive(Debug, Clone)]
pub struct TrafficFeedConfig {
    /// State-vector endpoint.
    pub endpoint: String,
    /// Poll interval.
    pub interval: Duration,
}

impl Default for TrafficFeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FEED_ENDPOINT.to_string(),
            interval: Duration::from_secs(10),
        }
    }
}

/// Run the traffic feed poll until cancelled.
///
/// Each cycle is self-contained: a fetch or decode failure is logged and
/// the registry is left as-is until the next successful cycle.
pub async fn run_traffic_feed(
    config: TrafficFeedConfig,
    viewport: SharedViewport,
    registry: SharedTrafficRegistry,
    cancel_token: CancellationToken,
) {
    let client = reqwest::Client::new();
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = cancel_token.cancelled() => {
                debug!("Traffic feed cancelled");
                return;
            }
        }

        let bbox = match *viewport.lock().expect("viewport lock poisoned") {
            Some(bbox) => bbox,
            None => continue, // Map has not drawn yet
        };

        match fetch_states(&client, &config.endpoint, bbox).await {
            Ok(records) => {
                let mut registry = registry.lock().expect("traffic registry lock poisoned");
                registry.reconcile(records);
                debug!("Traffic feed reconciled, {} aircraft in view", registry.len());
            }
            Err(e) => {
                warn!("Traffic feed fetch failed: {}", e);
            }
        }
    }
}

async fn fetch_states(
    client: &reqwest::Client,
    endpoint: &str,
    bbox: BoundingBox,
) -> Result<Vec<StateRecord>, reqwest::Error> {
    let url = format!(
        "{}?lamin={}&lomin={}&lamax={}&lomax={}",
        endpoint, bbox.south, bbox.west, bbox.north, bbox.east
    );

    let response: FeedResponse = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response
        .states
        .as_deref()
        .map(parse_states)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(icao24: &str, lat: f64, lon: f64) -> StateRecord {
        StateRecord {
            icao24: icao24.to_string(),
            callsign: None,
            latitude: lat,
            longitude: lon,
            altitude: Some(10000.0),
            heading: Some(90.0),
        }
    }

    #[test]
    fn test_reconcile_matches_snapshot() {
        let mut registry = TrafficRegistry::new();

        registry.reconcile(vec![record("a1", 45.0, -111.0), record("b2", 45.1, -111.1)]);
        assert_eq!(registry.len(), 2);

        registry.reconcile(vec![record("b2", 45.2, -111.2), record("c3", 45.3, -111.3)]);

        let mut keys: Vec<&str> = registry.aircraft().map(|a| a.icao24.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["b2", "c3"]);
        assert!(registry.get("a1").is_none());
    }

    #[test]
    fn test_reconcile_updates_in_place() {
        let mut registry = TrafficRegistry::new();

        registry.reconcile(vec![record("b2", 45.1, -111.1)]);
        registry.reconcile(vec![record("b2", 45.2, -111.2), record("c3", 45.3, -111.3)]);

        let b2 = registry.get("b2").unwrap();
        assert_eq!(b2.sightings, 2);
        assert_eq!(b2.latitude, 45.2);

        let c3 = registry.get("c3").unwrap();
        assert_eq!(c3.sightings, 1);
    }

    #[test]
    fn test_reconcile_empty_snapshot_clears() {
        let mut registry = TrafficRegistry::new();
        registry.reconcile(vec![record("a1", 45.0, -111.0)]);
        registry.reconcile(Vec::new());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_parse_states_skips_invalid_rows() {
        let states = vec![
            // Valid
            vec![
                json!("abc123"),
                json!("UAL123  "),
                json!("US"),
                json!(0),
                json!(0),
                json!(-111.04),
                json!(45.68),
                json!(10972.8),
                json!(false),
                json!(250.0),
                json!(271.5),
            ],
            // Missing latitude
            vec![
                json!("def456"),
                json!(""),
                json!("US"),
                json!(0),
                json!(0),
                json!(-111.0),
                json!(null),
            ],
            // Empty identifier
            vec![json!(""), json!("GHOST"), json!("US")],
            // Identifier is not a string
            vec![json!(42), json!("NUM")],
        ];

        let records = parse_states(&states);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].icao24, "abc123");
        assert_eq!(records[0].callsign.as_deref(), Some("UAL123"));
        assert_eq!(records[0].longitude, -111.04);
        assert_eq!(records[0].latitude, 45.68);
        assert_eq!(records[0].heading, Some(271.5));
    }

    #[test]
    fn test_label_formats() {
        let mut track = AircraftTrack {
            icao24: "abc123".to_string(),
            callsign: Some("UAL123".to_string()),
            latitude: 45.0,
            longitude: -111.0,
            altitude: Some(10972.6),
            heading: None,
            last_seen: Utc::now(),
            sightings: 1,
        };
        assert_eq!(track.label(), "UAL123 10973m");

        track.callsign = None;
        track.altitude = None;
        assert_eq!(track.label(), "abc123 N/A");

        track.altitude = Some(f64::NAN);
        assert_eq!(track.label(), "abc123 N/A");
    }
}
