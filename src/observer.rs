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

//! Ground-station (observer) position resolution.
//!
//! The compass bearing is computed from the operator's own location to the
//! balloon. A manually configured station coordinate always wins; without
//! one we fall back to IP-based geolocation. Resolution happens once at
//! startup on a worker thread so a slow lookup never blocks the UI.

use log::{info, warn};

use crate::config::AppConfig;

/// Resolve the observer position: config override first, then IP lookup.
///
/// Returns `None` when nothing could be resolved; bearing updates are
/// skipped in that case.
pub fn resolve(config: &AppConfig) -> Option<(f64, f64)> {
    if let (Some(lat), Some(lon)) = (config.station_latitude, config.station_longitude) {
        if lat.is_finite() && lon.is_finite() {
            info!("Using configured station location: {}, {}", lat, lon);
            return Some((lat, lon));
        }
        warn!("Configured station location is not finite, ignoring");
    }

    ip_geolocate()
}

fn ip_geolocate() -> Option<(f64, f64)> {
    info!("Resolving station location via IP geolocation...");

    if let Some(location) = fetch_json_location("https://ipapi.co/json/", "latitude", "longitude") {
        info!("Location found via ipapi.co: {}, {}", location.0, location.1);
        return Some(location);
    }

    // Fallback service uses different field names
    if let Some(location) = fetch_json_location("http://ip-api.com/json/", "lat", "lon") {
        info!("Location found via ip-api.com: {}, {}", location.0, location.1);
        return Some(location);
    }

    warn!("Failed to resolve station location from all sources");
    None
}

fn fetch_json_location(url: &str, lat_key: &str, lon_key: &str) -> Option<(f64, f64)> {
    let response = reqwest::blocking::get(url).ok()?;
    let value: serde_json::Value = response.json().ok()?;

    let lat = value.get(lat_key)?.as_f64()?;
    let lon = value.get(lon_key)?.as_f64()?;

    (lat.is_finite() && lon.is_finite()).then_some((lat, lon))
}
