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

//! Reverse geocoding for the tracked object's position.
//!
//! Resolves a city/region label from a Nominatim-style endpoint. Calls are
//! rate limited to one per window; extra triggers inside the window are
//! dropped silently. A failed fetch falls back to the "Location, Unknown"
//! placeholder instead of surfacing an error.

use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Deserialize;

const GEOCODE_ENDPOINT: &str = "https://nominatim.openstreetmap.org/reverse";
const GEOCODE_RATE_LIMIT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "habtrack-desktop/0.1";

/// City/region pair shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locality {
    pub city: String,
    pub region: String,
}

impl Locality {
    /// Placeholder used when the lookup fails.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            city: "Location".to_string(),
            region: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    hamlet: Option<String>,
    state: Option<String>,
    province: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: Option<Address>,
}

fn resolve_locality(address: &Address) -> Locality {
    let city = address
        .city
        .as_deref()
        .or(address.town.as_deref())
        .or(address.village.as_deref())
        .or(address.hamlet.as_deref())
        .unwrap_or("Unknown");

    let region = address
        .state
        .as_deref()
        .or(address.province.as_deref())
        .or(address.region.as_deref())
        .unwrap_or("");

    Locality {
        city: city.to_string(),
        region: region.to_string(),
    }
}

/// Minimum-interval rate limiter on a monotonic clock.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Returns true and arms the window if a call is allowed now.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

/// Reverse geocoding client with the fixed rate-limit window.
#[derive(Debug)]
pub struct ReverseGeocoder {
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl Default for ReverseGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseGeocoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            limiter: RateLimiter::new(GEOCODE_RATE_LIMIT),
        }
    }

    /// Look up the locality for a coordinate.
    ///
    /// Returns `None` when the call is dropped by the rate limiter, the
    /// placeholder on any fetch/parse failure, and the resolved locality
    /// otherwise.
    pub async fn lookup(&mut self, lat: f64, lon: f64) -> Option<Locality> {
        if !self.limiter.try_acquire() {
            debug!("Geocode trigger dropped (rate limit window)");
            return None;
        }

        Some(self.fetch(lat, lon).await.unwrap_or_else(|e| {
            warn!("Reverse geocoding failed: {}", e);
            Locality::unknown()
        }))
    }

    async fn fetch(&self, lat: f64, lon: f64) -> Result<Locality, reqwest::Error> {
        let url = format!(
            "{}?format=json&lat={}&lon={}&zoom=10&addressdetails=1",
            GEOCODE_ENDPOINT, lat, lon
        );

        let response: NominatimResponse = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let locality = response
            .address
            .as_ref()
            .map(resolve_locality)
            .unwrap_or_else(Locality::unknown);

        debug!("Resolved location: {}, {}", locality.city, locality.region);
        Ok(locality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_first_call_allowed() {
        let mut limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.try_acquire_at(Instant::now()));
    }

    #[test]
    fn test_rate_limiter_drops_second_within_window() {
        let mut limiter = RateLimiter::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(3)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(9)));
    }

    #[test]
    fn test_rate_limiter_allows_after_window() {
        let mut limiter = RateLimiter::new(Duration::from_secs(10));
        let t0 = Instant::now();

        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(10)));
        // New window armed from the second call
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(15)));
    }

    #[test]
    fn test_locality_fallback_chain() {
        let address = Address {
            town: Some("Bozeman".to_string()),
            province: Some("Montana".to_string()),
            ..Default::default()
        };
        let locality = resolve_locality(&address);
        assert_eq!(locality.city, "Bozeman");
        assert_eq!(locality.region, "Montana");
    }

    #[test]
    fn test_locality_city_wins_over_town() {
        let address = Address {
            city: Some("Helena".to_string()),
            town: Some("East Helena".to_string()),
            state: Some("Montana".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_locality(&address).city, "Helena");
    }

    #[test]
    fn test_locality_empty_address() {
        let locality = resolve_locality(&Address::default());
        assert_eq!(locality.city, "Unknown");
        assert_eq!(locality.region, "");
    }
}
