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

//! Application configuration management.
//!
//! Persistent TOML configuration: backend address, manually entered
//! ground-station coordinates, poll cadences, and the traffic overlay
//! settings. All telemetry settings (callsigns, modem IDs) live in the
//! backend, not here.

use serde::{Deserialize, Serialize};

/// Default address of the telemetry backend command interface
pub const DEFAULT_BACKEND_ADDRESS: &str = "localhost:52780";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Telemetry backend address in host:port format
    #[serde(default = "default_backend_address")]
    pub backend_address: String,

    /// Manually entered ground-station latitude (wins over IP geolocation)
    #[serde(default)]
    pub station_latitude: Option<f64>,

    /// Manually entered ground-station longitude
    #[serde(default)]
    pub station_longitude: Option<f64>,

    /// Initial map zoom level
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Position poll cadence in seconds
    #[serde(default = "default_position_poll_secs")]
    pub position_poll_secs: u64,

    /// Link status poll cadence in seconds
    #[serde(default = "default_status_poll_secs")]
    pub status_poll_secs: u64,

    /// Show live aircraft traffic on the map
    #[serde(default = "default_true")]
    pub traffic_enabled: bool,

    /// Traffic feed poll cadence in seconds
    #[serde(default = "default_traffic_interval_secs")]
    pub traffic_interval_secs: u64,

    /// Traffic feed endpoint override (state-vector API)
    #[serde(default)]
    pub traffic_endpoint: Option<String>,
}

// Default value functions for serde
fn default_backend_address() -> String {
    DEFAULT_BACKEND_ADDRESS.to_string()
}

fn default_zoom() -> f32 {
    4.0
}

fn default_position_poll_secs() -> u64 {
    6
}

fn default_status_poll_secs() -> u64 {
    1
}

fn default_traffic_interval_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_address: default_backend_address(),
            station_latitude: None,
            station_longitude: None,
            default_zoom: default_zoom(),
            position_poll_secs: default_position_poll_secs(),
            status_poll_secs: default_status_poll_secs(),
            traffic_enabled: true,
            traffic_interval_secs: default_traffic_interval_secs(),
            traffic_endpoint: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("habtrack-desktop", "config")
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("habtrack-desktop", "config")
    }
}
