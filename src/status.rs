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

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Diagnostic message with timestamp
#[derive(Debug, Clone)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Dashboard state shared between the pollers and the UI thread.
///
/// Mutated only inside short lock scopes; every poller writes its own
/// fields and failure in one cycle never blocks the next.
#[derive(Debug)]
pub struct SystemStatus {
    // Link indicators
    pub aprs_active: bool,
    pub iridium_active: bool,
    pub aprs_validity: Vec<bool>,
    pub iridium_validity: Vec<bool>,

    // Position display fields; None renders as absent
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub last_position_update: Option<DateTime<Utc>>,

    // Reverse-geocoded locality
    pub city: String,
    pub region: String,

    // Compass bearing to the balloon, if one has been computed
    pub bearing: Option<f64>,

    // Console area (keep last 50)
    pub diagnostics: VecDeque<DiagnosticMessage>,
    max_diagnostics: usize,
}

pub type SharedSystemStatus = Arc<Mutex<SystemStatus>>;

impl Default for SystemStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemStatus {
    pub fn new() -> Self {
        Self {
            aprs_active: false,
            iridium_active: false,
            aprs_validity: Vec::new(),
            iridium_validity: Vec::new(),

            latitude: None,
            longitude: None,
            altitude: None,
            last_position_update: None,

            city: String::new(),
            region: String::new(),

            bearing: None,

            diagnostics: VecDeque::with_capacity(50),
            max_diagnostics: 50,
        }
    }

    /// Create the shared handle used across tasks
    pub fn shared() -> SharedSystemStatus {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Record the latest validated position fields
    pub fn set_position(
        &mut self,
        latitude: Option<f64>,
        longitude: Option<f64>,
        altitude: Option<f64>,
    ) {
        self.latitude = latitude;
        self.longitude = longitude;
        self.altitude = altitude;
        self.last_position_update = Some(Utc::now());
    }

    /// Seconds since the last position poll completed
    pub fn seconds_since_update(&self) -> Option<i64> {
        self.last_position_update
            .map(|t| (Utc::now() - t).num_seconds())
    }

    /// Format a coordinate field for display, absent fields as "--"
    pub fn coordinate_text(value: Option<f64>) -> String {
        match value {
            Some(v) => format!("{:.3}", v),
            None => "--".to_string(),
        }
    }

    /// Add a diagnostic message to the console area
    pub fn add_diagnostic(&mut self, level: DiagnosticLevel, message: String) {
        let diagnostic = DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        };

        self.diagnostics.push_back(diagnostic);

        // Keep only the last N messages
        while self.diagnostics.len() > self.max_diagnostics {
            self.diagnostics.pop_front();
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_text() {
        assert_eq!(SystemStatus::coordinate_text(Some(45.6789)), "45.679");
        assert_eq!(SystemStatus::coordinate_text(None), "--");
    }

    #[test]
    fn test_diagnostics_ring_is_bounded() {
        let mut status = SystemStatus::new();
        for i in 0..60 {
            status.add_diagnostic(DiagnosticLevel::Info, format!("msg {}", i));
        }
        assert_eq!(status.diagnostics.len(), 50);
        assert_eq!(status.diagnostics.back().unwrap().message, "msg 59");
        assert_eq!(status.diagnostics.front().unwrap().message, "msg 10");
    }
}
