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

//! Client library for the HabTrack telemetry backend command interface.
//!
//! The backend process owns all APRS/Iridium telemetry acquisition, decoding,
//! and position fusion, and exposes a small fixed command table over a
//! line-delimited JSON TCP connection. This crate provides the layers for
//! talking to it:
//!
//! - **Protocol layer**: command names, request/reply wire codec
//! - **Connection layer**: async TCP with automatic reconnection, FIFO
//!   request/response matching, and address hot-reload
//! - **[`Client`] facade**: typed async methods, one per backend command
//!
//! # Quick Start
//!
//! ```no_run
//! use tracker_link::{Client, LinkConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::spawn(LinkConfig {
//!         address: "localhost:52780".to_string(),
//!         ..Default::default()
//!     });
//!
//!     match client.get_lat().await {
//!         Ok(lat) => println!("latitude: {}", lat),
//!         Err(e) => eprintln!("backend error: {}", e),
//!     }
//! }
//! ```

pub mod protocol;
pub mod tcp;

use std::time::Duration;

use thiserror::Error;

pub use protocol::{Command, ParseError, Reply};
pub use tcp::{Connection, ConnectionConfig};

/// Errors returned by backend commands.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The backend replied with an error for this command.
    #[error("backend command failed: {0}")]
    Backend(String),

    /// The reply line could not be decoded.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The connection failed mid-exchange.
    #[error("link I/O error: {0}")]
    Io(String),

    /// No connection to the backend right now.
    #[error("not connected to backend")]
    NotConnected,

    /// The link task has shut down.
    #[error("link shut down")]
    Shutdown,
}

/// Configuration for the backend link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Backend address in "host:port" format.
    pub address: String,
    /// Delay before reconnecting after disconnect.
    pub reconnect_delay: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: ConnectionConfig::default().address,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Typed client for the backend command table.
///
/// Commands are served strictly in issue order over one connection, so a
/// slow backend delays the cycle that issued the command and nothing else.
/// Every method maps a backend `err` reply to [`LinkError::Backend`] rather
/// than panicking or retrying; retry policy belongs to the caller's next
/// scheduled poll.
#[derive(Debug)]
pub struct Client {
    connection: Connection,
}

impl Client {
    /// Spawn the connection task and return the client handle.
    #[must_use]
    pub fn spawn(config: LinkConfig) -> Self {
        let connection = Connection::spawn(ConnectionConfig {
            address: config.address,
            reconnect_delay: config.reconnect_delay,
            ..Default::default()
        });

        Self { connection }
    }

    /// Latitude of the tracked object in degrees.
    pub async fn get_lat(&self) -> Result<f64, LinkError> {
        self.request_f64(Command::GetLat).await
    }

    /// Longitude of the tracked object in degrees.
    pub async fn get_long(&self) -> Result<f64, LinkError> {
        self.request_f64(Command::GetLong).await
    }

    /// Altitude of the tracked object in meters.
    pub async fn get_alt(&self) -> Result<f64, LinkError> {
        self.request_f64(Command::GetAlt).await
    }

    /// Bearing reported by the backend, if it can compute one.
    pub async fn get_heading(&self) -> Result<f64, LinkError> {
        self.request_f64(Command::GetHeading).await
    }

    /// Whether the APRS link has produced data.
    pub async fn is_aprs_active(&self) -> Result<bool, LinkError> {
        self.request_bool(Command::IsAprsActive).await
    }

    /// Whether the Iridium link has produced data.
    pub async fn is_iridium_active(&self) -> Result<bool, LinkError> {
        self.request_bool(Command::IsIridiumActive).await
    }

    /// Ordered per-instance validity flags for the APRS link.
    pub async fn get_aprs_validity(&self) -> Result<Vec<bool>, LinkError> {
        self.request_bool_seq(Command::GetAprsValidity).await
    }

    /// Ordered per-instance validity flags for the Iridium link.
    pub async fn get_iridium_validity(&self) -> Result<Vec<bool>, LinkError> {
        self.request_bool_seq(Command::GetIridiumValidity).await
    }

    /// Change the backend address (hot-reload).
    pub fn set_address(&self, address: String) {
        self.connection.set_address(address);
    }

    /// Get the current backend address.
    #[must_use]
    pub fn current_address(&self) -> String {
        self.connection.current_address()
    }

    /// Shut down the link.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }

    async fn request_f64(&self, cmd: Command) -> Result<f64, LinkError> {
        match self.connection.request(cmd).await? {
            Reply::Err(msg) => Err(LinkError::Backend(msg)),
            reply => reply.into_f64().map_err(LinkError::from),
        }
    }

    async fn request_bool(&self, cmd: Command) -> Result<bool, LinkError> {
        match self.connection.request(cmd).await? {
            Reply::Err(msg) => Err(LinkError::Backend(msg)),
            reply => reply.into_bool().map_err(LinkError::from),
        }
    }

    async fn request_bool_seq(&self, cmd: Command) -> Result<Vec<bool>, LinkError> {
        match self.connection.request(cmd).await? {
            Reply::Err(msg) => Err(LinkError::Backend(msg)),
            reply => reply.into_bool_seq().map_err(LinkError::from),
        }
    }
}
