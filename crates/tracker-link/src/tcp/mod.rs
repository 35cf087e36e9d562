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

//! Async TCP connection layer with automatic reconnection.
//!
//! Maintains a persistent connection to the telemetry backend and carries
//! request/response command exchanges over it. Requests are served one at a
//! time in arrival order, which preserves the protocol's FIFO reply
//! matching. Supports address hot-reload and graceful shutdown.

use std::time::Duration;

use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::protocol::{self, Command, Reply};
use crate::LinkError;

/// Configuration for the backend connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Backend address in "host:port" format.
    pub address: String,
    /// Delay before reconnecting after disconnect.
    pub reconnect_delay: Duration,
    /// Channel buffer size for queued requests.
    pub buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "localhost:52780".to_string(),
            reconnect_delay: Duration::from_secs(5),
            buffer_size: 32,
        }
    }
}

struct PendingRequest {
    cmd: Command,
    respond_to: oneshot::Sender<Result<Reply, LinkError>>,
}

impl PendingRequest {
    fn respond(self, result: Result<Reply, LinkError>) {
        // Caller may have given up waiting; nothing to do then
        let _ = self.respond_to.send(result);
    }
}

/// Handle to a managed backend connection.
///
/// The connection runs in a background task and automatically reconnects
/// on disconnect. Use `request()` to issue a command, `set_address()` to
/// change the backend address at runtime, and `shutdown()` to stop.
pub struct Connection {
    request_tx: mpsc::Sender<PendingRequest>,
    address_tx: watch::Sender<String>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Spawn a new connection task with the given configuration.
    #[must_use]
    pub fn spawn(config: ConnectionConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel(config.buffer_size);
        let (address_tx, address_rx) = watch::channel(config.address.clone());
        let cancel_token = CancellationToken::new();

        let task_cancel = cancel_token.clone();
        let reconnect_delay = config.reconnect_delay;

        tokio::spawn(async move {
            connection_loop(request_rx, address_rx, task_cancel, reconnect_delay).await;
        });

        Self {
            request_tx,
            address_tx,
            cancel_token,
        }
    }

    /// Issue a command and await its reply.
    pub async fn request(&self, cmd: Command) -> Result<Reply, LinkError> {
        let (respond_to, reply_rx) = oneshot::channel();
        self.request_tx
            .send(PendingRequest { cmd, respond_to })
            .await
            .map_err(|_| LinkError::Shutdown)?;

        reply_rx.await.map_err(|_| LinkError::Shutdown)?
    }

    /// Change the backend address.
    ///
    /// The connection will disconnect and reconnect to the new address.
    pub fn set_address(&self, address: String) {
        let _ = self.address_tx.send(address);
    }

    /// Get the current backend address.
    #[must_use]
    pub fn current_address(&self) -> String {
        self.address_tx.borrow().clone()
    }

    /// Shut down the connection.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

enum ServeEnd {
    AddressChanged,
    ConnectionClosed,
    Cancelled,
    Io(String),
}

async fn connection_loop(
    mut request_rx: mpsc::Receiver<PendingRequest>,
    mut address_rx: watch::Receiver<String>,
    cancel_token: CancellationToken,
    reconnect_delay: Duration,
) {
    loop {
        if cancel_token.is_cancelled() {
            info!("Backend link cancelled");
            return;
        }

        let current_address = address_rx.borrow_and_update().clone();
        info!("Connecting to backend at {}...", current_address);

        match TcpStream::connect(&current_address).await {
            Ok(stream) => {
                info!("Connected to backend at {}", current_address);
                match serve_requests(stream, &mut request_rx, &mut address_rx, &cancel_token).await
                {
                    ServeEnd::AddressChanged => {
                        info!("Backend address changed, reconnecting immediately...");
                        continue;
                    }
                    ServeEnd::ConnectionClosed => {
                        info!("Backend closed the connection");
                    }
                    ServeEnd::Cancelled => {
                        info!("Backend link cancelled");
                        return;
                    }
                    ServeEnd::Io(e) => {
                        error!("Backend link error: {}", e);
                    }
                }
            }
            Err(e) => {
                error!("Failed to connect to backend: {}", e);
            }
        }

        warn!("Reconnecting in {} seconds...", reconnect_delay.as_secs());

        // Requests issued while disconnected fail fast instead of piling up
        let delay = sleep(reconnect_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                () = &mut delay => break,
                maybe_request = request_rx.recv() => {
                    match maybe_request {
                        Some(request) => request.respond(Err(LinkError::NotConnected)),
                        None => return,
                    }
                }
                () = cancel_token.cancelled() => {
                    info!("Backend link cancelled during reconnect delay");
                    return;
                }
            }
        }
    }
}

async fn serve_requests(
    stream: TcpStream,
    request_rx: &mut mpsc::Receiver<PendingRequest>,
    address_rx: &mut watch::Receiver<String>,
    cancel_token: &CancellationToken,
) -> ServeEnd {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            maybe_request = request_rx.recv() => {
                let Some(request) = maybe_request else {
                    return ServeEnd::Cancelled;
                };

                let mut line = protocol::encode_request(request.cmd);
                line.push('\n');

                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    request.respond(Err(LinkError::Io(e.to_string())));
                    return ServeEnd::Io(e.to_string());
                }

                match lines.next_line().await {
                    Ok(Some(reply_line)) => {
                        let result = protocol::decode_reply(&reply_line).map_err(LinkError::from);
                        request.respond(result);
                    }
                    Ok(None) => {
                        request.respond(Err(LinkError::Io("connection closed".to_string())));
                        return ServeEnd::ConnectionClosed;
                    }
                    Err(e) => {
                        request.respond(Err(LinkError::Io(e.to_string())));
                        return ServeEnd::Io(e.to_string());
                    }
                }
            }

            result = address_rx.changed() => {
                if result.is_err() {
                    return ServeEnd::Cancelled;
                }
                return ServeEnd::AddressChanged;
            }

            () = cancel_token.cancelled() => {
                return ServeEnd::Cancelled;
            }
        }
    }
}
