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

//! Message bridge between the host (polling orchestrator) and the map pane.
//!
//! The two sides exchange fire-and-forget tagged messages over unbounded
//! channels: `MapReady` flows map -> host exactly once, position updates flow
//! host -> map, and altitude samples flow host -> graph. Delivery is FIFO per
//! direction with no ordering guarantee across directions and no correlation
//! IDs. The bridge is a transport only; receivers validate numeric fields.

use tokio::sync::mpsc;

/// Messages from the host to the map pane.
#[derive(Debug, Clone, PartialEq)]
pub enum HostToMap {
    /// Push the tracked object's position. The map applies every update,
    /// not only the first.
    UpdatePosition { lat: f64, lng: f64, alt: f64 },
}

/// Messages from the map pane to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapToHost {
    /// The map finished initializing its layers and controls.
    MapReady,
}

/// One altitude-graph sample, keyed by UTC wall clock.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSample {
    /// Sample time formatted as `HH:MM:SS` UTC.
    pub time: String,
    /// Altitude in meters.
    pub alt: f64,
}

/// Create a connected host/map bridge pair.
pub fn channel() -> (HostBridge, MapEndpoint) {
    let (to_map_tx, to_map_rx) = mpsc::unbounded_channel();
    let (to_host_tx, to_host_rx) = mpsc::unbounded_channel();

    (
        HostBridge {
            to_map: to_map_tx,
            from_map: to_host_rx,
            map_ready: false,
            pending: None,
        },
        MapEndpoint {
            from_host: to_map_rx,
            to_host: to_host_tx,
        },
    )
}

/// Create a channel for altitude-graph samples.
pub fn graph_channel() -> (
    mpsc::UnboundedSender<GraphSample>,
    mpsc::UnboundedReceiver<GraphSample>,
) {
    mpsc::unbounded_channel()
}

/// Host side of the bridge.
///
/// Holds the most recent position while the map is still initializing and
/// flushes it when `MapReady` arrives, so a position learned before the map
/// is up is not lost.
#[derive(Debug)]
pub struct HostBridge {
    to_map: mpsc::UnboundedSender<HostToMap>,
    from_map: mpsc::UnboundedReceiver<MapToHost>,
    map_ready: bool,
    pending: Option<(f64, f64, f64)>,
}

impl HostBridge {
    /// Drain map-side notifications. On `MapReady`, flush any buffered
    /// position. Call once per host cycle before sending.
    pub fn pump(&mut self) {
        while let Ok(msg) = self.from_map.try_recv() {
            match msg {
                MapToHost::MapReady => {
                    self.map_ready = true;
                    if let Some((lat, lng, alt)) = self.pending.take() {
                        let _ = self.to_map.send(HostToMap::UpdatePosition { lat, lng, alt });
                    }
                }
            }
        }
    }

    /// Send a position to the map, or buffer it if the map is not ready yet.
    /// Only the most recent pre-ready position is kept.
    pub fn send_position(&mut self, lat: f64, lng: f64, alt: f64) {
        self.pump();
        if self.map_ready {
            let _ = self.to_map.send(HostToMap::UpdatePosition { lat, lng, alt });
        } else {
            self.pending = Some((lat, lng, alt));
        }
    }
}

/// Map side of the bridge.
#[derive(Debug)]
pub struct MapEndpoint {
    from_host: mpsc::UnboundedReceiver<HostToMap>,
    to_host: mpsc::UnboundedSender<MapToHost>,
}

impl MapEndpoint {
    /// Signal that the map finished initializing.
    pub fn mark_ready(&self) {
        let _ = self.to_host.send(MapToHost::MapReady);
    }

    /// Drain the next host message, if any.
    pub fn try_recv(&mut self) -> Option<HostToMap> {
        self.from_host.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_buffered_until_ready() {
        let (mut host, mut map) = channel();

        host.send_position(10.0, 20.0, 100.0);
        assert_eq!(map.try_recv(), None);

        // A later position replaces the buffered one
        host.send_position(11.0, 21.0, 150.0);

        map.mark_ready();
        host.pump();

        assert_eq!(
            map.try_recv(),
            Some(HostToMap::UpdatePosition {
                lat: 11.0,
                lng: 21.0,
                alt: 150.0
            })
        );
        assert_eq!(map.try_recv(), None);
    }

    #[test]
    fn test_positions_delivered_in_send_order() {
        let (mut host, mut map) = channel();
        map.mark_ready();

        host.send_position(1.0, 1.0, 10.0);
        host.send_position(2.0, 2.0, 20.0);
        host.send_position(3.0, 3.0, 30.0);

        let lats: Vec<f64> = std::iter::from_fn(|| map.try_recv())
            .map(|msg| match msg {
                HostToMap::UpdatePosition { lat, .. } => lat,
            })
            .collect();
        assert_eq!(lats, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_repeated_updates_all_delivered() {
        let (mut host, mut map) = channel();
        map.mark_ready();

        host.send_position(5.0, 6.0, 70.0);
        host.send_position(5.0, 6.0, 70.0);

        assert!(map.try_recv().is_some());
        assert!(map.try_recv().is_some());
        assert_eq!(map.try_recv(), None);
    }

    #[test]
    fn test_graph_channel_passthrough() {
        let (tx, mut rx) = graph_channel();
        tx.send(GraphSample {
            time: "12:34:56".to_string(),
            alt: 28456.0,
        })
        .unwrap();

        let sample = rx.try_recv().unwrap();
        assert_eq!(sample.time, "12:34:56");
        assert_eq!(sample.alt, 28456.0);
    }
}
