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

//! Map pane: tile layer, tracked balloon marker, and aircraft overlay.
//!
//! The balloon marker is a small state machine: `Uninitialized` until the
//! first valid position arrives over the bridge, then `Positioned` with
//! in-place updates for the rest of the session. A position only counts as
//! movement when lat/lng differ numerically from the last applied value;
//! the viewport recenters when displacement since the last centering
//! exceeds the 0.01 degree threshold in either axis.

pub mod tiles;

use eframe::egui;
use log::warn;

use crate::bridge::{HostToMap, MapEndpoint};
use crate::traffic::{BoundingBox, SharedTrafficRegistry, SharedViewport};
use tiles::{TileManager, WebMercator};

const RECENTER_THRESHOLD_DEGREES: f64 = 0.01;
const MARKER_ZOOM: f32 = 10.0;
const TILE_PIXEL_SIZE: f32 = 256.0;

/// Tracked marker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarkerState {
    Uninitialized,
    Positioned { lat: f64, lng: f64, alt: f64 },
}

/// What a position message did to the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionOutcome {
    /// Non-finite coordinates; nothing moved.
    Rejected,
    /// Same lat/lng as the last applied position.
    Unchanged,
    /// Marker moved; `recentered` says whether the viewport should follow.
    Moved { recentered: bool },
}

/// The single balloon marker and its centering memory.
#[derive(Debug)]
pub struct TrackedMarker {
    state: MarkerState,
    last_centered: Option<(f64, f64)>,
}

impl Default for TrackedMarker {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackedMarker {
    pub fn new() -> Self {
        Self {
            state: MarkerState::Uninitialized,
            last_centered: None,
        }
    }

    /// Current position, if the marker has ever been positioned.
    pub fn position(&self) -> Option<(f64, f64, f64)> {
        match self.state {
            MarkerState::Uninitialized => None,
            MarkerState::Positioned { lat, lng, alt } => Some((lat, lng, alt)),
        }
    }

    /// Apply a position message. This is the single authority for marker
    /// state transitions.
    pub fn apply(&mut self, lat: f64, lng: f64, alt: f64) -> PositionOutcome {
        if !lat.is_finite() || !lng.is_finite() {
            return PositionOutcome::Rejected;
        }

        if let MarkerState::Positioned {
            lat: last_lat,
            lng: last_lng,
            ..
        } = self.state
        {
            if lat == last_lat && lng == last_lng {
                return PositionOutcome::Unchanged;
            }
        }

        self.state = MarkerState::Positioned { lat, lng, alt };

        let recentered = match self.last_centered {
            None => true,
            Some((c_lat, c_lng)) => {
                (lat - c_lat).abs() > RECENTER_THRESHOLD_DEGREES
                    || (lng - c_lng).abs() > RECENTER_THRESHOLD_DEGREES
            }
        };

        if recentered {
            self.last_centered = Some((lat, lng));
        }

        PositionOutcome::Moved { recentered }
    }

    /// Remember the current position as the centering reference (used by
    /// the manual recenter control).
    pub fn mark_centered(&mut self) {
        if let MarkerState::Positioned { lat, lng, .. } = self.state {
            self.last_centered = Some((lat, lng));
        }
    }

    /// Marker popup text with the latest coordinates and altitude.
    pub fn label(&self) -> Option<String> {
        self.position()
            .map(|(lat, lng, alt)| format!("Balloon\n{:.3}, {:.3}\n{:.0}m", lat, lng, alt))
    }
}

/// Map pane state: viewport, tiles, balloon marker, aircraft overlay.
pub struct MapPane {
    endpoint: MapEndpoint,
    marker: TrackedMarker,
    center_lat: f64,
    center_lon: f64,
    zoom: f32,
    tile_manager: TileManager,
    tile_error: Option<String>,
    viewport: SharedViewport,
    traffic: SharedTrafficRegistry,
}

impl MapPane {
    pub fn new(
        endpoint: MapEndpoint,
        viewport: SharedViewport,
        traffic: SharedTrafficRegistry,
        default_zoom: f32,
    ) -> Self {
        let pane = Self {
            endpoint,
            marker: TrackedMarker::new(),
            center_lat: 0.0,
            center_lon: 0.0,
            zoom: default_zoom,
            tile_manager: TileManager::new(),
            tile_error: None,
            viewport,
            traffic,
        };

        // Layers and controls are up; tell the host to flush any position
        // it learned before we existed
        pane.endpoint.mark_ready();
        pane
    }

    /// Drain bridge messages. Called once per frame before drawing.
    pub fn process_messages(&mut self) {
        while let Some(msg) = self.endpoint.try_recv() {
            match msg {
                HostToMap::UpdatePosition { lat, lng, alt } => {
                    self.apply_position(lat, lng, alt);
                }
            }
        }
    }

    fn apply_position(&mut self, lat: f64, lng: f64, alt: f64) -> PositionOutcome {
        let outcome = self.marker.apply(lat, lng, alt);
        match outcome {
            PositionOutcome::Rejected => {
                warn!("Ignoring invalid balloon coordinates: {}, {}", lat, lng);
            }
            PositionOutcome::Moved { recentered: true } => {
                self.center_lat = lat;
                self.center_lon = lng;
                self.zoom = MARKER_ZOOM;
            }
            _ => {}
        }
        outcome
    }

    /// Center the viewport on the balloon. No-op until a valid position
    /// has arrived.
    pub fn recenter_on_marker(&mut self) {
        if let Some((lat, lng, _)) = self.marker.position() {
            self.center_lat = lat;
            self.center_lon = lng;
            self.zoom = self.zoom.max(MARKER_ZOOM);
            self.marker.mark_centered();
        }
    }

    pub fn has_position(&self) -> bool {
        self.marker.position().is_some()
    }

    pub fn draw(&mut self, ui: &mut egui::Ui) {
        // Allocate space for the map
        let (response, painter) = ui.allocate_painter(
            egui::vec2(ui.available_width(), ui.available_height()),
            egui::Sense::click_and_drag(),
        );

        let rect = response.rect;
        let center = rect.center();

        painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(200, 220, 240));

        // Handle pinch-zoom gesture
        let zoom_delta = ui.ctx().input(|i| i.zoom_delta());
        if (zoom_delta - 1.0).abs() > 0.001 {
            self.zoom += zoom_delta.log2();
            self.zoom = self.zoom.clamp(2.0, 18.0);
        }

        let tile_zoom = self.zoom.round() as u8;

        // Render map tiles
        let visible_tiles = self.tile_manager.get_visible_tiles(
            self.center_lat,
            self.center_lon,
            tile_zoom,
            rect.width(),
            rect.height(),
        );

        let mut tiles_rendered = 0;
        for (tile_coord, offset_x, offset_y) in visible_tiles {
            if let Some(texture) = self.tile_manager.get_tile(tile_coord, ui.ctx()) {
                let tile_rect = egui::Rect::from_min_size(
                    egui::pos2(center.x + offset_x, center.y + offset_y),
                    egui::vec2(TILE_PIXEL_SIZE, TILE_PIXEL_SIZE),
                );

                painter.image(
                    texture.id(),
                    tile_rect,
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    egui::Color32::WHITE,
                );
                tiles_rendered += 1;
            }
        }

        if self.tile_manager.get_error_count() > 0 {
            self.tile_error = Some(format!(
                "Failed to load {} tiles",
                self.tile_manager.get_error_count()
            ));
        } else if self.tile_manager.has_loading_tiles() {
            self.tile_error = Some("Loading map tiles...".to_string());
        } else if tiles_rendered > 0 {
            self.tile_error = None;
        }

        // Handle dragging with Web Mercator
        if response.dragged() {
            let delta = response.drag_delta();

            let scale = 2.0_f64.powf(self.zoom as f64);
            let lat_per_pixel = 180.0 / (TILE_PIXEL_SIZE as f64 * scale);
            let lon_per_pixel = 360.0 / (TILE_PIXEL_SIZE as f64 * scale);

            // Account for Mercator distortion away from the equator
            let cos_lat = self.center_lat.to_radians().cos();

            self.center_lat += delta.y as f64 * lat_per_pixel;
            self.center_lon -= delta.x as f64 * lon_per_pixel / cos_lat.max(0.1);

            self.center_lat = self.center_lat.clamp(-85.0, 85.0);
        }

        // Publish the viewport for the traffic feed task
        self.publish_viewport(rect);

        let center_tile_x = WebMercator::lon_to_x(self.center_lon, tile_zoom);
        let center_tile_y = WebMercator::lat_to_y(self.center_lat, tile_zoom);

        let to_screen = |lat: f64, lon: f64| -> egui::Pos2 {
            let tile_x = WebMercator::lon_to_x(lon, tile_zoom);
            let tile_y = WebMercator::lat_to_y(lat, tile_zoom);

            egui::pos2(
                center.x + ((tile_x - center_tile_x) * TILE_PIXEL_SIZE as f64) as f32,
                center.y + ((tile_y - center_tile_y) * TILE_PIXEL_SIZE as f64) as f32,
            )
        };

        self.draw_aircraft(&painter, rect, &to_screen);
        self.draw_balloon(&painter, rect, &to_screen);

        // Attribution (required by OSM)
        painter.text(
            rect.right_bottom() + egui::vec2(-10.0, -10.0),
            egui::Align2::RIGHT_BOTTOM,
            "© OpenStreetMap contributors",
            egui::FontId::proportional(10.0),
            egui::Color32::from_black_alpha(180),
        );

        // Error display at the top
        if let Some(ref error_msg) = self.tile_error {
            let is_error = error_msg.contains("Failed");
            let bg_color = if is_error {
                egui::Color32::from_rgb(220, 50, 50)
            } else {
                egui::Color32::from_rgb(255, 200, 100)
            };

            let error_pos = rect.center_top() + egui::vec2(0.0, 20.0);
            let text_galley = painter.layout_no_wrap(
                error_msg.clone(),
                egui::FontId::proportional(12.0),
                egui::Color32::WHITE,
            );

            let padding = egui::vec2(12.0, 6.0);
            let bubble_rect =
                egui::Rect::from_center_size(error_pos, text_galley.size() + padding * 2.0);

            painter.rect_filled(bubble_rect, 5.0, bg_color);
            painter.text(
                error_pos,
                egui::Align2::CENTER_CENTER,
                error_msg,
                egui::FontId::proportional(12.0),
                egui::Color32::WHITE,
            );
        }
    }

    fn publish_viewport(&self, rect: egui::Rect) {
        let tile_zoom = self.zoom.round() as u8;
        let center_x = WebMercator::lon_to_x(self.center_lon, tile_zoom);
        let center_y = WebMercator::lat_to_y(self.center_lat, tile_zoom);

        let half_w = (rect.width() / 2.0 / TILE_PIXEL_SIZE) as f64;
        let half_h = (rect.height() / 2.0 / TILE_PIXEL_SIZE) as f64;

        let bbox = BoundingBox {
            south: WebMercator::tile_to_lat(center_y + half_h, tile_zoom),
            north: WebMercator::tile_to_lat(center_y - half_h, tile_zoom),
            west: WebMercator::tile_to_lon(center_x - half_w, tile_zoom),
            east: WebMercator::tile_to_lon(center_x + half_w, tile_zoom),
        };

        *self.viewport.lock().expect("viewport lock poisoned") = Some(bbox);
    }

    fn draw_aircraft(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        to_screen: &dyn Fn(f64, f64) -> egui::Pos2,
    ) {
        // Clone out of the registry with one short lock
        let aircraft: Vec<crate::traffic::AircraftTrack> = {
            let registry = self.traffic.lock().expect("traffic registry lock poisoned");
            registry.aircraft().cloned().collect()
        };

        for track in &aircraft {
            let pos = to_screen(track.latitude, track.longitude);
            if !rect.contains(pos) {
                continue;
            }

            let color = egui::Color32::from_rgb(120, 220, 120);
            painter.circle_filled(pos, 4.0, color);

            // Orient by heading when the feed reports one
            if let Some(heading) = track.heading {
                let angle = heading.to_radians();
                let dx = angle.sin() as f32 * 12.0;
                let dy = -angle.cos() as f32 * 12.0;
                painter.line_segment(
                    [pos, pos + egui::vec2(dx, dy)],
                    egui::Stroke::new(2.0, color),
                );
            }

            draw_label_box(
                painter,
                pos + egui::vec2(8.0, -8.0),
                &track.label(),
                egui::FontId::proportional(10.0),
                egui::Color32::WHITE,
            );
        }
    }

    fn draw_balloon(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        to_screen: &dyn Fn(f64, f64) -> egui::Pos2,
    ) {
        let Some((lat, lng, _)) = self.marker.position() else {
            return;
        };

        let pos = to_screen(lat, lng);
        if !rect.contains(pos) {
            return;
        }

        painter.circle_filled(pos, 7.0, egui::Color32::from_rgb(220, 60, 50));
        painter.circle_stroke(
            pos,
            7.0,
            egui::Stroke::new(2.0, egui::Color32::from_rgb(140, 20, 15)),
        );

        if let Some(label) = self.marker.label() {
            draw_label_box(
                painter,
                pos + egui::vec2(12.0, -10.0),
                &label,
                egui::FontId::proportional(11.0),
                egui::Color32::WHITE,
            );
        }
    }
}

fn draw_label_box(
    painter: &egui::Painter,
    pos: egui::Pos2,
    text: &str,
    font: egui::FontId,
    color: egui::Color32,
) {
    let galley = painter.layout_no_wrap(text.to_string(), font.clone(), color);

    let padding = egui::vec2(3.0, 2.0);
    let box_rect = egui::Rect::from_min_size(
        pos - egui::vec2(padding.x, galley.size().y / 2.0 + padding.y),
        galley.size() + padding * 2.0,
    );
    painter.rect_filled(
        box_rect,
        2.0,
        egui::Color32::from_rgba_unmultiplied(0, 0, 0, 180),
    );

    painter.text(pos, egui::Align2::LEFT_CENTER, text, font, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_starts_uninitialized() {
        let marker = TrackedMarker::new();
        assert_eq!(marker.position(), None);
        assert_eq!(marker.label(), None);
    }

    #[test]
    fn test_first_position_recenters() {
        let mut marker = TrackedMarker::new();
        let outcome = marker.apply(10.0, 20.0, 100.0);
        assert_eq!(outcome, PositionOutcome::Moved { recentered: true });
        assert_eq!(marker.position(), Some((10.0, 20.0, 100.0)));
    }

    #[test]
    fn test_identical_position_is_unchanged() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);

        let outcome = marker.apply(10.0, 20.0, 100.0);
        assert_eq!(outcome, PositionOutcome::Unchanged);
        assert_eq!(marker.position(), Some((10.0, 20.0, 100.0)));
    }

    #[test]
    fn test_large_displacement_recenters() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);

        // 0.02 degrees exceeds the 0.01 threshold
        let outcome = marker.apply(10.02, 20.0, 100.0);
        assert_eq!(outcome, PositionOutcome::Moved { recentered: true });
    }

    #[test]
    fn test_small_displacement_moves_without_recenter() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);

        let outcome = marker.apply(10.005, 20.0, 100.0);
        assert_eq!(outcome, PositionOutcome::Moved { recentered: false });
        assert_eq!(marker.position(), Some((10.005, 20.0, 100.0)));
    }

    #[test]
    fn test_displacement_accumulates_toward_recenter() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);

        // Each step is under the threshold, but displacement is measured
        // from the last centering, not the last position
        assert_eq!(
            marker.apply(10.006, 20.0, 100.0),
            PositionOutcome::Moved { recentered: false }
        );
        assert_eq!(
            marker.apply(10.011, 20.0, 100.0),
            PositionOutcome::Moved { recentered: true }
        );
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);

        assert_eq!(marker.apply(f64::NAN, 20.0, 100.0), PositionOutcome::Rejected);
        assert_eq!(
            marker.apply(10.0, f64::INFINITY, 100.0),
            PositionOutcome::Rejected
        );
        assert_eq!(marker.position(), Some((10.0, 20.0, 100.0)));
    }

    #[test]
    fn test_label_carries_latest_altitude() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);
        marker.apply(10.1, 20.0, 28456.0);
        assert_eq!(marker.label().unwrap(), "Balloon\n10.100, 20.000\n28456m");
    }

    #[test]
    fn test_mark_centered_resets_reference() {
        let mut marker = TrackedMarker::new();
        marker.apply(10.0, 20.0, 100.0);
        marker.apply(10.005, 20.0, 100.0);
        marker.mark_centered();

        // Now displacement is measured from 10.005
        assert_eq!(
            marker.apply(10.011, 20.0, 100.0),
            PositionOutcome::Moved { recentered: false }
        );
    }
}
