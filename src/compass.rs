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

use eframe::egui;

/// Compass dial showing the bearing from the ground station to the balloon.
///
/// The dial is fixed: cardinal letters, long ticks on the cardinals, medium
/// ticks on the intercardinals, short ticks on the 22.5 degree points. Only
/// the needle angle is state. `set_angle` ignores non-finite input, so a
/// failed bearing computation leaves the needle where it was.
#[derive(Debug, Default)]
pub struct CompassPane {
    angle: Option<f64>,
}

impl CompassPane {
    pub fn new() -> Self {
        Self { angle: None }
    }

    /// Point the needle at a bearing in degrees (0 = north, clockwise).
    pub fn set_angle(&mut self, degrees: f64) {
        if degrees.is_finite() {
            self.angle = Some(degrees.rem_euclid(360.0));
        }
    }

    /// Current needle angle, if one has been set.
    #[allow(dead_code)]
    pub fn angle(&self) -> Option<f64> {
        self.angle
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        let side = ui.available_width().min(180.0);
        if side <= 0.0 {
            return;
        }

        let (response, painter) =
            ui.allocate_painter(egui::vec2(side, side), egui::Sense::hover());
        let rect = response.rect;
        let center = rect.center();
        let radius = side / 2.0 - 4.0;

        // Screen offset for a dial angle (degrees clockwise from north)
        let offset = |angle_deg: f32, dist: f32| -> egui::Vec2 {
            let rad = angle_deg.to_radians();
            egui::vec2(rad.sin() * dist, -rad.cos() * dist)
        };

        painter.circle_filled(center, radius, egui::Color32::from_rgb(32, 36, 40));
        painter.circle_stroke(
            center,
            radius,
            egui::Stroke::new(1.5, egui::Color32::from_rgb(90, 100, 110)),
        );

        // Tick ring: every 22.5 degrees, longer on 45s, longest on cardinals
        for i in 0..16 {
            let angle = i as f32 * 22.5;
            let len = if i % 4 == 0 {
                8.0
            } else if i % 2 == 0 {
                5.5
            } else {
                3.5
            };
            let outer = center + offset(angle, radius - 2.0);
            let inner = center + offset(angle, radius - 2.0 - len);
            painter.line_segment(
                [inner, outer],
                egui::Stroke::new(1.5, egui::Color32::from_rgb(150, 160, 170)),
            );
        }

        for (angle, letter) in [(0.0, "N"), (90.0, "E"), (180.0, "S"), (270.0, "W")] {
            painter.text(
                center + offset(angle, radius - 18.0),
                egui::Align2::CENTER_CENTER,
                letter,
                egui::FontId::proportional(13.0),
                egui::Color32::from_rgb(220, 225, 230),
            );
        }

        if let Some(angle) = self.angle {
            let angle = angle as f32;
            let tip = center + offset(angle, radius - 14.0);
            let tail = center + offset(angle + 180.0, radius - 24.0);

            painter.line_segment(
                [center, tip],
                egui::Stroke::new(2.5, egui::Color32::from_rgb(200, 60, 45)),
            );
            painter.line_segment(
                [center, tail],
                egui::Stroke::new(2.5, egui::Color32::from_rgb(70, 85, 100)),
            );

            painter.text(
                rect.center_bottom() + egui::vec2(0.0, -2.0),
                egui::Align2::CENTER_BOTTOM,
                format!("{:03.0}°", angle),
                egui::FontId::monospace(11.0),
                egui::Color32::from_rgb(150, 220, 150),
            );
        }

        painter.circle_filled(center, 3.0, egui::Color32::from_rgb(10, 10, 10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_angle_stores_normalized() {
        let mut compass = CompassPane::new();
        compass.set_angle(450.0);
        assert_eq!(compass.angle(), Some(90.0));

        compass.set_angle(-90.0);
        assert_eq!(compass.angle(), Some(270.0));
    }

    #[test]
    fn test_set_angle_ignores_non_finite() {
        let mut compass = CompassPane::new();
        compass.set_angle(123.0);

        compass.set_angle(f64::NAN);
        assert_eq!(compass.angle(), Some(123.0));

        compass.set_angle(f64::INFINITY);
        assert_eq!(compass.angle(), Some(123.0));
    }

    #[test]
    fn test_set_angle_idempotent() {
        let mut compass = CompassPane::new();
        compass.set_angle(222.5);
        compass.set_angle(222.5);
        assert_eq!(compass.angle(), Some(222.5));
    }

    #[test]
    fn test_no_angle_until_set() {
        assert_eq!(CompassPane::new().angle(), None);
    }
}
