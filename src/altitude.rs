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

//! Altitude graph and bar.
//!
//! Collects the altitude samples pushed by the orchestrator on significant
//! movement and renders them as a flight profile plot, plus a vertical bar
//! indicating the current altitude against the expected flight ceiling.

use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints};

use crate::bridge::GraphSample;

const METERS_TO_FEET: f64 = 3.28084;
const MAX_ALTITUDE_FT: f64 = 110_000.0;

/// Fraction of the altitude bar filled for an altitude in meters,
/// clamped to the 0 to 110,000 ft flight ceiling.
fn bar_fraction(altitude_m: f64) -> f32 {
    if !altitude_m.is_finite() {
        return 0.0;
    }
    let altitude_ft = (altitude_m * METERS_TO_FEET).round();
    (altitude_ft.clamp(0.0, MAX_ALTITUDE_FT) / MAX_ALTITUDE_FT) as f32
}

/// Altitude graph pane fed by `GraphSample`s.
#[derive(Debug, Default)]
pub struct AltitudePane {
    samples: Vec<GraphSample>,
}

impl AltitudePane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Samples are kept for the whole session.
    pub fn push_sample(&mut self, sample: GraphSample) {
        self.samples.push(sample);
    }

    /// Most recent sample, if any.
    pub fn latest(&self) -> Option<&GraphSample> {
        self.samples.last()
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            self.draw_bar(ui);
            self.draw_graph(ui);
        });
    }

    fn draw_graph(&self, ui: &mut egui::Ui) {
        let points: PlotPoints = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| [i as f64, s.alt])
            .collect();

        let times: Vec<String> = self.samples.iter().map(|s| s.time.clone()).collect();

        Plot::new("altitude_graph")
            .height(140.0)
            .allow_drag(false)
            .allow_zoom(false)
            .allow_scroll(false)
            .x_axis_formatter(move |mark, _range| {
                let idx = mark.value.round() as usize;
                if (mark.value - idx as f64).abs() < 1e-6 {
                    times.get(idx).cloned().unwrap_or_default()
                } else {
                    String::new()
                }
            })
            .show(ui, |plot_ui| {
                plot_ui.line(
                    Line::new("altitude", points)
                        .color(egui::Color32::from_rgb(100, 200, 255))
                        .width(2.0),
                );
            });
    }

    fn draw_bar(&self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(egui::vec2(18.0, 140.0), egui::Sense::hover());
        let rect = response.rect;

        painter.rect_filled(rect, 2.0, egui::Color32::from_rgb(32, 36, 40));
        painter.rect_stroke(
            rect,
            2.0,
            egui::Stroke::new(1.0, egui::Color32::from_rgb(90, 100, 110)),
            egui::StrokeKind::Inside,
        );

        if let Some(sample) = self.latest() {
            let fraction = bar_fraction(sample.alt);
            let fill_height = rect.height() * fraction;
            let fill = egui::Rect::from_min_max(
                egui::pos2(rect.left(), rect.bottom() - fill_height),
                rect.max,
            );
            painter.rect_filled(fill, 2.0, egui::Color32::from_rgb(100, 200, 255));

            // Marker line at the current level
            let y = rect.bottom() - fill_height;
            painter.line_segment(
                [egui::pos2(rect.left(), y), egui::pos2(rect.right(), y)],
                egui::Stroke::new(2.0, egui::Color32::WHITE),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_fraction_ground() {
        assert_eq!(bar_fraction(0.0), 0.0);
        assert_eq!(bar_fraction(-50.0), 0.0);
    }

    #[test]
    fn test_bar_fraction_ceiling_clamped() {
        // 110,000 ft is 33,528 m; anything above pegs the bar
        assert_eq!(bar_fraction(33_528.0), 1.0);
        assert_eq!(bar_fraction(50_000.0), 1.0);
    }

    #[test]
    fn test_bar_fraction_midpoint() {
        // 55,000 ft in meters
        let half = 55_000.0 / METERS_TO_FEET;
        assert!((bar_fraction(half) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_bar_fraction_non_finite() {
        assert_eq!(bar_fraction(f64::NAN), 0.0);
        assert_eq!(bar_fraction(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_samples_accumulate() {
        let mut pane = AltitudePane::new();
        pane.push_sample(GraphSample {
            time: "01:02:03".to_string(),
            alt: 1200.0,
        });
        pane.push_sample(GraphSample {
            time: "01:02:09".to_string(),
            alt: 1350.0,
        });

        assert_eq!(pane.samples.len(), 2);
        assert_eq!(pane.latest().unwrap().alt, 1350.0);
    }
}
