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

/// Calculate the great-circle initial bearing from point 1 to point 2 in
/// degrees (0-360, north = 0, increasing clockwise).
///
/// Non-finite input propagates as NaN; callers skip the compass update in
/// that case.
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let x = delta_lon.sin() * lat2_rad.cos();
    let y = lat1_rad.cos() * lat2_rad.sin()
        - lat1_rad.sin() * lat2_rad.cos() * delta_lon.cos();

    let bearing = x.atan2(y).to_degrees();
    (bearing + 360.0) % 360.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearing_due_east() {
        let bearing = initial_bearing(0.0, 0.0, 0.0, 90.0);
        assert!((bearing - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_due_north() {
        let bearing = initial_bearing(0.0, 0.0, 90.0, 0.0);
        assert!(bearing.abs() < 1e-9);
    }

    #[test]
    fn test_bearing_range() {
        // Sweep a grid of point pairs; result must stay in [0, 360)
        for lat1 in [-80.0, -45.0, 0.0, 45.0, 80.0] {
            for lon1 in [-170.0, -90.0, 0.0, 90.0, 170.0] {
                for (lat2, lon2) in [(12.5, -37.0), (-60.0, 140.0), (89.0, 1.0)] {
                    let bearing = initial_bearing(lat1, lon1, lat2, lon2);
                    assert!(
                        (0.0..360.0).contains(&bearing),
                        "bearing {} out of range for ({},{}) -> ({},{})",
                        bearing, lat1, lon1, lat2, lon2
                    );
                }
            }
        }
    }

    #[test]
    fn test_bearing_westward_wraps_positive() {
        // Due west is 270, not -90
        let bearing = initial_bearing(0.0, 0.0, 0.0, -90.0);
        assert!((bearing - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_bearing_zero_distance() {
        // Same point: atan2(0, 0) is defined as 0 in IEEE, so either 0 or
        // NaN is acceptable to callers; it must not panic
        let bearing = initial_bearing(45.0, -111.0, 45.0, -111.0);
        assert!(bearing.is_nan() || (0.0..360.0).contains(&bearing));
    }

    #[test]
    fn test_bearing_nan_input() {
        assert!(initial_bearing(f64::NAN, 0.0, 10.0, 20.0).is_nan());
    }
}
