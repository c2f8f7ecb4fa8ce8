//! Alignment helpers for time series that do not share a time grid.
//!
//! Points are `(epoch seconds, value)` pairs with strictly increasing
//! timestamps, as returned by the API.

/// Piecewise-linear interpolation at `x`, extrapolating with the first/last
/// segment's slope outside the sampled range (not clamped).
pub fn interp_points(points: &[(f64, f64)], x: f64) -> Option<f64> {
    match points {
        [] => None,
        [(_, y)] => Some(*y),
        _ => {
            let segment = points
                .windows(2)
                .find(|w| x <= w[1].0)
                .unwrap_or(&points[points.len() - 2..]);
            let (x0, y0) = segment[0];
            let (x1, y1) = segment[1];
            if (x1 - x0).abs() < f64::EPSILON {
                return Some(y0);
            }
            Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
        }
    }
}

/// Restrict a polyline to `[start, end]`, interpolating a point at each
/// boundary a segment crosses so the drawn line reaches the window edge.
pub fn clip_to_window(points: &[(f64, f64)], start: f64, end: f64) -> Vec<(f64, f64)> {
    if start >= end {
        return Vec::new();
    }
    match points {
        [] => Vec::new(),
        [p] => {
            if p.0 >= start && p.0 <= end {
                vec![*p]
            } else {
                Vec::new()
            }
        }
        _ => {
            let mut out: Vec<(f64, f64)> = Vec::new();
            for w in points.windows(2) {
                let (x0, x1) = (w[0].0, w[1].0);
                if x1 < start || x0 > end {
                    continue;
                }
                let a = x0.max(start);
                let b = x1.min(end);
                for x in [a, b] {
                    let is_new = out
                        .last()
                        .is_none_or(|last| (last.0 - x).abs() > f64::EPSILON);
                    if is_new {
                        let y = interp_points(points, x).unwrap_or(w[0].1);
                        out.push((x, y));
                    }
                }
            }
            out
        }
    }
}

/// Direction glyph chosen from eight 45-degree-wide compass sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassGlyph {
    Up,
    NorthEast,
    Right,
    SouthEast,
    Down,
    SouthWest,
    Left,
    NorthWest,
}

impl CompassGlyph {
    pub const ALL: [CompassGlyph; 8] = [
        CompassGlyph::Up,
        CompassGlyph::NorthEast,
        CompassGlyph::Right,
        CompassGlyph::SouthEast,
        CompassGlyph::Down,
        CompassGlyph::SouthWest,
        CompassGlyph::Left,
        CompassGlyph::NorthWest,
    ];

    pub fn anchor_degrees(self) -> f64 {
        match self {
            CompassGlyph::Up => 0.0,
            CompassGlyph::NorthEast => 45.0,
            CompassGlyph::Right => 90.0,
            CompassGlyph::SouthEast => 135.0,
            CompassGlyph::Down => 180.0,
            CompassGlyph::SouthWest => 225.0,
            CompassGlyph::Left => 270.0,
            CompassGlyph::NorthWest => 315.0,
        }
    }

    /// Nearest anchor by angular distance with the input reduced mod 360;
    /// ties at sector boundaries go to the earlier anchor in compass order.
    pub fn from_degrees(degrees: f64) -> Self {
        let angle = degrees.rem_euclid(360.0);
        let mut best = CompassGlyph::Up;
        let mut best_distance = f64::INFINITY;
        for glyph in Self::ALL {
            let diff = (angle - glyph.anchor_degrees()).abs();
            let distance = diff.min(360.0 - diff);
            if distance < best_distance {
                best = glyph;
                best_distance = distance;
            }
        }
        best
    }

    pub fn name(self) -> &'static str {
        match self {
            CompassGlyph::Up => "uparrow",
            CompassGlyph::NorthEast => "nearrow",
            CompassGlyph::Right => "rightarrow",
            CompassGlyph::SouthEast => "searrow",
            CompassGlyph::Down => "downarrow",
            CompassGlyph::SouthWest => "swarrow",
            CompassGlyph::Left => "leftarrow",
            CompassGlyph::NorthWest => "nwarrow",
        }
    }

    /// Arrow polyline in pixel offsets around the anchor point, y axis
    /// pointing down. Shaft plus two head strokes, revisiting the tip.
    pub fn outline(self) -> Vec<(i32, i32)> {
        const TEMPLATE: [(f64, f64); 5] = [(0.0, 8.0), (0.0, -8.0), (-4.0, -3.0), (0.0, -8.0), (4.0, -3.0)];
        let theta = self.anchor_degrees().to_radians();
        let (sin, cos) = theta.sin_cos();
        TEMPLATE
            .iter()
            .map(|&(x, y)| {
                let rx = x * cos - y * sin;
                let ry = x * sin + y * cos;
                (rx.round() as i32, ry.round() as i32)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolation_midpoint() {
        let points = [(0.0, 5.0), (3600.0, 10.0)];
        assert_eq!(interp_points(&points, 1800.0), Some(7.5));
    }

    #[test]
    fn extrapolation_is_linear_not_clamped() {
        let points = [(0.0, 5.0), (3600.0, 10.0)];
        assert_eq!(interp_points(&points, -1800.0), Some(2.5));
        assert_eq!(interp_points(&points, 5400.0), Some(12.5));
    }

    #[test]
    fn interpolation_picks_the_covering_segment() {
        let points = [(0.0, 0.0), (10.0, 10.0), (20.0, 0.0)];
        assert_eq!(interp_points(&points, 15.0), Some(5.0));
    }

    #[test]
    fn interpolation_degenerate_inputs() {
        assert_eq!(interp_points(&[], 1.0), None);
        assert_eq!(interp_points(&[(0.0, 3.0)], 99.0), Some(3.0));
    }

    #[test]
    fn glyph_sector_selection() {
        assert_eq!(CompassGlyph::from_degrees(0.0), CompassGlyph::Up);
        assert_eq!(CompassGlyph::from_degrees(44.0), CompassGlyph::NorthEast);
        assert_eq!(CompassGlyph::from_degrees(46.0), CompassGlyph::NorthEast);
        assert_eq!(CompassGlyph::from_degrees(90.0), CompassGlyph::Right);
        assert_eq!(CompassGlyph::from_degrees(337.0), CompassGlyph::NorthWest);
        assert_eq!(CompassGlyph::from_degrees(360.0), CompassGlyph::Up);
    }

    #[test]
    fn glyph_boundary_at_22_5_degrees() {
        assert_eq!(CompassGlyph::from_degrees(22.4), CompassGlyph::Up);
        assert_eq!(CompassGlyph::from_degrees(23.0), CompassGlyph::NorthEast);
        // exact boundary: first anchor in compass order wins
        assert_eq!(CompassGlyph::from_degrees(22.5), CompassGlyph::Up);
    }

    #[test]
    fn glyph_names_match_compass_order() {
        let names: Vec<&str> = CompassGlyph::ALL.iter().map(|g| g.name()).collect();
        assert_eq!(
            names,
            [
                "uparrow",
                "nearrow",
                "rightarrow",
                "searrow",
                "downarrow",
                "swarrow",
                "leftarrow",
                "nwarrow"
            ]
        );
    }

    #[test]
    fn outline_rotates_with_the_anchor() {
        // up-arrow tip points up (negative y on screen)
        assert_eq!(CompassGlyph::Up.outline()[1], (0, -8));
        // right-arrow tip points right
        assert_eq!(CompassGlyph::Right.outline()[1], (8, 0));
        assert_eq!(CompassGlyph::Down.outline()[1], (0, 8));
    }

    #[test]
    fn clipping_inserts_boundary_points() {
        let points = [(0.0, 0.0), (10.0, 10.0), (20.0, 20.0)];
        let clipped = clip_to_window(&points, 5.0, 15.0);
        assert_eq!(clipped, vec![(5.0, 5.0), (10.0, 10.0), (15.0, 15.0)]);
    }

    #[test]
    fn clipping_keeps_interior_points_untouched() {
        let points = [(0.0, 1.0), (10.0, 2.0)];
        assert_eq!(clip_to_window(&points, -5.0, 15.0), points.to_vec());
    }

    #[test]
    fn clipping_segment_spanning_whole_window() {
        let points = [(0.0, 0.0), (100.0, 100.0)];
        let clipped = clip_to_window(&points, 40.0, 60.0);
        assert_eq!(clipped, vec![(40.0, 40.0), (60.0, 60.0)]);
    }

    #[test]
    fn clipping_disjoint_window_is_empty() {
        let points = [(0.0, 0.0), (10.0, 10.0)];
        assert!(clip_to_window(&points, 50.0, 60.0).is_empty());
    }
}
