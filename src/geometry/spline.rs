//! Periodic uniform cubic B-splines

use glam::DVec2;

use super::contour::Polygon;

/// Closed cubic B-spline stored as per-segment polynomial coefficients
///
/// Segment `i` is `a*u^3 + b*u^2 + c*u + d` for `u` in `[0, 1)`, built from
/// control points `i..i+4` (wrapping).
#[derive(Debug, Clone, PartialEq)]
pub struct BSpline {
    coeffs: Vec<[DVec2; 4]>,
}

impl BSpline {
    /// Fit a periodic spline using each polygon vertex as a control point
    pub fn from_polygon(polygon: &Polygon) -> Self {
        let pts = &polygon.points;
        let n = pts.len();
        let coeffs = (0..n)
            .map(|i| {
                let p0 = pts[i];
                let p1 = pts[(i + 1) % n];
                let p2 = pts[(i + 2) % n];
                let p3 = pts[(i + 3) % n];
                [
                    (-p0 + p1 * 3.0 - p2 * 3.0 + p3) / 6.0,
                    (p0 - p1 * 2.0 + p2) * 0.5,
                    (p2 - p0) * 0.5,
                    (p0 + p1 * 4.0 + p2) / 6.0,
                ]
            })
            .collect();
        Self { coeffs }
    }

    /// Number of segments (parameter period)
    #[inline]
    pub fn segments(&self) -> usize {
        self.coeffs.len()
    }

    /// Wrap `t` into `[0, segments)` and split it into segment index and local parameter
    #[inline]
    fn locate(&self, t: f64) -> (usize, f64) {
        let n = self.coeffs.len();
        let t = t.rem_euclid(n as f64);
        let i = (t.floor() as usize).min(n - 1);
        (i, t - i as f64)
    }

    /// Point on the curve at any real parameter
    pub fn evaluate(&self, t: f64) -> DVec2 {
        if self.coeffs.is_empty() {
            return DVec2::ZERO;
        }
        let (i, u) = self.locate(t);
        let [a, b, c, d] = self.coeffs[i];
        ((a * u + b) * u + c) * u + d
    }

    /// First derivative with respect to `t`
    pub fn tangent(&self, t: f64) -> DVec2 {
        if self.coeffs.is_empty() {
            return DVec2::ZERO;
        }
        let (i, u) = self.locate(t);
        let [a, b, c, _] = self.coeffs[i];
        (a * (3.0 * u) + b * 2.0) * u + c
    }
}
