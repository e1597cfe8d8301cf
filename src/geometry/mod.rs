//! Geometry pipeline
//!
//! Turns a raster image into smooth closed boundary curves and a fast
//! nearest-point lookup:
//! image -> wall mask -> traced polygons -> smoothed, rescaled polygons ->
//! periodic cubic B-splines -> jump flood sample lookup.

pub mod contour;
pub mod image;
pub mod lookup;
pub mod spline;

pub use contour::{Polygon, mask_to_polygons, rescale_polygons, smooth_polygon};
pub use image::{Image, Mask, image_to_mask};
pub use lookup::{ClosestPoint, SampleLookup, closest_point_on_boundary, splines_to_sample_lookup};
pub use spline::BSpline;

use crate::settings::BoundarySettings;

/// Trace an image into boundary splines in logical-domain coordinates
///
/// Returns an empty list when the image has no closed boundary long enough to
/// survive noise filtering.
pub fn image_to_splines(image: &Image, settings: &BoundarySettings) -> Vec<BSpline> {
    let mask = image_to_mask(image);
    let mut polygons = mask_to_polygons(&mask);
    rescale_polygons(&mut polygons);

    polygons
        .iter_mut()
        .map(|polygon| {
            smooth_polygon(polygon, settings.smoothing_iterations);
            BSpline::from_polygon(polygon)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disc_image_traces_to_one_centered_spline() {
        let size = 64;
        let image = Image::from_fn(size, size, |x, y| {
            let dx = x as f64 + 0.5 - 32.0;
            let dy = y as f64 + 0.5 - 32.0;
            if dx * dx + dy * dy < 24.0 * 24.0 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        });
        let splines = image_to_splines(&image, &BoundarySettings::coarse());
        assert_eq!(splines.len(), 1);

        let spline = &splines[0];
        let n = spline.segments();
        let mut centroid = glam::DVec2::ZERO;
        for i in 0..n {
            centroid += spline.evaluate(i as f64);
        }
        centroid /= n as f64;
        assert!(centroid.length() < 0.05);
        for i in 0..n {
            let r = spline.evaluate(i as f64).length();
            assert!(r > 0.8 && r < 1.05, "radius {r}");
        }
    }

    #[test]
    fn test_blank_image_has_no_splines() {
        let image = Image::from_fn(16, 16, |_, _| [255, 255, 255, 255]);
        assert!(image_to_splines(&image, &BoundarySettings::coarse()).is_empty());
    }
}
