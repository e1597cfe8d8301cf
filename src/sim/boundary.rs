//! Domain boundary
//!
//! Either a caller-supplied signed distance function or a curve traced from an
//! image. Both sit behind [`DistanceField`]; [`Boundary`] adds the coarse
//! rejection raster, the enclosed-area estimate and rejection sampling.

use std::fmt;

use glam::DVec2;
use rand::Rng;

use super::collision::BoundaryContact;
use crate::consts::{DOMAIN_AREA, DOMAIN_HALF, NORMAL_EPSILON};
use crate::geometry::{
    BSpline, Image, SampleLookup, closest_point_on_boundary, image_to_splines, splines_to_sample_lookup,
};
use crate::settings::BoundarySettings;
use crate::{cell_to_domain, cross, domain_to_cell};

/// Signed distance function over the logical domain (negative inside)
pub type DistanceFn = Box<dyn Fn(DVec2) -> f64>;

/// Shared contract of every boundary representation
pub trait DistanceField {
    /// Signed distance from `p` to the boundary, negative inside
    fn distance(&self, p: DVec2) -> f64;

    /// Contact for a particle of radius `radius` centered at `p`, if it
    /// reaches or crosses the wall
    fn contact(&self, p: DVec2, radius: f64) -> Option<BoundaryContact>;
}

/// Boundary given directly by a distance function
pub struct AnalyticBoundary {
    sdf: DistanceFn,
}

impl AnalyticBoundary {
    pub fn new<F>(sdf: F) -> Self
    where
        F: Fn(DVec2) -> f64 + 'static,
    {
        Self { sdf: Box::new(sdf) }
    }

    /// Square wall enclosing the whole logical domain
    pub fn domain_square() -> Self {
        Self::new(|p: DVec2| p.abs().max_element() - DOMAIN_HALF)
    }

    /// Central-difference gradient of the distance function
    fn gradient(&self, p: DVec2) -> DVec2 {
        let ex = DVec2::new(NORMAL_EPSILON, 0.0);
        let ey = DVec2::new(0.0, NORMAL_EPSILON);
        DVec2::new(
            (self.sdf)(p + ex) - (self.sdf)(p - ex),
            (self.sdf)(p + ey) - (self.sdf)(p - ey),
        )
    }
}

impl fmt::Debug for AnalyticBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticBoundary").finish_non_exhaustive()
    }
}

impl DistanceField for AnalyticBoundary {
    fn distance(&self, p: DVec2) -> f64 {
        (self.sdf)(p)
    }

    fn contact(&self, p: DVec2, radius: f64) -> Option<BoundaryContact> {
        let distance = (self.sdf)(p);
        if distance < -radius {
            return None;
        }
        // Flat spots in the field fall back to pointing at the origin
        let normal = (-self.gradient(p)).normalize_or((-p).normalize_or(DVec2::X));
        Some(BoundaryContact { distance, normal })
    }
}

/// Boundary traced from an image, queried through the sample lookup
#[derive(Debug, Clone)]
pub struct TracedBoundary {
    splines: Vec<BSpline>,
    lookup: SampleLookup,
    refine_iterations: usize,
}

impl TracedBoundary {
    pub fn new(splines: Vec<BSpline>, settings: &BoundarySettings) -> Self {
        let lookup = splines_to_sample_lookup(&splines, settings);
        Self {
            splines,
            lookup,
            refine_iterations: settings.refine_iterations,
        }
    }

    pub fn splines(&self) -> &[BSpline] {
        &self.splines
    }

    pub fn lookup(&self) -> &SampleLookup {
        &self.lookup
    }

    /// Signed distance and into-domain normal at the closest curve point
    ///
    /// Curves run with the wall on their left, so a query left of the local
    /// tangent is outside.
    fn nearest(&self, p: DVec2) -> Option<BoundaryContact> {
        let closest = closest_point_on_boundary(&self.splines, &self.lookup, p, self.refine_iterations)?;
        let tangent = self.splines[closest.spline].tangent(closest.t);
        let offset = p - closest.point;
        let dist = offset.length();
        let distance = if cross(tangent, offset) > 0.0 { dist } else { -dist };

        let normal = DVec2::new(tangent.y, -tangent.x)
            .try_normalize()
            .unwrap_or_else(|| (-offset * distance.signum()).normalize_or(DVec2::X));
        Some(BoundaryContact { distance, normal })
    }
}

impl DistanceField for TracedBoundary {
    fn distance(&self, p: DVec2) -> f64 {
        self.nearest(p).map_or(f64::INFINITY, |c| c.distance)
    }

    fn contact(&self, p: DVec2, radius: f64) -> Option<BoundaryContact> {
        self.nearest(p).filter(|c| c.distance >= -radius)
    }
}

/// Active boundary representation
#[derive(Debug)]
pub enum BoundaryShape {
    Analytic(AnalyticBoundary),
    Traced(TracedBoundary),
}

impl DistanceField for BoundaryShape {
    fn distance(&self, p: DVec2) -> f64 {
        match self {
            BoundaryShape::Analytic(b) => b.distance(p),
            BoundaryShape::Traced(b) => b.distance(p),
        }
    }

    fn contact(&self, p: DVec2, radius: f64) -> Option<BoundaryContact> {
        match self {
            BoundaryShape::Analytic(b) => b.contact(p, radius),
            BoundaryShape::Traced(b) => b.contact(p, radius),
        }
    }
}

/// Input accepted by [`Boundary::update`]
pub enum BoundarySource {
    Sdf(DistanceFn),
    Image(Image),
}

impl BoundarySource {
    pub fn sdf<F>(f: F) -> Self
    where
        F: Fn(DVec2) -> f64 + 'static,
    {
        BoundarySource::Sdf(Box::new(f))
    }

    pub fn circle(center: DVec2, radius: f64) -> Self {
        Self::sdf(move |p: DVec2| p.distance(center) - radius)
    }
}

impl fmt::Debug for BoundarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundarySource::Sdf(_) => f.write_str("Sdf(..)"),
            BoundarySource::Image(img) => write!(f, "Image({}x{})", img.width, img.height),
        }
    }
}

#[derive(Debug)]
pub struct Boundary {
    shape: BoundaryShape,
    /// Coarse approximate distances, `raster_size` squared, row-major
    raster: Vec<f64>,
    raster_size: usize,
    /// Worst-case raster error
    margin: f64,
    area: f64,
}

impl Default for Boundary {
    fn default() -> Self {
        Self {
            shape: BoundaryShape::Analytic(AnalyticBoundary::domain_square()),
            raster: Vec::new(),
            raster_size: 0,
            margin: 0.0,
            area: DOMAIN_AREA,
        }
    }
}

impl Boundary {
    /// Build a boundary from `source`, then precompute its raster and area
    pub fn new<R: Rng>(source: BoundarySource, settings: &BoundarySettings, rng: &mut R) -> Self {
        let mut boundary = Self::default();
        boundary.update(source, settings, rng);
        boundary
    }

    pub fn update<R: Rng>(&mut self, source: BoundarySource, settings: &BoundarySettings, rng: &mut R) {
        self.shape = match source {
            BoundarySource::Sdf(sdf) => BoundaryShape::Analytic(AnalyticBoundary { sdf }),
            BoundarySource::Image(image) => {
                let splines = image_to_splines(&image, settings);
                if splines.is_empty() {
                    log::warn!(
                        "No closed boundary traced from {}x{} image, using the domain square",
                        image.width,
                        image.height
                    );
                    BoundaryShape::Analytic(AnalyticBoundary::domain_square())
                } else {
                    log::info!("Traced {} boundary curve(s)", splines.len());
                    BoundaryShape::Traced(TracedBoundary::new(splines, settings))
                }
            }
        };

        self.build_raster(settings.raster_size);
        self.area = self.estimate_area(settings.area_samples, rng);
        log::info!("Boundary updated, enclosed area {:.4}", self.area);
    }

    pub fn shape(&self) -> &BoundaryShape {
        &self.shape
    }

    /// Monte Carlo estimate of the enclosed area
    pub fn area(&self) -> f64 {
        self.area
    }

    pub fn raster_size(&self) -> usize {
        self.raster_size
    }

    /// Approximate distance from the raster cell containing `p`
    pub fn approx_distance(&self, p: DVec2) -> Option<f64> {
        if self.raster_size == 0 {
            return None;
        }
        let xi = domain_to_cell(p.x, self.raster_size);
        let yi = domain_to_cell(p.y, self.raster_size);
        Some(self.raster[yi * self.raster_size + xi])
    }

    pub fn distance(&self, p: DVec2) -> f64 {
        self.shape.distance(p)
    }

    /// Contact for a particle at `p`, if it touches the wall
    ///
    /// Particles pushed from one wall into another (concave corners) get the
    /// bisector of both normals.
    pub fn collides(&self, p: DVec2, radius: f64) -> Option<BoundaryContact> {
        if let Some(approx) = self.approx_distance(p)
            && approx < -(radius + self.margin)
        {
            return None;
        }

        let first = self.shape.contact(p, radius)?;
        let corrected = p + first.normal * (first.distance + radius);
        let second = match self.shape.contact(corrected, radius) {
            Some(second) if second.distance > -radius => second,
            _ => return Some(first),
        };

        match (first.normal + second.normal).try_normalize() {
            Some(normal) => Some(BoundaryContact {
                distance: first.distance,
                normal,
            }),
            None => Some(first),
        }
    }

    /// Uniform random point at least `radius` inside the boundary
    ///
    /// Never gives up, so a boundary with no room for `radius` loops forever.
    pub fn sample_inside<R: Rng>(&self, radius: f64, rng: &mut R) -> DVec2 {
        loop {
            let p = random_domain_point(rng);
            if self.distance(p) < -radius {
                return p;
            }
        }
    }

    fn build_raster(&mut self, size: usize) {
        self.raster_size = size;
        self.margin = if size > 0 { 4.0 * std::f64::consts::SQRT_2 / size as f64 } else { 0.0 };
        self.raster.clear();
        self.raster.reserve(size * size);
        for yi in 0..size {
            let y = cell_to_domain(yi, size);
            for xi in 0..size {
                let x = cell_to_domain(xi, size);
                self.raster.push(self.shape.distance(DVec2::new(x, y)));
            }
        }
    }

    fn estimate_area<R: Rng>(&self, samples: usize, rng: &mut R) -> f64 {
        if samples == 0 {
            return DOMAIN_AREA;
        }
        let inside = (0..samples)
            .filter(|_| self.distance(random_domain_point(rng)) < 0.0)
            .count();
        DOMAIN_AREA * inside as f64 / samples as f64
    }
}

#[inline]
fn random_domain_point<R: Rng>(rng: &mut R) -> DVec2 {
    DVec2::new(
        rng.random_range(-DOMAIN_HALF..DOMAIN_HALF),
        rng.random_range(-DOMAIN_HALF..DOMAIN_HALF),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn coarse() -> BoundarySettings {
        BoundarySettings {
            area_samples: 40_000,
            ..BoundarySettings::coarse()
        }
    }

    fn disc_image(size: usize, radius: f64) -> Image {
        let c = size as f64 / 2.0;
        Image::from_fn(size, size, |x, y| {
            let dx = x as f64 + 0.5 - c;
            let dy = y as f64 + 0.5 - c;
            if dx * dx + dy * dy < radius * radius {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
    }

    #[test]
    fn test_sample_inside_circle() {
        let mut rng = Pcg32::seed_from_u64(1);
        let boundary = Boundary::new(BoundarySource::circle(DVec2::ZERO, 0.95), &coarse(), &mut rng);
        for _ in 0..1000 {
            let p = boundary.sample_inside(0.01, &mut rng);
            assert!(p.length() <= 0.94);
        }
    }

    #[test]
    fn test_circle_area_estimate() {
        let mut rng = Pcg32::seed_from_u64(2);
        let boundary = Boundary::new(BoundarySource::circle(DVec2::ZERO, 0.5), &coarse(), &mut rng);
        let exact = std::f64::consts::PI * 0.25;
        assert!((boundary.area() - exact).abs() < 0.05);
    }

    #[test]
    fn test_default_is_domain_square() {
        let boundary = Boundary::default();
        assert_eq!(boundary.area(), DOMAIN_AREA);
        assert!(boundary.distance(DVec2::ZERO) < 0.0);
        assert!(boundary.distance(DVec2::new(1.5, 0.0)) > 0.0);
    }

    #[test]
    fn test_analytic_contact_normal_points_inward() {
        let mut rng = Pcg32::seed_from_u64(3);
        let boundary = Boundary::new(BoundarySource::circle(DVec2::ZERO, 0.5), &coarse(), &mut rng);
        let contact = boundary.collides(DVec2::new(0.48, 0.0), 0.05).unwrap();
        assert!((contact.distance + 0.02).abs() < 1e-9);
        assert!(contact.normal.distance(-DVec2::X) < 1e-6);
    }

    #[test]
    fn test_far_particles_are_rejected() {
        let mut rng = Pcg32::seed_from_u64(4);
        let boundary = Boundary::new(BoundarySource::circle(DVec2::ZERO, 0.9), &coarse(), &mut rng);
        assert!(boundary.collides(DVec2::ZERO, 0.05).is_none());
        assert!(boundary.collides(DVec2::new(0.5, 0.5), 0.05).is_none());
    }

    #[test]
    fn test_concave_corner_uses_bisector() {
        let mut rng = Pcg32::seed_from_u64(5);
        let boundary = Boundary::new(
            BoundarySource::Sdf(Box::new(|p: DVec2| (p.x - 0.5).max(p.y - 0.5))),
            &coarse(),
            &mut rng,
        );
        // Touching the right wall, and the top wall once pushed left
        let contact = boundary.collides(DVec2::new(0.47, 0.46), 0.05).unwrap();
        let expected = DVec2::new(-1.0, -1.0).normalize();
        assert!(contact.normal.distance(expected) < 1e-6);
    }

    #[test]
    fn test_traced_disc_sign_and_contact() {
        let mut rng = Pcg32::seed_from_u64(6);
        let boundary = Boundary::new(BoundarySource::Image(disc_image(96, 40.0)), &coarse(), &mut rng);
        assert!(matches!(boundary.shape(), BoundaryShape::Traced(_)));

        assert!(boundary.distance(DVec2::ZERO) < -0.5);
        assert!(boundary.distance(DVec2::new(0.99, 0.99)) > 0.0);

        // The rescaled disc fills about [-0.99, 0.99]
        let contact = boundary.collides(DVec2::new(0.0, 0.97), 0.05).unwrap();
        assert!(contact.normal.y < -0.9);

        let exact = std::f64::consts::PI * 0.99 * 0.99;
        assert!((boundary.area() - exact).abs() < 0.15);
    }

    #[test]
    fn test_blank_image_falls_back_to_domain_square() {
        let mut rng = Pcg32::seed_from_u64(7);
        let blank = Image::from_fn(16, 16, |_, _| [255, 255, 255, 255]);
        let boundary = Boundary::new(BoundarySource::Image(blank), &coarse(), &mut rng);
        assert!(matches!(boundary.shape(), BoundaryShape::Analytic(_)));
        assert!((boundary.area() - DOMAIN_AREA).abs() < 1e-9);
    }

    #[test]
    fn test_empty_image_falls_back_to_domain_square() {
        let mut rng = Pcg32::seed_from_u64(7);
        let empty = Image::from_fn(0, 0, |_, _| [255, 255, 255, 255]);
        let boundary = Boundary::new(BoundarySource::Image(empty), &coarse(), &mut rng);
        assert!(matches!(boundary.shape(), BoundaryShape::Analytic(_)));
        assert!(boundary.distance(DVec2::ZERO) < 0.0);
    }
}
