//! Particle Toy - deterministic fixed-radius 2D particle engine
//!
//! Core modules:
//! - `sim`: Deterministic simulation (particle store, broad/narrow phase, stepping, reversal)
//! - `geometry`: Raster mask to smooth boundary curves and nearest-point lookup
//! - `settings`: Serializable configuration
//! - `view`: Read-only snapshots for renderers

pub mod error;
pub mod geometry;
pub mod settings;
pub mod sim;
pub mod view;

pub use error::{Result, SimError};
pub use settings::{BoundarySettings, SimSettings};

use glam::DVec2;

/// Engine configuration constants
pub mod consts {
    /// Side length of the logical domain (centered at the origin)
    pub const DOMAIN_SIZE: f64 = 2.0;
    /// Half side length of the logical domain
    pub const DOMAIN_HALF: f64 = 1.0;
    /// Area of the logical domain square
    pub const DOMAIN_AREA: f64 = DOMAIN_SIZE * DOMAIN_SIZE;

    /// Grid cell padding so particles exactly 2r apart never straddle a cell edge
    pub const GRID_EPSILON: f64 = 1e-5;
    /// Particles stored per spatial grid cell; extra members are dropped
    pub const BUCKET_CAPACITY: usize = 4;

    /// Overshoot applied to positional corrections so resolved pairs do not re-trigger
    pub const SEPARATION_OVERSHOOT: f64 = 1e-5;
    /// Elasticity boost per unit of relative overlap depth (capped at 1)
    pub const OVERLAP_ELASTICITY_BOOST: f64 = 1.0;

    /// Central difference step for analytic boundary normals
    pub const NORMAL_EPSILON: f64 = 1e-5;

    /// Traced loops shorter than this are treated as noise
    pub const MIN_LOOP_VERTICES: usize = 32;
    /// Luminance*alpha cutoff above which a pixel becomes wall
    pub const MASK_THRESHOLD: f64 = 192.0;
    /// Fraction of the domain the rescaled boundary fills along its longer axis
    pub const BOUNDARY_EXTENT: f64 = 0.99;

    /// Upper bound on sub-steps per macro-step
    pub const MAX_SUBSTEPS: usize = 4096;
    /// Bisection never refines deeper than this
    pub const MAX_BISECTION_DEPTH: usize = 30;
    /// Initial trial step is shortened by this fraction so it never covers the full remainder
    pub const TRIAL_STEP_SHRINK: f64 = 1e-4;

    /// Densest packing of equal discs in the plane
    pub const MAX_DENSITY: f64 = std::f64::consts::PI / (2.0 * 1.732_050_807_568_877_2);
}

/// Cross product of two 2D vectors (z component)
#[inline]
pub fn cross(a: DVec2, b: DVec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Map a logical-domain coordinate in [-1, 1] to a grid index in [0, size)
#[inline]
pub fn domain_to_cell(v: f64, size: usize) -> usize {
    let half = size as f64 * 0.5;
    ((v * half + half).floor().max(0.0) as usize).min(size.saturating_sub(1))
}

/// Center of grid cell `i` in the logical domain
#[inline]
pub fn cell_to_domain(i: usize, size: usize) -> f64 {
    (i as f64 + 0.5) / size as f64 * consts::DOMAIN_SIZE - consts::DOMAIN_HALF
}

/// Number of particles that fill `area` at the given packing density
pub fn density_to_count(density: f64, radius: f64, area: f64) -> usize {
    let particle_area = std::f64::consts::PI * radius * radius;
    if particle_area <= 0.0 {
        return 0;
    }
    (area * density / particle_area).floor().max(0.0) as usize
}

/// Packing density of `count` particles inside `area`
pub fn count_to_density(count: usize, radius: f64, area: f64) -> f64 {
    if area <= 0.0 {
        return 0.0;
    }
    std::f64::consts::PI * radius * radius * count as f64 / area
}
