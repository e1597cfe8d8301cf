//! Simulation settings
//!
//! Serialized as JSON; missing fields fall back to defaults so partial
//! documents from older builds still load.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Boundary construction quality knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundarySettings {
    /// Side length of the coarse approximate-distance raster
    pub raster_size: usize,
    /// Monte Carlo samples for the enclosed area estimate
    pub area_samples: usize,
    /// Side length of the nearest-sample lookup table
    pub lookup_resolution: usize,
    /// Candidate samples kept per lookup cell (1 = winner only)
    pub candidates_per_cell: usize,
    /// Diffusion smoothing passes applied to traced polygons
    pub smoothing_iterations: usize,
    /// Lookup candidates placed per spline segment
    pub samples_per_segment: usize,
    /// Golden-section iterations when refining a closest point
    pub refine_iterations: usize,
}

impl Default for BoundarySettings {
    fn default() -> Self {
        Self {
            raster_size: 1024,
            area_samples: 100_000,
            lookup_resolution: 512,
            candidates_per_cell: 4,
            smoothing_iterations: 128,
            samples_per_segment: 2,
            refine_iterations: 20,
        }
    }
}

impl BoundarySettings {
    /// Cheap settings for previews and tests
    pub fn coarse() -> Self {
        Self {
            raster_size: 128,
            area_samples: 20_000,
            lookup_resolution: 128,
            candidates_per_cell: 4,
            smoothing_iterations: 32,
            samples_per_segment: 2,
            refine_iterations: 20,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    /// RNG seed for placement, velocities and Monte Carlo estimates
    pub seed: u64,
    /// Shared particle radius (logical units)
    pub radius: f64,
    /// Pseudo-elasticity (0 inelastic, 1 elastic, >1 amplifies)
    pub elasticity: f64,
    /// Target packing density used to derive the particle count
    pub density: f64,
    /// Simulated time per macro-step
    pub step_size: f64,
    /// Display frames between macro-steps
    pub frame_interval: u32,
    /// Wall-clock budget per display frame (ms)
    pub frame_budget_ms: f64,
    /// Hard cap on the wall-clock budget per macro-step (ms)
    pub max_frame_budget_ms: f64,
    pub boundary: BoundarySettings,
}

impl Default for SimSettings {
    fn default() -> Self {
        let radius = (-3.75f64).exp();
        Self {
            seed: 0x5eed,
            radius,
            elasticity: 1.0,
            density: 0.4,
            step_size: Self::step_size_for_radius(radius),
            frame_interval: 1,
            frame_budget_ms: 12.0,
            max_frame_budget_ms: 72.0,
            boundary: BoundarySettings::default(),
        }
    }
}

impl SimSettings {
    /// Default macro-step for a radius: particles travel ~29% of r per step at unit speed
    pub fn step_size_for_radius(radius: f64) -> f64 {
        (radius.ln() - 1.25).exp()
    }

    /// Wall-clock budget for one macro-step (ms)
    pub fn macro_step_budget_ms(&self) -> f64 {
        (self.frame_interval.max(1) as f64 * self.frame_budget_ms).min(self.max_frame_budget_ms)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings = serde_json::from_str(json)?;
        log::info!("Loaded simulation settings");
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
