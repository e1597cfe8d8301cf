//! Read-only views for renderers
//!
//! Renderers upload these each redraw; nothing here writes simulation state.

use bytemuck::{Pod, Zeroable};

use crate::sim::{Boundary, ParticleStore};

/// One particle as a GPU instance
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 2],
    /// Direction of travel (radians)
    pub heading: f32,
    pub radius: f32,
}

/// Snapshot of every active particle
pub fn instances(particles: &ParticleStore) -> Vec<ParticleInstance> {
    let radius = particles.radius as f32;
    particles
        .positions()
        .iter()
        .zip(particles.velocities())
        .map(|(p, v)| ParticleInstance {
            position: [p.x as f32, p.y as f32],
            heading: v.y.atan2(v.x) as f32,
            radius,
        })
        .collect()
}

/// Inside-coverage raster for drawing the boundary
///
/// The longer image side spans the logical domain. Each pixel tests its four
/// corners: 0 means fully outside, 255 fully inside, and edge pixels get an
/// intermediate value.
pub fn boundary_coverage(boundary: &Boundary, width: usize, height: usize) -> Vec<u8> {
    const SHADES: [u8; 5] = [0, 64, 128, 192, 255];

    let l = width.max(height).max(1) as f64;
    let inv = 1.0 / l;
    let mut out = Vec::with_capacity(width * height);
    for yi in 0..height {
        let y = (yi as f64 + 0.5 - height as f64 * 0.5) * inv * 2.0;
        for xi in 0..width {
            let x = (xi as f64 + 0.5 - width as f64 * 0.5) * inv * 2.0;
            let inside = [(-inv, -inv), (-inv, inv), (inv, -inv), (inv, inv)]
                .iter()
                .filter(|(dx, dy)| boundary.distance(glam::DVec2::new(x + dx, y + dy)) < 0.0)
                .count();
            out.push(SHADES[inside]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundarySettings;
    use crate::sim::BoundarySource;
    use glam::DVec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_instance_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 16);
        let data = [ParticleInstance::default(); 3];
        assert_eq!(bytemuck::cast_slice::<_, u8>(&data).len(), 48);
    }

    #[test]
    fn test_instances_follow_store() {
        let mut store = ParticleStore::new(0.02, 1.0);
        store.set_count(2);
        store.pos[1] = DVec2::new(0.5, -0.25);
        store.vel[0] = DVec2::Y;
        let views = instances(&store);
        assert_eq!(views.len(), 2);
        assert_eq!(views[1].position, [0.5, -0.25]);
        assert!((views[0].heading - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(views[0].radius, 0.02);
    }

    #[test]
    fn test_circle_coverage() {
        let mut rng = Pcg32::seed_from_u64(0);
        let boundary = Boundary::new(
            BoundarySource::circle(DVec2::ZERO, 0.5),
            &BoundarySettings::coarse(),
            &mut rng,
        );
        let size = 32;
        let raster = boundary_coverage(&boundary, size, size);
        assert_eq!(raster.len(), size * size);
        assert_eq!(raster[0], 0);
        assert_eq!(raster[16 * size + 16], 255);
        assert!(raster.iter().any(|&v| v > 0 && v < 255));
    }
}
