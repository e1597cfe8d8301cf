//! Narrow-phase collision response
//!
//! Particle pairs exchange an impulse along their center line and then have
//! both outgoing velocities rescaled so the sum of speeds is unchanged.
//! Overlap corrections go to the displacement buffer and are applied once per
//! sub-step, after every pair has been visited.

use glam::DVec2;

use super::particles::ParticleStore;
use crate::consts::{OVERLAP_ELASTICITY_BOOST, SEPARATION_OVERSHOOT};

/// Contact between a particle and the boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryContact {
    /// Signed distance of the particle center (negative inside)
    pub distance: f64,
    /// Unit normal pointing away from the wall, into the domain
    pub normal: DVec2,
}

/// Elasticity raised towards 1 in proportion to relative overlap depth
#[inline]
pub fn effective_elasticity(elasticity: f64, overlap: f64, radius: f64) -> f64 {
    let depth = if radius > 0.0 { overlap / (2.0 * radius) } else { 0.0 };
    elasticity.max((elasticity + OVERLAP_ELASTICITY_BOOST * depth).min(1.0))
}

/// Resolve an overlap between particles `i` and `j`
///
/// Returns `false` (and touches nothing) unless the centers are strictly
/// closer than one diameter.
pub fn collide_particles(particles: &mut ParticleStore, i: usize, j: usize) -> bool {
    let r = particles.radius;
    let diameter = 2.0 * r;
    let dx = particles.pos[i] - particles.pos[j];
    let dist_sq = dx.length_squared();
    if dist_sq >= diameter * diameter {
        return false;
    }
    particles.collisions += 1;

    // Coincident centers separate along +x
    let dist = dist_sq.sqrt();
    let normal = if dist > 0.0 { dx / dist } else { DVec2::X };

    let overlap = diameter - dist;
    let correction = normal * (overlap * 0.5 * (1.0 + SEPARATION_OVERSHOOT));
    particles.disp[i] += correction;
    particles.disp[j] -= correction;

    let v1 = particles.vel[i];
    let v2 = particles.vel[j];
    let e = effective_elasticity(particles.elasticity, overlap, r);
    let impulse = normal * ((1.0 + e) * 0.5 * (v1 - v2).dot(normal));
    let u1 = v1 - impulse;
    let u2 = v2 + impulse;

    let outgoing = u1.length() + u2.length();
    let scale = if outgoing > f64::EPSILON {
        (v1.length() + v2.length()) / outgoing
    } else {
        1.0
    };

    particles.vel[i] = u1 * scale;
    particles.vel[j] = u2 * scale;
    true
}

/// Push particle `i` clear of the wall and reflect it if it is moving into it
pub fn collide_boundary(particles: &mut ParticleStore, i: usize, contact: &BoundaryContact) {
    let n = contact.normal;
    let correction = (contact.distance + particles.radius) * (1.0 + SEPARATION_OVERSHOOT);
    particles.pos[i] += n * correction;

    let vn = particles.vel[i].dot(n);
    if vn < 0.0 {
        particles.vel[i] -= 2.0 * vn * n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pair(radius: f64, elasticity: f64, p: [DVec2; 2], v: [DVec2; 2]) -> ParticleStore {
        let mut store = ParticleStore::new(radius, elasticity);
        store.set_count(2);
        store.pos[..2].copy_from_slice(&p);
        store.vel[..2].copy_from_slice(&v);
        store
    }

    #[test]
    fn test_exact_contact_is_not_a_collision() {
        let mut store = pair(
            0.05,
            1.0,
            [DVec2::new(-0.05, 0.0), DVec2::new(0.05, 0.0)],
            [DVec2::X, -DVec2::X],
        );
        let before = store.clone();
        assert!(!collide_particles(&mut store, 0, 1));
        assert_eq!(store, before);
    }

    #[test]
    fn test_head_on_elastic_bounce() {
        let mut store = pair(
            0.05,
            1.0,
            [DVec2::new(-0.049, 0.0), DVec2::new(0.049, 0.0)],
            [DVec2::X, -DVec2::X],
        );
        assert!(collide_particles(&mut store, 0, 1));
        assert_eq!(store.collisions, 1);
        assert!(store.vel[0].distance(-DVec2::X) < 1e-12);
        assert!(store.vel[1].distance(DVec2::X) < 1e-12);
    }

    #[test]
    fn test_overlap_is_resolved_by_displacement() {
        let r = 0.05;
        let mut store = pair(
            r,
            1.0,
            [DVec2::new(0.01, 0.02), DVec2::new(0.04, 0.05)],
            [DVec2::ZERO, DVec2::ZERO],
        );
        assert!(collide_particles(&mut store, 0, 1));
        store.apply_displacements();
        let separation = store.pos[0].distance(store.pos[1]);
        assert!(separation >= 2.0 * r * (1.0 - SEPARATION_OVERSHOOT));
    }

    #[test]
    fn test_coincident_centers_are_separated() {
        let mut store = pair(0.05, 1.0, [DVec2::ZERO, DVec2::ZERO], [DVec2::Y, -DVec2::Y]);
        assert!(collide_particles(&mut store, 0, 1));
        store.apply_displacements();
        assert!(store.pos[0].distance(store.pos[1]) >= 0.1);
        assert!(store.vel[0].is_finite() && store.vel[1].is_finite());
    }

    #[test]
    fn test_inelastic_head_on_stays_finite() {
        let mut store = pair(
            0.05,
            0.0,
            [DVec2::new(-0.0999, 0.0), DVec2::ZERO],
            [DVec2::X, -DVec2::X],
        );
        assert!(collide_particles(&mut store, 0, 1));
        assert!(store.vel[0].is_finite());
        assert!(store.vel[1].is_finite());
    }

    #[test]
    fn test_effective_elasticity_bounds() {
        assert_eq!(effective_elasticity(1.0, 0.05, 0.05), 1.0);
        assert_eq!(effective_elasticity(1.5, 0.05, 0.05), 1.5);
        assert_eq!(effective_elasticity(0.5, 0.0, 0.05), 0.5);
        assert!(effective_elasticity(0.5, 0.05, 0.05) > 0.5);
        assert_eq!(effective_elasticity(0.9, 0.1, 0.05), 1.0);
    }

    #[test]
    fn test_boundary_reflects_incoming_velocity() {
        let mut store = ParticleStore::new(0.05, 1.0);
        store.set_count(1);
        store.pos[0] = DVec2::new(0.93, 0.0);
        store.vel[0] = DVec2::new(1.0, 0.5);
        let contact = BoundaryContact {
            distance: -0.02,
            normal: -DVec2::X,
        };
        collide_boundary(&mut store, 0, &contact);
        assert!((store.pos[0].x - (0.93 - 0.03 * (1.0 + SEPARATION_OVERSHOOT))).abs() < 1e-12);
        assert_eq!(store.vel[0], DVec2::new(-1.0, 0.5));
    }

    #[test]
    fn test_boundary_leaves_outgoing_velocity() {
        let mut store = ParticleStore::new(0.05, 1.0);
        store.set_count(1);
        store.pos[0] = DVec2::new(0.93, 0.0);
        store.vel[0] = DVec2::new(-1.0, 0.0);
        let contact = BoundaryContact {
            distance: -0.02,
            normal: -DVec2::X,
        };
        collide_boundary(&mut store, 0, &contact);
        assert_eq!(store.vel[0], DVec2::new(-1.0, 0.0));
        assert!(store.pos[0].x < 0.93);
    }

    proptest! {
        #[test]
        fn prop_speed_sum_conserved(
            angle in 0.0f64..std::f64::consts::TAU,
            gap in 0.0f64..0.09,
            v1 in (-2.0f64..2.0, -2.0f64..2.0),
            v2 in (-2.0f64..2.0, -2.0f64..2.0),
            elasticity in 0.0f64..2.0,
        ) {
            let r = 0.05;
            let offset = DVec2::from_angle(angle) * (gap + 1e-4);
            let v = [DVec2::new(v1.0, v1.1), DVec2::new(v2.0, v2.1)];
            let mut store = pair(r, elasticity, [offset, DVec2::ZERO], v);
            let before = v[0].length() + v[1].length();

            prop_assert!(collide_particles(&mut store, 0, 1));

            let outgoing = store.vel[0].length() + store.vel[1].length();
            prop_assume!(outgoing > 1e-9);
            prop_assert!((outgoing - before).abs() <= 1e-9 * before.max(1.0));
        }

        #[test]
        fn prop_pending_displacements_cancel(
            angle in 0.0f64..std::f64::consts::TAU,
            gap in 0.0f64..0.09,
        ) {
            let offset = DVec2::from_angle(angle) * (gap + 1e-4);
            let mut store = pair(0.05, 1.0, [offset, DVec2::ZERO], [DVec2::ZERO, DVec2::ZERO]);
            collide_particles(&mut store, 0, 1);
            prop_assert!((store.disp[0] + store.disp[1]).length() < 1e-15);
        }
    }
}
