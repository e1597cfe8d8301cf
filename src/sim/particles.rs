//! Particle store
//!
//! Dense parallel arrays of particle state. Capacity is always a power of two,
//! grows by reallocate-and-copy and never shrinks. Only `[0, n)` is meaningful.

use glam::DVec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticleStore {
    /// Active particle count
    n: usize,
    /// Shared radius
    pub radius: f64,
    /// Pseudo-elasticity (0 inelastic, 1 elastic, >1 amplifies)
    pub elasticity: f64,
    /// Particle-particle collisions since the last macro-step reset
    pub collisions: u64,
    pub pos: Vec<DVec2>,
    pub vel: Vec<DVec2>,
    /// Pending displacement, summed over a sub-step and applied once
    pub disp: Vec<DVec2>,
}

impl ParticleStore {
    pub fn new(radius: f64, elasticity: f64) -> Self {
        Self {
            radius,
            elasticity,
            ..Default::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.pos.len()
    }

    /// Grow capacity to at least `capacity` (rounded up to a power of two)
    pub fn reserve(&mut self, capacity: usize) {
        let target = capacity.max(1).next_power_of_two();
        if target <= self.capacity() {
            return;
        }
        self.pos.resize(target, DVec2::ZERO);
        self.vel.resize(target, DVec2::ZERO);
        self.disp.resize(target, DVec2::ZERO);
    }

    /// Change the active count, growing capacity as needed
    ///
    /// Entries `0..min(old, new)` are preserved; newly activated slots start
    /// at rest at the origin.
    pub fn set_count(&mut self, n: usize) {
        self.reserve(n);
        for i in self.n..n {
            self.pos[i] = DVec2::ZERO;
            self.vel[i] = DVec2::ZERO;
            self.disp[i] = DVec2::ZERO;
        }
        self.n = n;
    }

    /// Full-state copy into `dst`, reusing its allocations
    pub fn snapshot(&self, dst: &mut ParticleStore) {
        dst.clone_from(self);
    }

    /// Full-state copy from `src`, reusing our allocations
    pub fn restore_from(&mut self, src: &ParticleStore) {
        self.clone_from(src);
    }

    pub fn positions(&self) -> &[DVec2] {
        &self.pos[..self.n]
    }

    pub fn velocities(&self) -> &[DVec2] {
        &self.vel[..self.n]
    }

    pub fn clear_displacements(&mut self) {
        self.disp[..self.n].fill(DVec2::ZERO);
    }

    /// Move every particle along its velocity
    pub fn advance(&mut self, dt: f64) {
        let n = self.n;
        for (p, v) in self.pos[..n].iter_mut().zip(&self.vel[..n]) {
            *p += *v * dt;
        }
    }

    /// Apply and consume pending displacements
    pub fn apply_displacements(&mut self) {
        let n = self.n;
        for (p, d) in self.pos[..n].iter_mut().zip(&mut self.disp[..n]) {
            *p += *d;
            *d = DVec2::ZERO;
        }
    }

    pub fn negate_velocities(&mut self) {
        for v in &mut self.vel[..self.n] {
            *v = -*v;
        }
    }

    /// Sum of speeds over active particles
    pub fn total_speed(&self) -> f64 {
        self.velocities().iter().map(|v| v.length()).sum()
    }
}
