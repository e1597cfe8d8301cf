//! Time integration
//!
//! A macro-step of `step_size` simulated time is split into sub-steps. The
//! bisection stage searches for the sub-step length at which the next
//! particle contact first occurs and commits exactly that much, so fast
//! particles cannot pass through each other. Whatever time it leaves over is
//! covered by uniform sub-steps.

use std::time::Instant;

use glam::DVec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::boundary::{Boundary, BoundarySource};
use super::collision::{collide_boundary, collide_particles};
use super::grid::SpatialIndex;
use super::particles::ParticleStore;
use super::recorder::{RecorderMode, ReverseRecorder};
use crate::consts::{MAX_BISECTION_DEPTH, MAX_DENSITY, MAX_SUBSTEPS, TRIAL_STEP_SHRINK};
use crate::settings::SimSettings;
use crate::{count_to_density, density_to_count};

/// Everything a single sub-step reads and writes
#[derive(Debug, Default)]
pub struct World {
    pub particles: ParticleStore,
    pub boundary: Boundary,
    pub index: SpatialIndex,
    /// Largest bucket overflow seen since the last `take_overflow()`
    overflow: usize,
}

impl World {
    pub fn new(particles: ParticleStore, boundary: Boundary) -> Self {
        let index = SpatialIndex::new(particles.radius);
        Self {
            particles,
            boundary,
            index,
            overflow: 0,
        }
    }

    /// One sub-step: move, resolve particle pairs, then the boundary
    pub fn iter(&mut self, dt: f64) {
        let World {
            particles,
            boundary,
            index,
            overflow,
        } = self;

        particles.clear_displacements();
        particles.advance(dt);

        index.index(particles);
        *overflow = (*overflow).max(index.dropped());
        index.detect(|i, j| {
            collide_particles(particles, i, j);
        });
        particles.apply_displacements();

        let r = particles.radius;
        for i in 0..particles.len() {
            if let Some(contact) = boundary.collides(particles.pos[i], r) {
                collide_boundary(particles, i, &contact);
            }
        }
    }

    pub fn take_overflow(&mut self) -> usize {
        std::mem::take(&mut self.overflow)
    }
}

/// Where the bisection stage is within a macro-step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Bracketing and bisecting the next contact time
    SeekingContact,
    /// A contact-length sub-step was just committed
    Converged,
    /// Bisection stopped early; the remainder needs uniform sub-steps
    FallbackUniform,
    /// The whole macro-step has been integrated
    Done,
}

/// Persistent state for contact-time search across macro-steps
#[derive(Debug, Clone, Default)]
pub struct BisectionIterator {
    backup: ParticleStore,
}

impl BisectionIterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contact-resolving sub-steps for one macro-step
    ///
    /// `budget` is the sub-step budget for the macro-step and
    /// `expected_collisions` the collision count of the previous one. Each
    /// yielded length has already been integrated into `world`.
    pub fn steps<'a>(
        &'a mut self,
        world: &'a mut World,
        step_size: f64,
        budget: usize,
        expected_collisions: u64,
    ) -> BisectionSteps<'a> {
        let c_est = expected_collisions as f64;
        let depth = if expected_collisions == 0 {
            MAX_BISECTION_DEPTH as f64
        } else {
            (budget as f64 / c_est - 2.0).ceil().min(MAX_BISECTION_DEPTH as f64)
        };
        let phase = if depth < 2.0 || step_size <= 0.0 {
            StepPhase::FallbackUniform
        } else {
            StepPhase::SeekingContact
        };

        BisectionSteps {
            backup: &mut self.backup,
            world,
            step_size,
            remaining: step_size,
            c_est,
            depth: depth.max(0.0) as usize,
            max_iters: budget * 4,
            iters: 0,
            phase,
        }
    }
}

pub struct BisectionSteps<'a> {
    backup: &'a mut ParticleStore,
    world: &'a mut World,
    step_size: f64,
    remaining: f64,
    c_est: f64,
    depth: usize,
    max_iters: usize,
    iters: usize,
    phase: StepPhase,
}

impl BisectionSteps<'_> {
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Simulation time not yet integrated
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// Sub-step evaluations spent, counting trials
    pub fn iterations(&self) -> usize {
        self.iters
    }

    /// Run a sub-step on the live world, report whether it produced a
    /// particle collision, then roll back
    fn causes_collision(&mut self, dt: f64) -> bool {
        self.world.iter(dt);
        let hit = self.world.particles.collisions > self.backup.collisions;
        self.world.particles.restore_from(self.backup);
        hit
    }

    fn commit(&mut self, dt: f64) -> f64 {
        self.world.iter(dt);
        self.remaining -= dt;
        dt
    }
}

impl Iterator for BisectionSteps<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        match self.phase {
            StepPhase::FallbackUniform | StepPhase::Done => return None,
            StepPhase::SeekingContact | StepPhase::Converged => {}
        }
        if self.iters >= self.max_iters {
            self.phase = StepPhase::FallbackUniform;
            return None;
        }
        self.phase = StepPhase::SeekingContact;
        self.world.particles.snapshot(self.backup);

        // First guess assumes contacts are evenly spread over the macro-step
        let remaining = self.remaining;
        let mut lo = 0.0;
        let mut hi = (self.step_size / self.c_est).min(remaining * (1.0 - TRIAL_STEP_SHRINK));
        let mut depth = self.depth;

        while hi < remaining {
            if self.causes_collision(hi) {
                break;
            }
            depth += 1;
            self.iters += 1;
            hi += hi - lo;
        }
        if hi >= remaining {
            hi = remaining;
            if !self.causes_collision(remaining) {
                self.phase = StepPhase::Done;
                self.iters += 1;
                return Some(self.commit(remaining));
            }
        }
        self.iters += depth;

        for _ in 0..=depth {
            let mid = lo + (hi - lo) * 0.5;
            if self.causes_collision(mid) {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        self.phase = StepPhase::Converged;
        Some(self.commit(hi))
    }
}

/// Outcome of one macro-step
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// Sub-step budget the macro-step was given
    pub budget: usize,
    /// Sub-steps committed by the contact search
    pub contact_steps: usize,
    /// Uniform sub-steps covering the remainder
    pub uniform_steps: usize,
    /// Sub-step evaluations, trials included
    pub iterations: usize,
    /// Particle collisions in the macro-step
    pub collisions: u64,
}

/// Particle engine with its boundary, stepping and reversal state
#[derive(Debug)]
pub struct Simulation {
    settings: SimSettings,
    world: World,
    bisection: BisectionIterator,
    recorder: ReverseRecorder,
    rng: Pcg32,
    /// Running wall-clock cost of one sub-step (ms)
    avg_iter_ms: f64,
}

impl Simulation {
    /// Build the boundary and fill it at the configured density
    pub fn new(settings: SimSettings, source: BoundarySource) -> Self {
        let mut rng = Pcg32::seed_from_u64(settings.seed);
        let boundary = Boundary::new(source, &settings.boundary, &mut rng);
        let particles = ParticleStore::new(settings.radius, settings.elasticity);
        let count = density_to_count(settings.density.min(MAX_DENSITY), settings.radius, boundary.area());

        let mut sim = Self {
            world: World::new(particles, boundary),
            bisection: BisectionIterator::new(),
            recorder: ReverseRecorder::new(),
            rng,
            avg_iter_ms: settings.frame_budget_ms,
            settings,
        };
        sim.update_particles(count);
        sim
    }

    pub fn settings(&self) -> &SimSettings {
        &self.settings
    }

    pub fn particles(&self) -> &ParticleStore {
        &self.world.particles
    }

    /// Direct access for hosts that place particles themselves
    ///
    /// The recorder is reset, since arbitrary edits break reversibility.
    pub fn particles_mut(&mut self) -> &mut ParticleStore {
        self.recorder.reset(&self.world.particles);
        &mut self.world.particles
    }

    pub fn boundary(&self) -> &Boundary {
        &self.world.boundary
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn recorder(&self) -> &ReverseRecorder {
        &self.recorder
    }

    pub fn recorder_mode(&self) -> RecorderMode {
        self.recorder.mode()
    }

    pub fn avg_iter_ms(&self) -> f64 {
        self.avg_iter_ms
    }

    /// Current packing density inside the boundary
    pub fn density(&self) -> f64 {
        count_to_density(self.world.particles.len(), self.world.particles.radius, self.world.boundary.area())
    }

    pub fn set_step_size(&mut self, step_size: f64) {
        self.settings.step_size = step_size.max(0.0);
    }

    pub fn update_boundary(&mut self, source: BoundarySource) {
        self.world.boundary.update(source, &self.settings.boundary, &mut self.rng);
        self.recorder.reset(&self.world.particles);
    }

    /// Change the particle count
    ///
    /// Existing particles keep their state; new ones are placed inside the
    /// boundary with random unit velocities.
    pub fn update_particles(&mut self, count: usize) {
        let prev = self.world.particles.len();
        self.world.particles.set_count(count);

        let r = self.world.particles.radius;
        for i in prev..count {
            self.world.particles.pos[i] = self.world.boundary.sample_inside(r, &mut self.rng);
            self.world.particles.vel[i] = random_direction(&mut self.rng);
        }

        self.recorder.reset(&self.world.particles);
        if prev > 0 && count > 0 {
            self.avg_iter_ms *= count as f64 / prev as f64;
        }
        self.world.index.resize(r);
        log::info!("Particle count {} -> {} (density {:.3})", prev, count, self.density());
    }

    /// Change the count to reach a packing density (capped at hexagonal packing)
    pub fn set_density(&mut self, density: f64) {
        self.settings.density = density.clamp(0.0, MAX_DENSITY);
        let count = density_to_count(
            self.settings.density,
            self.world.particles.radius,
            self.world.boundary.area(),
        );
        self.update_particles(count);
    }

    pub fn set_radius(&mut self, radius: f64) {
        self.settings.radius = radius;
        self.world.particles.radius = radius;
        self.world.index.resize(radius);
        self.recorder.reset(&self.world.particles);
    }

    pub fn set_elasticity(&mut self, elasticity: f64) {
        self.settings.elasticity = elasticity;
        self.world.particles.elasticity = elasticity;
        self.recorder.reset(&self.world.particles);
    }

    /// Give every particle a new random unit velocity
    pub fn randomise_velocities(&mut self) {
        let n = self.world.particles.len();
        for v in &mut self.world.particles.vel[..n] {
            *v = random_direction(&mut self.rng);
        }
        self.recorder.reset(&self.world.particles);
    }

    /// Resample every particle's position and velocity
    pub fn reposition(&mut self) {
        let r = self.world.particles.radius;
        for i in 0..self.world.particles.len() {
            self.world.particles.pos[i] = self.world.boundary.sample_inside(r, &mut self.rng);
            self.world.particles.vel[i] = random_direction(&mut self.rng);
        }
        self.recorder.reset(&self.world.particles);
    }

    /// Start recording for later reversal (elastic only)
    pub fn record(&mut self) {
        self.recorder.record(&self.world.particles);
    }

    /// Flip every velocity; replays the recording if one is active
    pub fn reverse(&mut self) {
        self.recorder.reverse(&mut self.world.particles);
    }

    /// Run one macro-step sized by the wall-clock budget
    pub fn frame(&mut self) -> FrameStats {
        let start = Instant::now();
        let budget = self.settings.macro_step_budget_ms();
        let stats = self.advance(substep_budget(budget, self.avg_iter_ms));

        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        self.avg_iter_ms = elapsed / stats.iterations.max(1) as f64;
        stats
    }

    /// Run one macro-step with an explicit sub-step budget
    pub fn advance(&mut self, budget: usize) -> FrameStats {
        let budget = budget.clamp(1, MAX_SUBSTEPS);
        let step_size = self.settings.step_size;
        let expected = self.world.particles.collisions;
        self.world.particles.collisions = 0;

        let mut contact_steps = 0;
        let mut steps = self.bisection.steps(&mut self.world, step_size, budget, expected);
        for _ in &mut steps {
            contact_steps += 1;
        }
        let remaining = steps.remaining().max(0.0);
        let mut iterations = steps.iterations();

        let uniform_steps = if step_size > 0.0 && remaining > 0.0 {
            (budget as f64 * remaining / step_size).ceil() as usize
        } else {
            0
        };
        if uniform_steps > 0 {
            let dt = remaining / uniform_steps as f64;
            for _ in 0..uniform_steps {
                self.world.iter(dt);
            }
        }
        iterations += uniform_steps;

        self.recorder.step(&mut self.world.particles);

        let dropped = self.world.take_overflow();
        if dropped > 0 {
            log::warn!("Spatial grid overflow: {} particle(s) missed collision checks", dropped);
        }

        let stats = FrameStats {
            budget,
            contact_steps,
            uniform_steps,
            iterations,
            collisions: self.world.particles.collisions,
        };
        log::debug!("{:?}", stats);
        stats
    }
}

/// Sub-steps that fit in `budget_ms` at `avg_iter_ms` each, within `[1, MAX_SUBSTEPS]`
///
/// A zero average (a frame too fast to time) yields the maximum.
fn substep_budget(budget_ms: f64, avg_iter_ms: f64) -> usize {
    (budget_ms / avg_iter_ms).ceil().max(1.0).min(MAX_SUBSTEPS as f64) as usize
}

fn random_direction<R: Rng>(rng: &mut R) -> DVec2 {
    DVec2::from_angle(rng.random::<f64>() * std::f64::consts::TAU)
}
