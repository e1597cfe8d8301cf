//! Reverse recorder
//!
//! While recording, every macro-step logs the prior state of each particle
//! whose velocity changed. After `reverse()` the log is replayed backwards,
//! restoring those particles exactly so the trajectory retraces itself.

use glam::DVec2;
use serde::{Deserialize, Serialize};

use super::particles::ParticleStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderMode {
    #[default]
    Inactive,
    Recording,
    Playing,
}

/// Prior state of one particle before a logged macro-step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    pub step: usize,
    pub index: usize,
    pub position: DVec2,
    pub velocity: DVec2,
}

/// Sparse log of velocity changes for replaying a run backwards
///
/// Only particles whose velocity changed in a macro-step are logged. Playback
/// is exact while the reversed run produces the same collisions as the
/// forward one. A particle that was never logged can still pick up roundoff
/// from free flight, and if that lets it touch a neighbour it missed going
/// forward (likely when placement left pairs overlapping, or at high density)
/// the divergence spreads from there. The log is not a full snapshot per step.
#[derive(Debug, Clone, Default)]
pub struct ReverseRecorder {
    mode: RecorderMode,
    /// Particle state at the end of the previous macro-step
    buffer: ParticleStore,
    log: Vec<RecordEntry>,
    /// Macro-steps recorded (or still to be replayed)
    position: usize,
}

impl ReverseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    pub fn entries(&self) -> &[RecordEntry] {
        &self.log
    }

    /// Macro-steps currently held by the log
    pub fn steps(&self) -> usize {
        self.position
    }

    /// Start a fresh recording; only possible for elastic dynamics
    pub fn record(&mut self, particles: &ParticleStore) {
        if particles.elasticity != 1.0 {
            return;
        }
        self.reset(particles);
        self.mode = RecorderMode::Recording;
    }

    /// Negate all velocities and flip between recording and playing
    pub fn reverse(&mut self, particles: &mut ParticleStore) {
        particles.negate_velocities();
        particles.snapshot(&mut self.buffer);
        self.mode = match self.mode {
            RecorderMode::Recording => RecorderMode::Playing,
            RecorderMode::Playing => RecorderMode::Recording,
            RecorderMode::Inactive => RecorderMode::Inactive,
        };
        log::debug!("Recorder reversed, now {:?} with {} steps", self.mode, self.position);
    }

    pub fn reset(&mut self, particles: &ParticleStore) {
        self.log.clear();
        self.position = 0;
        particles.snapshot(&mut self.buffer);
        self.mode = RecorderMode::Inactive;
    }

    /// Observe the particles after a macro-step
    pub fn step(&mut self, particles: &mut ParticleStore) {
        match self.mode {
            RecorderMode::Inactive => {}
            RecorderMode::Recording => {
                let n = particles.len().min(self.buffer.len());
                for i in 0..n {
                    if particles.vel[i] != self.buffer.vel[i] {
                        self.log.push(RecordEntry {
                            step: self.position,
                            index: i,
                            position: self.buffer.pos[i],
                            velocity: self.buffer.vel[i],
                        });
                    }
                }
                self.position += 1;
                particles.snapshot(&mut self.buffer);
            }
            RecorderMode::Playing => {
                if self.position == 0 || self.log.is_empty() {
                    self.record(particles);
                    if self.mode == RecorderMode::Playing {
                        self.mode = RecorderMode::Inactive;
                    }
                    return;
                }
                self.position -= 1;
                while let Some(entry) = self.log.last().copied() {
                    if entry.step != self.position {
                        break;
                    }
                    self.log.pop();
                    particles.pos[entry.index] = entry.position;
                    particles.vel[entry.index] = -entry.velocity;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(elasticity: f64) -> ParticleStore {
        let mut store = ParticleStore::new(0.05, elasticity);
        store.set_count(2);
        store.vel[0] = DVec2::X;
        store.vel[1] = -DVec2::X;
        store
    }

    #[test]
    fn test_record_requires_elastic() {
        let p = store(0.9);
        let mut recorder = ReverseRecorder::new();
        recorder.record(&p);
        assert_eq!(recorder.mode(), RecorderMode::Inactive);

        let p = store(1.0);
        recorder.record(&p);
        assert_eq!(recorder.mode(), RecorderMode::Recording);
    }

    #[test]
    fn test_only_changed_velocities_are_logged() {
        let mut p = store(1.0);
        let mut recorder = ReverseRecorder::new();
        recorder.record(&p);

        p.pos[0] = DVec2::new(0.1, 0.0);
        recorder.step(&mut p);
        assert!(recorder.entries().is_empty());

        p.vel[1] = DVec2::Y;
        recorder.step(&mut p);
        assert_eq!(recorder.entries().len(), 1);
        let entry = recorder.entries()[0];
        assert_eq!(entry.step, 1);
        assert_eq!(entry.index, 1);
        assert_eq!(entry.velocity, -DVec2::X);
        assert_eq!(recorder.steps(), 2);
    }

    #[test]
    fn test_reverse_flips_mode_and_velocities() {
        let mut p = store(1.0);
        let mut recorder = ReverseRecorder::new();
        recorder.record(&p);
        recorder.reverse(&mut p);
        assert_eq!(recorder.mode(), RecorderMode::Playing);
        assert_eq!(p.vel[0], -DVec2::X);
        recorder.reverse(&mut p);
        assert_eq!(recorder.mode(), RecorderMode::Recording);
        assert_eq!(p.vel[0], DVec2::X);
    }

    #[test]
    fn test_playback_restores_logged_state() {
        let mut p = store(1.0);
        let mut recorder = ReverseRecorder::new();
        recorder.record(&p);

        // Step 0: particle 0 bounces
        p.pos[0] = DVec2::new(0.2, 0.0);
        p.vel[0] = -DVec2::X;
        recorder.step(&mut p);

        recorder.reverse(&mut p);
        p.pos[0] = DVec2::new(0.25, 0.0);
        recorder.step(&mut p);
        assert_eq!(p.pos[0], DVec2::ZERO);
        assert_eq!(p.vel[0], -DVec2::X);
        assert!(recorder.entries().is_empty());

        // Log exhausted: recording restarts
        recorder.step(&mut p);
        assert_eq!(recorder.mode(), RecorderMode::Recording);
    }

    #[test]
    fn test_exhausted_playback_goes_inactive_when_inelastic() {
        let mut p = store(1.0);
        let mut recorder = ReverseRecorder::new();
        recorder.record(&p);
        recorder.reverse(&mut p);
        p.elasticity = 0.5;
        recorder.step(&mut p);
        assert_eq!(recorder.mode(), RecorderMode::Inactive);
    }
}
