//! Deterministic simulation module
//!
//! All physics lives here. Given the same settings, seed and sub-step
//! budgets the simulation is bit-for-bit reproducible:
//! - Seeded RNG only
//! - Stable iteration order (by particle index)
//! - No rendering or platform dependencies

pub mod boundary;
pub mod collision;
pub mod grid;
pub mod particles;
pub mod recorder;
pub mod stepper;
pub mod ticker;

pub use boundary::{AnalyticBoundary, Boundary, BoundaryShape, BoundarySource, DistanceField, DistanceFn, TracedBoundary};
pub use collision::{BoundaryContact, collide_boundary, collide_particles, effective_elasticity};
pub use grid::SpatialIndex;
pub use particles::ParticleStore;
pub use recorder::{RecordEntry, RecorderMode, ReverseRecorder};
pub use stepper::{BisectionIterator, BisectionSteps, FrameStats, Simulation, StepPhase, World};
pub use ticker::Ticker;
