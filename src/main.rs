//! Particle Toy entry point
//!
//! Headless native demo: fills a circular boundary, records a run, reverses
//! it and reports how closely the particles returned to their start.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Particle Toy (native) starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => match load_settings(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Failed to load settings from {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => particle_toy::SimSettings::default(),
    };

    run(settings);
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The engine is driven by the host page on wasm
}

#[cfg(not(target_arch = "wasm32"))]
fn load_settings(path: &str) -> Result<particle_toy::SimSettings, Box<dyn std::error::Error>> {
    let json = std::fs::read_to_string(path)?;
    Ok(particle_toy::SimSettings::from_json(&json)?)
}

#[cfg(not(target_arch = "wasm32"))]
fn run(settings: particle_toy::SimSettings) {
    use glam::DVec2;
    use particle_toy::sim::{BoundarySource, Simulation, Ticker};

    const FRAMES: usize = 240;

    let mut ticker = Ticker::new(settings.frame_interval);
    let mut sim = Simulation::new(settings, BoundarySource::circle(DVec2::ZERO, 0.95));
    log::info!(
        "{} particles, radius {:.4}, boundary area {:.4}",
        sim.particles().len(),
        sim.particles().radius,
        sim.boundary().area()
    );

    let start = sim.particles().clone();
    sim.record();
    ticker.playing = true;

    let mut collisions = 0;
    let mut macro_steps = 0;
    for _ in 0..FRAMES {
        ticker.tick(|| {
            collisions += sim.frame().collisions;
            macro_steps += 1;
        });
    }
    log::info!(
        "Forward: {} macro-steps, {} collisions, {:.3} ms per sub-step",
        macro_steps,
        collisions,
        sim.avg_iter_ms()
    );

    sim.reverse();
    for _ in 0..macro_steps {
        sim.frame();
    }

    let drift = start
        .positions()
        .iter()
        .zip(sim.particles().positions())
        .map(|(a, b)| a.distance(*b))
        .fold(0.0, f64::max);
    log::info!("Reversed: max position drift {:e}", drift);
    println!(
        "{} particles, {} macro-steps forward and back, max drift {:e}",
        start.len(),
        macro_steps,
        drift
    );
}
