//! Uniform grid broad phase
//!
//! Cell edge is slightly larger than a particle diameter, so any overlapping
//! pair sits in the same or an adjacent cell. The grid covers the bounded
//! logical domain without wraparound and is rebuilt from scratch each sub-step.

use super::particles::ParticleStore;
use crate::consts::{BUCKET_CAPACITY, DOMAIN_HALF, DOMAIN_SIZE, GRID_EPSILON};

#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f64,
    inv_cell_size: f64,
    /// Cells per axis
    grid_len: usize,
    /// Cells scanned either side of a particle's own cell
    reach: usize,
    /// Bucket members, `BUCKET_CAPACITY` slots per cell
    buckets: Vec<u32>,
    counts: Vec<u8>,
    /// Cell of each indexed particle
    particle_cells: Vec<u32>,
    /// Members discarded by full buckets during the last `index()`
    dropped: usize,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self {
            cell_size: DOMAIN_SIZE,
            inv_cell_size: 1.0 / DOMAIN_SIZE,
            grid_len: 1,
            reach: 1,
            buckets: vec![0; BUCKET_CAPACITY],
            counts: vec![0; 1],
            particle_cells: Vec::new(),
            dropped: 0,
        }
    }
}

impl SpatialIndex {
    pub fn new(radius: f64) -> Self {
        let mut index = Self::default();
        index.resize(radius);
        index
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn grid_len(&self) -> usize {
        self.grid_len
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Recompute the cell size for a new radius, growing storage if needed
    pub fn resize(&mut self, radius: f64) {
        let diameter = 2.0 * radius * (1.0 + GRID_EPSILON);
        self.cell_size = if diameter.is_finite() && diameter > 0.0 {
            diameter.min(DOMAIN_SIZE)
        } else {
            DOMAIN_SIZE
        };
        self.inv_cell_size = 1.0 / self.cell_size;
        self.grid_len = ((DOMAIN_SIZE / self.cell_size).ceil() as usize).max(1);
        self.reach = ((2.0 * radius * self.inv_cell_size).ceil() as usize).max(1);

        let cells = self.grid_len * self.grid_len;
        if cells > self.counts.len() {
            let allocation = cells.next_power_of_two();
            self.counts = vec![0; allocation];
            self.buckets = vec![0; allocation * BUCKET_CAPACITY];
        }
    }

    #[inline]
    fn axis_cell(&self, v: f64) -> usize {
        (((v + DOMAIN_HALF) * self.inv_cell_size).floor().max(0.0) as usize).min(self.grid_len - 1)
    }

    /// Cell coordinates for a position, clamped into the grid
    #[inline]
    pub fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        (self.axis_cell(x), self.axis_cell(y))
    }

    /// Rebuild all buckets from the store's current positions
    ///
    /// Members beyond a bucket's capacity are discarded.
    pub fn index(&mut self, particles: &ParticleStore) {
        let cells = self.grid_len * self.grid_len;
        self.counts[..cells].fill(0);
        self.particle_cells.clear();
        self.dropped = 0;

        for (i, p) in particles.positions().iter().enumerate() {
            let (cx, cy) = self.cell_of(p.x, p.y);
            let cell = cy * self.grid_len + cx;
            self.particle_cells.push(cell as u32);

            let count = self.counts[cell] as usize;
            if count < BUCKET_CAPACITY {
                self.buckets[cell * BUCKET_CAPACITY + count] = i as u32;
                self.counts[cell] += 1;
            } else {
                self.dropped += 1;
            }
        }
    }

    /// Members of one cell
    #[inline]
    pub fn bucket(&self, cell: usize) -> &[u32] {
        let start = cell * BUCKET_CAPACITY;
        &self.buckets[start..start + self.counts[cell] as usize]
    }

    /// Visit every candidate pair `(i, j)` with `i < j` exactly once
    ///
    /// Uses the cells recorded by the last `index()`, so the callback may
    /// mutate velocities and displacements but must not rely on positions
    /// having been re-indexed.
    pub fn detect<F>(&self, mut callback: F)
    where
        F: FnMut(usize, usize),
    {
        let gl = self.grid_len;
        for (i, &cell) in self.particle_cells.iter().enumerate() {
            let cell = cell as usize;
            let (cx, cy) = (cell % gl, cell / gl);
            let y0 = cy.saturating_sub(self.reach);
            let y1 = (cy + self.reach).min(gl - 1);
            let x0 = cx.saturating_sub(self.reach);
            let x1 = (cx + self.reach).min(gl - 1);
            for y in y0..=y1 {
                for x in x0..=x1 {
                    for &j in self.bucket(y * gl + x) {
                        let j = j as usize;
                        if i < j {
                            callback(i, j);
                        }
                    }
                }
            }
        }
    }
}
