//! Nearest boundary sample lookup built with the jump flood algorithm
//!
//! Candidate samples are placed along every spline and each grid cell ends up
//! referencing the samples nearest to its center. Point queries compare the
//! candidates of one cell and then refine the winner on the continuous curve
//! with a golden-section search.

use std::ops::Range;

use glam::DVec2;

use super::spline::BSpline;
use crate::settings::BoundarySettings;
use crate::{cell_to_domain, domain_to_cell};

/// Marks a cell with no sample
const EMPTY: u32 = u32::MAX;

/// 1 / phi
const INV_PHI: f64 = 0.618_033_988_749_894_8;

/// Extra step=1 jump flood passes after the halving sequence
const FINE_PASSES: usize = 2;

/// A candidate point on one spline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub spline: u32,
    pub t: f64,
    pub pos: DVec2,
}

/// Result of a closest point query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub spline: usize,
    pub t: f64,
    pub point: DVec2,
}

/// Square grid over the logical domain mapping cells to nearby samples
#[derive(Debug, Clone)]
pub struct SampleLookup {
    resolution: usize,
    candidates: usize,
    samples: Vec<Sample>,
    /// Sample index range owned by each spline (samples are stored in parameter order)
    spans: Vec<Range<usize>>,
    /// Parameter spacing between neighbouring samples of each spline
    spacing: Vec<f64>,
    /// `resolution^2 * candidates` sample indices, nearest first, padded with `EMPTY`
    cells: Vec<u32>,
}

impl SampleLookup {
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Candidate sample indices stored for a cell
    pub fn cell(&self, xi: usize, yi: usize) -> impl Iterator<Item = usize> + '_ {
        let start = (yi * self.resolution + xi) * self.candidates;
        self.cells[start..start + self.candidates]
            .iter()
            .take_while(|&&s| s != EMPTY)
            .map(|&s| s as usize)
    }

    /// Step to neighbouring samples of the same spline while that gets closer to `p`
    fn descend(&self, mut best: usize, p: DVec2) -> usize {
        let span = &self.spans[self.samples[best].spline as usize];
        let len = span.len();
        if len < 3 {
            return best;
        }
        let mut best_d = self.samples[best].pos.distance_squared(p);
        for _ in 0..len {
            let local = best - span.start;
            let prev = span.start + (local + len - 1) % len;
            let next = span.start + (local + 1) % len;
            let dp = self.samples[prev].pos.distance_squared(p);
            let dn = self.samples[next].pos.distance_squared(p);
            if dp < best_d && dp <= dn {
                best = prev;
                best_d = dp;
            } else if dn < best_d {
                best = next;
                best_d = dn;
            } else {
                break;
            }
        }
        best
    }
}

/// Place candidate samples along each spline
///
/// Consecutive samples closer than `min_gap` are merged so no two entries
/// describe the same spot on the curve.
fn place_samples(
    splines: &[BSpline],
    per_segment: usize,
    min_gap: f64,
) -> (Vec<Sample>, Vec<Range<usize>>, Vec<f64>) {
    let per_segment = per_segment.max(1);
    let mut samples = Vec::new();
    let mut spans = Vec::with_capacity(splines.len());
    let mut spacing = Vec::with_capacity(splines.len());

    for (si, spline) in splines.iter().enumerate() {
        let start = samples.len();
        let count = spline.segments() * per_segment;
        let dt = 1.0 / per_segment as f64;
        let mut last: Option<DVec2> = None;
        for k in 0..count {
            let t = k as f64 * dt;
            let pos = spline.evaluate(t);
            if let Some(prev) = last {
                if prev.distance(pos) < min_gap {
                    continue;
                }
            }
            samples.push(Sample {
                spline: si as u32,
                t,
                pos,
            });
            last = Some(pos);
        }
        let kept = samples.len() - start;
        spans.push(start..samples.len());
        spacing.push(if kept > 0 {
            spline.segments() as f64 / kept as f64
        } else {
            0.0
        });
    }

    (samples, spans, spacing)
}

/// One jump flood pass: each cell adopts an axis neighbour's sample if it is closer
fn jump_flood_pass(samples: &[Sample], read: &[u32], write: &mut [u32], res: usize, step: usize) {
    for yi in 0..res {
        let y = cell_to_domain(yi, res);
        for xi in 0..res {
            let center = DVec2::new(cell_to_domain(xi, res), y);
            let i = yi * res + xi;
            let mut best = read[i];
            let mut best_d = if best == EMPTY {
                f64::INFINITY
            } else {
                samples[best as usize].pos.distance_squared(center)
            };

            let neighbours = [
                (xi >= step).then(|| i - step),
                (xi + step < res).then(|| i + step),
                (yi >= step).then(|| i - step * res),
                (yi + step < res).then(|| i + step * res),
            ];
            for j in neighbours.into_iter().flatten() {
                let candidate = read[j];
                if candidate == EMPTY {
                    continue;
                }
                let d = samples[candidate as usize].pos.distance_squared(center);
                if d < best_d {
                    best = candidate;
                    best_d = d;
                }
            }
            write[i] = best;
        }
    }
}

/// Build the nearest-sample lookup table for a set of splines
pub fn splines_to_sample_lookup(splines: &[BSpline], settings: &BoundarySettings) -> SampleLookup {
    let res = settings.lookup_resolution.max(2);
    let k = settings.candidates_per_cell.max(1);
    let cell = 2.0 / res as f64;
    let (samples, spans, spacing) = place_samples(splines, settings.samples_per_segment, cell * 0.25);

    let mut lookup = SampleLookup {
        resolution: res,
        candidates: k,
        samples,
        spans,
        spacing,
        cells: vec![EMPTY; res * res * k],
    };
    if lookup.samples.is_empty() {
        return lookup;
    }

    // Seed each cell with the sample closest to its center
    let mut table = vec![EMPTY; res * res];
    for (si, s) in lookup.samples.iter().enumerate() {
        let xi = domain_to_cell(s.pos.x, res);
        let yi = domain_to_cell(s.pos.y, res);
        let i = yi * res + xi;
        let center = DVec2::new(cell_to_domain(xi, res), cell_to_domain(yi, res));
        let replace = table[i] == EMPTY
            || s.pos.distance_squared(center)
                < lookup.samples[table[i] as usize].pos.distance_squared(center);
        if replace {
            table[i] = si as u32;
        }
    }

    // Jump flood: step 1, halving steps from res/2, then extra fine passes
    let mut steps = vec![1];
    let mut step = res / 2;
    while step >= 1 {
        steps.push(step);
        step /= 2;
    }
    steps.extend(std::iter::repeat_n(1, FINE_PASSES));

    let mut buffer = table.clone();
    for step in steps {
        jump_flood_pass(&lookup.samples, &table, &mut buffer, res, step);
        std::mem::swap(&mut table, &mut buffer);
    }

    // Local search along each winner's spline
    for yi in 0..res {
        let y = cell_to_domain(yi, res);
        for xi in 0..res {
            let i = yi * res + xi;
            if table[i] != EMPTY {
                let center = DVec2::new(cell_to_domain(xi, res), y);
                table[i] = lookup.descend(table[i] as usize, center) as u32;
            }
        }
    }

    // Expand each cell with the winners of its 3x3 neighbourhood
    let mut gathered: Vec<(f64, u32)> = Vec::with_capacity(9);
    for yi in 0..res {
        let y = cell_to_domain(yi, res);
        for xi in 0..res {
            let center = DVec2::new(cell_to_domain(xi, res), y);
            gathered.clear();
            for ny in yi.saturating_sub(1)..=(yi + 1).min(res - 1) {
                for nx in xi.saturating_sub(1)..=(xi + 1).min(res - 1) {
                    let s = table[ny * res + nx];
                    if s != EMPTY && !gathered.iter().any(|&(_, g)| g == s) {
                        let d = lookup.samples[s as usize].pos.distance_squared(center);
                        gathered.push((d, s));
                    }
                }
            }
            gathered.sort_by(|a, b| a.0.total_cmp(&b.0));
            let start = (yi * res + xi) * k;
            for (slot, &(_, s)) in gathered.iter().take(k).enumerate() {
                lookup.cells[start + slot] = s;
            }
        }
    }

    log::debug!(
        "Built {}x{} boundary lookup from {} samples on {} splines",
        res,
        res,
        lookup.samples.len(),
        splines.len()
    );

    lookup
}

/// Find the closest point on any spline to `p`
///
/// Queries outside the table are clamped to the nearest edge cell. Returns
/// `None` only when there are no splines at all.
pub fn closest_point_on_boundary(
    splines: &[BSpline],
    lookup: &SampleLookup,
    p: DVec2,
    refine_iterations: usize,
) -> Option<ClosestPoint> {
    let res = lookup.resolution;
    let xi = domain_to_cell(p.x, res);
    let yi = domain_to_cell(p.y, res);

    let best = lookup
        .cell(xi, yi)
        .map(|s| (lookup.samples[s].pos.distance_squared(p), s))
        .min_by(|a, b| a.0.total_cmp(&b.0))?
        .1;
    let best = lookup.descend(best, p);

    let sample = lookup.samples[best];
    let si = sample.spline as usize;
    let spline = &splines[si];
    let h = lookup.spacing[si];
    let f = |t: f64| spline.evaluate(t).distance_squared(p);

    // Golden-section search over one sample spacing either side
    let (mut a, mut b) = (sample.t - h, sample.t + h);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c);
    let mut fd = f(d);
    for _ in 0..refine_iterations {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d);
        }
    }

    let mut t = (a + b) * 0.5;
    if f(t) > f(sample.t) {
        t = sample.t;
    }
    let t = t.rem_euclid(spline.segments() as f64);

    Some(ClosestPoint {
        spline: si,
        t,
        point: spline.evaluate(t),
    })
}
