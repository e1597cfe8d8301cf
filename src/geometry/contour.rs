//! Boundary tracing over a wall mask
//!
//! Marching squares places a vertex at every pixel corner where neighbouring
//! mask values differ. Vertices are linked along pixel edges into a graph where
//! every vertex has exactly two neighbours (saddle corners are split in two),
//! so each connected component is a closed loop.

use glam::DVec2;

use super::image::Mask;
use crate::consts::{BOUNDARY_EXTENT, MIN_LOOP_VERTICES};

/// A closed loop of vertices. Traced loops keep the wall on their left.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon {
    pub points: Vec<DVec2>,
}

impl Polygon {
    pub fn new(points: Vec<DVec2>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shoelace area; positive when the loop turns counter-clockwise (y up)
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        (0..n)
            .map(|i| crate::cross(self.points[i], self.points[(i + 1) % n]))
            .sum::<f64>()
            * 0.5
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    Up = 0,
    Left = 1,
    Right = 2,
    Down = 3,
}

impl Dir {
    fn opposite(self) -> Dir {
        match self {
            Dir::Up => Dir::Down,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
            Dir::Down => Dir::Up,
        }
    }

    fn offset(self) -> (isize, isize) {
        match self {
            Dir::Up => (0, -1),
            Dir::Left => (-1, 0),
            Dir::Right => (1, 0),
            Dir::Down => (0, 1),
        }
    }
}

const NONE: usize = usize::MAX;

struct Vertex {
    pos: DVec2,
    block: (usize, usize),
    dirs: [Dir; 2],
}

/// Trace every closed boundary in the mask (pixel-corner coordinates)
///
/// Loops shorter than [`MIN_LOOP_VERTICES`] are dropped as noise. A mask
/// without any boundary yields an empty list.
pub fn mask_to_polygons(mask: &Mask) -> Vec<Polygon> {
    if mask.width < 2 || mask.height < 2 {
        return Vec::new();
    }
    let bw = mask.width - 1;
    let bh = mask.height - 1;

    // Vertex owning each (block, direction) edge
    let mut ports = vec![[NONE; 4]; bw * bh];
    let mut vertices: Vec<Vertex> = Vec::new();

    for y in 0..bh {
        for x in 0..bw {
            let tl = mask.is_wall(x, y);
            let tr = mask.is_wall(x + 1, y);
            let bl = mask.is_wall(x, y + 1);
            let br = mask.is_wall(x + 1, y + 1);

            let mut dirs = Vec::with_capacity(4);
            if tl != tr {
                dirs.push(Dir::Up);
            }
            if tl != bl {
                dirs.push(Dir::Left);
            }
            if tr != br {
                dirs.push(Dir::Right);
            }
            if bl != br {
                dirs.push(Dir::Down);
            }

            let pairs: Vec<[Dir; 2]> = match dirs.len() {
                2 => vec![[dirs[0], dirs[1]]],
                // Saddle: keep the two inside pixels apart, let the walls touch diagonally
                4 if tl => vec![[Dir::Up, Dir::Right], [Dir::Left, Dir::Down]],
                4 => vec![[Dir::Up, Dir::Left], [Dir::Right, Dir::Down]],
                _ => continue,
            };

            let pos = DVec2::new(x as f64 + 1.0, y as f64 + 1.0);
            for pair in pairs {
                let id = vertices.len();
                for d in pair {
                    ports[y * bw + x][d as usize] = id;
                }
                vertices.push(Vertex {
                    pos,
                    block: (x, y),
                    dirs: pair,
                });
            }
        }
    }

    let links: Vec<[usize; 2]> = vertices
        .iter()
        .map(|v| {
            v.dirs.map(|d| {
                let (dx, dy) = d.offset();
                let nx = v.block.0 as isize + dx;
                let ny = v.block.1 as isize + dy;
                if nx < 0 || ny < 0 || nx >= bw as isize || ny >= bh as isize {
                    return NONE;
                }
                ports[ny as usize * bw + nx as usize][d.opposite() as usize]
            })
        })
        .collect();

    let mut visited = vec![false; vertices.len()];
    let mut polygons = Vec::new();

    for start in 0..vertices.len() {
        if visited[start] {
            continue;
        }

        let mut points = Vec::new();
        let mut prev = NONE;
        let mut cur = start;
        let mut closed = false;
        loop {
            visited[cur] = true;
            points.push(vertices[cur].pos);

            let [a, b] = links[cur];
            let next = if a != prev { a } else { b };
            if next == NONE {
                break;
            }
            if next == start {
                closed = true;
                break;
            }
            if visited[next] {
                break;
            }
            prev = cur;
            cur = next;
        }

        if !closed || points.len() < MIN_LOOP_VERTICES {
            continue;
        }

        let mut polygon = Polygon::new(points);
        orient_wall_left(&mut polygon, mask);
        polygons.push(polygon);
    }

    polygons
}

/// Reverse the loop if the pixel left of its first edge is not wall
fn orient_wall_left(polygon: &mut Polygon, mask: &Mask) {
    let p0 = polygon.points[0];
    let p1 = polygon.points[1];
    let probe = (p0 + p1) * 0.5 + (p1 - p0).perp() * 0.5;
    let px = probe.x.floor();
    let py = probe.y.floor();
    if px < 0.0 || py < 0.0 {
        return;
    }
    let (px, py) = (px as usize, py as usize);
    if px < mask.width && py < mask.height && !mask.is_wall(px, py) {
        polygon.points.reverse();
    }
}

/// Diffusion smoothing of a closed loop
///
/// Each pass replaces every vertex with the mean of itself and its two
/// neighbours, using a sliding window sum. Repeated passes converge towards a
/// Gaussian filter of the curve.
pub fn smooth_polygon(polygon: &mut Polygon, iterations: usize) {
    let n = polygon.points.len();
    if n < 3 {
        return;
    }
    let pts = &mut polygon.points;
    let mut copy = pts.clone();
    for _ in 0..iterations {
        copy.copy_from_slice(pts);
        let mut sum = copy[n - 1] + copy[0] + copy[1];
        for i in 0..n {
            pts[i] = sum / 3.0;
            sum += copy[(i + 2) % n] - copy[(i + n - 1) % n];
        }
    }
}

/// Map traced loops into the logical domain
///
/// The shared bounding box is centred on the origin and scaled uniformly so
/// its longer side spans `[-BOUNDARY_EXTENT, BOUNDARY_EXTENT]`.
pub fn rescale_polygons(polygons: &mut [Polygon]) {
    let mut min = DVec2::splat(f64::INFINITY);
    let mut max = DVec2::splat(f64::NEG_INFINITY);
    for p in polygons.iter().flat_map(|p| p.points.iter()) {
        min = min.min(*p);
        max = max.max(*p);
    }
    if !min.is_finite() || !max.is_finite() {
        return;
    }

    let extent = (max - min).max_element();
    if extent <= 0.0 {
        return;
    }
    let center = (min + max) * 0.5;
    let scale = 2.0 * BOUNDARY_EXTENT / extent;
    for p in polygons.iter_mut().flat_map(|p| p.points.iter_mut()) {
        *p = (*p - center) * scale;
    }
}
