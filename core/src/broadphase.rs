use std::collections::{HashMap, HashSet};

use crate::body::BodyHandle;
use crate::math::Aabb;

/// Uniform grid over cached body AABBs.
///
/// Produces candidate pairs only; the world filters them by exact AABB
/// overlap, sleep state and connection sets, so the surviving pair set
/// matches a plain O(n^2) sweep.
pub struct SpatialHash {
    inv_cell_size: f32,
    cells: HashMap<(i32, i32), Vec<BodyHandle>>,
}

impl SpatialHash {
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 64.0 };
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Insert a body into every cell its AABB covers.
    pub fn insert(&mut self, handle: BodyHandle, aabb: &Aabb) {
        let x0 = (aabb.min.x * self.inv_cell_size).floor() as i32;
        let y0 = (aabb.min.y * self.inv_cell_size).floor() as i32;
        let x1 = (aabb.max.x * self.inv_cell_size).floor() as i32;
        let y1 = (aabb.max.y * self.inv_cell_size).floor() as i32;

        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().push(handle);
            }
        }
    }

    /// Collect unique pairs of bodies that share at least one cell.
    pub fn pairs(&self) -> Vec<(BodyHandle, BodyHandle)> {
        let mut seen = HashSet::new();
        let mut pairs = Vec::new();

        for cell in self.cells.values() {
            let n = cell.len();
            for i in 0..n {
                for j in (i + 1)..n {
                    let a = cell[i];
                    let b = cell[j];
                    let pair = if a < b { (a, b) } else { (b, a) };
                    if seen.insert(pair) {
                        pairs.push(pair);
                    }
                }
            }
        }
        pairs
    }
}
