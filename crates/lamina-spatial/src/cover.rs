//! Bounded-memory region covering.
//!
//! Produces at most `max_cells` cells whose union contains the region.
//! Candidates expand through a priority queue, coarsest first; a candidate
//! becomes terminal when the region fully contains it or it reaches
//! `max_level`. The result is normalized (four siblings collapse into the
//! parent) and then coarsened until it fits the cell budget.

use crate::cell::{CellId, LatLon, MAX_LEVEL};
use std::{cmp::Reverse, collections::BinaryHeap};

///
/// Region
///

pub trait Region {
    /// Conservative: must be true whenever any part of the region lies in
    /// the cell. False positives only cost covering quality.
    fn may_intersect(&self, cell: CellId) -> bool;

    /// Exact-or-conservative in the other direction: true only when the
    /// whole cell lies inside the region.
    fn contains_cell(&self, cell: CellId) -> bool;
}

///
/// Cap
///
/// Spherical cap: center plus an angular radius in degrees.
///

#[derive(Clone, Copy, Debug)]
pub struct Cap {
    pub center: LatLon,
    pub radius_deg: f64,
}

impl Cap {
    #[must_use]
    pub const fn new(center: LatLon, radius_deg: f64) -> Self {
        Self { center, radius_deg }
    }

    // Upper bound on the angle from a cell's center to any of its points.
    fn cell_angle(level: u8) -> f64 {
        90.0 / f64::from(1u32 << level.min(26))
    }
}

impl Region for Cap {
    fn may_intersect(&self, cell: CellId) -> bool {
        let distance = self.center.angle_to(&cell.to_lat_lon());
        distance <= self.radius_deg + Self::cell_angle(cell.level())
    }

    fn contains_cell(&self, cell: CellId) -> bool {
        let distance = self.center.angle_to(&cell.to_lat_lon());
        distance + Self::cell_angle(cell.level()) <= self.radius_deg
    }
}

///
/// RegionCoverer
///

#[derive(Clone, Copy, Debug)]
pub struct RegionCoverer {
    pub min_level: u8,
    pub max_level: u8,
    pub max_cells: usize,
}

impl Default for RegionCoverer {
    fn default() -> Self {
        Self {
            min_level: 0,
            max_level: MAX_LEVEL,
            max_cells: 8,
        }
    }
}

impl RegionCoverer {
    /// Cells whose union contains `region`, at most `max_cells` of them.
    #[must_use]
    pub fn covering(&self, region: &dyn Region) -> Vec<CellId> {
        let max_level = self.max_level.min(MAX_LEVEL);
        let min_level = self.min_level.min(max_level);
        let max_cells = self.max_cells.max(1);

        // Coarsest candidates pop first. Expansion is bounded: once enough
        // terminal cells have accumulated, remaining candidates are taken
        // as-is instead of subdividing further.
        let mut heap: BinaryHeap<Reverse<(u8, CellId)>> = BinaryHeap::new();
        for candidate in face_candidates(region, min_level) {
            heap.push(Reverse((candidate.level(), candidate)));
        }

        let expansion_budget = max_cells.saturating_mul(4).max(64);
        let mut result = Vec::new();

        while let Some(Reverse((level, cell))) = heap.pop() {
            let terminal = region.contains_cell(cell)
                || level >= max_level
                || result.len() + heap.len() >= expansion_budget;

            if terminal {
                result.push(cell);
                continue;
            }

            for child in cell.children() {
                if region.may_intersect(child) {
                    heap.push(Reverse((child.level(), child)));
                }
            }
        }

        normalize(&mut result);
        coarsen(&mut result, max_cells, min_level);
        result
    }
}

// Expand each of the six face cells down to `min_level`, keeping only
// cells that may intersect the region.
fn face_candidates(region: &dyn Region, min_level: u8) -> Vec<CellId> {
    let mut out = Vec::new();
    for face in 0..6 {
        subdivide_to(CellId::from_face(face), min_level, region, &mut out);
    }
    out
}

fn coarsen(cells: &mut Vec<CellId>, max_cells: usize, min_level: u8) {
    while cells.len() > max_cells {
        let Some(finest) = cells.iter().map(|c| c.level()).max() else {
            return;
        };
        if finest == 0 || finest <= min_level {
            return; // face cells cannot merge further
        }

        for cell in cells.iter_mut() {
            if cell.level() == finest {
                *cell = cell.parent(finest - 1);
            }
        }
        normalize(cells);
    }
}

fn subdivide_to(cell: CellId, level: u8, region: &dyn Region, out: &mut Vec<CellId>) {
    if !region.may_intersect(cell) {
        return;
    }
    if cell.level() >= level {
        out.push(cell);
        return;
    }
    for child in cell.children() {
        subdivide_to(child, level, region, out);
    }
}

// Sort, drop cells covered by an ancestor in the set, and replace any four
// complete siblings with their parent (repeating to fixpoint).
fn normalize(cells: &mut Vec<CellId>) {
    cells.sort();
    cells.dedup();

    // Remove descendants of earlier cells; sorted order puts ancestors
    // first within their leaf range.
    let mut pruned: Vec<CellId> = Vec::with_capacity(cells.len());
    for &cell in cells.iter() {
        if pruned.last().is_none_or(|prev| !prev.contains(cell)) {
            pruned.push(cell);
        }
    }
    *cells = pruned;

    loop {
        let mut merged = false;
        let mut out: Vec<CellId> = Vec::with_capacity(cells.len());
        let mut idx = 0;

        while idx < cells.len() {
            let cell = cells[idx];
            if cell.level() > 0 && idx + 3 < cells.len() {
                let parent = cell.parent(cell.level() - 1);
                let siblings = parent.children();
                if cells[idx..idx + 4] == siblings {
                    out.push(parent);
                    idx += 4;
                    merged = true;
                    continue;
                }
            }
            out.push(cell);
            idx += 1;
        }

        *cells = out;
        if !merged {
            return;
        }
    }
}
