//! Octant spatial hashing.
//!
//! Boids are bucketed into one of 8 cells by the sign of each position
//! component:
//!
//! ```text
//! cell = (x > 0 ? 1 : 0) + (y > 0 ? 2 : 0) + (z > 0 ? 4 : 0)
//! ```
//!
//! The partition is deliberately coarse. It covers all of space with eight
//! unbounded buckets, so it only narrows neighbour search by up to 8x and
//! hides neighbours that sit across an axis plane. A finer scheme would use
//! fixed-width cells sized to the perception radius; switching to that would
//! change which boids see each other and is not done here.
//!
//! The index is rebuilt from scratch every cycle. Inserts are safe from any
//! number of worker threads at once.

use glam::Vec3;
use parking_lot::Mutex;
use rayon::prelude::*;

/// Number of octant cells.
pub const CELL_COUNT: usize = 8;

/// Octant cell id of a position.
#[inline]
pub fn octant_of(position: Vec3) -> u8 {
    (position.x > 0.0) as u8 + ((position.y > 0.0) as u8) * 2 + ((position.z > 0.0) as u8) * 4
}

/// Multi-map from octant cell id to boid index.
#[derive(Debug, Default)]
pub struct OctantIndex {
    cells: [Mutex<Vec<u32>>; CELL_COUNT],
}

impl OctantIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index with every cell able to hold `capacity` boids without growing.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: std::array::from_fn(|_| Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    /// Empty every cell, keeping allocations.
    pub fn clear(&self) {
        for cell in &self.cells {
            cell.lock().clear();
        }
    }

    /// Record `index` in `cell`. Safe to call concurrently.
    pub fn insert(&self, cell: u8, index: u32) {
        self.cells[cell as usize].lock().push(index);
    }

    /// Clear the index and bucket every position by octant.
    ///
    /// Workers bucket their share locally and merge into the shared cells
    /// once per batch, so lock traffic scales with the number of batches
    /// rather than the number of boids.
    pub fn rebuild(&self, positions: &[Vec3], batch_size: usize) {
        self.clear();
        positions
            .par_iter()
            .enumerate()
            .with_min_len(batch_size.max(1))
            .fold(
                || std::array::from_fn::<Vec<u32>, CELL_COUNT, _>(|_| Vec::new()),
                |mut local, (index, &position)| {
                    local[octant_of(position) as usize].push(index as u32);
                    local
                },
            )
            .for_each(|local| {
                for (cell, members) in local.iter().enumerate() {
                    if !members.is_empty() {
                        self.cells[cell].lock().extend_from_slice(members);
                    }
                }
            });
    }

    /// Copy of the members of `cell`, in no particular order.
    pub fn cell(&self, cell: u8) -> Vec<u32> {
        self.cells[cell as usize].lock().clone()
    }

    /// Total number of indexed boids.
    pub fn len(&self) -> usize {
        self.cells.iter().map(|c| c.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupancy summary.
    pub fn stats(&self) -> OctantStats {
        let sizes: [usize; CELL_COUNT] = std::array::from_fn(|i| self.cells[i].lock().len());
        OctantStats {
            occupied_cells: sizes.iter().filter(|&&n| n > 0).count(),
            largest_cell: sizes.iter().copied().max().unwrap_or(0),
            total: sizes.iter().sum(),
        }
    }
}

/// Occupancy of an [`OctantIndex`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OctantStats {
    /// Cells holding at least one boid.
    pub occupied_cells: usize,
    /// Size of the fullest cell.
    pub largest_cell: usize,
    /// Boids indexed.
    pub total: usize,
}
