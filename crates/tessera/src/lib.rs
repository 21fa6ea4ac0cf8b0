//! # Tessera
//!
//! Grid substrate for concurrent placement of entities on integer cells.
//!
//! Tessera represents a world map as a sparse mapping from [`Coordinate`] to the
//! ordered set of entities occupying that cell. It provides:
//!
//! - **Value-keyed cell locks**: one fair lock per coordinate value, created lazily
//!   and never discarded while the registry lives
//! - **A movement protocol**: acquire-check-act-release with bounded waits, so
//!   contention degrades to "skip this action" instead of blocking
//! - **Layout capture**: independent copies of the placement mapping for undo
//!   and for digest-based comparison
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera::{Coordinate, GridBounds, MoveRule, SpatialRegistry};
//!
//! let registry = SpatialRegistry::new(GridBounds::new(10, 10));
//! registry.place(&goblin);
//!
//! // Agents move with a short lock timeout; contention is not an error.
//! match registry.try_move(&goblin, Coordinate::new(1, 2), timeout, MoveRule::VacantOnly) {
//!     MoveOutcome::Moved { .. } => {}
//!     MoveOutcome::Contended | MoveOutcome::Refused => {}
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod coordinate;
pub mod hash;
pub mod layout;
pub mod lock;
pub mod registry;

// Re-exports for convenience
pub use coordinate::Coordinate;
pub use hash::layout_digest;
pub use layout::Layout;
pub use lock::{CellGuard, CellLocks};
pub use registry::{MoveOutcome, MoveRule, Occupancy, Placeable, SpatialRegistry};

use serde::{Deserialize, Serialize};

/// Rectangular extent of a grid, anchored at `(0, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    /// Number of rows
    pub rows: u32,
    /// Number of columns
    pub cols: u32,
}

impl GridBounds {
    /// Create bounds from dimensions.
    #[must_use]
    pub const fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Number of cells covered by the bounds.
    #[must_use]
    pub const fn area(&self) -> u64 {
        self.rows as u64 * self.cols as u64
    }

    /// Check if a coordinate lies inside the bounds.
    #[must_use]
    pub fn contains(&self, at: Coordinate) -> bool {
        at.row() >= 0
            && at.col() >= 0
            && i64::from(at.row()) < i64::from(self.rows)
            && i64::from(at.col()) < i64::from(self.cols)
    }

    /// Iterate every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Coordinate> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| {
            (0..cols).map(move |col| Coordinate::from_unsigned(row, col))
        })
    }
}

impl Default for GridBounds {
    fn default() -> Self {
        Self::new(10, 10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_contains() {
        let bounds = GridBounds::new(3, 4);
        assert!(bounds.contains(Coordinate::new(0, 0)));
        assert!(bounds.contains(Coordinate::new(2, 3)));
        assert!(!bounds.contains(Coordinate::new(3, 0)));
        assert!(!bounds.contains(Coordinate::new(0, 4)));
        assert!(!bounds.contains(Coordinate::new(-1, 0)));
    }

    #[test]
    fn test_bounds_area() {
        assert_eq!(GridBounds::new(100, 100).area(), 10_000);
        assert_eq!(GridBounds::new(1, 1).area(), 1);
    }

    #[test]
    fn test_cells_row_major() {
        let cells: Vec<_> = GridBounds::new(2, 2).cells().collect();
        assert_eq!(
            cells,
            vec![
                Coordinate::new(0, 0),
                Coordinate::new(0, 1),
                Coordinate::new(1, 0),
                Coordinate::new(1, 1),
            ]
        );
    }
}
