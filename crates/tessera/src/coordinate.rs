//! Integer grid coordinates.
//!
//! A [`Coordinate`] is an immutable `(row, col)` pair compared and hashed by
//! value. Lock identity is derived from the value (see [`crate::lock`]), so any
//! number of equal coordinates may exist without weakening mutual exclusion.

use std::fmt;

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// A cell position on the grid.
///
/// Ordering is row-major, which gives layouts and digests a stable iteration
/// order.
///
/// # Example
///
/// ```
/// use tessera::Coordinate;
///
/// let a = Coordinate::new(1, 1);
/// let b = Coordinate::new(3, 2);
///
/// assert_eq!(a.manhattan(b), 3);
/// assert_eq!(a.step_toward(b), Coordinate::new(2, 2));
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    row: i32,
    col: i32,
}

impl Coordinate {
    /// Creates a coordinate from a row and a column.
    #[must_use]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Creates a coordinate from unsigned grid indices, saturating at `i32::MAX`.
    #[must_use]
    pub fn from_unsigned(row: u32, col: u32) -> Self {
        Self::new(
            i32::try_from(row).unwrap_or(i32::MAX),
            i32::try_from(col).unwrap_or(i32::MAX),
        )
    }

    /// Row (Y axis).
    #[must_use]
    pub const fn row(self) -> i32 {
        self.row
    }

    /// Column (X axis).
    #[must_use]
    pub const fn col(self) -> i32 {
        self.col
    }

    /// The coordinate as a `(col, row)` vector.
    #[must_use]
    pub const fn as_ivec2(self) -> IVec2 {
        IVec2::new(self.col, self.row)
    }

    /// Inverse of [`Coordinate::as_ivec2`].
    #[must_use]
    pub const fn from_ivec2(v: IVec2) -> Self {
        Self::new(v.y, v.x)
    }

    /// Manhattan distance to another coordinate.
    #[must_use]
    pub fn manhattan(self, other: Self) -> u32 {
        let delta = (other.as_ivec2() - self.as_ivec2()).abs();
        delta.x.unsigned_abs() + delta.y.unsigned_abs()
    }

    /// One unit step toward `target`, moving on both axes by the sign of the
    /// difference. Returns `self` when already at `target`.
    #[must_use]
    pub fn step_toward(self, target: Self) -> Self {
        let delta = (target.as_ivec2() - self.as_ivec2()).signum();
        Self::from_ivec2(self.as_ivec2() + delta)
    }

    /// Offsets the coordinate by a row and column delta.
    #[must_use]
    pub const fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }

    /// The four orthogonally adjacent coordinates (down, up, right, left).
    #[must_use]
    pub const fn neighbors(self) -> [Self; 4] {
        [
            self.offset(1, 0),
            self.offset(-1, 0),
            self.offset(0, 1),
            self.offset(0, -1),
        ]
    }
}

impl fmt::Debug for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coordinate({}, {})", self.row, self.col)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((row, col): (i32, i32)) -> Self {
        Self::new(row, col)
    }
}
