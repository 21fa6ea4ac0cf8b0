//! Captured placement mapping.
//!
//! A [`Layout`] is an owned, ordered copy of a registry's cell map. Cells are
//! kept in a [`BTreeMap`] so iteration (and therefore restore order and digests)
//! is row-major and reproducible.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::registry::Placeable;
use crate::Coordinate;

/// Owned snapshot of `Coordinate -> [entity]` placements.
pub struct Layout<E: Placeable> {
    cells: BTreeMap<Coordinate, Vec<Arc<E>>>,
}

impl<E: Placeable> Layout<E> {
    /// Builds a layout from `(coordinate, entities)` pairs. Empty cells are
    /// dropped.
    pub fn from_cells(cells: impl IntoIterator<Item = (Coordinate, Vec<Arc<E>>)>) -> Self {
        Self {
            cells: cells
                .into_iter()
                .filter(|(_, list)| !list.is_empty())
                .collect(),
        }
    }

    /// An empty layout.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }

    /// Iterates cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&Coordinate, &Vec<Arc<E>>)> {
        self.cells.iter()
    }

    /// Entities recorded at `at`, in insertion order.
    #[must_use]
    pub fn entities_at(&self, at: Coordinate) -> &[Arc<E>] {
        self.cells.get(&at).map_or(&[], Vec::as_slice)
    }

    /// Iterates every recorded entity with the cell it was captured in.
    pub fn entries(&self) -> impl Iterator<Item = (Coordinate, &Arc<E>)> {
        self.cells
            .iter()
            .flat_map(|(at, list)| list.iter().map(move |entity| (*at, entity)))
    }

    /// Number of recorded placements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The `(coordinate, id)` pairs in iteration order.
    #[must_use]
    pub fn placements(&self) -> Vec<(Coordinate, E::Id)> {
        self.entries().map(|(at, entity)| (at, entity.id())).collect()
    }
}

impl<E: Placeable> Clone for Layout<E> {
    fn clone(&self) -> Self {
        Self {
            cells: self.cells.clone(),
        }
    }
}

impl<E: Placeable> Default for Layout<E> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Layouts compare by placement identity, not entity state.
impl<E: Placeable> PartialEq for Layout<E> {
    fn eq(&self, other: &Self) -> bool {
        self.placements() == other.placements()
    }
}

impl<E: Placeable> Eq for Layout<E> {}

impl<E: Placeable> fmt::Debug for Layout<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.cells
                    .iter()
                    .map(|(at, list)| (at, list.iter().map(|e| e.id()).collect::<Vec<_>>())),
            )
            .finish()
    }
}
