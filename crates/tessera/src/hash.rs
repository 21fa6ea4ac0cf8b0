//! Layout hashing for state comparison.
//!
//! Two layouts with the same placements (same ids at the same coordinates, in
//! the same per-cell order) produce the same digest. Used by tests and by
//! snapshot logging to compare world states cheaply.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::layout::Layout;
use crate::registry::Placeable;
use crate::Coordinate;

/// Compute a digest of a captured layout.
///
/// Hashes every cell in row-major order, followed by its entity ids in
/// insertion order.
#[must_use]
pub fn layout_digest<E: Placeable>(layout: &Layout<E>) -> u64 {
    let mut hasher = DefaultHasher::new();

    for (at, list) in layout.cells() {
        hash_coordinate(*at, &mut hasher);
        list.len().hash(&mut hasher);
        for entity in list {
            entity.id().hash(&mut hasher);
        }
    }

    hasher.finish()
}

fn hash_coordinate<H: Hasher>(at: Coordinate, hasher: &mut H) {
    at.row().hash(hasher);
    at.col().hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::Token;
    use crate::{GridBounds, MoveRule, Occupancy, SpatialRegistry};
    use proptest::prelude::*;
    use std::time::Duration;

    fn populated() -> (SpatialRegistry<Token>, std::sync::Arc<Token>) {
        let reg = SpatialRegistry::new(GridBounds::new(5, 5));
        let a = Token::new(1, Coordinate::new(0, 0), Occupancy::Exclusive);
        reg.place(&a);
        reg.place(&Token::new(2, Coordinate::new(3, 3), Occupancy::Open));
        (reg, a)
    }

    #[test]
    fn test_identical_layouts_hash_equal() {
        let (r1, _) = populated();
        let (r2, _) = populated();
        assert_eq!(layout_digest(&r1.capture()), layout_digest(&r2.capture()));
    }

    #[test]
    fn test_hash_changes_after_move() {
        let (reg, a) = populated();
        let before = layout_digest(&reg.capture());

        reg.try_move(&a, Coordinate::new(0, 1), Duration::from_millis(10), MoveRule::VacantOnly);
        assert_ne!(before, layout_digest(&reg.capture()));
    }

    #[test]
    fn test_hash_restored_after_restore() {
        let (reg, a) = populated();
        let layout = reg.capture();
        let before = layout_digest(&layout);

        reg.try_move(&a, Coordinate::new(1, 0), Duration::from_millis(10), MoveRule::VacantOnly);
        reg.restore(&layout);
        assert_eq!(before, layout_digest(&reg.capture()));
    }

    proptest! {
        #[test]
        fn prop_digest_survives_capture_restore(cells in prop::collection::vec((0i32..5, 0i32..5), 0..20)) {
            let reg = SpatialRegistry::new(GridBounds::new(5, 5));
            for (id, (row, col)) in (1u32..).zip(cells) {
                reg.place(&Token::new(id, Coordinate::new(row, col), Occupancy::Open));
            }
            let layout = reg.capture();
            let digest = layout_digest(&layout);

            reg.clear();
            reg.restore(&layout);
            prop_assert_eq!(layout_digest(&reg.capture()), digest);
        }
    }
}
