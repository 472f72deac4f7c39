use crate::predicates::on_left;

use super::types::GridCoord;

/// Checks if the quadrilateral `q0 q1 q2 q3`, given counter-clockwise, is strictly convex.
///
/// Only then the diagonal `q1 q3` can be swapped for `q0 q2` without folding a triangle.
pub fn is_strictly_convex(q0: GridCoord, q1: GridCoord, q2: GridCoord, q3: GridCoord) -> bool {
    on_left(q0, q1, q2) > 0
        && on_left(q1, q2, q3) > 0
        && on_left(q2, q3, q0) > 0
        && on_left(q3, q0, q1) > 0
}
