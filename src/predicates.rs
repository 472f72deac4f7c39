//! Geometric predicates.
//!
//! Tests on the integer grid of the spatial index ([`on_left`], [`in_circle_exact`]) are exact.
//! The float variants on parametric coordinates are backed by the adaptive predicates of [robust].

use robust::{incircle, orient2d, Coord};

use crate::utils::{
    long_long::LongLong,
    types::{GridCoord, Vertex2},
};

/// Signed orientation of `c` with respect to the directed line `a -> b`, i.e. `(b - a) x (c - a)`.
///
/// Positive if `c` is on the left, negative if it is on the right and zero if the three are aligned.
/// Grid coordinates lie in `[0, 2^30]`, so the result never overflows.
#[inline]
pub const fn on_left(a: GridCoord, b: GridCoord, c: GridCoord) -> i64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

/// Exact test whether `d` lies strictly inside the circumcircle of the counter-clockwise triangle `abc`.
pub fn in_circle_exact(a: GridCoord, b: GridCoord, c: GridCoord, d: GridCoord) -> bool {
    let [ax, ay] = [a[0] - d[0], a[1] - d[1]];
    let [bx, by] = [b[0] - d[0], b[1] - d[1]];
    let [cx, cy] = [c[0] - d[0], c[1] - d[1]];

    // lifted terms and 2x2 minors are both bounded by 2^61
    let det = LongLong::mul(ax * ax + ay * ay, bx * cy - by * cx)
        + LongLong::mul(bx * bx + by * by, cx * ay - cy * ax)
        + LongLong::mul(cx * cx + cy * cy, ax * by - ay * bx);

    det.is_positive()
}

#[inline]
const fn coord(p: &Vertex2) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

/// Sign of the orientation of `abc` on float coordinates: `1.0`, `-1.0` or `0.0`.
#[inline]
pub fn orient_2d(a: &Vertex2, b: &Vertex2, c: &Vertex2) -> f64 {
    sign_f64(orient2d(coord(a), coord(b), coord(c)))
}

/// Sign of the in-circle determinant of `d` against the counter-clockwise triangle `abc`.
///
/// Positive if `d` lies inside the circumcircle.
#[inline]
pub fn in_circle(a: &Vertex2, b: &Vertex2, c: &Vertex2, d: &Vertex2) -> f64 {
    sign_f64(incircle(coord(a), coord(b), coord(c), coord(d)))
}

#[inline]
fn sign_f64(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: i64 = 1 << 30;

    #[test]
    fn test_on_left() {
        let a = [0, 0];
        let b = [G, 0];
        assert!(on_left(a, b, [0, G]) > 0);
        assert!(on_left(a, b, [G / 2, -1]) < 0);
        assert_eq!(on_left(a, b, [G / 2, 0]), 0);
        // extreme magnitudes must not overflow
        assert_eq!(on_left([0, 0], [G, 0], [G, G]), G * G);
        assert_eq!(on_left([G, G], [0, G], [0, 0]), G * G);
    }

    #[test]
    fn test_in_circle_exact_unit_square() {
        let h = G / 2;
        let a = [0, 0];
        let b = [h, 0];
        let c = [0, h];
        // the fourth corner of the square is cocircular
        assert!(!in_circle_exact(a, b, c, [h, h]));
        assert!(in_circle_exact(a, b, c, [h - 1, h - 1]));
        assert!(!in_circle_exact(a, b, c, [h, h + 1]));
        assert!(in_circle_exact(a, b, c, [h / 3, h / 3]));
        assert!(!in_circle_exact(a, b, c, [G, G]));
    }

    #[test]
    fn test_in_circle_exact_matches_float() {
        let pts: [GridCoord; 6] = [
            [0, 0],
            [G, 1],
            [3, G - 7],
            [G / 2 + 11, G / 2 - 5],
            [G, G],
            [G / 7, 5 * (G / 7)],
        ];
        for a in pts {
            for b in pts {
                for c in pts {
                    if on_left(a, b, c) <= 0 {
                        continue;
                    }
                    for d in pts {
                        let to_f = |p: GridCoord| [p[0] as f64, p[1] as f64];
                        let float = in_circle(&to_f(a), &to_f(b), &to_f(c), &to_f(d));
                        assert_eq!(in_circle_exact(a, b, c, d), float > 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_orient_2d_float() {
        assert_eq!(orient_2d(&[0., 0.], &[1., 0.], &[0., 1.]), 1.0);
        assert_eq!(orient_2d(&[0., 0.], &[0., 1.], &[1., 0.]), -1.0);
        assert_eq!(orient_2d(&[0., 0.], &[1., 1.], &[2., 2.]), 0.0);
    }
}
