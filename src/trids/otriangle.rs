use core::fmt;

use super::{attributes::EdgeAttributes, tri_data_structure::TriDataStructure, tri_iterator::TriIterator};
use crate::{
    utils::types::TriIdx,
    VertexNode,
};

/// Local index rotation `i -> i + 1 mod 3`.
pub const NEXT3: [usize; 3] = [1, 2, 0];
/// Local index rotation `i -> i - 1 mod 3`.
pub const PREV3: [usize; 3] = [2, 0, 1];

/// An oriented triangle, i.e. a half-edge handle.
///
/// The handle is the pair `(triangle, orientation)`: edge `orientation` runs from corner
/// `NEXT3[orientation]` (origin) to corner `PREV3[orientation]` (destination), the corner
/// `orientation` itself is the apex.
///
/// ```ignore
///              apex
///              /  \
///   prev()    /    \   next()
///            /      \
///       origin ----> destination
/// ```
///
/// Handles are plain values, all accessors read straight through to the data structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OTriangle {
    pub tri: TriIdx,
    pub orientation: usize,
}

impl OTriangle {
    /// Placeholder for adjacency slots that have not been glued yet.
    pub const INACTIVE: Self = Self {
        tri: usize::MAX,
        orientation: 0,
    };

    pub const fn new(tri: TriIdx, orientation: usize) -> Self {
        Self { tri, orientation }
    }

    pub const fn is_active(&self) -> bool {
        self.tri != usize::MAX
    }

    /// Next edge of the same triangle, counter-clockwise.
    #[inline]
    pub const fn next(self) -> Self {
        Self::new(self.tri, NEXT3[self.orientation])
    }

    /// Previous edge of the same triangle.
    #[inline]
    pub const fn prev(self) -> Self {
        Self::new(self.tri, PREV3[self.orientation])
    }

    /// The same edge seen from the adjacent triangle.
    #[inline]
    pub fn sym(self, tds: &TriDataStructure) -> Self {
        tds.tris[self.tri].adj[self.orientation]
    }

    /// Rotate counter-clockwise around the origin.
    #[inline]
    pub fn next_origin(self, tds: &TriDataStructure) -> Self {
        self.prev().sym(tds)
    }

    /// Rotate clockwise around the origin.
    #[inline]
    pub fn prev_origin(self, tds: &TriDataStructure) -> Self {
        self.sym(tds).next()
    }

    /// Rotate counter-clockwise around the destination.
    #[inline]
    pub fn next_dest(self, tds: &TriDataStructure) -> Self {
        self.sym(tds).prev()
    }

    /// Rotate clockwise around the destination.
    #[inline]
    pub fn prev_dest(self, tds: &TriDataStructure) -> Self {
        self.next().sym(tds)
    }

    /// Rotate counter-clockwise around the apex.
    #[inline]
    pub fn next_apex(self, tds: &TriDataStructure) -> Self {
        self.next().sym(tds).next()
    }

    /// Rotate clockwise around the apex.
    #[inline]
    pub fn prev_apex(self, tds: &TriDataStructure) -> Self {
        self.prev().sym(tds).prev()
    }

    #[inline]
    pub fn origin(self, tds: &TriDataStructure) -> VertexNode {
        tds.tris[self.tri].nodes[NEXT3[self.orientation]]
    }

    #[inline]
    pub fn destination(self, tds: &TriDataStructure) -> VertexNode {
        tds.tris[self.tri].nodes[PREV3[self.orientation]]
    }

    #[inline]
    pub fn apex(self, tds: &TriDataStructure) -> VertexNode {
        tds.tris[self.tri].nodes[self.orientation]
    }

    #[inline]
    pub fn attributes(self, tds: &TriDataStructure) -> EdgeAttributes {
        tds.tris[self.tri].attributes[self.orientation]
    }

    /// Check if all the given flags are set on this edge.
    #[inline]
    pub fn has_attributes(self, tds: &TriDataStructure, attr: EdgeAttributes) -> bool {
        self.attributes(tds).contains(attr)
    }

    /// Check if the edge can be swapped, i.e. it is neither `BOUNDARY` nor `OUTER`.
    #[inline]
    pub fn is_mutable(self, tds: &TriDataStructure) -> bool {
        self.attributes(tds).is_mutable()
    }

    /// Check if this handle lies in a ghost triangle.
    pub fn is_outer(self, tds: &TriDataStructure) -> bool {
        self.has_attributes(tds, EdgeAttributes::OUTER)
    }

    /// The triangle this handle belongs to.
    pub const fn tri<'a>(&self, tds: &'a TriDataStructure) -> TriIterator<'a> {
        TriIterator::new(tds, self.tri)
    }

    /// Check if `sym` round-trips and the adjacent edge joins the same vertices in reverse order.
    pub fn is_sound(self, tds: &TriDataStructure) -> bool {
        let sym = self.sym(tds);
        if !sym.is_active() || sym.tri >= tds.tris.len() {
            return false;
        }
        if self.has_attributes(tds, EdgeAttributes::NONMANIFOLD) {
            return true;
        }

        sym.sym(tds) == self
            && sym.origin(tds) == self.destination(tds)
            && sym.destination(tds) == self.origin(tds)
    }

    /// Display helper bound to a data structure.
    pub const fn display<'a>(&self, tds: &'a TriDataStructure) -> OTriangleDisplay<'a> {
        OTriangleDisplay { ot: *self, tds }
    }
}

pub struct OTriangleDisplay<'a> {
    ot: OTriangle,
    tds: &'a TriDataStructure,
}

impl fmt::Display for OTriangleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Edge {}/{}: {} -> {} (apex {}) {:?}",
            self.ot.tri,
            self.ot.orientation,
            self.ot.origin(self.tds),
            self.ot.destination(self.tds),
            self.ot.apex(self.tds),
            self.ot.attributes(self.tds),
        )
    }
}
