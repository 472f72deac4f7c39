use core::fmt;

use super::{attributes::EdgeAttributes, otriangle::OTriangle, tri_data_structure::TriDataStructure};
use crate::{utils::types::TriIdx, VertexNode};

/// A read-only view on one triangle of the data structure.
#[derive(Clone, Copy)]
pub struct TriIterator<'a> {
    pub tds: &'a TriDataStructure,
    pub idx: TriIdx,
}

impl<'a> TriIterator<'a> {
    pub const fn new(tds: &'a TriDataStructure, idx: TriIdx) -> Self {
        Self { tds, idx }
    }

    /// Returns the index of this.
    pub const fn idx(&self) -> TriIdx {
        self.idx
    }

    /// The three half-edges of this triangle, edge `i` is opposite to corner `i`.
    pub const fn otriangles(&self) -> [OTriangle; 3] {
        [
            OTriangle::new(self.idx, 0),
            OTriangle::new(self.idx, 1),
            OTriangle::new(self.idx, 2),
        ]
    }

    /// Get the corners of this triangle.
    pub fn nodes(&self) -> [VertexNode; 3] {
        self.tds.tris[self.idx].nodes
    }

    pub fn attributes(&self) -> [EdgeAttributes; 3] {
        self.tds.tris[self.idx].attributes
    }

    /// Check if this is a ghost triangle, i.e. one of the corners is the outer vertex.
    pub fn is_outer(&self) -> bool {
        self.nodes().iter().any(VertexNode::is_conceptual)
    }

    /// Check if the triangle has been dropped, i.e. its corners are deleted nodes.
    pub fn is_deleted(&self) -> bool {
        self.nodes().iter().any(VertexNode::is_deleted)
    }

    /// Check if all corners are real mesh vertices.
    pub fn is_casual(&self) -> bool {
        self.nodes().iter().all(|n| n.idx().is_some())
    }

    /// Check if two corners coincide, which happens to the pair collapsed by a contraction.
    pub fn is_degenerate(&self) -> bool {
        let [n0, n1, n2] = self.nodes();
        n0 == n1 || n1 == n2 || n2 == n0
    }
}

impl fmt::Display for TriIterator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n0, n1, n2] = self.nodes();
        write!(f, "Triangle {}: {} -> {} -> {}", self.idx(), n0, n1, n2)
    }
}
