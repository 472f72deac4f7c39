use crate::utils::types::VertexIdx;
use core::fmt;

/// A corner slot of a triangle.
///
/// A `casual node` has an index into the mesh vertex list.
///
/// A `conceptual node` is the outer vertex, the point at infinity closing the boundary with ghost triangles.
///
/// A `deleted node` marks a triangle that has been dropped by a contraction.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub enum VertexNode {
    Casual(VertexIdx),
    Conceptual,
    Deleted,
}

impl VertexNode {
    /// Get the index of the node.
    pub const fn idx(&self) -> Option<VertexIdx> {
        match self {
            VertexNode::Casual(idx) => Some(*idx),
            _ => None,
        }
    }

    /// Check if the node is the outer vertex.
    pub const fn is_conceptual(&self) -> bool {
        matches!(self, VertexNode::Conceptual)
    }

    /// Check if the node is deleted.
    pub const fn is_deleted(&self) -> bool {
        matches!(self, VertexNode::Deleted)
    }
}

impl fmt::Display for VertexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VertexNode::Casual(v_idx) => write!(f, "Casual({})", v_idx),
            VertexNode::Conceptual => write!(f, "Outer"),
            VertexNode::Deleted => write!(f, "Deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kinds() {
        assert_eq!(VertexNode::Casual(4).idx(), Some(4));
        assert_eq!(VertexNode::Conceptual.idx(), None);
        assert!(VertexNode::Conceptual.is_conceptual());
        assert!(VertexNode::Deleted.is_deleted());
        assert_eq!(format!("{}", VertexNode::Conceptual), "Outer");
    }
}
