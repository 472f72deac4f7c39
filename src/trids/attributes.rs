bitflags::bitflags! {
    /// Per-edge flags, one set for each of the three edges of a triangle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeAttributes: u8 {
        /// Constrained edge, a real half-edge facing a ghost triangle or a forced edge.
        const BOUNDARY = 0b0000_0001;
        /// Edge of a ghost triangle.
        const OUTER = 0b0000_0010;
        /// Diagonal created by the latest swap.
        const SWAPPED = 0b0000_0100;
        /// Free for algorithms to tag visited edges.
        const MARKED = 0b0000_1000;
        /// Edge separates two triangles merged into a quadrangle.
        const QUAD = 0b0001_0000;
        /// Edge shared by more than two triangles, it can not be glued.
        const NONMANIFOLD = 0b0010_0000;
    }
}

impl EdgeAttributes {
    /// A swap may only change edges that are neither constrained nor part of a ghost triangle.
    pub const fn is_mutable(self) -> bool {
        !self.intersects(Self::BOUNDARY.union(Self::OUTER))
    }
}
