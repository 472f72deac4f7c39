use crate::utils::types::{GridCoord, Vertex2, Vertex3};

/// A mesh point.
///
/// Parametric meshes store `(u, v, 0)`, surface meshes store Euclidean `(x, y, z)`.
/// The back-link to an incident triangle is kept by the triangle data structure.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub coords: Vertex3,
    /// Position on the integer grid of the spatial index, derived from the first two coordinates.
    pub(crate) grid: GridCoord,
    /// Reference to a CAD entity, `0` for unconstrained vertices.
    pub label: i32,
}

impl Vertex {
    pub(crate) const fn new(coords: Vertex3, grid: GridCoord) -> Self {
        Self {
            coords,
            grid,
            label: 0,
        }
    }

    /// The first two coordinates.
    pub const fn uv(&self) -> Vertex2 {
        [self.coords[0], self.coords[1]]
    }

    pub const fn grid(&self) -> GridCoord {
        self.grid
    }

    pub const fn is_constrained(&self) -> bool {
        self.label != 0
    }
}
