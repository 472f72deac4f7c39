//! # Amibe
//!
//! An oriented-triangle half-edge mesh kernel for surface meshing: Delaunay edge swaps,
//! boundary-edge enforcement and edge contraction.
//!
//! The mesh is closed by ghost triangles joining every boundary edge to an outer vertex, so
//! every half-edge has a twin and fan walks need no special case at the boundary.
#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

pub use error::{MeshError, MeshErrorExt};
pub use mesh::{Location, Mesh, MeshConfig, MeshType};
pub use metric::{CadSurface, CompGeom, Metric2D, Plane};
pub use node::VertexNode;
pub use trids::{AroundApex, AroundOrigin, EdgeAttributes, OTriangle, TriDataStructure};
pub use utils::types::{GridCoord, TriIdx, Triangle3, Vertex2, Vertex3, VertexIdx};
pub use vertex::Vertex;

pub mod error;
pub mod mesh;
pub mod metric;
mod node;
pub mod predicates;
pub mod quadtree;
pub mod trids;
mod utils;
mod vertex;
