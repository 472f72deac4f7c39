//! The mesh: triangle storage, vertices, spatial index and geometry contexts.

mod boundary;
mod decimation;
mod insertion;

pub use insertion::Location;

use std::collections::HashMap;

use anyhow::{Ok as HowOk, Result as HowResult};
use log::{debug, error, trace, warn};
use rayon::prelude::*;

use crate::{
    error::{enforcement, illegal_argument, internal, precondition},
    metric::{CadSurface, CompGeom, Metric2D},
    predicates::{in_circle, in_circle_exact, on_left},
    quadtree::{QuadTree, WalkAction},
    trids::{EdgeAttributes, OTriangle, TriDataStructure, TriIterator},
    utils::types::{GridCoord, Triangle3, Vertex2, Vertex3, VertexIdx},
    vertex::Vertex,
    VertexNode,
};

/// Whether vertices live in the parametric plane or in 3D space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshType {
    /// Vertices are `(u, v, 0)` in the parametric plane of a surface.
    Mesh2D,
    /// Vertices are Euclidean `(x, y, z)`.
    Mesh3D,
}

/// Tunables of a mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshConfig {
    /// Minimal distance between inserted vertices, closer ones are ignored.
    pub epsilon: Option<f64>,
    /// Relative tolerance under which a metric counts as isotropic.
    pub isotropy_tolerance: f64,
    /// Iteration bound of [`Mesh::force_boundary_edges`].
    pub max_iter: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            epsilon: None,
            isotropy_tolerance: 1e-2,
            max_iter: 100,
        }
    }
}

impl MeshConfig {
    /// Relax the insertion tolerance before retrying a failed triangulation.
    pub fn scale_tolerance(&mut self, factor: f64) {
        if let Some(epsilon) = self.epsilon.as_mut() {
            *epsilon *= factor;
        }
        warn!(
            "Scaling tolerance by {}, epsilon is now {:?}",
            factor, self.epsilon
        );
    }
}

/// A triangle mesh closed by ghost triangles around the outer vertex.
///
/// ```
/// use amibe::{Mesh, MeshType};
///
/// let mut mesh = Mesh::new(MeshType::Mesh2D, [-1.0, -1.0], [3.0, 3.0]).unwrap();
/// let v0 = mesh.add_vertex([-1.0, -1.0, 0.0]).unwrap();
/// let v1 = mesh.add_vertex([3.0, -1.0, 0.0]).unwrap();
/// let v2 = mesh.add_vertex([-1.0, 3.0, 0.0]).unwrap();
/// mesh.bootstrap(v0, v1, v2).unwrap();
///
/// mesh.insert_vertices(&[[0.0, 0.0, 0.0], [0.5, 0.25, 0.0], [0.25, 0.75, 0.0]]).unwrap();
///
/// assert_eq!(mesh.num_real_tris(), 7);
/// assert!(mesh.is_sound());
/// assert!(mesh.is_delaunay_mesh());
/// ```
pub struct Mesh {
    kind: MeshType,
    pub(crate) tds: TriDataStructure,
    pub(crate) vertices: Vec<Vertex>,
    /// The point at infinity, located at the bounding box centre.
    outer: Vertex,
    pub(crate) quadtree: QuadTree,
    comp_geom: Vec<CompGeom>,
    surface: Option<Box<dyn CadSurface>>,
    pub config: MeshConfig,
    /// Vertices that are not part of the mesh, due to epsilon.
    pub(crate) ignored_vertices: Vec<VertexIdx>,
}

impl Mesh {
    /// Create an empty mesh whose vertices lie in the bounding box `[min, max]` of their first two
    /// coordinates.
    pub fn new(kind: MeshType, min: Vertex2, max: Vertex2) -> HowResult<Self> {
        Self::with_config(kind, min, max, MeshConfig::default())
    }

    pub fn with_config(
        kind: MeshType,
        min: Vertex2,
        max: Vertex2,
        config: MeshConfig,
    ) -> HowResult<Self> {
        let quadtree = QuadTree::new(min, max)?;
        let outer = Vertex::new(
            [(min[0] + max[0]) * 0.5, (min[1] + max[1]) * 0.5, 0.0],
            quadtree.centre(),
        );

        HowOk(Self {
            kind,
            tds: TriDataStructure::new(),
            vertices: Vec::new(),
            outer,
            quadtree,
            comp_geom: Vec::new(),
            surface: None,
            config,
            ignored_vertices: Vec::new(),
        })
    }

    /// Build a mesh from an indexed list of counter-clockwise triangles.
    ///
    /// Every directed edge may appear only once. Edges without a twin become `BOUNDARY` and are
    /// closed by ghost triangles.
    pub fn from_triangles(
        kind: MeshType,
        coords: &[Vertex3],
        triangles: &[[VertexIdx; 3]],
    ) -> HowResult<Self> {
        let now = std::time::Instant::now();
        let (min, max) = bounding_box(coords)
            .ok_or_else(|| illegal_argument("Cannot build a mesh without vertices"))?;
        let mut mesh = Self::new(kind, min, max)?;
        for c in coords {
            mesh.add_vertex(*c)?;
        }

        let mut edges: HashMap<(VertexIdx, VertexIdx), OTriangle> = HashMap::new();
        for tri in triangles {
            if tri.iter().any(|&v| v >= coords.len()) {
                return Err(illegal_argument(format!(
                    "Triangle {tri:?} references an unknown vertex"
                )));
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
                return Err(illegal_argument(format!("Triangle {tri:?} is degenerate")));
            }

            let t = mesh.tds.add_tri(tri.map(VertexNode::Casual));
            for o in 0..3 {
                let ot = OTriangle::new(t, o);
                let key = (tri[(o + 1) % 3], tri[(o + 2) % 3]);
                if edges.insert(key, ot).is_some() {
                    return Err(illegal_argument(format!(
                        "Edge {} -> {} is non-manifold or inconsistently oriented",
                        key.0, key.1
                    )));
                }
            }
            for v in tri {
                mesh.tds.set_link(VertexNode::Casual(*v), Some(t));
            }
        }

        // ghost edges leaving and entering the outer vertex, keyed by their casual end point
        let mut to_outer: HashMap<VertexIdx, OTriangle> = HashMap::new();
        let mut from_outer: HashMap<VertexIdx, OTriangle> = HashMap::new();
        let mut keys: Vec<_> = edges.keys().copied().collect();
        keys.sort_unstable();
        for (u, v) in keys {
            let ot = edges[&(u, v)];
            if let Some(&twin) = edges.get(&(v, u)) {
                if u < v {
                    mesh.tds.glue(ot, twin)?;
                }
                continue;
            }

            let g = mesh.tds.add_tri([
                VertexNode::Conceptual,
                VertexNode::Casual(v),
                VertexNode::Casual(u),
            ]);
            mesh.tds.glue(ot, OTriangle::new(g, 0))?;
            mesh.tds.set_attributes(ot, EdgeAttributes::BOUNDARY);
            for o in 0..3 {
                mesh.tds
                    .set_attributes(OTriangle::new(g, o), EdgeAttributes::OUTER);
            }
            mesh.tds.set_link(VertexNode::Conceptual, Some(g));

            let bow_tie = to_outer.insert(u, OTriangle::new(g, 1)).is_some()
                || from_outer.insert(v, OTriangle::new(g, 2)).is_some();
            if bow_tie {
                return Err(illegal_argument(format!(
                    "Boundary is not manifold at edge {u} -> {v}"
                )));
            }
        }
        for (v, ot) in &to_outer {
            let twin = from_outer
                .get(v)
                .ok_or_else(|| internal(format!("Boundary does not close at vertex {v}")))?;
            mesh.tds.glue(*ot, *twin)?;
        }

        for v_idx in 0..coords.len() {
            if mesh.tds.link(VertexNode::Casual(v_idx)).is_some() {
                mesh.quadtree.add(v_idx, mesh.vertices[v_idx].grid);
            }
        }

        trace!(
            "Mesh of {} triangles built in {:.4} µs",
            triangles.len(),
            now.elapsed().as_micros()
        );
        HowOk(mesh)
    }

    /// Attach the surface this mesh is parametrizing.
    pub fn set_surface(&mut self, surface: Box<dyn CadSurface>) {
        self.surface = Some(surface);
        self.quadtree.clear_all_metrics();
    }

    pub const fn kind(&self) -> MeshType {
        self.kind
    }

    pub const fn tds(&self) -> &TriDataStructure {
        &self.tds
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, v_idx: VertexIdx) -> HowResult<&Vertex> {
        self.vertices
            .get(v_idx)
            .ok_or_else(|| illegal_argument(format!("Unknown vertex {v_idx}")))
    }

    /// The outer vertex, it never belongs to the triangle collection.
    pub const fn outer_vertex(&self) -> &Vertex {
        &self.outer
    }

    pub fn ignored_vertices(&self) -> &[VertexIdx] {
        &self.ignored_vertices
    }

    /// Create a vertex, it is not part of the triangulation until inserted.
    pub fn add_vertex(&mut self, coords: Vertex3) -> HowResult<VertexIdx> {
        let grid = self.quadtree.double_to_int([coords[0], coords[1]])?;
        self.vertices.push(Vertex::new(coords, grid));

        HowOk(self.vertices.len() - 1)
    }

    /// Attach a vertex to the CAD entity `label`, `0` detaches it.
    pub fn set_label(&mut self, v_idx: VertexIdx, label: i32) -> HowResult<()> {
        let vertex = self
            .vertices
            .get_mut(v_idx)
            .ok_or_else(|| illegal_argument(format!("Unknown vertex {v_idx}")))?;
        vertex.label = label;

        HowOk(())
    }

    /// Reverse the orientation of the connected component containing `ot`.
    pub fn invert_orientation(&mut self, ot: OTriangle) -> HowResult<()> {
        self.tds.invert_orientation(ot)?;
        debug!("Inverted the orientation around {}", ot.display(&self.tds));

        HowOk(())
    }

    /// Coordinates of a node, the outer vertex for anything but a casual node.
    pub(crate) fn node_vertex(&self, node: VertexNode) -> &Vertex {
        match node {
            VertexNode::Casual(v_idx) => self.vertices.get(v_idx).unwrap_or(&self.outer),
            _ => &self.outer,
        }
    }

    pub(crate) fn grid(&self, node: VertexNode) -> GridCoord {
        self.node_vertex(node).grid
    }

    /// Create the first triangle and the three ghost triangles around it.
    ///
    /// The vertices are reordered counter-clockwise. Returns the edge `v0 -> v1` or `v0 -> v2`,
    /// whichever runs counter-clockwise.
    pub fn bootstrap(
        &mut self,
        v0: VertexIdx,
        v1: VertexIdx,
        v2: VertexIdx,
    ) -> HowResult<OTriangle> {
        if self.tds.num_tris() > 0 {
            return Err(precondition("Mesh is already bootstrapped"));
        }
        let [g0, g1, g2] = [
            self.vertex(v0)?.grid,
            self.vertex(v1)?.grid,
            self.vertex(v2)?.grid,
        ];

        let orientation = on_left(g0, g1, g2);
        let v_idxs = match orientation.signum() {
            1 => [v0, v1, v2],
            -1 => [v0, v2, v1],
            _ => {
                return Err(enforcement(format!(
                    "Seed triangle {v0} {v1} {v2} is degenerate"
                )))
            }
        };

        let t = self.tds.add_init_tri(v_idxs)?[0].idx();
        for v_idx in v_idxs {
            self.quadtree.add(v_idx, self.vertices[v_idx].grid);
        }
        debug!("Bootstrapped mesh with {:?}", v_idxs);

        // edge 2 of the initial triangle runs from its first to its second corner
        HowOk(OTriangle::new(t, 2))
    }

    /// Open a geometry context of dimension `dim`, i.e. `2` or `3`.
    pub fn push_comp_geom(&mut self, dim: usize) -> HowResult<()> {
        let comp_geom = CompGeom::from_dim(dim)?;
        self.comp_geom.push(comp_geom);
        self.quadtree.clear_all_metrics();
        trace!("Pushed {} geometry context", comp_geom);

        HowOk(())
    }

    /// Close the top geometry context, which must be of dimension `dim`.
    pub fn pop_comp_geom(&mut self, dim: usize) -> HowResult<CompGeom> {
        let expected = CompGeom::from_dim(dim)?;
        let Some(&top) = self.comp_geom.last() else {
            return Err(internal(format!(
                "Expected value: {expected}, found an empty geometry context stack"
            )));
        };
        if top != expected {
            return Err(internal(format!(
                "Expected value: {expected}, found: {top}"
            )));
        }

        self.comp_geom.pop();
        // an empty stack falls back to 2D
        if self.comp_geom() != top {
            self.quadtree.clear_all_metrics();
        }
        trace!("Popped {} geometry context", top);

        HowOk(top)
    }

    /// The active geometry context, 2D when none is open.
    pub fn comp_geom(&self) -> CompGeom {
        self.comp_geom
            .last()
            .copied()
            .unwrap_or(CompGeom::Calculus2D)
    }

    /// Metric at a vertex in the active geometry context, cached by the spatial index.
    pub fn metric(&self, node: VertexNode) -> Metric2D {
        let VertexNode::Casual(v_idx) = node else {
            return Metric2D::identity();
        };
        if let Some(metric) = self.quadtree.metric(v_idx) {
            return metric;
        }

        let metric = self
            .comp_geom()
            .metric(self.node_vertex(node).uv(), self.surface.as_deref());
        self.quadtree.set_metric(v_idx, metric);

        metric
    }

    /// Check if the edge `ot` is locally Delaunay with respect to `apex2`, the apex on its
    /// other side. `false` means the edge should be swapped.
    pub fn is_delaunay(&self, ot: OTriangle, apex2: VertexNode) -> bool {
        if self
            .metric(apex2)
            .is_pseudo_isotropic(self.config.isotropy_tolerance)
        {
            self.is_delaunay_isotropic(ot, apex2)
        } else {
            self.is_delaunay_anisotropic(ot, apex2)
        }
    }

    fn is_delaunay_isotropic(&self, ot: OTriangle, apex2: VertexNode) -> bool {
        let a = self.grid(ot.origin(&self.tds));
        let b = self.grid(ot.destination(&self.tds));
        let v1 = self.grid(ot.apex(&self.tds));
        let v2 = self.grid(apex2);

        let tp1 = on_left(a, b, v1);
        let tp2 = on_left(b, a, v2);
        let tp3 = on_left(v2, b, v1);
        let tp4 = on_left(v1, a, v2);

        // the far triangles are flatter than the near ones
        if tp3.abs() + tp4.abs() < tp1.abs() + tp2.abs() {
            return true;
        }
        // the quadrilateral is not convex
        if tp1 > 0 && tp2 > 0 && (tp3 <= 0 || tp4 <= 0) {
            return true;
        }

        !in_circle_exact(a, b, v1, v2)
    }

    fn is_delaunay_anisotropic(&self, ot: OTriangle, apex2: VertexNode) -> bool {
        let nodes = [
            ot.origin(&self.tds),
            ot.destination(&self.tds),
            ot.apex(&self.tds),
            apex2,
        ];
        if nodes.iter().any(|n| n.idx().is_none()) {
            return true;
        }

        let metric = Metric2D::average(&nodes.map(|n| self.metric(n)));
        let uvs = nodes.map(|n| self.node_vertex(n).uv());
        let Some(p) = metric.to_euclidean_frame(&uvs) else {
            error!("Metric {:?} is not positive definite", metric.0);
            return true;
        };

        in_circle(&p[0], &p[1], &p[2], &p[3]) <= 0.0
    }

    /// Check if any real triangle has a non-positive signed area in the parametric plane.
    ///
    /// Only meaningful for [`MeshType::Mesh2D`], a 3D mesh is rejected with a precondition error.
    pub fn check_inverted_triangles(&self) -> HowResult<bool> {
        if self.kind == MeshType::Mesh3D {
            return Err(precondition(
                "Orientation in the parametric plane is undefined for a 3D mesh",
            ));
        }

        let inverted = (0..self.tds.tris.len())
            .into_par_iter()
            .map(|idx| TriIterator::new(&self.tds, idx))
            .filter(|tri| !tri.is_deleted() && tri.is_casual())
            .any(|tri| {
                let [g0, g1, g2] = tri.nodes().map(|n| self.grid(n));
                let inverted = on_left(g0, g1, g2) <= 0;
                if inverted {
                    error!("{} is inverted", tri);
                }
                inverted
            });

        HowOk(inverted)
    }

    /// Check if the mesh is sound and, for a parametric mesh, free of inverted triangles.
    pub fn is_valid(&self) -> bool {
        let oriented = match self.kind {
            MeshType::Mesh2D => matches!(self.check_inverted_triangles(), Ok(false)),
            MeshType::Mesh3D => true,
        };
        self.is_sound() && oriented
    }

    /// Check if every swappable edge is locally Delaunay.
    pub fn is_delaunay_mesh(&self) -> bool {
        (0..self.tds.tris.len())
            .into_par_iter()
            .map(|idx| TriIterator::new(&self.tds, idx))
            .filter(|tri| !tri.is_deleted() && tri.is_casual())
            .all(|tri| {
                tri.otriangles().iter().all(|&ot| {
                    !ot.is_mutable(&self.tds) || {
                        let apex2 = ot.sym(&self.tds).apex(&self.tds);
                        apex2.idx().is_none() || self.is_delaunay(ot, apex2)
                    }
                })
            })
    }

    /// Check if the data structure is sound and only references known vertices.
    pub fn is_sound(&self) -> bool {
        let known = self.tds.active_tris().all(|tri| {
            tri.nodes()
                .iter()
                .all(|n| n.idx().map_or(true, |v_idx| v_idx < self.vertices.len()))
        });
        if !known {
            error!("Mesh references unknown vertices");
        }

        let sound = self.tds.is_sound();
        if !sound {
            error!("Mesh is not sound!");
        }

        known && sound && self.is_index_sound()
    }

    /// Check if the spatial index holds exactly the vertices referenced by the triangles.
    fn is_index_sound(&self) -> bool {
        let mut num_indexed = 0;
        let mut sound = true;
        self.quadtree.walk(|cell| {
            for &(v_idx, g) in cell.vertices.unwrap_or_default() {
                num_indexed += 1;
                let linked = self.tds.link(VertexNode::Casual(v_idx)).is_some();
                let in_cell = (0..2)
                    .all(|k| g[k] >= cell.corner[k] && g[k] < cell.corner[k] + cell.size);
                let same_grid = self.vertices.get(v_idx).map(Vertex::grid) == Some(g);
                if !linked || !in_cell || !same_grid {
                    error!("Spatial index holds stale vertex {}", v_idx);
                    sound = false;
                }
            }
            WalkAction::Continue
        });

        if num_indexed != self.num_vertices() {
            error!(
                "Spatial index holds {} vertices, the mesh {}",
                num_indexed,
                self.num_vertices()
            );
            sound = false;
        }
        sound
    }

    /// Find the half-edge running from `from` to `to`.
    pub fn find_edge(&self, from: VertexIdx, to: VertexIdx) -> Option<OTriangle> {
        self.tds
            .find_edge(VertexNode::Casual(from), VertexNode::Casual(to))
    }

    /// Vertex indices of the real triangles, in storage order.
    pub fn triangles(&self) -> Vec<[VertexIdx; 3]> {
        self.tds
            .active_tris()
            .filter_map(|tri| {
                let [n0, n1, n2] = tri.nodes();
                Some([n0.idx()?, n1.idx()?, n2.idx()?])
            })
            .collect()
    }

    /// Coordinates of the real triangles, in storage order.
    pub fn triangle_coords(&self) -> Vec<Triangle3> {
        self.triangles()
            .into_iter()
            .map(|tri| tri.map(|v_idx| self.vertices[v_idx].coords))
            .collect()
    }

    pub fn num_real_tris(&self) -> usize {
        self.tds.num_real_tris()
    }

    /// The number of vertices referenced by the triangles.
    pub fn num_vertices(&self) -> usize {
        self.tds.vertex_links.iter().filter(|l| l.is_some()).count()
    }
}

fn bounding_box(coords: &[Vertex3]) -> Option<(Vertex2, Vertex2)> {
    let first = coords.first()?;
    let mut min = [first[0], first[1]];
    let mut max = min;
    for c in coords {
        min = [min[0].min(c[0]), min[1].min(c[1])];
        max = [max[0].max(c[0]), max[1].max(c[1])];
    }

    Some((min, max))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{error::MeshErrorExt, metric::Plane, MeshError};
    use amibe_test_utils::{grid_triangulation, jittered_grid, sample_uv_vertices};
    use approx::assert_relative_eq;

    pub(crate) fn verify_mesh(mesh: &Mesh) {
        assert!(mesh.is_valid());
        for tri in mesh.tds.active_tris() {
            for ot in tri.otriangles() {
                assert_eq!(ot.sym(&mesh.tds).sym(&mesh.tds), ot);
            }
        }
    }

    /// A seed triangle covering `[-0.5, 0.5]^2` inside the bounding box `[-1, 3]^2`.
    pub(crate) fn seeded_mesh(config: MeshConfig) -> Mesh {
        let mut mesh = Mesh::with_config(MeshType::Mesh2D, [-1.0, -1.0], [3.0, 3.0], config).unwrap();
        let v0 = mesh.add_vertex([-1.0, -1.0, 0.0]).unwrap();
        let v1 = mesh.add_vertex([3.0, -1.0, 0.0]).unwrap();
        let v2 = mesh.add_vertex([-1.0, 3.0, 0.0]).unwrap();
        mesh.bootstrap(v0, v1, v2).unwrap();
        mesh
    }

    pub(crate) fn grid_mesh(n: usize) -> Mesh {
        let (coords, triangles) = grid_triangulation(n, n, 1.0);
        Mesh::from_triangles(MeshType::Mesh2D, &coords, &triangles).unwrap()
    }

    #[test]
    fn test_bootstrap_unit_triangle() {
        let mut mesh = Mesh::new(MeshType::Mesh2D, [0.0, 0.0], [1.0, 1.0]).unwrap();
        let v0 = mesh.add_vertex([0.0, 0.0, 0.0]).unwrap();
        let v1 = mesh.add_vertex([1.0, 0.0, 0.0]).unwrap();
        let v2 = mesh.add_vertex([0.0, 1.0, 0.0]).unwrap();
        let ot = mesh.bootstrap(v0, v1, v2).unwrap();

        verify_mesh(&mesh);
        assert_eq!(mesh.tds.num_tris(), 4);
        assert_eq!(mesh.num_real_tris(), 1);
        assert_eq!(ot.origin(&mesh.tds), VertexNode::Casual(v0));
        assert_eq!(ot.destination(&mesh.tds), VertexNode::Casual(v1));

        let [[a, b, c]] = mesh.triangle_coords()[..] else {
            panic!("expected a single triangle");
        };
        let area = 0.5 * ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]));
        assert_relative_eq!(area, 0.5);

        let real = ot.tri;
        let mut ghosts = 0;
        for tri in mesh.tds.active_tris().filter(|t| t.is_outer()) {
            ghosts += 1;
            let shared = tri
                .otriangles()
                .iter()
                .filter(|ot| ot.sym(&mesh.tds).tri == real)
                .count();
            assert_eq!(shared, 1);
            assert!(tri.otriangles().iter().all(|ot| ot.is_outer(&mesh.tds)));
        }
        assert_eq!(ghosts, 3);
        assert_eq!(mesh.quadtree.len(), 3);
    }

    #[test]
    fn test_bootstrap_reorders_clockwise_input() {
        let mut mesh = Mesh::new(MeshType::Mesh2D, [0.0, 0.0], [1.0, 1.0]).unwrap();
        let v0 = mesh.add_vertex([0.0, 0.0, 0.0]).unwrap();
        let v1 = mesh.add_vertex([0.0, 1.0, 0.0]).unwrap();
        let v2 = mesh.add_vertex([1.0, 0.0, 0.0]).unwrap();
        let ot = mesh.bootstrap(v0, v1, v2).unwrap();

        verify_mesh(&mesh);
        assert_eq!(ot.destination(&mesh.tds), VertexNode::Casual(v2));
        assert!(mesh.bootstrap(v0, v1, v2).is_err());
    }

    #[test]
    fn test_bootstrap_degenerate_is_recoverable() {
        let mut mesh = Mesh::new(MeshType::Mesh2D, [0.0, 0.0], [1.0, 1.0]).unwrap();
        let v0 = mesh.add_vertex([0.0, 0.0, 0.0]).unwrap();
        let v1 = mesh.add_vertex([0.5, 0.5, 0.0]).unwrap();
        let v2 = mesh.add_vertex([1.0, 1.0, 0.0]).unwrap();

        let err = mesh.bootstrap(v0, v1, v2).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(mesh.tds.num_tris(), 0);
    }

    #[test]
    fn test_add_vertex_outside_bounding_box() {
        let mut mesh = Mesh::new(MeshType::Mesh2D, [0.0, 0.0], [1.0, 1.0]).unwrap();
        let err = mesh.add_vertex([2.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(
            err.mesh_error(),
            Some(MeshError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_comp_geom_stack() {
        let mut mesh = seeded_mesh(MeshConfig::default());
        assert_eq!(mesh.comp_geom(), CompGeom::Calculus2D);

        let err = mesh.push_comp_geom(4).unwrap_err();
        assert!(matches!(err.mesh_error(), Some(MeshError::IllegalArgument(_))));

        mesh.push_comp_geom(2).unwrap();
        mesh.push_comp_geom(3).unwrap();
        assert_eq!(mesh.comp_geom(), CompGeom::Calculus3D);

        let err = mesh.pop_comp_geom(2).unwrap_err();
        assert!(matches!(err.mesh_error(), Some(MeshError::Internal(_))));
        assert!(!err.is_recoverable());
        // a mismatch leaves the stack untouched
        assert_eq!(mesh.comp_geom(), CompGeom::Calculus3D);

        assert_eq!(mesh.pop_comp_geom(3).unwrap(), CompGeom::Calculus3D);
        assert_eq!(mesh.pop_comp_geom(2).unwrap(), CompGeom::Calculus2D);
        assert!(mesh.pop_comp_geom(2).is_err());
    }

    #[test]
    fn test_metric_cache_follows_context() {
        let mut mesh = seeded_mesh(MeshConfig::default());
        mesh.set_surface(Box::new(Plane {
            origin: [0.0; 3],
            u_axis: [4.0, 0.0, 0.0],
            v_axis: [0.0, 1.0, 0.0],
        }));
        let v = VertexNode::Casual(0);

        mesh.push_comp_geom(2).unwrap();
        assert!(mesh.metric(v).is_pseudo_isotropic(1e-2));
        assert_eq!(mesh.quadtree.num_cached_metrics(), 1);

        mesh.push_comp_geom(3).unwrap();
        assert_eq!(mesh.quadtree.num_cached_metrics(), 0);
        assert_relative_eq!(mesh.metric(v).0[(0, 0)], 16.0);

        mesh.pop_comp_geom(3).unwrap();
        assert_eq!(mesh.quadtree.num_cached_metrics(), 0);
        assert!(mesh.metric(v).is_pseudo_isotropic(1e-2));
    }

    #[test]
    fn test_metric_cache_cleared_when_stack_empties() {
        let mut mesh = seeded_mesh(MeshConfig::default());
        mesh.set_surface(Box::new(Plane {
            origin: [0.0; 3],
            u_axis: [4.0, 0.0, 0.0],
            v_axis: [0.0, 1.0, 0.0],
        }));
        let v = VertexNode::Casual(0);

        mesh.push_comp_geom(3).unwrap();
        assert_relative_eq!(mesh.metric(v).0[(0, 0)], 16.0);
        assert_eq!(mesh.quadtree.num_cached_metrics(), 1);

        mesh.pop_comp_geom(3).unwrap();
        assert_eq!(mesh.comp_geom(), CompGeom::Calculus2D);
        assert_eq!(mesh.quadtree.num_cached_metrics(), 0);
        assert!(mesh.metric(v).is_pseudo_isotropic(1e-2));

        // the implicit 2D context keeps its cache on a 2D push and pop
        mesh.push_comp_geom(2).unwrap();
        let _ = mesh.metric(v);
        mesh.pop_comp_geom(2).unwrap();
        assert_eq!(mesh.quadtree.num_cached_metrics(), 1);
    }

    #[test]
    fn test_pop_comp_geom_rejects_unknown_dimension() {
        let mut mesh = seeded_mesh(MeshConfig::default());
        mesh.push_comp_geom(3).unwrap();

        let err = mesh.pop_comp_geom(5).unwrap_err();
        assert!(matches!(err.mesh_error(), Some(MeshError::IllegalArgument(_))));
        assert_eq!(mesh.comp_geom(), CompGeom::Calculus3D);
    }

    fn assert_delaunay_symmetric(mesh: &Mesh) -> usize {
        let mut num_checked = 0;
        for tri in mesh.tds.active_tris().filter(TriIterator::is_casual) {
            for ot in tri.otriangles() {
                if !ot.is_mutable(&mesh.tds) {
                    continue;
                }
                let sym = ot.sym(&mesh.tds);
                assert_eq!(
                    mesh.is_delaunay(ot, sym.apex(&mesh.tds)),
                    mesh.is_delaunay(sym, ot.apex(&mesh.tds)),
                    "{} disagrees with its twin",
                    ot.display(&mesh.tds)
                );
                num_checked += 1;
            }
        }
        num_checked
    }

    fn random_mesh(n: usize) -> Mesh {
        let mut mesh = seeded_mesh(MeshConfig::default());
        mesh.insert_vertices(&sample_uv_vertices(n, None)).unwrap();
        mesh
    }

    #[test]
    fn test_is_delaunay_symmetry() {
        assert!(assert_delaunay_symmetric(&grid_mesh(4)) > 0);
    }

    #[test]
    fn test_is_delaunay_symmetry_jittered_grid() {
        let coords = jittered_grid(6, 6, 1.0, 0.05);
        let (_, triangles) = grid_triangulation(6, 6, 1.0);
        let mesh = Mesh::from_triangles(MeshType::Mesh2D, &coords, &triangles).unwrap();

        assert!(assert_delaunay_symmetric(&mesh) > 0);
    }

    #[test]
    fn test_is_delaunay_symmetry_random_insertion() {
        let mesh = random_mesh(200);
        verify_mesh(&mesh);

        assert!(assert_delaunay_symmetric(&mesh) > 0);
    }

    #[test]
    fn test_is_delaunay_symmetry_anisotropic() {
        let mut mesh = random_mesh(200);
        mesh.set_surface(Box::new(Plane {
            origin: [0.0; 3],
            u_axis: [4.0, 0.0, 0.0],
            v_axis: [0.0, 1.0, 0.0],
        }));
        mesh.push_comp_geom(3).unwrap();
        assert!(!mesh
            .metric(VertexNode::Casual(0))
            .is_pseudo_isotropic(mesh.config.isotropy_tolerance));

        assert!(assert_delaunay_symmetric(&mesh) > 0);
        // the stretched metric disagrees with the isotropic triangulation somewhere
        assert!(!mesh.is_delaunay_mesh());
    }

    #[test]
    fn test_is_delaunay_detects_bad_diagonal() {
        // a kite whose long diagonal is not Delaunay
        let coords = [
            [0.0, 0.0, 0.0],
            [2.0, 0.9, 0.0],
            [4.0, 0.0, 0.0],
            [2.0, -0.9, 0.0],
        ];
        let mesh =
            Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 3, 2], [0, 2, 1]]).unwrap();
        let ot = mesh.find_edge(0, 2).unwrap();
        let apex2 = ot.sym(&mesh.tds).apex(&mesh.tds);
        assert!(!mesh.is_delaunay(ot, apex2));
        assert!(!mesh.is_delaunay_mesh());

        let ot = mesh.find_edge(2, 0).unwrap();
        assert!(!mesh.is_delaunay(ot, ot.sym(&mesh.tds).apex(&mesh.tds)));
    }

    #[test]
    fn test_is_delaunay_anisotropic() {
        // the same kite is Delaunay once u is shrunk by a factor 4
        let coords = [
            [0.0, 0.0, 0.0],
            [2.0, 0.9, 0.0],
            [4.0, 0.0, 0.0],
            [2.0, -0.9, 0.0],
        ];
        let mut mesh =
            Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 3, 2], [0, 2, 1]]).unwrap();
        mesh.set_surface(Box::new(Plane {
            origin: [0.0; 3],
            u_axis: [0.25, 0.0, 0.0],
            v_axis: [0.0, 1.0, 0.0],
        }));
        mesh.push_comp_geom(3).unwrap();

        let ot = mesh.find_edge(0, 2).unwrap();
        let apex2 = ot.sym(&mesh.tds).apex(&mesh.tds);
        assert!(!mesh.metric(apex2).is_pseudo_isotropic(1e-2));
        assert!(mesh.is_delaunay(ot, apex2));
        assert!(mesh.is_delaunay_anisotropic(ot, VertexNode::Conceptual));
    }

    #[test]
    fn test_from_triangles() {
        let mesh = grid_mesh(3);
        verify_mesh(&mesh);
        assert_eq!(mesh.num_real_tris(), 18);
        assert_eq!(mesh.num_vertices(), 16);
        // one ghost per boundary edge
        assert_eq!(mesh.tds.num_tris(), 18 + 12);
        assert_eq!(mesh.triangles().len(), 18);
        assert!(mesh.is_delaunay_mesh());
    }

    #[test]
    fn test_from_triangles_rejects_non_manifold() {
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        let err = Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 1, 2], [0, 1, 3]])
            .err()
            .unwrap();
        assert!(matches!(err.mesh_error(), Some(MeshError::IllegalArgument(_))));
        assert!(Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 1, 7]]).is_err());
        assert!(Mesh::from_triangles(MeshType::Mesh2D, &[], &[]).is_err());
    }

    #[test]
    fn test_check_inverted_triangles() {
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let good = Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 1, 2]]).unwrap();
        assert!(!good.check_inverted_triangles().unwrap());
        assert!(good.is_valid());
        let bad = Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 2, 1]]).unwrap();
        assert!(bad.check_inverted_triangles().unwrap());
        assert!(bad.is_sound());
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_check_inverted_triangles_needs_parametric_mesh() {
        let (coords, triangles) = grid_triangulation(2, 2, 1.0);
        let mesh = Mesh::from_triangles(MeshType::Mesh3D, &coords, &triangles).unwrap();
        let err = mesh.check_inverted_triangles().unwrap_err();
        assert!(matches!(err.mesh_error(), Some(MeshError::Precondition(_))));
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_invert_orientation_repairs_clockwise_input() {
        let coords = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]];
        let mut mesh =
            Mesh::from_triangles(MeshType::Mesh2D, &coords, &[[0, 2, 1], [1, 2, 3]]).unwrap();
        assert!(mesh.is_sound());
        assert!(!mesh.is_valid());

        let ot = mesh.find_edge(0, 2).unwrap();
        mesh.invert_orientation(ot).unwrap();
        verify_mesh(&mesh);
        assert_eq!(ot.origin(&mesh.tds), VertexNode::Casual(2));
        assert_eq!(mesh.num_real_tris(), 2);

        // and back
        mesh.invert_orientation(ot).unwrap();
        assert!(mesh.is_sound());
        assert!(mesh.check_inverted_triangles().unwrap());
    }

    #[test]
    fn test_is_sound_checks_spatial_index() {
        let mut mesh = grid_mesh(2);
        assert!(mesh.is_sound());

        let grid = mesh.vertices[4].grid;
        assert!(mesh.quadtree.remove(4, grid));
        assert!(!mesh.is_sound());

        mesh.quadtree.add(4, grid);
        assert!(mesh.is_sound());
    }

    #[test]
    fn test_set_label() {
        let mut mesh = seeded_mesh(MeshConfig::default());
        assert!(!mesh.vertices()[0].is_constrained());
        mesh.set_label(0, 3).unwrap();
        assert!(mesh.vertices()[0].is_constrained());
        assert_eq!(mesh.vertices()[0].label, 3);

        let err = mesh.set_label(42, 1).unwrap_err();
        assert!(matches!(err.mesh_error(), Some(MeshError::IllegalArgument(_))));
    }

    #[test]
    fn test_scale_tolerance() {
        let mut config = MeshConfig {
            epsilon: Some(1e-3),
            ..Default::default()
        };
        config.scale_tolerance(10.0);
        assert_relative_eq!(config.epsilon.unwrap(), 1e-2);

        let mut config = MeshConfig::default();
        config.scale_tolerance(10.0);
        assert_eq!(config.epsilon, None);
    }
}
