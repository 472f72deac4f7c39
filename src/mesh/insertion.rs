use anyhow::{Ok as HowOk, Result as HowResult};
use log::{debug, trace};
use nalgebra::Vector2;

use super::Mesh;
use crate::{
    error::{illegal_argument, internal, precondition},
    predicates::on_left,
    trids::{AroundOrigin, OTriangle},
    utils::{
        point_order::sort_along_hilbert_curve_2d,
        types::{GridCoord, TriIdx, Vertex3, VertexIdx},
    },
    VertexNode,
};

/// Where a point lies with respect to the triangulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    /// Strictly inside a real triangle.
    Inside(TriIdx),
    /// On the interior of an edge, the handle has the point on its left.
    OnEdge(OTriangle),
    /// On an existing vertex.
    OnVertex(VertexIdx),
}

impl Mesh {
    /// A half-edge leaving `v_idx` whose triangle is real.
    pub(crate) fn real_handle_at(&self, v_idx: VertexIdx) -> HowResult<OTriangle> {
        let node = VertexNode::Casual(v_idx);
        let start = self
            .tds
            .handle_at_origin(node)
            .ok_or_else(|| precondition(format!("Vertex {v_idx} is not part of the mesh")))?;

        AroundOrigin::new(&self.tds, start)
            .find(|ot| !ot.is_outer(&self.tds))
            .ok_or_else(|| internal(format!("Vertex {v_idx} has no real triangle")))
    }

    /// Locate the grid point `g` with a visibility walk starting in the triangle of `start`.
    ///
    /// Fails if the walk leaves the triangulated domain.
    pub fn locate(&self, g: GridCoord, start: OTriangle) -> HowResult<Location> {
        if start.is_outer(&self.tds) {
            return Err(precondition(format!(
                "Cannot walk from ghost edge {}",
                start.display(&self.tds)
            )));
        }
        let max_steps = 3 * self.tds.tris.len() + 3;

        let mut ot = start;
        for _ in 0..max_steps {
            let mut crossed = None;
            let mut on_edges = Vec::with_capacity(2);
            for k in 0..3 {
                let e = OTriangle::new(ot.tri, (ot.orientation + k) % 3);
                let side = on_left(
                    self.grid(e.origin(&self.tds)),
                    self.grid(e.destination(&self.tds)),
                    g,
                );
                if side < 0 {
                    crossed = Some(e);
                    break;
                }
                if side == 0 {
                    on_edges.push(e);
                }
            }

            if let Some(e) = crossed {
                let sym = e.sym(&self.tds);
                if sym.is_outer(&self.tds) {
                    return Err(illegal_argument(format!(
                        "Point {:?} lies outside of the triangulated domain",
                        self.quadtree.int_to_double(g)
                    )));
                }
                // rotate the first tested edge to avoid cycling
                ot = sym.next();
                continue;
            }

            return match on_edges[..] {
                [] => HowOk(Location::Inside(ot.tri)),
                [e] => HowOk(Location::OnEdge(e)),
                _ => {
                    let tri = ot.tri(&self.tds);
                    tri.nodes()
                        .into_iter()
                        .filter_map(|n| n.idx())
                        .find(|&v_idx| self.vertices[v_idx].grid == g)
                        .map(Location::OnVertex)
                        .ok_or_else(|| internal(format!("{tri} is flat")))
                }
            };
        }

        Err(internal(format!(
            "Visibility walk did not terminate within {max_steps} steps"
        )))
    }

    /// Insert an existing vertex and restore the Delaunay property around it.
    ///
    /// Returns `false` if the vertex was ignored because it is closer than `epsilon` to, or on
    /// top of, an inserted vertex.
    pub fn insert_vertex(&mut self, v_idx: VertexIdx) -> HowResult<bool> {
        if self.tds.num_tris() == 0 {
            return Err(precondition(
                "Needs a bootstrapped mesh to insert a vertex!",
            ));
        }
        let vertex = *self.vertex(v_idx)?;
        if self.tds.link(VertexNode::Casual(v_idx)).is_some() {
            return Err(precondition(format!("Vertex {v_idx} is already inserted")));
        }

        let now = std::time::Instant::now();
        let near = self
            .quadtree
            .nearest_vertex(vertex.grid)
            .ok_or_else(|| internal("Spatial index is empty"))?;

        if let Some(epsilon) = self.config.epsilon {
            let dist = Vector2::from(vertex.uv())
                .metric_distance(&Vector2::from(self.vertices[near].uv()));
            if dist < epsilon {
                debug!("Ignoring vertex {v_idx}, {dist:.3e} away from vertex {near}");
                self.ignored_vertices.push(v_idx);
                return HowOk(false);
            }
        }

        let location = self.locate(vertex.grid, self.real_handle_at(near)?)?;
        trace!("Located vertex {} in {:.4} µs", v_idx, now.elapsed().as_micros());

        match location {
            Location::OnVertex(other) => {
                debug!("Ignoring vertex {v_idx}, it coincides with vertex {other}");
                self.ignored_vertices.push(v_idx);
                return HowOk(false);
            }
            Location::Inside(tri_idx) => {
                self.tds.split_1_to_3(tri_idx, v_idx)?;
                self.quadtree.add(v_idx, vertex.grid);
            }
            Location::OnEdge(e) => {
                if !e.is_mutable(&self.tds) {
                    return Err(precondition(format!(
                        "Vertex {v_idx} lies on constrained edge {}",
                        e.display(&self.tds)
                    )));
                }
                let ots = self.tds.split_1_to_3(e.tri, v_idx)?;
                self.quadtree.add(v_idx, vertex.grid);
                // the part over the edge is flat, swapping the edge removes it
                self.tds.swap(ots[e.orientation])?;
            }
        }

        let swaps = self.legalize(v_idx)?;
        trace!(
            "Inserted vertex {} with {} swaps in {:.4} µs",
            v_idx,
            swaps,
            now.elapsed().as_micros()
        );

        HowOk(true)
    }

    /// Swap non-Delaunay edges opposite to the freshly inserted `v_idx` until none is left.
    fn legalize(&mut self, v_idx: VertexIdx) -> HowResult<usize> {
        let start = self.real_handle_at(v_idx)?;
        let mut to_check: Vec<OTriangle> = AroundOrigin::new(&self.tds, start)
            .filter(|ot| !ot.is_outer(&self.tds))
            .map(OTriangle::next)
            .collect();

        let max_swaps = 3 * self.tds.tris.len() + 3;
        let mut swaps = 0;
        while let Some(ot) = to_check.pop() {
            if !ot.is_mutable(&self.tds) {
                continue;
            }
            let apex2 = ot.sym(&self.tds).apex(&self.tds);
            if apex2.idx().is_none() || self.is_delaunay(ot, apex2) {
                continue;
            }

            // x -> y of apex v becomes x -> z and z -> y, both of apex v
            let s = self.tds.swap(ot)?;
            to_check.push(s);
            to_check.push(s.next().sym(&self.tds).next());

            swaps += 1;
            if swaps > max_swaps {
                return Err(internal(format!(
                    "Legalizing vertex {v_idx} did not terminate"
                )));
            }
        }

        HowOk(swaps)
    }

    /// Create and insert a batch of vertices, ordered along a Hilbert curve.
    ///
    /// Returns the indices of the created vertices in input order, some of which may be ignored.
    pub fn insert_vertices(&mut self, coords: &[Vertex3]) -> HowResult<Vec<VertexIdx>> {
        if self.tds.num_tris() == 0 {
            return Err(precondition(
                "Needs a bootstrapped mesh to insert vertices!",
            ));
        }

        let mut v_idxs = Vec::with_capacity(coords.len());
        for c in coords {
            v_idxs.push(self.add_vertex(*c)?);
        }

        let now = std::time::Instant::now();
        let points: Vec<_> = v_idxs
            .iter()
            .map(|&v_idx| (v_idx, self.vertices[v_idx].grid))
            .collect();
        let order = sort_along_hilbert_curve_2d(&points);
        trace!(
            "Spatial sorting (hilbert curve) computed in {:.4} µs",
            now.elapsed().as_micros()
        );

        debug!("Inserting {} vertices", order.len());
        let now = std::time::Instant::now();
        let num_ignored = self.ignored_vertices.len();
        for v_idx in order {
            self.insert_vertex(v_idx)?;
        }
        debug!(
            "Inserted {} vertices in {} µs, {} ignored",
            v_idxs.len(),
            now.elapsed().as_micros(),
            self.ignored_vertices.len() - num_ignored
        );

        HowOk(v_idxs)
    }
}
