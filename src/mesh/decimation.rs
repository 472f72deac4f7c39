use std::collections::HashSet;

use anyhow::{Ok as HowOk, Result as HowResult};
use log::{debug, trace, warn};
use nalgebra::Vector3;

use super::{Mesh, MeshType};
use crate::{
    error::precondition,
    trids::{AroundApex, AroundOrigin, EdgeAttributes, OTriangle},
    utils::types::{Vertex3, VertexIdx},
    VertexNode,
};

impl Mesh {
    /// Check if the edge `ot` can be collapsed into a vertex at `target`.
    ///
    /// Rejects ears and edges whose end points share more than two neighbors. In 3D, also rejects
    /// a target that would flip or flatten a triangle around either end point.
    pub fn can_contract(&self, ot: OTriangle, target: Vertex3) -> bool {
        let tds = &self.tds;
        if let Err(err) = tds.check_handle(ot) {
            trace!("{err}");
            return false;
        }
        let ot = if ot.is_outer(tds) { ot.sym(tds) } else { ot };
        let sym = ot.sym(tds);
        let (o, d) = (ot.origin(tds), ot.destination(tds));
        if ot.is_outer(tds) || o.idx().is_none() || d.idx().is_none() {
            return false;
        }

        let is_ear = |h: OTriangle| {
            !h.is_outer(tds)
                && h.next().has_attributes(tds, EdgeAttributes::BOUNDARY)
                && h.prev().has_attributes(tds, EdgeAttributes::BOUNDARY)
        };
        if is_ear(ot) || is_ear(sym) {
            trace!("Edge {} closes an ear", ot.display(tds));
            return false;
        }

        if self.kind() == MeshType::Mesh3D {
            let target = Vector3::from(target);
            // the opposite edges of o, then of d
            for start in [ot.next(), sym.next()] {
                for h in AroundApex::new(tds, start) {
                    if h.tri == ot.tri || h.tri == sym.tri || h.is_outer(tds) {
                        continue;
                    }
                    let x0 = Vector3::from(self.node_vertex(h.origin(tds)).coords);
                    let x1 = Vector3::from(self.node_vertex(h.destination(tds)).coords);
                    let xa = Vector3::from(self.node_vertex(h.apex(tds)).coords);

                    let t1 = x1 - x0;
                    let n = t1.cross(&(xa - x0));
                    // in-plane normal of x0 -> x1 pointing away from the apex, null if flat
                    let nu = t1.cross(&n);
                    let dot = (target - x0).dot(&nu);
                    if dot.is_nan() || dot >= 0.0 {
                        trace!("Contracting {} inverts {}", ot.display(tds), h.tri(tds));
                        return false;
                    }
                }
            }
        }

        let neighbors = |start: OTriangle| -> HashSet<VertexNode> {
            AroundOrigin::new(tds, start)
                .map(|h| h.destination(tds))
                .filter(|&n| n != o && n != d)
                .collect()
        };
        let common = neighbors(ot).intersection(&neighbors(sym)).count();

        common < 3
    }

    /// Collapse the edge `ot` into `target`, one of its end points or a vertex not yet in the mesh.
    ///
    /// The caller is responsible for checking [`Mesh::can_contract`] first.
    pub fn contract(&mut self, ot: OTriangle, target: VertexIdx) -> HowResult<()> {
        self.check_contractible_handle(ot)?;
        let (o, d) = (ot.origin(&self.tds), ot.destination(&self.tds));
        let (Some(o_idx), Some(d_idx)) = (o.idx(), d.idx()) else {
            return Err(precondition(format!(
                "Cannot contract {} next to the outer vertex",
                ot.display(&self.tds)
            )));
        };
        let grid = self.vertex(target)?.grid;
        let is_new = target != o_idx && target != d_idx;
        if is_new && self.tds.link(VertexNode::Casual(target)).is_some() {
            return Err(precondition(format!(
                "Cannot contract into vertex {target}, it is already part of the mesh"
            )));
        }

        self.tds.contract(ot, VertexNode::Casual(target))?;

        for v_idx in [o_idx, d_idx] {
            if v_idx != target {
                self.quadtree.remove(v_idx, self.vertices[v_idx].grid);
            }
        }
        if is_new {
            self.quadtree.add(target, grid);
        }
        debug!("Contracted {} -> {} into {}", o_idx, d_idx, target);

        HowOk(())
    }

    /// Collapse the edge `ot` into a new vertex at its midpoint and return that vertex.
    pub fn contract_to_midpoint(&mut self, ot: OTriangle) -> HowResult<VertexIdx> {
        self.check_contractible_handle(ot)?;
        let (o, d) = (ot.origin(&self.tds), ot.destination(&self.tds));
        let (Some(o_idx), Some(d_idx)) = (o.idx(), d.idx()) else {
            return Err(precondition(format!(
                "Cannot contract {} next to the outer vertex",
                ot.display(&self.tds)
            )));
        };
        let mid: Vertex3 = ((Vector3::from(self.vertices[o_idx].coords)
            + Vector3::from(self.vertices[d_idx].coords))
            * 0.5)
            .into();

        if !self.can_contract(ot, mid) {
            return Err(precondition(format!(
                "Edge {} can not be contracted",
                ot.display(&self.tds)
            )));
        }
        let v_idx = self.add_vertex(mid)?;
        self.contract(ot, v_idx)?;

        HowOk(v_idx)
    }

    /// Collapse every boundary edge whose end points carry the same non-zero label, i.e. the
    /// image of a CAD edge degenerated into a point. Each edge is collapsed into its origin.
    ///
    /// Returns the number of collapsed edges. Edges failing [`Mesh::can_contract`] are kept.
    pub fn remove_degenerated_edges(&mut self) -> HowResult<usize> {
        debug!("Removing degenerated edges");
        let tds = &self.tds;
        let candidates: Vec<(VertexIdx, VertexIdx)> = tds
            .active_tris()
            .filter(|tri| !tri.is_outer())
            .flat_map(|tri| tri.otriangles())
            .filter(|ot| ot.has_attributes(tds, EdgeAttributes::BOUNDARY))
            .filter_map(|ot| Some((ot.origin(tds).idx()?, ot.destination(tds).idx()?)))
            .filter(|&(o, d)| {
                let label = self.vertices[o].label;
                label != 0 && label == self.vertices[d].label
            })
            .collect();

        let mut num_collapsed = 0;
        for (o, d) in candidates {
            // an earlier collapse may have removed the edge
            let Some(ot) = self.find_edge(o, d) else {
                continue;
            };
            if !ot.has_attributes(&self.tds, EdgeAttributes::BOUNDARY) {
                continue;
            }
            if !self.can_contract(ot, self.vertices[o].coords) {
                warn!("Degenerated edge {} -> {} can not be collapsed", o, d);
                continue;
            }
            trace!("Collapsing {}", ot.display(&self.tds));
            self.contract(ot, o)?;
            num_collapsed += 1;
        }
        debug!("Collapsed {} degenerated edges", num_collapsed);

        HowOk(num_collapsed)
    }

    fn check_contractible_handle(&self, ot: OTriangle) -> HowResult<()> {
        self.tds.check_handle(ot).map_err(|err| {
            precondition(format!(
                "Cannot contract handle {}/{}: {err}",
                ot.tri, ot.orientation
            ))
        })
    }
}
