use anyhow::{Ok as HowOk, Result as HowResult};
use log::{error, trace};
use rayon::prelude::*;

use super::{
    attributes::EdgeAttributes,
    otriangle::{OTriangle, NEXT3, PREV3},
    tri_iterator::TriIterator,
};
use crate::{
    error::{illegal_argument, internal, precondition},
    utils::types::{TriIdx, VertexIdx},
    VertexNode,
};

/// Storage of one triangle: its corners, the half-edges glued to its edges and the edge flags.
///
/// Edge `i` is opposite to corner `i`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub nodes: [VertexNode; 3],
    pub adj: [OTriangle; 3],
    pub attributes: [EdgeAttributes; 3],
}

impl Triangle {
    pub const fn new(nodes: [VertexNode; 3]) -> Self {
        Self {
            nodes,
            adj: [OTriangle::INACTIVE; 3],
            attributes: [EdgeAttributes::empty(); 3],
        }
    }

    const fn deleted() -> Self {
        Self::new([VertexNode::Deleted; 3])
    }
}

/// A 2D triangulation data structure.
///
/// Triangles are stored in an arena, a half-edge is addressed by an [`OTriangle`] handle, i.e. a
/// triangle index and a local edge index.
///
/// ```ignore
///          n0
///         /  \
///   edge1/    \edge2
///       /      \
///     n1 ------ n2
///         edge0
/// ```
//
// Every half-edge has exactly one twin. The exterior is closed by ghost triangles sharing the
// outer node, all their edges are flagged `OUTER`. A real edge facing a ghost is `BOUNDARY`.
#[derive(Debug)]
pub struct TriDataStructure {
    pub(crate) tris: Vec<Triangle>,
    /// One incident triangle per vertex.
    pub(crate) vertex_links: Vec<Option<TriIdx>>,
    /// One ghost triangle, i.e. a triangle incident to the outer node.
    pub(crate) outer_link: Option<TriIdx>,
    pub num_tris: usize,
    /// The number of triangles dropped by contractions, their slots stay in the arena.
    pub num_deleted_tris: usize,
}

impl Default for TriDataStructure {
    fn default() -> Self {
        Self::new()
    }
}

impl TriDataStructure {
    pub const fn new() -> Self {
        Self {
            tris: Vec::new(),
            vertex_links: Vec::new(),
            outer_link: None,
            num_tris: 0,
            num_deleted_tris: 0,
        }
    }

    /// Add a triangle without any adjacency and retrieve its index.
    pub fn add_tri(&mut self, vertex_nodes: [VertexNode; 3]) -> TriIdx {
        self.tris.push(Triangle::new(vertex_nodes));
        self.num_tris += 1;

        self.tris.len() - 1
    }

    /// Make `ot1` and `ot2` twins of each other.
    pub fn glue(&mut self, ot1: OTriangle, ot2: OTriangle) -> HowResult<()> {
        self.check_handle(ot1)?;
        self.check_handle(ot2)?;
        if ot1.has_attributes(self, EdgeAttributes::NONMANIFOLD)
            || ot2.has_attributes(self, EdgeAttributes::NONMANIFOLD)
        {
            return Err(precondition(format!(
                "Cannot glue non-manifold edges {} and {}",
                ot1.display(self),
                ot2.display(self)
            )));
        }

        self.tris[ot1.tri].adj[ot1.orientation] = ot2;
        self.tris[ot2.tri].adj[ot2.orientation] = ot1;

        HowOk(())
    }

    /// Add flags to an edge.
    pub fn set_attributes(&mut self, ot: OTriangle, attr: EdgeAttributes) {
        self.tris[ot.tri].attributes[ot.orientation].insert(attr);
    }

    /// Remove flags from an edge.
    pub fn clear_attributes(&mut self, ot: OTriangle, attr: EdgeAttributes) {
        self.tris[ot.tri].attributes[ot.orientation].remove(attr);
    }

    /// Overwrite all flags of an edge.
    pub fn replace_attributes(&mut self, ot: OTriangle, attr: EdgeAttributes) {
        self.tris[ot.tri].attributes[ot.orientation] = attr;
    }

    /// The triangle a node is linked to.
    pub fn link(&self, node: VertexNode) -> Option<TriIdx> {
        match node {
            VertexNode::Casual(v_idx) => self.vertex_links.get(v_idx).copied().flatten(),
            VertexNode::Conceptual => self.outer_link,
            VertexNode::Deleted => None,
        }
    }

    pub fn set_link(&mut self, node: VertexNode, tri: Option<TriIdx>) {
        match node {
            VertexNode::Casual(v_idx) => {
                if v_idx >= self.vertex_links.len() {
                    self.vertex_links.resize(v_idx + 1, None);
                }
                self.vertex_links[v_idx] = tri;
            }
            VertexNode::Conceptual => self.outer_link = tri,
            VertexNode::Deleted => {}
        }
    }

    /// A half-edge starting at `node`, taken from its linked triangle.
    pub fn handle_at_origin(&self, node: VertexNode) -> Option<OTriangle> {
        let tri = self.link(node)?;
        let slot = self.tris.get(tri)?.nodes.iter().position(|&n| n == node)?;

        Some(OTriangle::new(tri, PREV3[slot]))
    }

    /// All half-edges starting at the origin of `start`, rotating counter-clockwise, ghosts included.
    pub fn fan_around_origin(&self, start: OTriangle) -> HowResult<Vec<OTriangle>> {
        self.check_handle(start)?;
        let guard = self.tris.len() + 3;

        let mut fan = vec![start];
        let mut ot = start.next_origin(self);
        while ot != start {
            if fan.len() > guard || !ot.is_active() {
                return Err(internal(format!(
                    "Fan around {} does not close",
                    start.origin(self)
                )));
            }
            fan.push(ot);
            ot = ot.next_origin(self);
        }

        HowOk(fan)
    }

    /// Find the half-edge running from `from` to `to`.
    pub fn find_edge(&self, from: VertexNode, to: VertexNode) -> Option<OTriangle> {
        let start = self.handle_at_origin(from)?;
        self.fan_around_origin(start)
            .ok()?
            .into_iter()
            .find(|ot| ot.destination(self) == to)
    }

    /// Insert an initial triangle and the three ghost triangles closing it.
    ///
    /// The vertices are expected in counter-clockwise order.
    pub fn add_init_tri(&mut self, v_idxs: [VertexIdx; 3]) -> HowResult<[TriIterator; 4]> {
        if self.num_tris() > 0 {
            return Err(precondition("Triangulation already contains triangles!"));
        }
        if v_idxs[0] == v_idxs[1] || v_idxs[1] == v_idxs[2] || v_idxs[2] == v_idxs[0] {
            return Err(illegal_argument(format!(
                "Initial triangle needs three distinct vertices, got {v_idxs:?}"
            )));
        }

        let a = VertexNode::Casual(v_idxs[0]);
        let b = VertexNode::Casual(v_idxs[1]);
        let c = VertexNode::Casual(v_idxs[2]);
        let n_inf = VertexNode::Conceptual;

        // edge 0 of each ghost is the twin of one edge of the real triangle
        let t = self.add_tri([a, b, c]);
        let g_bc = self.add_tri([n_inf, c, b]);
        let g_ca = self.add_tri([n_inf, a, c]);
        let g_ab = self.add_tri([n_inf, b, a]);

        self.glue(OTriangle::new(t, 0), OTriangle::new(g_bc, 0))?;
        self.glue(OTriangle::new(t, 1), OTriangle::new(g_ca, 0))?;
        self.glue(OTriangle::new(t, 2), OTriangle::new(g_ab, 0))?;

        // b -> inf | inf -> b, c -> inf | inf -> c, a -> inf | inf -> a
        self.glue(OTriangle::new(g_bc, 1), OTriangle::new(g_ab, 2))?;
        self.glue(OTriangle::new(g_ca, 1), OTriangle::new(g_bc, 2))?;
        self.glue(OTriangle::new(g_ab, 1), OTriangle::new(g_ca, 2))?;

        for o in 0..3 {
            self.set_attributes(OTriangle::new(t, o), EdgeAttributes::BOUNDARY);
            for g in [g_bc, g_ca, g_ab] {
                self.set_attributes(OTriangle::new(g, o), EdgeAttributes::OUTER);
            }
        }

        for node in [a, b, c] {
            self.set_link(node, Some(t));
        }
        self.set_link(n_inf, Some(g_bc));

        HowOk([
            TriIterator::new(self, t),
            TriIterator::new(self, g_bc),
            TriIterator::new(self, g_ca),
            TriIterator::new(self, g_ab),
        ])
    }

    /// Insert vertex `v_idx` into the real triangle `tri_idx`, the `1 -> 3 split`.
    ///
    /// Returns the three half-edges of the former triangle, each with the new vertex as apex.
    pub fn split_1_to_3(&mut self, tri_idx: TriIdx, v_idx: VertexIdx) -> HowResult<[OTriangle; 3]> {
        let tri = self.get_tri(tri_idx)?;
        if tri.is_deleted() || tri.is_outer() {
            return Err(precondition(format!("Cannot split {tri}")));
        }

        let old = self.tris[tri_idx];
        let p = VertexNode::Casual(v_idx);
        let ids = [tri_idx, self.add_tri([p; 3]), self.add_tri([p; 3])];

        for k in 0..3 {
            self.tris[ids[k]] = Triangle::new([p, old.nodes[NEXT3[k]], old.nodes[PREV3[k]]]);
            self.tris[ids[k]].attributes[0] = old.attributes[k];
        }
        for k in 0..3 {
            self.glue(OTriangle::new(ids[k], 0), old.adj[k])?;
            self.glue(OTriangle::new(ids[k], 1), OTriangle::new(ids[NEXT3[k]], 2))?;
        }

        self.set_link(p, Some(ids[0]));
        for k in 0..3 {
            self.set_link(old.nodes[NEXT3[k]], Some(ids[k]));
        }
        trace!("Split triangle {} at vertex {}", tri_idx, v_idx);

        HowOk([
            OTriangle::new(ids[0], 0),
            OTriangle::new(ids[1], 0),
            OTriangle::new(ids[2], 0),
        ])
    }

    /// Swap the diagonal `ot` of the quadrilateral formed by its two triangles, the `2 -> 2 flip`.
    ///
    /// With `ot = o -> d` of apex `a` and `n` the apex on the other side, the new diagonal joins
    /// `a` and `n`. Returns the half-edge `o -> n` with apex `a`.
    pub fn swap(&mut self, ot: OTriangle) -> HowResult<OTriangle> {
        self.check_handle(ot)?;
        if !ot.is_mutable(self) {
            return Err(precondition(format!(
                "Cannot swap immutable edge {}",
                ot.display(self)
            )));
        }

        let sym = ot.sym(self);
        let o = ot.origin(self);
        let d = ot.destination(self);
        let a = ot.apex(self);
        let n = sym.apex(self);
        if [o, d, a, n].iter().any(|v| v.idx().is_none()) {
            return Err(precondition(format!(
                "Cannot swap edge {} next to the outer vertex",
                ot.display(self)
            )));
        }

        // d -> a, a -> o, o -> n, n -> d
        let quad = [ot.next(), ot.prev(), sym.next(), sym.prev()];
        let ext = quad.map(|e| e.sym(self));
        if quad
            .iter()
            .chain(ext.iter())
            .chain([ot, sym].iter())
            .any(|e| e.has_attributes(self, EdgeAttributes::NONMANIFOLD))
        {
            return Err(precondition(format!(
                "Cannot swap edge {} of a non-manifold quadrilateral",
                ot.display(self)
            )));
        }

        let attrs = quad.map(|e| e.attributes(self).difference(EdgeAttributes::SWAPPED));
        for e in ext {
            self.clear_attributes(e, EdgeAttributes::SWAPPED);
        }

        let (t1, i) = (ot.tri, ot.orientation);
        let (t2, j) = (sym.tri, sym.orientation);

        self.tris[t1].nodes[NEXT3[i]] = n;
        self.tris[t1].nodes[PREV3[i]] = a;
        self.tris[t1].nodes[i] = o;
        self.tris[t2].nodes[NEXT3[j]] = a;
        self.tris[t2].nodes[PREV3[j]] = n;
        self.tris[t2].nodes[j] = d;

        let e_ao = OTriangle::new(t1, NEXT3[i]);
        let e_on = OTriangle::new(t1, PREV3[i]);
        let e_nd = OTriangle::new(t2, NEXT3[j]);
        let e_da = OTriangle::new(t2, PREV3[j]);

        self.replace_attributes(e_ao, attrs[1]);
        self.replace_attributes(e_on, attrs[2]);
        self.replace_attributes(e_nd, attrs[3]);
        self.replace_attributes(e_da, attrs[0]);

        self.glue(e_ao, ext[1])?;
        self.glue(e_on, ext[2])?;
        self.glue(e_nd, ext[3])?;
        self.glue(e_da, ext[0])?;
        self.glue(OTriangle::new(t1, i), OTriangle::new(t2, j))?;

        self.replace_attributes(OTriangle::new(t1, i), EdgeAttributes::SWAPPED);
        self.replace_attributes(OTriangle::new(t2, j), EdgeAttributes::SWAPPED);

        for v in [n, a, o] {
            self.set_link(v, Some(t1));
        }
        self.set_link(d, Some(t2));
        trace!("Swapped {} -> {} into {} -> {}", o, d, a, n);

        HowOk(e_on)
    }

    /// Collapse the edge `ot` into the node `n`.
    ///
    /// Every triangle around either end point is relabeled to `n`, the two triangles sharing the
    /// edge are dropped and their outer neighbors glued to each other. A ghost side is spliced
    /// without carrying flags.
    pub fn contract(&mut self, ot: OTriangle, n: VertexNode) -> HowResult<()> {
        self.check_handle(ot)?;
        let sym = ot.sym(self);
        let o = ot.origin(self);
        let d = ot.destination(self);
        if o.idx().is_none() || d.idx().is_none() || n.idx().is_none() {
            return Err(precondition(format!(
                "Cannot contract {} into {}",
                ot.display(self),
                n
            )));
        }

        let t1_outer = ot.is_outer(self);
        let t2_outer = sym.is_outer(self);
        if t1_outer && t2_outer {
            return Err(precondition(format!(
                "Edge {} lies outside of the mesh",
                ot.display(self)
            )));
        }

        // a1 -> o, d -> a1, o -> a2, a2 -> d
        let [e3, e4, e5, e6] = [ot.prev(), ot.next(), sym.next(), sym.prev()];
        let [ext3, ext4, ext5, ext6] = [e3, e4, e5, e6].map(|e| e.sym(self));
        if [ot, sym, e3, e4, e5, e6, ext3, ext4, ext5, ext6]
            .iter()
            .any(|e| e.has_attributes(self, EdgeAttributes::NONMANIFOLD))
        {
            return Err(precondition(format!(
                "Cannot contract non-manifold edge {}",
                ot.display(self)
            )));
        }
        if (!t1_outer && ext3.is_outer(self) && ext4.is_outer(self))
            || (!t2_outer && ext5.is_outer(self) && ext6.is_outer(self))
        {
            return Err(precondition(format!(
                "Contracting {} would leave a dangling edge",
                ot.display(self)
            )));
        }

        let a1 = ot.apex(self);
        let a2 = sym.apex(self);
        let [attr3, attr4, attr5, attr6] = [e3, e4, e5, e6].map(|e| e.attributes(self));

        let fan_o = self.fan_around_origin(ot)?;
        let fan_d = self.fan_around_origin(sym)?;
        for h in fan_o.iter().chain(fan_d.iter()) {
            self.tris[h.tri].nodes[NEXT3[h.orientation]] = n;
        }

        for v in [o, d] {
            if v != n {
                self.set_link(v, None);
            }
        }

        self.glue(ext4, ext3)?;
        if t1_outer {
            self.set_link(a1, Some(ext3.tri));
        } else {
            self.set_attributes(ext4, attr3);
            self.set_attributes(ext3, attr4);
            let t34 = if ext3.is_outer(self) { ext4.tri } else { ext3.tri };
            self.set_link(a1, Some(t34));
            self.set_link(n, Some(t34));
        }

        self.glue(ext5, ext6)?;
        if t2_outer {
            self.set_link(a2, Some(ext5.tri));
        } else {
            self.set_attributes(ext5, attr6);
            self.set_attributes(ext6, attr5);
            let t56 = if ext5.is_outer(self) { ext6.tri } else { ext5.tri };
            self.set_link(a2, Some(t56));
            self.set_link(n, Some(t56));
        }

        self.clear_attributes(ot, EdgeAttributes::MARKED);
        self.clear_attributes(sym, EdgeAttributes::MARKED);
        self.set_tri_inactive(ot.tri);
        self.set_tri_inactive(sym.tri);
        trace!("Contracted {} -> {} into {}", o, d, n);

        HowOk(())
    }

    /// Drop a triangle from the active collection, its slot stays in the arena.
    fn set_tri_inactive(&mut self, triangle_idx: TriIdx) {
        self.tris[triangle_idx] = Triangle::deleted();
        self.num_tris -= 1;
        self.num_deleted_tris += 1;
    }

    /// Retrieve a tri iterator by index.
    pub fn get_tri(&self, idx: TriIdx) -> HowResult<TriIterator> {
        if idx >= self.tris.len() {
            return Err(illegal_argument(format!("Tri index {idx} out of bounds!")));
        }

        HowOk(TriIterator::new(self, idx))
    }

    /// All triangles still part of the mesh, ghosts included.
    pub fn active_tris(&self) -> impl Iterator<Item = TriIterator<'_>> + '_ {
        (0..self.tris.len())
            .map(move |idx| TriIterator::new(self, idx))
            .filter(|tri| !tri.is_deleted())
    }

    /// Get the number of triangles in the triangulation, ghosts included.
    pub const fn num_tris(&self) -> usize {
        self.num_tris
    }

    /// Get the number of triangles in the triangulation, without the ones connected to the outer node.
    pub fn num_real_tris(&self) -> usize {
        self.active_tris().filter(TriIterator::is_casual).count()
    }

    /// Reverse the orientation of every triangle connected to `ot`, which then runs from its former
    /// destination to its former origin.
    ///
    /// Each triangle exchanges two corners, together with the adjacency and flags of the edges
    /// leaving them. Twins are glued again across every edge that is not non-manifold.
    pub fn invert_orientation(&mut self, ot: OTriangle) -> HowResult<()> {
        self.check_handle(ot)?;

        let mut seen = vec![false; self.tris.len()];
        let mut todo = vec![ot];
        let mut num_inverted = 0;
        while let Some(OTriangle { tri, orientation }) = todo.pop() {
            if seen[tri] {
                continue;
            }
            seen[tri] = true;
            num_inverted += 1;

            {
                let t = &mut self.tris[tri];
                // ghosts keep the outer node in its slot
                let pivot = t
                    .nodes
                    .iter()
                    .position(VertexNode::is_conceptual)
                    .unwrap_or(orientation);
                let (i, j) = (NEXT3[pivot], PREV3[pivot]);
                t.nodes.swap(i, j);
                t.adj.swap(i, j);
                t.attributes.swap(i, j);
            }

            for o in 0..3 {
                let edge = OTriangle::new(tri, o);
                let sym = self.tris[tri].adj[o];
                if !sym.is_active() || edge.has_attributes(self, EdgeAttributes::NONMANIFOLD) {
                    continue;
                }
                self.tris[sym.tri].adj[sym.orientation] = edge;
                todo.push(sym);
            }
        }
        trace!("Inverted the orientation of {} triangles", num_inverted);

        HowOk(())
    }

    pub(crate) fn check_handle(&self, ot: OTriangle) -> HowResult<()> {
        if !ot.is_active() || ot.tri >= self.tris.len() || ot.orientation > 2 {
            return Err(illegal_argument(format!(
                "Invalid handle {}/{}",
                ot.tri, ot.orientation
            )));
        }
        if self.tris[ot.tri].nodes.iter().any(VertexNode::is_deleted) {
            return Err(precondition(format!("Triangle {} has been dropped", ot.tri)));
        }

        HowOk(())
    }

    fn is_tri_sound(&self, idx: TriIdx) -> bool {
        let tri = TriIterator::new(self, idx);
        if tri.is_deleted() {
            return true;
        }
        if tri.is_degenerate() {
            error!("{} is degenerate", tri);
            return false;
        }

        let mut sound = true;
        for ot in tri.otriangles() {
            if !ot.is_sound(self) {
                error!("{} is not glued consistently", ot.display(self));
                sound = false;
                continue;
            }
            let flags_sound = if tri.is_outer() {
                ot.is_outer(self)
            } else {
                !ot.is_outer(self)
                    && (ot.has_attributes(self, EdgeAttributes::BOUNDARY)
                        || !ot.sym(self).is_outer(self))
            };
            if !flags_sound {
                error!("{} carries inconsistent flags", ot.display(self));
                sound = false;
            }
        }

        sound
    }

    /// Check if the data structure is sound: twins round-trip, ghost flags are consistent and
    /// every vertex link points to a triangle containing that vertex.
    pub fn is_sound(&self) -> bool {
        let num_broken = (0..self.tris.len())
            .into_par_iter()
            .filter(|&idx| !self.is_tri_sound(idx))
            .count();

        let mut links_sound = true;
        for (v_idx, link) in self.vertex_links.iter().enumerate() {
            let Some(tri) = link else { continue };
            let node = VertexNode::Casual(v_idx);
            if self.tris.get(*tri).map_or(true, |t| !t.nodes.contains(&node)) {
                error!("Vertex {} links to triangle {} not containing it", v_idx, tri);
                links_sound = false;
            }
        }
        if let Some(tri) = self.outer_link {
            if self
                .tris
                .get(tri)
                .map_or(true, |t| !t.nodes.contains(&VertexNode::Conceptual))
            {
                error!("Outer vertex links to triangle {} not containing it", tri);
                links_sound = false;
            }
        }

        let count_sound = self.active_tris().count() == self.num_tris;
        if !count_sound {
            error!("Triangle count {} is out of sync", self.num_tris);
        }

        num_broken == 0 && links_sound && count_sound
    }
}
