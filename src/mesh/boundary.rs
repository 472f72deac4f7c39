use std::collections::VecDeque;

use anyhow::{Ok as HowOk, Result as HowResult};
use log::{debug, trace};

use super::Mesh;
use crate::{
    error::{enforcement, illegal_argument, internal},
    predicates::on_left,
    trids::{AroundOrigin, EdgeAttributes, OTriangle},
    utils::{convexity::is_strictly_convex, types::VertexIdx},
    VertexNode,
};

/// What the fan of the chord start sees in the direction of the chord end.
enum Bracket {
    /// The edge already exists.
    Edge(OTriangle),
    /// The chord leaves the fan through this edge, its origin is right of the chord.
    Crossing(OTriangle),
}

impl Mesh {
    /// Walk the fan of `from` for the edge reaching `to`, or the edge the chord crosses first.
    fn bracket(&self, from: VertexIdx, to: VertexIdx) -> HowResult<Bracket> {
        let [gs, ge] = [self.vertices[from].grid, self.vertices[to].grid];
        let start = self.real_handle_at(from)?;

        for h in AroundOrigin::new(&self.tds, start) {
            if h.is_outer(&self.tds) {
                continue;
            }
            let d = h.destination(&self.tds);
            if d == VertexNode::Casual(to) {
                return HowOk(Bracket::Edge(h));
            }

            let gd = self.grid(d);
            let ga = self.grid(h.apex(&self.tds));
            let side_d = on_left(gs, gd, ge);
            if side_d == 0 && (gd[0] - gs[0]) * (ge[0] - gs[0]) + (gd[1] - gs[1]) * (ge[1] - gs[1]) > 0 {
                return Err(enforcement(format!(
                    "Edge {from} -> {to} runs through vertex {d}"
                )));
            }
            if side_d > 0 && on_left(gs, ga, ge) < 0 {
                return HowOk(Bracket::Crossing(h.next()));
            }
        }

        Err(enforcement(format!(
            "Fan of vertex {from} does not bracket vertex {to}"
        )))
    }

    /// Follow the chord `from -> to` through the triangles it crosses, starting at `first`.
    ///
    /// Returns the crossed edges as `(right, left)` vertex pairs.
    fn trace_chord(
        &self,
        from: VertexIdx,
        to: VertexIdx,
        first: OTriangle,
    ) -> HowResult<Vec<(VertexIdx, VertexIdx)>> {
        let [gs, ge] = [self.vertices[from].grid, self.vertices[to].grid];
        let max_steps = self.tds.tris.len();

        let mut crossings = Vec::new();
        let mut h = first;
        while crossings.len() <= max_steps {
            let (Some(u), Some(w)) = (
                h.origin(&self.tds).idx(),
                h.destination(&self.tds).idx(),
            ) else {
                return Err(enforcement(format!(
                    "Edge {from} -> {to} leaves the mesh"
                )));
            };
            if !h.is_mutable(&self.tds) {
                return Err(enforcement(format!(
                    "Edge {from} -> {to} crosses constrained edge {u} -> {w}"
                )));
            }
            crossings.push((u, w));

            let sym = h.sym(&self.tds);
            let x = sym.apex(&self.tds);
            if x == VertexNode::Casual(to) {
                return HowOk(crossings);
            }
            if x.idx().is_none() {
                return Err(enforcement(format!(
                    "Edge {from} -> {to} leaves the mesh"
                )));
            }

            h = match on_left(gs, ge, self.grid(x)).signum() {
                1 => sym.next(),
                -1 => sym.prev(),
                _ => {
                    return Err(enforcement(format!(
                        "Edge {from} -> {to} runs through vertex {x}"
                    )))
                }
            };
        }

        Err(internal(format!(
            "Tracing edge {from} -> {to} did not terminate"
        )))
    }

    /// Swap the crossed edges away, re-queueing those which can not be swapped yet.
    ///
    /// Returns the number of swaps.
    fn remove_crossings(
        &mut self,
        from: VertexIdx,
        to: VertexIdx,
        crossings: Vec<(VertexIdx, VertexIdx)>,
    ) -> HowResult<usize> {
        let [gs, ge] = [self.vertices[from].grid, self.vertices[to].grid];
        let n = crossings.len();
        let max_pops = n * n + n;
        let mut queue = VecDeque::from(crossings);

        let mut swaps = 0;
        let mut stalled = 0;
        let mut pops = 0;
        while let Some((u, w)) = queue.pop_front() {
            pops += 1;
            if stalled > queue.len() || pops > max_pops {
                break;
            }
            let Some(h) = self.find_edge(u, w) else {
                continue;
            };

            let sym = h.sym(&self.tds);
            let (p, x) = (h.apex(&self.tds), sym.apex(&self.tds));
            let convex = h.is_mutable(&self.tds)
                && p.idx().is_some()
                && x.idx().is_some()
                && is_strictly_convex(
                    self.grid(x),
                    self.vertices[w].grid,
                    self.grid(p),
                    self.vertices[u].grid,
                );
            if !convex {
                queue.push_back((u, w));
                stalled += 1;
                continue;
            }

            self.tds.swap(h)?;
            swaps += 1;
            stalled = 0;

            let (Some(p), Some(x)) = (p.idx(), x.idx()) else {
                continue;
            };
            let side_p = on_left(gs, ge, self.vertices[p].grid).signum();
            let side_x = on_left(gs, ge, self.vertices[x].grid).signum();
            if side_p * side_x < 0 {
                queue.push_back(if side_p > 0 { (x, p) } else { (p, x) });
            }
        }

        HowOk(swaps)
    }

    /// Find or create the edge `start -> end` by swapping the edges crossing it.
    ///
    /// Each pass traces the chord from the current start, swaps what it can and exchanges the
    /// roles of both end points. Fails with a recoverable error when the chord runs through a
    /// vertex, crosses a constrained edge or is not recovered within `max_iter` passes.
    pub fn force_boundary_edge(
        &mut self,
        start: VertexIdx,
        end: VertexIdx,
        max_iter: usize,
    ) -> HowResult<OTriangle> {
        if start == end {
            return Err(illegal_argument(format!(
                "Cannot force the loop edge {start} -> {end}"
            )));
        }
        for v_idx in [start, end] {
            self.vertex(v_idx)?;
            if self.tds.link(VertexNode::Casual(v_idx)).is_none() {
                return Err(illegal_argument(format!(
                    "Vertex {v_idx} is not part of the mesh"
                )));
            }
        }

        let now = std::time::Instant::now();
        let (mut from, mut to) = (start, end);
        let mut num_crossings = 0;
        let mut swaps = 0;
        for iter in 0..=max_iter {
            let first = match self.bracket(from, to)? {
                Bracket::Edge(_) => {
                    let ot = self
                        .find_edge(start, end)
                        .ok_or_else(|| internal(format!("Edge {start} -> {end} is lost")))?;
                    debug!(
                        "Forced edge {} -> {}: {} intersections, {} swaps in {} passes",
                        start, end, num_crossings, swaps, iter
                    );
                    trace!("Edge forced in {:.4} µs", now.elapsed().as_micros());
                    return HowOk(ot);
                }
                Bracket::Crossing(h) => h,
            };
            if iter == max_iter {
                break;
            }

            let crossings = self.trace_chord(from, to, first)?;
            if iter == 0 {
                num_crossings = crossings.len();
            }
            swaps += self.remove_crossings(from, to, crossings)?;

            std::mem::swap(&mut from, &mut to);
        }

        Err(enforcement(format!(
            "Edge {start} -> {end} not found after {max_iter} iterations"
        )))
    }

    /// Force every pair as a constrained edge, flagged `BOUNDARY` on both sides.
    pub fn force_boundary_edges(
        &mut self,
        pairs: &[(VertexIdx, VertexIdx)],
    ) -> HowResult<Vec<OTriangle>> {
        let mut forced = Vec::with_capacity(pairs.len());
        for &(start, end) in pairs {
            let ot = self.force_boundary_edge(start, end, self.config.max_iter)?;
            let sym = ot.sym(&self.tds);
            self.tds.set_attributes(ot, EdgeAttributes::BOUNDARY);
            self.tds.set_attributes(sym, EdgeAttributes::BOUNDARY);
            forced.push(ot);
        }
        debug!("Forced {} boundary edges", forced.len());

        HowOk(forced)
    }
}
