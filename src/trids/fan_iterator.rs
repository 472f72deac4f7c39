use log::error;

use super::{otriangle::OTriangle, tri_data_structure::TriDataStructure};
use crate::VertexNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sweep {
    Start,
    Forward,
    Backward,
}

/// Circulates the half-edges sharing the origin of a start handle, counter-clockwise.
///
/// Reaching a ghost triangle the walk jumps back across the real fan to the ghost on the other
/// side and continues from there, so boundary vertices are handled like interior ones. Every
/// half-edge is yielded once, the walk stops when the start destination comes round again.
pub struct AroundOrigin<'a> {
    tds: &'a TriDataStructure,
    current: OTriangle,
    first_dest: VertexNode,
    sweep: Sweep,
    /// The outer vertex has no real fan to jump across.
    reversible: bool,
    steps: usize,
    max_steps: usize,
    done: bool,
}

impl<'a> AroundOrigin<'a> {
    pub fn new(tds: &'a TriDataStructure, start: OTriangle) -> Self {
        let max_steps = tds.tris.len() + 3;
        let reversible = !start.origin(tds).is_conceptual();

        // start inside the real fan, the jump assumes it
        let mut current = start;
        if reversible {
            let mut steps = 0;
            while current.is_outer(tds) && steps < max_steps {
                current = current.next_origin(tds);
                steps += 1;
            }
        }

        Self {
            tds,
            current,
            first_dest: current.destination(tds),
            sweep: Sweep::Start,
            reversible,
            steps: 0,
            max_steps,
            done: false,
        }
    }

    fn advance(&mut self) {
        let tds = self.tds;
        if self.sweep == Sweep::Start {
            self.sweep = Sweep::Forward;
        }

        if self.reversible && self.sweep == Sweep::Forward && self.current.is_outer(tds) {
            self.sweep = Sweep::Backward;
            self.current = self.current.prev_origin(tds);
            while !self.current.is_outer(tds) && self.steps < self.max_steps {
                self.current = self.current.prev_origin(tds);
                self.steps += 1;
            }
        } else {
            self.current = self.current.next_origin(tds);
        }
    }
}

impl Iterator for AroundOrigin<'_> {
    type Item = OTriangle;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.sweep != Sweep::Start {
            if self.current.destination(self.tds) == self.first_dest {
                self.done = true;
                return None;
            }
            if self.steps > self.max_steps {
                error!(
                    "Fan around {} does not close",
                    self.current.origin(self.tds)
                );
                self.done = true;
                return None;
            }
        }

        let item = self.current;
        self.advance();
        self.steps += 1;

        Some(item)
    }
}

/// Circulates the half-edges having the apex of a start handle as apex, counter-clockwise.
///
/// The half-edges opposite to a vertex are the successors of the half-edges leaving it, so this
/// follows [`AroundOrigin`] and inherits its handling of ghost triangles.
pub struct AroundApex<'a> {
    inner: AroundOrigin<'a>,
}

impl<'a> AroundApex<'a> {
    pub fn new(tds: &'a TriDataStructure, start: OTriangle) -> Self {
        Self {
            inner: AroundOrigin::new(tds, start.prev()),
        }
    }
}

impl Iterator for AroundApex<'_> {
    type Item = OTriangle;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(OTriangle::next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn fan_tds() -> TriDataStructure {
        let mut tds = TriDataStructure::new();
        tds.add_init_tri([0, 1, 2]).unwrap();
        tds.split_1_to_3(0, 3).unwrap();
        tds
    }

    fn destinations(tds: &TriDataStructure, it: impl Iterator<Item = OTriangle>) -> HashSet<VertexNode> {
        it.map(|ot| ot.destination(tds)).collect()
    }

    #[test]
    fn test_around_interior_origin() {
        let tds = fan_tds();
        let start = tds.handle_at_origin(VertexNode::Casual(3)).unwrap();
        let fan: Vec<_> = AroundOrigin::new(&tds, start).collect();

        assert_eq!(fan.len(), 3);
        assert_eq!(fan[0], start);
        for ot in &fan {
            assert_eq!(ot.origin(&tds), VertexNode::Casual(3));
            assert!(!ot.is_outer(&tds));
        }
        assert_eq!(
            destinations(&tds, fan.into_iter()),
            HashSet::from([VertexNode::Casual(0), VertexNode::Casual(1), VertexNode::Casual(2)])
        );
    }

    #[test]
    fn test_around_boundary_origin() {
        let tds = fan_tds();
        let full = tds
            .fan_around_origin(tds.handle_at_origin(VertexNode::Casual(0)).unwrap())
            .unwrap();

        // the walk visits every half-edge once, whichever one it starts from
        for start in &full {
            let fan: Vec<_> = AroundOrigin::new(&tds, *start).collect();
            assert_eq!(fan.len(), full.len(), "start {}", start.display(&tds));
            assert_eq!(
                destinations(&tds, fan.into_iter()),
                destinations(&tds, full.iter().copied())
            );
        }
        assert!(destinations(&tds, full.into_iter()).contains(&VertexNode::Conceptual));
    }

    #[test]
    fn test_around_outer_vertex() {
        let tds = fan_tds();
        let start = tds.handle_at_origin(VertexNode::Conceptual).unwrap();
        let fan: Vec<_> = AroundOrigin::new(&tds, start).collect();

        assert_eq!(fan.len(), 3);
        assert!(fan.iter().all(|ot| ot.is_outer(&tds)));
    }

    #[test]
    fn test_next_and_prev_origin_agree() {
        let tds = fan_tds();
        let start = tds.handle_at_origin(VertexNode::Casual(1)).unwrap();
        let ccw = tds.fan_around_origin(start).unwrap();

        let mut cw = vec![start];
        let mut ot = start.prev_origin(&tds);
        while ot != start {
            cw.push(ot);
            ot = ot.prev_origin(&tds);
        }
        assert_eq!(ccw.len(), cw.len());
        assert_eq!(
            destinations(&tds, ccw.into_iter()),
            destinations(&tds, cw.into_iter())
        );
    }

    #[test]
    fn test_around_apex() {
        let tds = fan_tds();
        let start = tds.handle_at_origin(VertexNode::Casual(3)).unwrap().next();
        assert_eq!(start.apex(&tds), VertexNode::Casual(3));

        let ring: Vec<_> = AroundApex::new(&tds, start).collect();
        assert_eq!(ring.len(), 3);
        assert_eq!(ring[0], start);
        for ot in &ring {
            assert_eq!(ot.apex(&tds), VertexNode::Casual(3));
            assert!(ot.has_attributes(&tds, crate::trids::EdgeAttributes::BOUNDARY));
        }
    }

    #[test]
    fn test_around_boundary_apex() {
        let tds = fan_tds();
        let start = tds.handle_at_origin(VertexNode::Casual(2)).unwrap().next();
        let ring: Vec<_> = AroundApex::new(&tds, start).collect();

        // two real triangles and two ghosts share vertex 2
        assert_eq!(ring.len(), 4);
        assert!(ring.iter().all(|ot| ot.apex(&tds) == VertexNode::Casual(2)));
        assert_eq!(ring.iter().filter(|ot| ot.is_outer(&tds)).count(), 2);
    }
}
