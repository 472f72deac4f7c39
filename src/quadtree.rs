//! Spatial index of mesh vertices.
//!
//! Vertices are mapped onto an integer grid of `2^30` units per axis covering the bounding box,
//! with the same scale on both axes so that integer predicates stay isotropic.
//! The index also caches per-vertex metrics for the active geometry context.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use anyhow::Result as HowResult;

use crate::{
    error::illegal_argument,
    metric::Metric2D,
    utils::types::{GridCoord, Vertex2, VertexIdx},
};

/// Number of grid units along the longest side of the bounding box.
pub const GRID_SIZE: i64 = 1 << 30;

/// The root cell is twice as large as the grid, so that `GRID_SIZE` itself is a valid coordinate.
const ROOT_SIZE: i64 = 1 << 31;

const BUCKET_SIZE: usize = 10;

#[derive(Debug)]
enum Cell {
    Leaf(Vec<(VertexIdx, GridCoord)>),
    Node([usize; 4]),
}

/// What [`QuadTree::walk`] should do after visiting a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WalkAction {
    Continue,
    Abort,
}

/// A cell visited by [`QuadTree::walk`].
#[derive(Debug)]
pub(crate) struct CellView<'a> {
    pub corner: GridCoord,
    pub size: i64,
    /// The vertices stored in a leaf, `None` for inner cells.
    pub vertices: Option<&'a [(VertexIdx, GridCoord)]>,
}

#[derive(Debug)]
pub struct QuadTree {
    origin: Vertex2,
    scale: f64,
    extent: GridCoord,
    cells: Vec<Cell>,
    num_vertices: usize,
    metrics: RwLock<HashMap<VertexIdx, Metric2D>>,
}

impl QuadTree {
    /// Create an empty index over the bounding box `[min, max]`.
    pub fn new(min: Vertex2, max: Vertex2) -> HowResult<Self> {
        let extent = (max[0] - min[0]).max(max[1] - min[1]);
        let finite = min.iter().chain(max.iter()).all(|c| c.is_finite());
        if !finite || extent <= 0.0 || max[0] < min[0] || max[1] < min[1] {
            return Err(illegal_argument(format!(
                "Invalid bounding box: {min:?} -> {max:?}"
            )));
        }
        let scale = GRID_SIZE as f64 / extent;

        Ok(Self {
            origin: min,
            scale,
            extent: [
                ((max[0] - min[0]) * scale).round() as i64,
                ((max[1] - min[1]) * scale).round() as i64,
            ],
            cells: vec![Cell::Leaf(Vec::new())],
            num_vertices: 0,
            metrics: RwLock::new(HashMap::new()),
        })
    }

    /// Convert parametric coordinates to grid coordinates.
    pub fn double_to_int(&self, p: Vertex2) -> HowResult<GridCoord> {
        let x = (p[0] - self.origin[0]) * self.scale;
        let y = (p[1] - self.origin[1]) * self.scale;
        let limit = GRID_SIZE as f64 + 0.5;
        if !(-0.5..=limit).contains(&x) || !(-0.5..=limit).contains(&y) {
            return Err(illegal_argument(format!(
                "Point {p:?} lies outside of the spatial index bounding box"
            )));
        }

        Ok([
            (x.round() as i64).clamp(0, GRID_SIZE),
            (y.round() as i64).clamp(0, GRID_SIZE),
        ])
    }

    /// Convert grid coordinates back to parametric coordinates.
    pub(crate) fn int_to_double(&self, g: GridCoord) -> Vertex2 {
        [
            self.origin[0] + g[0] as f64 / self.scale,
            self.origin[1] + g[1] as f64 / self.scale,
        ]
    }

    /// Grid coordinates of the bounding box centre, where the outer vertex lives.
    pub const fn centre(&self) -> GridCoord {
        [self.extent[0] / 2, self.extent[1] / 2]
    }

    pub const fn len(&self) -> usize {
        self.num_vertices
    }

    pub const fn is_empty(&self) -> bool {
        self.num_vertices == 0
    }

    /// Register a vertex at grid position `g`.
    pub fn add(&mut self, v_idx: VertexIdx, g: GridCoord) {
        let mut idx = 0;
        let mut corner = [0, 0];
        let mut size = ROOT_SIZE;

        loop {
            let split = match &mut self.cells[idx] {
                Cell::Node(children) => {
                    let c = child_index(corner, size, g);
                    idx = children[c];
                    corner = child_corner(corner, size, c);
                    size /= 2;
                    continue;
                }
                Cell::Leaf(bucket) => {
                    bucket.push((v_idx, g));
                    bucket.len() > BUCKET_SIZE && size > 1
                }
            };

            if split {
                self.split(idx, corner, size);
            }
            break;
        }

        self.num_vertices += 1;
    }

    fn split(&mut self, idx: usize, corner: GridCoord, size: i64) {
        let first = self.cells.len();
        let children = [first, first + 1, first + 2, first + 3];
        let bucket = match core::mem::replace(&mut self.cells[idx], Cell::Node(children)) {
            Cell::Leaf(bucket) => bucket,
            node => {
                self.cells[idx] = node;
                return;
            }
        };

        let mut buckets: [Vec<(VertexIdx, GridCoord)>; 4] = Default::default();
        for entry in bucket {
            buckets[child_index(corner, size, entry.1)].push(entry);
        }
        let crowded: Vec<usize> = (0..4)
            .filter(|&c| buckets[c].len() > BUCKET_SIZE && size / 2 > 1)
            .collect();
        self.cells.extend(buckets.into_iter().map(Cell::Leaf));

        for c in crowded {
            self.split(children[c], child_corner(corner, size, c), size / 2);
        }
    }

    /// Unregister a vertex, returns `false` if it was not found at `g`.
    pub fn remove(&mut self, v_idx: VertexIdx, g: GridCoord) -> bool {
        let mut idx = 0;
        let mut corner = [0, 0];
        let mut size = ROOT_SIZE;

        loop {
            match &mut self.cells[idx] {
                Cell::Node(children) => {
                    let c = child_index(corner, size, g);
                    idx = children[c];
                    corner = child_corner(corner, size, c);
                    size /= 2;
                }
                Cell::Leaf(bucket) => {
                    let Some(pos) = bucket.iter().position(|&(v, _)| v == v_idx) else {
                        return false;
                    };
                    bucket.swap_remove(pos);
                    self.num_vertices -= 1;
                    self.metrics
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&v_idx);
                    return true;
                }
            }
        }
    }

    /// Find the registered vertex closest to `g`.
    pub fn nearest_vertex(&self, g: GridCoord) -> Option<VertexIdx> {
        let mut best: Option<(i128, VertexIdx)> = None;
        let mut stack = vec![(0, [0, 0], ROOT_SIZE)];

        while let Some((idx, corner, size)) = stack.pop() {
            if let Some((best_dist, _)) = best {
                if cell_dist2(corner, size, g) >= best_dist {
                    continue;
                }
            }

            match &self.cells[idx] {
                Cell::Leaf(bucket) => {
                    for &(v_idx, p) in bucket {
                        let d = dist2(p, g);
                        if best.map_or(true, |(best_dist, _)| d < best_dist) {
                            best = Some((d, v_idx));
                        }
                    }
                }
                Cell::Node(children) => {
                    let mut order: Vec<(i128, usize, GridCoord)> = (0..4)
                        .map(|c| {
                            let child = child_corner(corner, size, c);
                            (cell_dist2(child, size / 2, g), children[c], child)
                        })
                        .collect();
                    // the closest child is popped first
                    order.sort_unstable_by(|a, b| b.0.cmp(&a.0));
                    stack.extend(order.into_iter().map(|(_, c, child)| (c, child, size / 2)));
                }
            }
        }

        best.map(|(_, v_idx)| v_idx)
    }

    /// Visit cells depth-first, children in z-order.
    pub(crate) fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&CellView) -> WalkAction,
    {
        let mut stack = vec![(0, [0, 0], ROOT_SIZE)];

        while let Some((idx, corner, size)) = stack.pop() {
            let cell = &self.cells[idx];
            let view = CellView {
                corner,
                size,
                vertices: match cell {
                    Cell::Leaf(bucket) => Some(bucket.as_slice()),
                    Cell::Node(_) => None,
                },
            };

            match visit(&view) {
                WalkAction::Abort => return,
                WalkAction::Continue => (),
            }

            if let Cell::Node(children) = cell {
                for c in (0..4).rev() {
                    stack.push((children[c], child_corner(corner, size, c), size / 2));
                }
            }
        }
    }

    /// Cached metric of a vertex.
    pub fn metric(&self, v_idx: VertexIdx) -> Option<Metric2D> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&v_idx)
            .copied()
    }

    pub fn set_metric(&self, v_idx: VertexIdx, metric: Metric2D) {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(v_idx, metric);
    }

    /// Drop all cached metrics, they are stale once the geometry context changes.
    pub fn clear_all_metrics(&self) {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn num_cached_metrics(&self) -> usize {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[inline]
const fn child_index(corner: GridCoord, size: i64, g: GridCoord) -> usize {
    let half = size / 2;
    let right = (g[0] >= corner[0] + half) as usize;
    let top = (g[1] >= corner[1] + half) as usize;
    right | (top << 1)
}

#[inline]
const fn child_corner(corner: GridCoord, size: i64, c: usize) -> GridCoord {
    let half = size / 2;
    [
        corner[0] + if c & 1 == 1 { half } else { 0 },
        corner[1] + if c & 2 == 2 { half } else { 0 },
    ]
}

#[inline]
fn dist2(a: GridCoord, b: GridCoord) -> i128 {
    let dx = (a[0] - b[0]) as i128;
    let dy = (a[1] - b[1]) as i128;
    dx * dx + dy * dy
}

/// Squared distance from `g` to the cell `[corner, corner + size)`.
#[inline]
fn cell_dist2(corner: GridCoord, size: i64, g: GridCoord) -> i128 {
    let axis = |k: usize| -> i128 {
        let lo = corner[k];
        let hi = corner[k] + size - 1;
        if g[k] < lo {
            (lo - g[k]) as i128
        } else if g[k] > hi {
            (g[k] - hi) as i128
        } else {
            0
        }
    };
    let dx = axis(0);
    let dy = axis(1);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use amibe_test_utils::sample_vertices_2d;

    fn brute_force_nearest(points: &[GridCoord], g: GridCoord) -> i128 {
        points.iter().map(|&p| dist2(p, g)).min().unwrap()
    }

    #[test]
    fn test_grid_mapping() {
        let qt = QuadTree::new([-1.0, 0.0], [1.0, 1.0]).unwrap();
        assert_eq!(qt.double_to_int([-1.0, 0.0]).unwrap(), [0, 0]);
        assert_eq!(qt.double_to_int([1.0, 0.0]).unwrap(), [GRID_SIZE, 0]);
        assert_eq!(qt.double_to_int([0.0, 1.0]).unwrap(), [GRID_SIZE / 2, GRID_SIZE / 2]);
        assert!(qt.double_to_int([1.5, 0.0]).is_err());
        assert_eq!(qt.centre(), [GRID_SIZE / 2, GRID_SIZE / 4]);
        assert_eq!(qt.int_to_double([GRID_SIZE / 2, 0]), [0.0, 0.0]);
    }

    #[test]
    fn test_invalid_bounding_box() {
        assert!(QuadTree::new([0.0, 0.0], [0.0, 0.0]).is_err());
        assert!(QuadTree::new([0.0, 0.0], [f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_nearest_vertex() {
        for n in [1, 5, 11, 100, 1000] {
            let mut qt = QuadTree::new([-0.5, -0.5], [0.5, 0.5]).unwrap();
            let points: Vec<GridCoord> = sample_vertices_2d(n, None)
                .into_iter()
                .map(|p| qt.double_to_int(p).unwrap())
                .collect();
            for (i, &g) in points.iter().enumerate() {
                qt.add(i, g);
            }
            assert_eq!(qt.len(), n);

            for query in sample_vertices_2d(20, None) {
                let g = qt.double_to_int(query).unwrap();
                let found = qt.nearest_vertex(g).unwrap();
                assert_eq!(dist2(points[found], g), brute_force_nearest(&points, g));
            }
        }
    }

    #[test]
    fn test_remove_and_walk() {
        let mut qt = QuadTree::new([0.0, 0.0], [1.0, 1.0]).unwrap();
        let points: Vec<GridCoord> = sample_vertices_2d(200, Some(0.0..=1.0))
            .into_iter()
            .map(|p| qt.double_to_int(p).unwrap())
            .collect();
        for (i, &g) in points.iter().enumerate() {
            qt.add(i, g);
        }

        for i in (0..200).step_by(2) {
            assert!(qt.remove(i, points[i]));
        }
        assert!(!qt.remove(0, points[0]));
        assert_eq!(qt.len(), 100);

        let mut seen = Vec::new();
        let mut is_split = false;
        qt.walk(|cell| {
            is_split |= cell.size < ROOT_SIZE;
            if let Some(vertices) = cell.vertices {
                assert!(vertices.len() <= BUCKET_SIZE);
                seen.extend(vertices.iter().map(|&(v, _)| v));
            }
            WalkAction::Continue
        });
        seen.sort_unstable();
        assert_eq!(seen, (1..200).step_by(2).collect::<Vec<_>>());
        assert!(is_split);

        let mut visited = 0;
        qt.walk(|_| {
            visited += 1;
            WalkAction::Abort
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_metric_cache() {
        let mut qt = QuadTree::new([0.0, 0.0], [1.0, 1.0]).unwrap();
        qt.add(0, [1, 1]);
        qt.set_metric(0, Metric2D::identity());
        qt.set_metric(3, Metric2D::identity());
        assert_eq!(qt.num_cached_metrics(), 2);
        assert_eq!(qt.metric(0), Some(Metric2D::identity()));

        assert!(qt.remove(0, [1, 1]));
        assert_eq!(qt.metric(0), None);

        qt.clear_all_metrics();
        assert_eq!(qt.num_cached_metrics(), 0);
    }
}
