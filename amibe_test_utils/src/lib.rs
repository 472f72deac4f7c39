//! utils for amibe tests and fuzzing
#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

use rand::{distr::Uniform, prelude::Distribution};
use rand_distr::Normal;
use std::ops::RangeInclusive;

pub type Vertex2 = [f64; 2];
pub type Vertex3 = [f64; 3];

/// Samples `n` vertices in 2D space from the [Uniform] distribution.
///
/// If no range is specified, the unit-square centered around the origin is used, `[-0.5, 0.5]`.
pub fn sample_vertices_2d(n: usize, range: Option<RangeInclusive<f64>>) -> Vec<Vertex2> {
    let mut rng = rand::rng();
    let range = range.unwrap_or(-0.5..=0.5);
    let uniform = Uniform::try_from(range).expect("Expected range with a greater start then end");

    let mut vertices: Vec<Vertex2> = Vec::with_capacity(n);
    for _ in 0..n {
        let x = uniform.sample(&mut rng);
        let y = uniform.sample(&mut rng);
        vertices.push([x, y]);
    }

    vertices
}

/// Samples `n` parametric vertices `(u, v, 0)`, see [`sample_vertices_2d`].
pub fn sample_uv_vertices(n: usize, range: Option<RangeInclusive<f64>>) -> Vec<Vertex3> {
    sample_vertices_2d(n, range)
        .into_iter()
        .map(|[u, v]| [u, v, 0.0])
        .collect()
}

/// A regular grid of `(nx + 1) x (ny + 1)` vertices in the `z = 0` plane, row by row.
///
/// Interior vertices are moved by a [Normal] noise of deviation `sigma`, relative to the spacing.
pub fn jittered_grid(nx: usize, ny: usize, spacing: f64, sigma: f64) -> Vec<Vertex3> {
    let mut rng = rand::rng();
    let normal = Normal::new(0.0, sigma.abs() * spacing).unwrap();

    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            let interior = i > 0 && i < nx && j > 0 && j < ny;
            let (dx, dy) = if interior && sigma > 0.0 {
                (normal.sample(&mut rng), normal.sample(&mut rng))
            } else {
                (0.0, 0.0)
            };
            vertices.push([i as f64 * spacing + dx, j as f64 * spacing + dy, 0.0]);
        }
    }

    vertices
}

/// A regular grid of `nx x ny` square cells, each split along its `(i, j) -> (i + 1, j + 1)`
/// diagonal into two counter-clockwise triangles.
pub fn grid_triangulation(nx: usize, ny: usize, spacing: f64) -> (Vec<Vertex3>, Vec<[usize; 3]>) {
    let vertices = jittered_grid(nx, ny, spacing, 0.0);
    let idx = |i: usize, j: usize| j * (nx + 1) + i;

    let mut triangles = Vec::with_capacity(2 * nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            triangles.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
            triangles.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
        }
    }

    (vertices, triangles)
}
