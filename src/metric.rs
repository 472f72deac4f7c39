//! Metrics of the parametric plane and the geometric computation contexts selecting them.

use core::fmt;

use anyhow::Result as HowResult;
use nalgebra::{Matrix2, Vector2, Vector3};

use crate::{
    error::illegal_argument,
    utils::types::{Vertex2, Vertex3},
};

/// A parametric surface evaluated by the CAD layer.
pub trait CadSurface: Send + Sync {
    /// Point of the surface at parameters `uv`.
    fn value(&self, uv: Vertex2) -> Vertex3;

    /// First derivatives with respect to `u` and `v`.
    fn d1(&self, uv: Vertex2) -> [Vertex3; 2];
}

/// An affine plane `origin + u * u_axis + v * v_axis`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub origin: Vertex3,
    pub u_axis: Vertex3,
    pub v_axis: Vertex3,
}

impl Plane {
    /// The `z = 0` plane parametrized by `x` and `y`.
    pub const fn xy() -> Self {
        Self {
            origin: [0.0; 3],
            u_axis: [1.0, 0.0, 0.0],
            v_axis: [0.0, 1.0, 0.0],
        }
    }
}

impl CadSurface for Plane {
    fn value(&self, uv: Vertex2) -> Vertex3 {
        let p = Vector3::from(self.origin)
            + Vector3::from(self.u_axis) * uv[0]
            + Vector3::from(self.v_axis) * uv[1];
        p.into()
    }

    fn d1(&self, _uv: Vertex2) -> [Vertex3; 2] {
        [self.u_axis, self.v_axis]
    }
}

/// A symmetric positive definite tensor measuring lengths in the parametric plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metric2D(pub Matrix2<f64>);

impl Default for Metric2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Metric2D {
    pub fn identity() -> Self {
        Self(Matrix2::identity())
    }

    /// The first fundamental form `[[E, F], [F, G]]` of a surface with tangents `du` and `dv`.
    pub fn from_tangents(du: Vertex3, dv: Vertex3) -> Self {
        let du = Vector3::from(du);
        let dv = Vector3::from(dv);
        let e = du.dot(&du);
        let f = du.dot(&dv);
        let g = dv.dot(&dv);
        Self(Matrix2::new(e, f, f, g))
    }

    /// Arithmetic mean of several metrics.
    pub fn average(metrics: &[Metric2D]) -> Self {
        if metrics.is_empty() {
            return Self::identity();
        }
        let sum = metrics
            .iter()
            .fold(Matrix2::zeros(), |acc, m| acc + m.0);
        Self(sum / metrics.len() as f64)
    }

    /// Check if the metric is a multiple of the identity up to the relative tolerance `tol`.
    pub fn is_pseudo_isotropic(&self, tol: f64) -> bool {
        let e = self.0[(0, 0)];
        let f = self.0[(0, 1)];
        let g = self.0[(1, 1)];
        let trace = e + g;

        trace > 0.0 && (e - g).abs() <= tol * trace && f.abs() <= tol * trace
    }

    /// Map parametric coordinates into a frame where this metric is Euclidean, i.e. `p -> L^T p`
    /// with `M = L L^T`.
    ///
    /// Returns `None` if the metric is not positive definite.
    pub fn to_euclidean_frame(&self, points: &[Vertex2]) -> Option<Vec<Vertex2>> {
        let lt = self.0.cholesky()?.l().transpose();
        Some(
            points
                .iter()
                .map(|p| {
                    let q = lt * Vector2::new(p[0], p[1]);
                    [q.x, q.y]
                })
                .collect(),
        )
    }
}

/// The geometric computation context a mesh is currently working in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompGeom {
    /// Euclidean metric of the parametric plane.
    Calculus2D,
    /// Metric induced by the 3D surface on the parametric plane.
    Calculus3D,
}

impl CompGeom {
    pub fn from_dim(dim: usize) -> HowResult<Self> {
        match dim {
            2 => Ok(CompGeom::Calculus2D),
            3 => Ok(CompGeom::Calculus3D),
            _ => Err(illegal_argument(format!(
                "Unknown geometry context dimension: {dim}"
            ))),
        }
    }

    pub const fn dim(&self) -> usize {
        match self {
            CompGeom::Calculus2D => 2,
            CompGeom::Calculus3D => 3,
        }
    }

    /// Metric at parameters `uv` in this context.
    pub fn metric(&self, uv: Vertex2, surface: Option<&dyn CadSurface>) -> Metric2D {
        match (self, surface) {
            (CompGeom::Calculus3D, Some(surface)) => {
                let [du, dv] = surface.d1(uv);
                Metric2D::from_tangents(du, dv)
            }
            _ => Metric2D::identity(),
        }
    }
}

impl fmt::Display for CompGeom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}D", self.dim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stretched_plane() -> Plane {
        Plane {
            origin: [1.0, 2.0, 3.0],
            u_axis: [3.0, 0.0, 0.0],
            v_axis: [0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn test_from_dim() {
        assert_eq!(CompGeom::from_dim(2).unwrap(), CompGeom::Calculus2D);
        assert_eq!(CompGeom::from_dim(3).unwrap().dim(), 3);
        assert!(CompGeom::from_dim(4).is_err());
    }

    #[test]
    fn test_metric_per_context() {
        let plane = stretched_plane();
        let m2 = CompGeom::Calculus2D.metric([0.5, 0.5], Some(&plane as &dyn CadSurface));
        assert!(m2.is_pseudo_isotropic(1e-2));

        let m3 = CompGeom::Calculus3D.metric([0.5, 0.5], Some(&plane as &dyn CadSurface));
        assert_relative_eq!(m3.0[(0, 0)], 9.0);
        assert_relative_eq!(m3.0[(1, 1)], 1.0);
        assert!(!m3.is_pseudo_isotropic(1e-2));

        assert_eq!(CompGeom::Calculus3D.metric([0.5, 0.5], None), Metric2D::identity());
    }

    #[test]
    fn test_euclidean_frame() {
        let m = Metric2D::from_tangents([3.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let mapped = m.to_euclidean_frame(&[[1.0, 1.0]]).unwrap();
        assert_relative_eq!(mapped[0][0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(mapped[0][1], 2.0, epsilon = 1e-12);

        let singular = Metric2D(Matrix2::zeros());
        assert!(singular.to_euclidean_frame(&[[1.0, 1.0]]).is_none());
    }

    #[test]
    fn test_plane_value() {
        let p = stretched_plane().value([1.0, 2.0]);
        assert_relative_eq!(p[0], 4.0);
        assert_relative_eq!(p[1], 2.0);
        assert_relative_eq!(p[2], 5.0);
        assert_eq!(Plane::xy().value([0.25, 0.75]), [0.25, 0.75, 0.0]);
    }

    #[test]
    fn test_average() {
        let avg = Metric2D::average(&[
            Metric2D::identity(),
            Metric2D(Matrix2::new(3.0, 0.0, 0.0, 3.0)),
        ]);
        assert_relative_eq!(avg.0[(0, 0)], 2.0);
        assert!(avg.is_pseudo_isotropic(1e-9));
    }
}
