//! Mesh sizes, variable layout, and projection onto the mesh.
//!
//! The outer MADS loop owns both structures; the search only reads them.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Current mesh (`delta`, per coordinate) and frame (`Delta`, per coordinate) sizes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub mesh_size: DVector<f64>,
    pub frame_size: DVector<f64>,
}

impl Mesh {
    pub fn new(mesh_size: DVector<f64>, frame_size: DVector<f64>) -> Self {
        Self {
            mesh_size,
            frame_size,
        }
    }

    /// Same `delta` and `Delta` in every coordinate.
    pub fn uniform(n: usize, mesh_size: f64, frame_size: f64) -> Self {
        Self {
            mesh_size: DVector::from_element(n, mesh_size),
            frame_size: DVector::from_element(n, frame_size),
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.mesh_size.len()
    }

    /// Smallest mesh size over the free coordinates.
    pub fn min_free_size(&self, vars: &Variables) -> f64 {
        vars.free_indices()
            .map(|i| self.mesh_size[i])
            .fold(f64::INFINITY, f64::min)
    }
}

/// Dimension, fixed-variable mask, and bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variables {
    pub fixed: Vec<bool>,
    pub lower: DVector<f64>,
    pub upper: DVector<f64>,
}

impl Variables {
    /// `n` free, unbounded variables.
    pub fn free(n: usize) -> Self {
        Self {
            fixed: vec![false; n],
            lower: DVector::from_element(n, f64::NEG_INFINITY),
            upper: DVector::from_element(n, f64::INFINITY),
        }
    }

    pub fn with_fixed(mut self, fixed: Vec<bool>) -> Self {
        self.fixed = fixed;
        self
    }

    pub fn with_bounds(mut self, lower: DVector<f64>, upper: DVector<f64>) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.fixed.len()
    }

    #[inline]
    pub fn n_free(&self) -> usize {
        self.fixed.iter().filter(|&&f| !f).count()
    }

    pub fn free_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.fixed
            .iter()
            .enumerate()
            .filter(|(_, &f)| !f)
            .map(|(i, _)| i)
    }

    /// Free coordinates of `x`, in index order.
    pub fn free_part(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.n_free(), self.free_indices().map(|i| x[i]))
    }

    pub fn out_of_bounds(&self, x: &DVector<f64>) -> Option<usize> {
        (0..x.len()).find(|&i| x[i] < self.lower[i] || x[i] > self.upper[i])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.dim();
        if self.lower.len() != n || self.upper.len() != n {
            return Err(ConfigError::DimensionMismatch {
                what: "bounds",
                expected: n,
                got: self.lower.len().min(self.upper.len()),
            });
        }
        if self.n_free() == 0 {
            return Err(ConfigError::NoFreeVariables);
        }
        if let Some(i) = (0..n).find(|&i| !(self.lower[i] <= self.upper[i])) {
            return Err(ConfigError::InvalidBounds { index: i });
        }
        Ok(())
    }

    /// Mesh compatible with these variables (dimensions and positive free sizes).
    pub fn validate_mesh(&self, mesh: &Mesh) -> Result<(), ConfigError> {
        let n = self.dim();
        for (what, v) in [("mesh_size", &mesh.mesh_size), ("frame_size", &mesh.frame_size)] {
            if v.len() != n {
                return Err(ConfigError::DimensionMismatch {
                    what,
                    expected: n,
                    got: v.len(),
                });
            }
        }
        if let Some(i) = self
            .free_indices()
            .find(|&i| !(mesh.mesh_size[i] > 0.0 && mesh.mesh_size[i].is_finite()))
        {
            return Err(ConfigError::InvalidMeshSize { index: i });
        }
        Ok(())
    }
}

/// Snap the free coordinates of `x` onto the mesh anchored at `center`.
///
/// Fixed coordinates are left untouched.
pub fn project_to_mesh(
    x: &DVector<f64>,
    center: &DVector<f64>,
    mesh: &Mesh,
    vars: &Variables,
) -> DVector<f64> {
    let mut out = x.clone();
    for i in vars.free_indices() {
        let d = mesh.mesh_size[i];
        out[i] = center[i] + ((x[i] - center[i]) / d).round() * d;
    }
    out
}
