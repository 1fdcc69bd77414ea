//! Trial-point construction: reflect/expand/contract along the worst vertex, shrink
//! toward the best, then mask, project and deduplicate.

use nalgebra::DVector;
use thiserror::Error;

use crate::mesh::{project_to_mesh, Mesh, Variables};
use crate::point::same_point;

use super::geometry::centroid;
use super::set::SimplexSet;

/// Why a trial point was not produced. Local to one trial; never fatal.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum TrialError {
    #[error("simplex has too few vertices for a transform")]
    TooFewVertices,
    #[error("transform direction vanishes on the free variables")]
    DegenerateDirection,
    #[error("coordinate {index} is out of bounds")]
    OutOfBounds { index: usize },
    #[error("trial point was already submitted in this call")]
    Duplicate,
    #[error("trial point coincides with a simplex vertex")]
    Collapsed,
}

/// Builds trial points for one search call.
///
/// `center` is the incumbent: fixed coordinates are copied from it and the
/// mesh projection is anchored at it.
#[derive(Clone, Copy, Debug)]
pub struct TrialBuilder<'a> {
    pub vars: &'a Variables,
    pub mesh: &'a Mesh,
    pub center: &'a DVector<f64>,
    pub project: bool,
}

impl<'a> TrialBuilder<'a> {
    /// Centroid of every vertex except the worst.
    pub fn centroid(&self, set: &SimplexSet) -> Result<DVector<f64>, TrialError> {
        let v = set.vertices();
        if v.len() < 2 {
            return Err(TrialError::TooFewVertices);
        }
        centroid(v[..v.len() - 1].iter().map(|v| &v.x)).ok_or(TrialError::TooFewVertices)
    }

    /// `centroid + delta * (centroid - worst)`.
    ///
    /// `delta = 1` reflects, `delta > 1` expands, `0 < delta < 1` contracts
    /// outside and `-1 < delta < 0` contracts inside.
    pub fn transform(
        &self,
        set: &SimplexSet,
        delta: f64,
        submitted: &[DVector<f64>],
    ) -> Result<DVector<f64>, TrialError> {
        let c = self.centroid(set)?;
        let worst = set.worst().ok_or(TrialError::TooFewVertices)?;
        let d = &c - &worst.x;
        let scale = c.amax().max(1.0);
        if self
            .vars
            .free_indices()
            .all(|i| d[i].abs() <= 1e-13 * scale)
        {
            return Err(TrialError::DegenerateDirection);
        }
        let raw = c + d * delta;
        tracing::trace!(delta, ?raw, "transform");
        self.finalize(raw, set, submitted)
    }

    /// `y0 + gamma * (yi - y0)` for every non-best vertex, in rank order.
    pub fn shrink(
        &self,
        set: &SimplexSet,
        gamma: f64,
        submitted: &[DVector<f64>],
    ) -> Result<Vec<DVector<f64>>, TrialError> {
        let v = set.vertices();
        let best = v.first().ok_or(TrialError::TooFewVertices)?;
        if v.len() < 2 {
            return Err(TrialError::TooFewVertices);
        }
        let mut seen = submitted.to_vec();
        let mut out = Vec::with_capacity(v.len() - 1);
        for yi in &v[1..] {
            let raw = &best.x + (&yi.x - &best.x) * gamma;
            let x = self.finalize(raw, set, &seen)?;
            seen.push(x.clone());
            out.push(x);
        }
        Ok(out)
    }

    /// Mask fixed coordinates, project, then reject out-of-bounds and repeated points.
    pub fn finalize(
        &self,
        mut x: DVector<f64>,
        set: &SimplexSet,
        submitted: &[DVector<f64>],
    ) -> Result<DVector<f64>, TrialError> {
        for (i, &fixed) in self.vars.fixed.iter().enumerate() {
            if fixed {
                x[i] = self.center[i];
            }
        }
        if self.project {
            x = project_to_mesh(&x, self.center, self.mesh, self.vars);
        }
        if let Some(index) = self.vars.out_of_bounds(&x) {
            return Err(TrialError::OutOfBounds { index });
        }
        if set.vertices().iter().any(|v| same_point(&v.x, &x)) {
            return Err(TrialError::Collapsed);
        }
        if submitted.iter().any(|s| same_point(s, &x)) {
            return Err(TrialError::Duplicate);
        }
        Ok(x)
    }
}
