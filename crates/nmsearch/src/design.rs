//! Reproducible random designs on the mesh.
//!
//! Purpose
//! - Draw starting points inside the frame around a center (for example to
//!   fill the cache before the first search call) so that the simplex search has
//!   history to seed from.
//!
//! Why this design
//! - A `ReplayToken` (seed, index) fully determines a draw, so a run can be
//!   replayed or a single draw regenerated without replaying the ones before it.

use nalgebra::DVector;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::mesh::{project_to_mesh, Mesh, Variables};
use crate::point::same_point;

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { seed, index: 0 }
    }

    #[inline]
    pub fn next(self) -> Self {
        Self {
            seed: self.seed,
            index: self.index.wrapping_add(1),
        }
    }

    fn to_std_rng(self) -> StdRng {
        // SplitMix64 finalizer.
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 30;
            x = x.wrapping_mul(0xbf58476d1ce4e5b9);
            x ^= x >> 27;
            x = x.wrapping_mul(0x94d049bb133111eb);
            x ^ (x >> 31)
        }
        let k = mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)));
        StdRng::seed_from_u64(k)
    }
}

/// Up to `count` distinct mesh points drawn uniformly in the frame around
/// `center`, clipped to the bounds. Fixed coordinates are copied from `center`.
///
/// Returns fewer points when the frame holds too few distinct mesh points.
pub fn sample_frame(
    center: &DVector<f64>,
    mesh: &Mesh,
    vars: &Variables,
    count: usize,
    tok: ReplayToken,
) -> Vec<DVector<f64>> {
    let mut rng = tok.to_std_rng();
    let mut out: Vec<DVector<f64>> = Vec::with_capacity(count);
    let max_draws = count.saturating_mul(8).max(8);
    for _ in 0..max_draws {
        if out.len() == count {
            break;
        }
        let mut x = center.clone();
        for i in vars.free_indices() {
            let lo = (center[i] - mesh.frame_size[i]).max(vars.lower[i]);
            let hi = (center[i] + mesh.frame_size[i]).min(vars.upper[i]);
            x[i] = if lo < hi { rng.gen_range(lo..=hi) } else { lo };
        }
        let x = project_to_mesh(&x, center, mesh, vars);
        if vars.out_of_bounds(&x).is_some() {
            continue;
        }
        if same_point(&x, center) || out.iter().any(|p| same_point(p, &x)) {
            continue;
        }
        out.push(x);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn draws_replay_from_the_token() {
        let vars = Variables::free(3);
        let mesh = Mesh::uniform(3, 0.25, 1.0);
        let c = dvector![0.0, 1.0, 2.0];
        let tok = ReplayToken::new(42);
        let a = sample_frame(&c, &mesh, &vars, 5, tok);
        let b = sample_frame(&c, &mesh, &vars, 5, tok);
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        let other = sample_frame(&c, &mesh, &vars, 5, tok.next());
        assert_ne!(a, other);
    }

    #[test]
    fn draws_stay_on_mesh_inside_frame_and_bounds() {
        let vars = Variables::free(2)
            .with_fixed(vec![false, true])
            .with_bounds(dvector![-0.5, -10.0], dvector![10.0, 10.0]);
        let mesh = Mesh::new(dvector![0.5, 0.5], dvector![2.0, 2.0]);
        let c = dvector![0.0, 3.0];
        for x in sample_frame(&c, &mesh, &vars, 4, ReplayToken::new(7)) {
            assert_eq!(x[1], 3.0);
            assert!(x[0] >= -0.5 && x[0] <= 2.0);
            let steps = x[0] / 0.5;
            assert!((steps - steps.round()).abs() < 1e-12);
            assert!(x[0] != 0.0);
        }
    }

    #[test]
    fn small_frames_return_fewer_points() {
        // Frame of one mesh step: only -0.5 and 0.5 are available besides the center.
        let vars = Variables::free(1);
        let mesh = Mesh::uniform(1, 0.5, 0.5);
        let pts = sample_frame(&dvector![0.0], &mesh, &vars, 10, ReplayToken::new(1));
        assert!(pts.len() <= 2);
    }
}
