//! Loose partitions of the simplex into undominated (`Y0`) and dominated (`Yn`) vertices.
//!
//! Unlike the simplex itself, zones allow ties: dominance on `(h, f)` is
//! coarser than the strict order the simplex is sorted by.

use serde::{Deserialize, Serialize};

use crate::order::dominates;
use crate::point::Score;

use super::set::SimplexSet;

/// How zones are built and what "dominates" means inside them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPolicy {
    /// `Y0`: vertices no other vertex dominates. `Yn`: vertices that dominate
    /// no other vertex. Tests use component-wise dominance on `(h, f)`.
    #[default]
    Dominance,
    /// `Y0 = {best}`, `Yn = {worst}`; tests use the strict simplex order.
    StrictOrder,
}

/// Zones of one simplex state.
#[derive(Debug)]
pub struct Zones<'a> {
    set: &'a SimplexSet,
    policy: PartitionPolicy,
    y0: Vec<usize>,
    yn: Vec<usize>,
}

impl<'a> Zones<'a> {
    pub fn new(set: &'a SimplexSet, policy: PartitionPolicy) -> Self {
        let n = set.len();
        let (y0, yn) = match policy {
            PartitionPolicy::StrictOrder if n == 0 => (Vec::new(), Vec::new()),
            PartitionPolicy::StrictOrder => (vec![0], vec![n - 1]),
            PartitionPolicy::Dominance => {
                let v = set.vertices();
                let y0 = (0..n)
                    .filter(|&i| !(0..n).any(|j| dominates(&v[j].score, &v[i].score)))
                    .collect();
                let yn = (0..n)
                    .filter(|&i| !(0..n).any(|j| dominates(&v[i].score, &v[j].score)))
                    .collect();
                (y0, yn)
            }
        };
        Self {
            set,
            policy,
            y0,
            yn,
        }
    }

    /// Vertex indices (into `set.vertices()`) of `Y0`.
    #[inline]
    pub fn y0(&self) -> &[usize] {
        &self.y0
    }

    /// Vertex indices of `Yn`.
    #[inline]
    pub fn yn(&self) -> &[usize] {
        &self.yn
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.y0.is_empty() || self.yn.is_empty()
    }

    fn beats(&self, a: &Score, b: &Score) -> bool {
        match self.policy {
            PartitionPolicy::Dominance => dominates(a, b),
            PartitionPolicy::StrictOrder => self.set.order().is_better(a, b),
        }
    }

    fn score(&self, i: usize) -> &Score {
        &self.set.vertices()[i].score
    }

    /// `xt` dominates every member of `Y0`.
    pub fn point_dominates_y0(&self, xt: &Score) -> bool {
        !self.y0.is_empty() && self.y0.iter().all(|&i| self.beats(xt, self.score(i)))
    }

    /// Some member of `Yn` dominates `xt`.
    pub fn yn_dominates_point(&self, xt: &Score) -> bool {
        self.yn.iter().any(|&i| self.beats(self.score(i), xt))
    }

    /// `xt` dominates at least `k` members of `Y`.
    pub fn point_dominates_pts_in_y(&self, xt: &Score, k: usize) -> bool {
        (0..self.set.len())
            .filter(|&i| self.beats(xt, self.score(i)))
            .take(k)
            .count()
            >= k
    }
}
