//! Orderings over evaluated points.
//!
//! - `DominanceOrder`: strict weak ordering used to sort the simplex. Feasible
//!   points (`h <= h_min`) rank by `f`, infeasible ones by `h`, and any feasible
//!   point outranks any infeasible one. Exact ties fall back to the creation tag.
//! - `dominates`: the coarse component-wise relation on `(h, f)` used to build
//!   the undominated/dominated zones of the simplex.
//!
//! The comparator is a value: `h_min` and the tie-break mode travel with it, so
//! two comparisons with the same inputs always agree.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::point::{EvalPoint, Score};

/// Which point wins an exact `(f, h)` tie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Smaller creation tag wins.
    #[default]
    OlderFirst,
    /// Larger creation tag wins.
    NewerFirst,
}

/// Feasibility-aware strict weak ordering.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DominanceOrder {
    pub h_min: f64,
    pub tie_break: TieBreak,
}

impl Default for DominanceOrder {
    fn default() -> Self {
        Self {
            h_min: 0.0,
            tie_break: TieBreak::OlderFirst,
        }
    }
}

impl DominanceOrder {
    #[inline]
    pub fn new(h_min: f64, tie_break: TieBreak) -> Self {
        Self { h_min, tie_break }
    }

    /// `Less` means `a` ranks before (is better than) `b`.
    pub fn cmp(&self, a: &Score, b: &Score) -> Ordering {
        let (ca, va) = self.class(a);
        let (cb, vb) = self.class(b);
        ca.cmp(&cb)
            .then_with(|| va.partial_cmp(&vb).unwrap_or(Ordering::Equal))
            .then_with(|| match self.tie_break {
                TieBreak::OlderFirst => a.tag.cmp(&b.tag),
                TieBreak::NewerFirst => b.tag.cmp(&a.tag),
            })
    }

    #[inline]
    pub fn is_better(&self, a: &Score, b: &Score) -> bool {
        self.cmp(a, b) == Ordering::Less
    }

    /// `true` iff `a` strictly outranks `b`.
    #[inline]
    pub fn is_better_than(&self, a: &EvalPoint, b: &EvalPoint) -> bool {
        self.is_better(&a.score(), &b.score())
    }

    /// Rank class (feasible, infeasible, undefined) and the value compared inside it.
    ///
    /// Undefined points share one class with value 0, so only tags separate them.
    fn class(&self, s: &Score) -> (u8, f64) {
        if !s.defined {
            (2, 0.0)
        } else if s.h <= self.h_min {
            (0, s.f)
        } else {
            (1, s.h)
        }
    }
}

/// `a` dominates `b`: no worse in both `h` and `f`, strictly better in one.
///
/// An undefined point dominates nothing and is dominated by every defined point.
pub fn dominates(a: &Score, b: &Score) -> bool {
    match (a.defined, b.defined) {
        (false, _) => false,
        (true, false) => true,
        (true, true) => a.h <= b.h && a.f <= b.f && (a.h < b.h || a.f < b.f),
    }
}
