//! Evaluated points and the ranking key derived from them.
//!
//! - `EvalPoint`: coordinates, raw blackbox outputs, aggregated `f`/`h`, tag, status.
//! - `Score`: the copyable `(f, h, tag, defined)` key used by every ordering.
//! - `OutputType`: how a raw blackbox output contributes to `f` and `h`.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Outcome of a blackbox call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalStatus {
    Ok,
    Failed,
}

/// Role of one blackbox output.
///
/// Progressive-barrier constraints `c <= 0` add `max(c, 0)^2` to `h`; an
/// extreme-barrier constraint makes `h = +inf` as soon as it is violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputType {
    Objective,
    ProgressiveBarrier,
    ExtremeBarrier,
    Ignored,
}

/// Aggregate raw outputs into `(f, h)`.
///
/// Returns `None` when the outputs do not match `types`, when there is no
/// objective, or when a relevant output is NaN.
pub fn aggregate(outputs: &[f64], types: &[OutputType]) -> Option<(f64, f64)> {
    if outputs.len() != types.len() {
        return None;
    }
    let mut f = None;
    let mut h = 0.0;
    for (&v, &t) in outputs.iter().zip(types) {
        match t {
            OutputType::Ignored => continue,
            _ if v.is_nan() => return None,
            OutputType::Objective => f = Some(v),
            OutputType::ProgressiveBarrier => {
                if v > 0.0 {
                    h += v * v;
                }
            }
            OutputType::ExtremeBarrier => {
                if v > 0.0 {
                    h = f64::INFINITY;
                }
            }
        }
    }
    f.map(|f| (f, h))
}

/// A point together with its evaluation.
///
/// Invariants:
/// - `h >= 0` for defined points (`h == 0` is feasible at `h_min = 0`).
/// - `tag` is assigned by the owning cache and strictly increases with creation.
#[derive(Clone, Debug)]
pub struct EvalPoint {
    pub x: DVector<f64>,
    pub outputs: Vec<f64>,
    pub f: f64,
    pub h: f64,
    pub tag: u64,
    pub status: EvalStatus,
}

impl EvalPoint {
    /// Successful evaluation with already aggregated `f` and `h`.
    pub fn evaluated(x: DVector<f64>, f: f64, h: f64) -> Self {
        Self {
            x,
            outputs: vec![f, h],
            f,
            h,
            tag: 0,
            status: EvalStatus::Ok,
        }
    }

    /// Successful blackbox call; aggregation failures mark the point undefined.
    pub fn from_outputs(x: DVector<f64>, outputs: Vec<f64>, types: &[OutputType]) -> Self {
        let (f, h) = aggregate(&outputs, types).unwrap_or((f64::NAN, f64::NAN));
        Self {
            x,
            outputs,
            f,
            h,
            tag: 0,
            status: EvalStatus::Ok,
        }
    }

    /// Failed blackbox call.
    pub fn failed(x: DVector<f64>) -> Self {
        Self {
            x,
            outputs: Vec::new(),
            f: f64::NAN,
            h: f64::NAN,
            tag: 0,
            status: EvalStatus::Failed,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        self.status == EvalStatus::Ok && !self.f.is_nan() && !self.h.is_nan()
    }

    #[inline]
    pub fn score(&self) -> Score {
        Score {
            f: self.f,
            h: self.h,
            tag: self.tag,
            defined: self.is_defined(),
        }
    }
}

/// Ranking key of an evaluated point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
    pub f: f64,
    pub h: f64,
    pub tag: u64,
    pub defined: bool,
}

impl Score {
    #[inline]
    pub fn new(f: f64, h: f64, tag: u64) -> Self {
        Self {
            f,
            h,
            tag,
            defined: !f.is_nan() && !h.is_nan(),
        }
    }

    /// Constraint violation with undefined points mapped to `+inf`.
    #[inline]
    pub fn h_eff(&self) -> f64 {
        if self.defined {
            self.h
        } else {
            f64::INFINITY
        }
    }

    #[inline]
    pub fn is_feasible(&self, h_min: f64) -> bool {
        self.defined && self.h <= h_min
    }
}
