//! Step types, stop reasons and the result of one search call.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::point::PointId;
use crate::simplex::Geometry;

/// State of the step engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    Initial,
    Reflect,
    Expand,
    OutsideContraction,
    InsideContraction,
    Shrink,
    Complete,
}

/// Why a search call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    TooSmallSimplex,
    SimplexRankInsufficient,
    InitialFailed,
    OrderFailed,
    ShrinkRequest,
    ReflectFailed,
    ExpansionFailed,
    OutsideContractionFailed,
    InsideContractionFailed,
    ShrinkFailed,
    MaxSearchPointsReached,
    MinSimplexVolReached,
    UndefinedStep,
    InsertionFailed,
    StepFailed,
    Completed,
    OpportunisticStop,
}

impl StopReason {
    pub const ALL: [StopReason; 17] = [
        Self::TooSmallSimplex,
        Self::SimplexRankInsufficient,
        Self::InitialFailed,
        Self::OrderFailed,
        Self::ShrinkRequest,
        Self::ReflectFailed,
        Self::ExpansionFailed,
        Self::OutsideContractionFailed,
        Self::InsideContractionFailed,
        Self::ShrinkFailed,
        Self::MaxSearchPointsReached,
        Self::MinSimplexVolReached,
        Self::UndefinedStep,
        Self::InsertionFailed,
        Self::StepFailed,
        Self::Completed,
        Self::OpportunisticStop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TooSmallSimplex => "TOO_SMALL_SIMPLEX",
            Self::SimplexRankInsufficient => "SIMPLEX_RANK_INSUFFICIENT",
            Self::InitialFailed => "INITIAL_FAILED",
            Self::OrderFailed => "ORDER_FAILED",
            Self::ShrinkRequest => "SHRINK_REQUEST",
            Self::ReflectFailed => "REFLECT_FAILED",
            Self::ExpansionFailed => "EXPANSION_FAILED",
            Self::OutsideContractionFailed => "OUTSIDE_CONTRACTION_FAILED",
            Self::InsideContractionFailed => "INSIDE_CONTRACTION_FAILED",
            Self::ShrinkFailed => "SHRINK_FAILED",
            Self::MaxSearchPointsReached => "MAX_SEARCH_POINTS_REACHED",
            Self::MinSimplexVolReached => "MIN_SIMPLEX_VOL_REACHED",
            Self::UndefinedStep => "UNDEFINED_STEP",
            Self::InsertionFailed => "INSERTION_FAILED",
            Self::StepFailed => "STEP_FAILED",
            Self::Completed => "COMPLETED",
            Self::OpportunisticStop => "OPPORTUNISTIC_STOP",
        }
    }

    /// Stops that end the call normally rather than on a failure.
    #[inline]
    pub fn is_normal(self) -> bool {
        matches!(self, Self::Completed | Self::OpportunisticStop)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a call improved on its incumbent. Ordered `None < Partial < Full`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SuccessKind {
    #[default]
    None,
    /// Infeasible point with smaller `h` (but larger `f`).
    Partial,
    /// New best point.
    Full,
}

/// Per-call counters. Advisory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Trial points constructed and submitted.
    pub generated: usize,
    /// Outcomes received back from the evaluator.
    pub evaluated: usize,
    /// Trial points that entered the simplex.
    pub accepted: usize,
    /// Completed simplex updates.
    pub iterations: usize,
}

/// Geometry of the final simplex of a call. Advisory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub volume: f64,
    pub normalized_volume: f64,
    pub diameter: f64,
    pub witness: Option<(PointId, PointId)>,
    pub rank: usize,
}

impl From<&Geometry> for GeometrySnapshot {
    fn from(g: &Geometry) -> Self {
        Self {
            volume: g.volume,
            normalized_volume: g.normalized_volume,
            diameter: g.diameter,
            witness: g.witness,
            rank: g.rank,
        }
    }
}

/// Result of one `run_search` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Trial points that entered the simplex, in acceptance order.
    pub accepted: Vec<PointId>,
    pub success: SuccessKind,
    /// The call ended on a terminal condition (always set on return).
    pub stop: bool,
    pub stop_reason: StopReason,
    pub stats: SearchStats,
    pub geometry: GeometrySnapshot,
    /// Final simplex vertices, best first.
    pub simplex: Vec<PointId>,
}

/// Externally owned cancellation flag shared with the caller.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
