//! Point model and the cache/evaluator collaborators.
//!
//! Purpose
//! - Describe evaluated points (`EvalPoint`, `Score`) and how blackbox outputs
//!   aggregate into an objective `f` and a constraint violation `h`.
//! - Provide the handle-based cache (`Cache`, `PointId`) and the `Evaluator`
//!   seam the search submits trial points through.
//!
//! Why this design
//! - The search never holds references into the cache. It holds `PointId`
//!   handles and resolves them through `PointStore`, so a purged point is an
//!   explicit `StoreError` rather than a dangling reference.

mod eval;
mod store;
mod types;

pub use eval::{BlackboxError, Blackbox, CachedEvaluator, EvalCounters, Evaluator};
pub use store::{Cache, PointId, PointStore, StoreError};
pub use types::{aggregate, EvalPoint, EvalStatus, OutputType, Score};

pub(crate) use store::same_point;
