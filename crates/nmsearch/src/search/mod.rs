//! The simplex search step.
//!
//! Purpose
//! - `NmCfg`: coefficients, tolerances, budget and policies of a search call.
//! - `StepEngine`: the reflect/expand/contract/shrink state machine and its
//!   stop reasons.
//! - `SearchStrategy` / `NelderMeadSearch`: the `run_search` capability the
//!   outer poll loop calls with the incumbent and the current mesh.
//!
//! Why this design
//! - A call returns a `SearchOutcome` for every way the search can end; the
//!   caller reads `stop_reason` (for example `SHRINK_REQUEST`) to decide what
//!   to do with the mesh.

mod cfg;
mod engine;
mod strategy;
mod types;

pub use cfg::NmCfg;
pub use engine::{success_against, StepEngine};
pub use strategy::{NelderMeadSearch, SearchStrategy};
pub use types::{
    GeometrySnapshot, SearchOutcome, SearchStats, StepType, StopFlag, StopReason, SuccessKind,
};
