//! Nelder-Mead simplex search step for a mesh-adaptive direct-search optimizer.
//!
//! Layout
//! - `point`: evaluated points, the handle-based cache and the evaluator seam.
//! - `order`: the feasibility-aware ordering and component-wise dominance.
//! - `mesh`: mesh/frame sizes, variable layout and mesh projection.
//! - `simplex`: the simplex set, its geometry, zones and trial construction.
//! - `search`: configuration, the step engine and the `run_search` strategy.
//! - `design`: reproducible random designs used to fill the cache.
//!
//! API Policy
//! - This crate is project-internal. There is no stable public API.

pub mod design;
pub mod error;
pub mod mesh;
pub mod order;
pub mod point;
pub mod search;
pub mod simplex;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{ConfigError, SearchError};

/// Common exports for callers driving a search.
pub mod prelude {
    pub use crate::design::{sample_frame, ReplayToken};
    pub use crate::error::{ConfigError, SearchError};
    pub use crate::mesh::{Mesh, Variables};
    pub use crate::order::{dominates, DominanceOrder, TieBreak};
    pub use crate::point::{
        Blackbox, BlackboxError, Cache, CachedEvaluator, EvalPoint, Evaluator, OutputType,
        PointId, PointStore,
    };
    pub use crate::search::{
        NelderMeadSearch, NmCfg, SearchOutcome, SearchStrategy, StopFlag, StopReason, SuccessKind,
    };
    pub use crate::simplex::PartitionPolicy;
}
