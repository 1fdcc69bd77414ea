//! Simplex container and the geometry built on it.
//!
//! Purpose
//! - `SimplexSet`: the ordered working set `Y` of at most `n_free + 1` vertices
//!   with lazily cached volume, diameter (plus witness pair) and rank.
//! - `Zones`: loose undominated/dominated partitions (`Y0`, `Yn`) and the
//!   dominance tests the step engine classifies trial points with.
//! - `TrialBuilder`: reflect/expand/contract/shrink point construction with
//!   fixed-variable masking, mesh projection and duplicate rejection.
//!
//! Why this design
//! - Vertices snapshot the ranking key and coordinates of the cached point so
//!   ordering and geometry never touch the cache; `validate` re-checks the
//!   handles against the cache whenever the engine resumes.

pub mod geometry;
mod set;
mod trial;
mod zones;

pub use set::{GeomFrame, Geometry, SimplexSet, Vertex};
pub use trial::{TrialBuilder, TrialError};
pub use zones::{PartitionPolicy, Zones};

#[cfg(test)]
mod tests;
