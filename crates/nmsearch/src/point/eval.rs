//! Evaluator collaborator: submits trial points to a blackbox through the cache.

use nalgebra::DVector;
use thiserror::Error;

use super::store::{Cache, PointId, PointStore, StoreError};
use super::types::{EvalPoint, OutputType};

/// Failure reported by a blackbox call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("blackbox evaluation failed: {reason}")]
pub struct BlackboxError {
    pub reason: String,
}

impl BlackboxError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// An opaque objective/constraint function.
pub trait Blackbox {
    fn eval(&self, x: &DVector<f64>) -> Result<Vec<f64>, BlackboxError>;
}

impl<F> Blackbox for F
where
    F: Fn(&DVector<f64>) -> Result<Vec<f64>, BlackboxError>,
{
    fn eval(&self, x: &DVector<f64>) -> Result<Vec<f64>, BlackboxError> {
        self(x)
    }
}

/// Evaluates batches of trial points and records them.
///
/// `submit` blocks until the whole batch is evaluated and returns one handle per
/// submitted point, in submission order. Failed evaluations are still recorded
/// (as undefined points) so that they rank last instead of vanishing.
pub trait Evaluator: PointStore {
    fn submit(&mut self, batch: &[DVector<f64>]) -> Vec<PointId>;
}

/// Call counters of a [`CachedEvaluator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalCounters {
    pub blackbox_calls: usize,
    pub failures: usize,
    pub cache_hits: usize,
}

/// Evaluator backed by an in-memory [`Cache`].
pub struct CachedEvaluator<B> {
    pub cache: Cache,
    blackbox: B,
    types: Vec<OutputType>,
    counters: EvalCounters,
}

impl<B: Blackbox> CachedEvaluator<B> {
    pub fn new(blackbox: B, types: Vec<OutputType>) -> Self {
        Self {
            cache: Cache::new(),
            blackbox,
            types,
            counters: EvalCounters::default(),
        }
    }

    #[inline]
    pub fn counters(&self) -> EvalCounters {
        self.counters
    }

    #[inline]
    pub fn output_types(&self) -> &[OutputType] {
        &self.types
    }

    /// Evaluate a single point (or fetch it from the cache).
    pub fn evaluate(&mut self, x: &DVector<f64>) -> PointId {
        if let Some(id) = self.cache.find(x) {
            self.counters.cache_hits += 1;
            return id;
        }
        self.counters.blackbox_calls += 1;
        let point = match self.blackbox.eval(x) {
            Ok(outputs) => EvalPoint::from_outputs(x.clone(), outputs, &self.types),
            Err(err) => {
                tracing::debug!(%err, "blackbox failure");
                self.counters.failures += 1;
                EvalPoint::failed(x.clone())
            }
        };
        self.cache.insert(point)
    }
}

impl<B> PointStore for CachedEvaluator<B> {
    fn get(&self, id: PointId) -> Result<&EvalPoint, StoreError> {
        self.cache.get(id)
    }

    fn nearby(&self, center: &DVector<f64>, radius: &DVector<f64>) -> Vec<PointId> {
        self.cache.nearby(center, radius)
    }
}

impl<B: Blackbox> Evaluator for CachedEvaluator<B> {
    fn submit(&mut self, batch: &[DVector<f64>]) -> Vec<PointId> {
        batch.iter().map(|x| self.evaluate(x)).collect()
    }
}
