//! Search strategies as seen by the outer poll loop.

use crate::error::SearchError;
use crate::mesh::{Mesh, Variables};
use crate::point::{Evaluator, PointId};

use super::cfg::NmCfg;
use super::engine::StepEngine;
use super::types::{SearchOutcome, StopFlag};

/// A search step of the outer MADS loop.
///
/// The strategy reads the mesh and never changes it; shrinking or enlarging
/// the mesh after an outcome is the caller's decision.
pub trait SearchStrategy {
    fn run_search<E: Evaluator>(
        &mut self,
        eval: &mut E,
        incumbent: PointId,
        mesh: &Mesh,
        stop: &StopFlag,
    ) -> Result<SearchOutcome, SearchError>;
}

/// Nelder-Mead simplex search.
///
/// Owns its configuration, the variable layout, and (with `carry_simplex`)
/// the final simplex of the previous call.
#[derive(Clone, Debug)]
pub struct NelderMeadSearch {
    cfg: NmCfg,
    vars: Variables,
    carried: Option<Vec<PointId>>,
}

impl NelderMeadSearch {
    pub fn new(cfg: NmCfg, vars: Variables) -> Self {
        Self {
            cfg,
            vars,
            carried: None,
        }
    }

    #[inline]
    pub fn cfg(&self) -> &NmCfg {
        &self.cfg
    }

    #[inline]
    pub fn vars(&self) -> &Variables {
        &self.vars
    }

    /// Simplex the next call starts from, if any.
    #[inline]
    pub fn carried(&self) -> Option<&[PointId]> {
        self.carried.as_deref()
    }

    /// Start the next call from `ids` instead of seeding from the cache.
    pub fn carry(&mut self, ids: Vec<PointId>) {
        self.carried = Some(ids);
    }

    pub fn forget(&mut self) {
        self.carried = None;
    }
}

impl SearchStrategy for NelderMeadSearch {
    fn run_search<E: Evaluator>(
        &mut self,
        eval: &mut E,
        incumbent: PointId,
        mesh: &Mesh,
        stop: &StopFlag,
    ) -> Result<SearchOutcome, SearchError> {
        let carried = self.carried.take();
        let engine = match StepEngine::new(&self.cfg, &self.vars, mesh, eval, incumbent, stop) {
            Ok(engine) => engine,
            Err(e) => {
                tracing::warn!(error = %e, "simplex search rejected");
                return Err(e);
            }
        };
        let outcome = engine.run(carried.as_deref())?;
        if self.cfg.carry_simplex && outcome.geometry.rank == self.vars.n_free() {
            self.carried = Some(outcome.simplex.clone());
        }
        Ok(outcome)
    }
}
