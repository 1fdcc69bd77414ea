//! The Nelder-Mead step engine: one search call as a state machine.
//!
//! Purpose
//! - Seed a simplex near the incumbent, then repeat reflect / expand /
//!   contract / shrink until a stop condition fires.
//!
//! Why this design
//! - The engine borrows the configuration, the variables, the mesh and the
//!   evaluator for exactly one call and owns the simplex; nothing it holds can
//!   outlive the cache it reads from.
//! - Every failure inside a call (bad trial point, degenerate simplex,
//!   exhausted budget, short evaluator reply) is resolved into a `StopReason`.
//!   Only configuration errors and stale handles surface as `SearchError`.
//! - The caller can drive the machine one step at a time (`step`) or to the
//!   end (`run`).
//!
//! Classification of a trial point `x` against the zones of the current simplex
//! (`k = accept_threshold`):
//! - reflect: `x` dominates `Y0` -> expand; else `Yn` dominates `x` -> inside
//!   contraction; else `x` dominates `k` vertices -> accept; else outside
//!   contraction.
//! - expand: keep the better of the reflect and expand points.
//! - outside contraction: accept iff `x` dominates `k` vertices.
//! - inside contraction: accept iff `Yn` does not dominate `x`.
//! - a rejected contraction shrinks (`perform_shrink`) or returns
//!   `SHRINK_REQUEST` to the caller.

use std::cmp::Ordering;

use nalgebra::DVector;

use crate::error::{ConfigError, SearchError};
use crate::mesh::{Mesh, Variables};
use crate::order::dominates;
use crate::point::{Evaluator, PointId, Score};
use crate::simplex::{GeomFrame, SimplexSet, TrialBuilder, Vertex, Zones};

use super::cfg::NmCfg;
use super::types::{
    GeometrySnapshot, SearchOutcome, SearchStats, StepType, StopFlag, StopReason, SuccessKind,
};

/// Success of `trial` relative to `incumbent`.
///
/// Full: feasible improvement of `f`, infeasible to feasible, or dominance
/// between infeasible points. Partial: infeasible with smaller `h` only.
pub fn success_against(incumbent: &Score, trial: &Score, h_min: f64) -> SuccessKind {
    if !trial.defined {
        return SuccessKind::None;
    }
    match (incumbent.is_feasible(h_min), trial.is_feasible(h_min)) {
        (true, true) if trial.f < incumbent.f => SuccessKind::Full,
        (false, true) => SuccessKind::Full,
        (false, false) if dominates(trial, incumbent) => SuccessKind::Full,
        (false, false) if trial.h < incumbent.h => SuccessKind::Partial,
        _ => SuccessKind::None,
    }
}

/// State of one search call.
pub struct StepEngine<'a, E: Evaluator> {
    cfg: &'a NmCfg,
    vars: &'a Variables,
    mesh: &'a Mesh,
    eval: &'a mut E,
    stop: &'a StopFlag,
    incumbent: Score,
    center: DVector<f64>,
    y: SimplexSet,
    step: StepType,
    stop_reason: Option<StopReason>,
    /// Evaluated reflect point waiting for the expansion step.
    reflected: Option<Vertex>,
    submitted: Vec<DVector<f64>>,
    evaluated: Vec<PointId>,
    accepted: Vec<PointId>,
    success: SuccessKind,
    stats: SearchStats,
    budget: usize,
}

impl<'a, E: Evaluator> StepEngine<'a, E> {
    /// Validate the configuration and resolve the incumbent.
    pub fn new(
        cfg: &'a NmCfg,
        vars: &'a Variables,
        mesh: &'a Mesh,
        eval: &'a mut E,
        incumbent: PointId,
        stop: &'a StopFlag,
    ) -> Result<Self, SearchError> {
        cfg.validate()?;
        vars.validate()?;
        vars.validate_mesh(mesh)?;
        let (score, center) = {
            let p = eval.get(incumbent)?;
            if p.dim() != vars.dim() {
                return Err(ConfigError::DimensionMismatch {
                    what: "incumbent",
                    expected: vars.dim(),
                    got: p.dim(),
                }
                .into());
            }
            if !p.is_defined() {
                return Err(ConfigError::UndefinedIncumbent.into());
            }
            (p.score(), p.x.clone())
        };
        let n_free = vars.n_free();
        let y = SimplexSet::new(
            cfg.order(),
            n_free + 1,
            GeomFrame::new(vars, mesh, cfg.rank_eps),
        );
        Ok(Self {
            cfg,
            vars,
            mesh,
            eval,
            stop,
            incumbent: score,
            center,
            y,
            step: StepType::Initial,
            stop_reason: None,
            reflected: None,
            submitted: Vec::new(),
            evaluated: Vec::new(),
            accepted: Vec::new(),
            success: SuccessKind::None,
            stats: SearchStats::default(),
            budget: cfg.budget(n_free),
        })
    }

    #[inline]
    pub fn step_type(&self) -> StepType {
        self.step
    }

    #[inline]
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.step == StepType::Complete
    }

    #[inline]
    pub fn simplex(&self) -> &SimplexSet {
        &self.y
    }

    #[inline]
    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Trial points submitted so far in this call.
    #[inline]
    pub fn submitted(&self) -> &[DVector<f64>] {
        &self.submitted
    }

    /// Handles of every outcome received in this call.
    #[inline]
    pub fn evaluated(&self) -> &[PointId] {
        &self.evaluated
    }

    /// Run `INITIAL` then step until `COMPLETE`.
    pub fn run(mut self, carried: Option<&[PointId]>) -> Result<SearchOutcome, SearchError> {
        self.initialize(carried)?;
        while self.step()? {}
        Ok(self.into_outcome())
    }

    /// `INITIAL`: build the simplex from `carried` when it still resolves to a
    /// full simplex, otherwise from cache points near the incumbent.
    pub fn initialize(&mut self, carried: Option<&[PointId]>) -> Result<(), SearchError> {
        if self.step != StepType::Initial {
            return Ok(());
        }
        self.y.clear();
        let reused = match carried {
            Some(ids) => self.load_carried(ids),
            None => false,
        };
        if !reused {
            self.seed()?;
            if !self.y.is_full() && self.cfg.seed_new_points {
                self.seed_new_points()?;
                if self.is_done() {
                    return Ok(());
                }
            }
        }
        tracing::debug!(
            vertices = self.y.len(),
            capacity = self.y.capacity(),
            reused,
            "initial simplex"
        );
        if !self.y.is_full() {
            self.finish(StopReason::InitialFailed);
            return Ok(());
        }
        match self.degeneracy() {
            Some(reason) => self.finish(reason),
            None => self.goto(StepType::Reflect),
        }
        Ok(())
    }

    /// Advance one step. Returns `false` once the call is complete.
    ///
    /// A transform step on a simplex that is not full, or `EXPAND` without a
    /// pending reflect point, completes with `UNDEFINED_STEP`. `initialize`
    /// and the transitions never leave the engine in either state.
    pub fn step(&mut self) -> Result<bool, SearchError> {
        if !matches!(self.step, StepType::Initial | StepType::Complete) {
            self.y.validate(&*self.eval)?;
        }
        match self.step {
            StepType::Complete => return Ok(false),
            StepType::Initial => self.initialize(None)?,
            _ if !self.y.is_full() => self.finish(StopReason::UndefinedStep),
            StepType::Reflect => self.reflect()?,
            StepType::Expand => self.expand()?,
            StepType::OutsideContraction => self.outside_contraction()?,
            StepType::InsideContraction => self.inside_contraction()?,
            StepType::Shrink => self.shrink()?,
        }
        Ok(true)
    }

    /// Final result. Unfinished calls report `OPPORTUNISTIC_STOP` or `COMPLETED`.
    pub fn into_outcome(self) -> SearchOutcome {
        let stop_reason = self.stop_reason.unwrap_or_else(|| self.default_reason());
        tracing::info!(
            reason = %stop_reason,
            success = ?self.success,
            generated = self.stats.generated,
            accepted = self.stats.accepted,
            iterations = self.stats.iterations,
            "simplex search stopped"
        );
        SearchOutcome {
            accepted: self.accepted,
            success: self.success,
            stop: true,
            stop_reason,
            stats: self.stats,
            geometry: GeometrySnapshot::from(self.y.geometry()),
            simplex: self.y.ids(),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_step(&mut self, step: StepType) {
        self.step = step;
    }

    fn load_carried(&mut self, ids: &[PointId]) -> bool {
        let mut vertices = Vec::with_capacity(ids.len());
        for &id in ids {
            match Vertex::resolve(&*self.eval, id) {
                Ok(v) if v.x.len() == self.center.len() => vertices.push(v),
                Ok(_) => return false,
                Err(e) => {
                    tracing::debug!(error = %e, "carried simplex is stale; reseeding");
                    return false;
                }
            }
        }
        for v in vertices {
            self.y.insert(v);
        }
        if self.y.is_full() {
            true
        } else {
            self.y.clear();
            false
        }
    }

    /// Greedy seeding: take defined cache points in rank order, keeping each one
    /// only if it raises the rank of the simplex.
    fn seed(&mut self) -> Result<(), SearchError> {
        let radius = &self.mesh.frame_size * self.cfg.include_factor;
        let mut candidates = Vec::new();
        for id in self.eval.nearby(&self.center, &radius) {
            let v = Vertex::resolve(&*self.eval, id)?;
            if !v.score.defined || v.x.len() != self.center.len() {
                continue;
            }
            let moves_fixed = self
                .vars
                .fixed
                .iter()
                .enumerate()
                .any(|(i, &fixed)| fixed && v.x[i] != self.center[i]);
            if !moves_fixed {
                candidates.push(v);
            }
        }
        let order = *self.y.order();
        candidates.sort_by(|a, b| order.cmp(&a.score, &b.score));
        for v in candidates {
            if self.y.is_full() {
                break;
            }
            self.try_extend(v);
        }
        Ok(())
    }

    /// Insert `v` if it raises the rank of the simplex.
    fn try_extend(&mut self, v: Vertex) -> bool {
        let before = self.y.len();
        let id = v.id;
        if !self.y.insert(v) {
            return false;
        }
        if self.y.geometry().rank < before {
            self.y.remove(id);
            return false;
        }
        true
    }

    /// Complete a short initial simplex with `center +- Delta_i e_i` points.
    fn seed_new_points(&mut self) -> Result<(), SearchError> {
        let missing = self.y.capacity() - self.y.len();
        if !self.reserve(missing) {
            return Ok(());
        }
        let mut batch: Vec<DVector<f64>> = Vec::with_capacity(missing);
        {
            let builder = self.builder();
            'axes: for i in self.vars.free_indices() {
                for sign in [1.0, -1.0] {
                    if batch.len() == missing {
                        break 'axes;
                    }
                    let mut x = self.center.clone();
                    x[i] += sign * self.mesh.frame_size[i];
                    let mut seen = self.submitted.clone();
                    seen.extend(batch.iter().cloned());
                    if let Ok(x) = builder.finalize(x, &self.y, &seen) {
                        batch.push(x);
                        break;
                    }
                }
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(points = batch.len(), "seeding simplex with new points");
        let Some(vertices) = self.evaluate(batch)? else {
            return Ok(());
        };
        for v in vertices {
            if self.y.is_full() {
                break;
            }
            if v.score.defined {
                self.try_extend(v);
            }
        }
        Ok(())
    }

    fn builder(&self) -> TrialBuilder<'_> {
        TrialBuilder {
            vars: self.vars,
            mesh: self.mesh,
            center: &self.center,
            project: self.cfg.project_to_mesh,
        }
    }

    fn reflect(&mut self) -> Result<(), SearchError> {
        if !self.reserve(1) {
            return Ok(());
        }
        let trial = self.builder().transform(&self.y, 1.0, &self.submitted);
        let xr = match trial {
            Ok(x) => x,
            Err(e) => {
                tracing::debug!(error = %e, "reflect point rejected");
                self.finish(StopReason::ReflectFailed);
                return Ok(());
            }
        };
        let Some(vr) = self.evaluate_one(xr)? else {
            return Ok(());
        };
        let next = {
            let zones = Zones::new(&self.y, self.cfg.partition);
            if zones.point_dominates_y0(&vr.score) {
                Some(StepType::Expand)
            } else if zones.yn_dominates_point(&vr.score) {
                Some(StepType::InsideContraction)
            } else if zones.point_dominates_pts_in_y(&vr.score, self.cfg.accept_threshold) {
                None
            } else {
                Some(StepType::OutsideContraction)
            }
        };
        match next {
            Some(StepType::Expand) => {
                self.reflected = Some(vr);
                self.goto(StepType::Expand);
            }
            Some(step) => self.goto(step),
            None => self.accept(vr),
        }
        Ok(())
    }

    fn expand(&mut self) -> Result<(), SearchError> {
        let Some(vr) = self.reflected.take() else {
            self.finish(StopReason::UndefinedStep);
            return Ok(());
        };
        if !self.reserve(1) {
            self.settle(vr, StopReason::MaxSearchPointsReached);
            return Ok(());
        }
        let trial = self.builder().transform(&self.y, self.cfg.delta_e, &self.submitted);
        let xe = match trial {
            Ok(x) => x,
            Err(e) => {
                tracing::debug!(error = %e, "expansion point rejected");
                self.settle(vr, StopReason::ExpansionFailed);
                return Ok(());
            }
        };
        let Some(ve) = self.evaluate_one(xe)? else {
            return Ok(());
        };
        let kept = match self.y.order().cmp(&vr.score, &ve.score) {
            Ordering::Greater => ve.id,
            _ => vr.id,
        };
        if self.y.insert_best(vr, ve) {
            self.record_accepted(kept);
            self.after_update();
        } else {
            self.finish(StopReason::InsertionFailed);
        }
        Ok(())
    }

    fn outside_contraction(&mut self) -> Result<(), SearchError> {
        if !self.reserve(1) {
            return Ok(());
        }
        let trial = self.builder().transform(&self.y, self.cfg.delta_oc, &self.submitted);
        let x = match trial {
            Ok(x) => x,
            Err(e) => {
                tracing::debug!(error = %e, "outside contraction point rejected");
                self.finish(StopReason::OutsideContractionFailed);
                return Ok(());
            }
        };
        let Some(v) = self.evaluate_one(x)? else {
            return Ok(());
        };
        let keep = Zones::new(&self.y, self.cfg.partition)
            .point_dominates_pts_in_y(&v.score, self.cfg.accept_threshold);
        if keep {
            self.accept(v);
        } else {
            self.shrink_or_request();
        }
        Ok(())
    }

    fn inside_contraction(&mut self) -> Result<(), SearchError> {
        if !self.reserve(1) {
            return Ok(());
        }
        let trial = self.builder().transform(&self.y, -self.cfg.delta_ic, &self.submitted);
        let x = match trial {
            Ok(x) => x,
            Err(e) => {
                tracing::debug!(error = %e, "inside contraction point rejected");
                self.finish(StopReason::InsideContractionFailed);
                return Ok(());
            }
        };
        let Some(v) = self.evaluate_one(x)? else {
            return Ok(());
        };
        let keep = !Zones::new(&self.y, self.cfg.partition).yn_dominates_point(&v.score);
        if keep {
            self.accept(v);
        } else {
            self.shrink_or_request();
        }
        Ok(())
    }

    fn shrink_or_request(&mut self) {
        if self.cfg.perform_shrink {
            self.goto(StepType::Shrink);
        } else {
            self.finish(StopReason::ShrinkRequest);
        }
    }

    /// Replace every non-best vertex by its image under `y0 + gamma (yi - y0)`.
    fn shrink(&mut self) -> Result<(), SearchError> {
        if !self.reserve(self.y.len().saturating_sub(1)) {
            return Ok(());
        }
        let trial = self.builder().shrink(&self.y, self.cfg.gamma, &self.submitted);
        let points = match trial {
            Ok(points) => points,
            Err(e) => {
                tracing::debug!(error = %e, "shrink point rejected");
                self.finish(StopReason::ShrinkFailed);
                return Ok(());
            }
        };
        let Some(vertices) = self.evaluate(points)? else {
            return Ok(());
        };
        let Some(best) = self.y.best().cloned() else {
            self.finish(StopReason::UndefinedStep);
            return Ok(());
        };
        self.y.clear();
        self.y.insert(best);
        for v in vertices {
            let id = v.id;
            if !self.y.insert(v) {
                self.finish(StopReason::InsertionFailed);
                return Ok(());
            }
            self.record_accepted(id);
        }
        self.after_update();
        Ok(())
    }

    /// Accept `v` into the simplex and move on.
    fn accept(&mut self, v: Vertex) {
        let id = v.id;
        if self.y.insert(v) {
            self.record_accepted(id);
            self.after_update();
        } else {
            self.finish(StopReason::InsertionFailed);
        }
    }

    /// Keep an already evaluated improvement, then stop with `reason`.
    fn settle(&mut self, v: Vertex, reason: StopReason) {
        let id = v.id;
        if self.y.insert(v) {
            self.record_accepted(id);
            self.finish(reason);
        } else {
            self.finish(StopReason::InsertionFailed);
        }
    }

    fn record_accepted(&mut self, id: PointId) {
        tracing::debug!(?id, step = ?self.step, "trial point accepted");
        self.accepted.push(id);
        self.stats.accepted += 1;
    }

    fn after_update(&mut self) {
        self.stats.iterations += 1;
        {
            let g = self.y.geometry();
            tracing::debug!(
                volume = g.normalized_volume,
                diameter = g.diameter,
                rank = g.rank,
                "simplex updated"
            );
        }
        if let Some(reason) = self.degeneracy() {
            self.finish(reason);
        } else if self.cfg.opportunistic && self.success == SuccessKind::Full {
            self.finish(StopReason::OpportunisticStop);
        } else if self
            .cfg
            .max_iterations
            .is_some_and(|m| self.stats.iterations >= m)
        {
            self.finish(StopReason::Completed);
        } else {
            self.goto(StepType::Reflect);
        }
    }

    /// First degeneracy of the current simplex, checked in order: rank,
    /// diameter, normalized volume, zones.
    ///
    /// Both partition relations are acyclic, so `Y0` and `Yn` of a non-empty
    /// set always have a member and `ORDER_FAILED` does not fire for the two
    /// built-in policies. The check guards partition rules that can leave a
    /// zone empty.
    fn degeneracy(&self) -> Option<StopReason> {
        let n_free = self.y.capacity() - 1;
        let g = self.y.geometry();
        if g.rank < n_free {
            Some(StopReason::SimplexRankInsufficient)
        } else if g.diameter < self.cfg.min_diameter_ratio * self.mesh.min_free_size(self.vars) {
            Some(StopReason::TooSmallSimplex)
        } else if g.normalized_volume < self.cfg.min_simplex_vol {
            Some(StopReason::MinSimplexVolReached)
        } else if Zones::new(&self.y, self.cfg.partition).is_degenerate() {
            Some(StopReason::OrderFailed)
        } else {
            None
        }
    }

    fn reserve(&mut self, count: usize) -> bool {
        if self.stats.generated + count > self.budget {
            self.finish(StopReason::MaxSearchPointsReached);
            false
        } else {
            true
        }
    }

    fn evaluate_one(&mut self, x: DVector<f64>) -> Result<Option<Vertex>, SearchError> {
        Ok(self.evaluate(vec![x])?.and_then(|mut v| v.pop()))
    }

    /// Submit one batch. `None` when the call stopped around the submission.
    fn evaluate(&mut self, batch: Vec<DVector<f64>>) -> Result<Option<Vec<Vertex>>, SearchError> {
        if self.interrupted() {
            return Ok(None);
        }
        let n = batch.len();
        self.stats.generated += n;
        let ids = self.eval.submit(&batch);
        self.submitted.extend(batch);
        if ids.len() != n || n == 0 {
            tracing::debug!(expected = n, got = ids.len(), "evaluator reply does not match batch");
            self.finish(StopReason::StepFailed);
            return Ok(None);
        }
        self.stats.evaluated += n;
        let mut out = Vec::with_capacity(n);
        for id in ids {
            let v = Vertex::resolve(&*self.eval, id)?;
            let kind = success_against(&self.incumbent, &v.score, self.cfg.h_min);
            self.success = self.success.max(kind);
            self.evaluated.push(id);
            out.push(v);
        }
        if self.interrupted() {
            return Ok(None);
        }
        Ok(Some(out))
    }

    fn interrupted(&mut self) -> bool {
        if !self.stop.is_raised() {
            return false;
        }
        tracing::debug!(step = ?self.step, "stop flag raised");
        let reason = self.default_reason();
        self.finish(reason);
        true
    }

    fn default_reason(&self) -> StopReason {
        if self.success > SuccessKind::None {
            StopReason::OpportunisticStop
        } else {
            StopReason::Completed
        }
    }

    fn goto(&mut self, step: StepType) {
        tracing::debug!(from = ?self.step, to = ?step, "step transition");
        self.step = step;
    }

    /// Record the first stop reason and complete the call.
    fn finish(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason);
        }
        self.goto(StepType::Complete);
    }
}
