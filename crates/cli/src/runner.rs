//! Toy outer loop: repeated simplex searches with a halving mesh.
//!
//! This is not a full MADS poll. It is just enough of an outer loop to drive
//! `run_search` the way a poll step would: pick the incumbent from the cache,
//! run one search call, then enlarge the mesh after a full success and halve
//! it after a call without success or one that ended in `SHRINK_REQUEST`.

use anyhow::{Context, Result};
use nmsearch::point::Score;
use nmsearch::prelude::*;
use serde::{Deserialize, Serialize};

use crate::problems::Problem;

/// Run configuration read from `--config` (JSON). Missing fields use defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCfg {
    pub search: NmCfg,
    /// Initial (and largest) mesh size.
    pub mesh_size: f64,
    /// Initial (and largest) frame size.
    pub frame_size: f64,
    pub min_mesh_size: f64,
    pub max_calls: usize,
    /// Random points evaluated around `x0` before the first call (default `2 n`).
    pub design_points: Option<usize>,
    pub seed: u64,
}

impl Default for RunCfg {
    fn default() -> Self {
        Self {
            search: NmCfg::default(),
            mesh_size: 0.25,
            frame_size: 1.0,
            min_mesh_size: 1e-6,
            max_calls: 50,
            design_points: None,
            seed: 0,
        }
    }
}

/// One `run_search` call as seen by the outer loop.
#[derive(Clone, Debug, Serialize)]
pub struct CallRecord {
    pub call: usize,
    pub stop_reason: StopReason,
    pub success: SuccessKind,
    pub generated: usize,
    pub accepted: usize,
    /// Smallest free mesh size the call ran with.
    pub mesh_size: f64,
    pub best_f: f64,
    pub best_h: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub problem: String,
    pub dim: usize,
    pub calls: Vec<CallRecord>,
    pub best_x: Vec<f64>,
    pub best_f: f64,
    pub best_h: f64,
    pub blackbox_calls: usize,
    pub cache_hits: usize,
    pub failures: usize,
}

/// Best defined point in the cache under `order`.
pub fn best_point(cache: &Cache, order: &DominanceOrder) -> Option<(PointId, Score)> {
    cache
        .iter()
        .filter(|(_, p)| p.is_defined())
        .map(|(id, p)| (id, p.score()))
        .min_by(|a, b| order.cmp(&a.1, &b.1))
}

/// Mesh for the next call: doubled (up to the initial sizes) after a full
/// success, halved after no success or a `SHRINK_REQUEST`, kept otherwise.
pub fn update_mesh(mesh: &mut Mesh, outcome: &SearchOutcome, cfg: &RunCfg) {
    match (outcome.success, outcome.stop_reason) {
        (SuccessKind::Full, _) => {
            mesh.mesh_size = mesh.mesh_size.map(|d| (2.0 * d).min(cfg.mesh_size));
            mesh.frame_size = mesh.frame_size.map(|d| (2.0 * d).min(cfg.frame_size));
        }
        (SuccessKind::None, _) | (_, StopReason::ShrinkRequest) => {
            mesh.mesh_size *= 0.5;
            mesh.frame_size *= 0.5;
        }
        (SuccessKind::Partial, _) => {}
    }
}

/// Run the outer loop on `problem`. Returns the summary and the final cache.
pub fn run(problem: &Problem, cfg: &RunCfg) -> Result<(RunSummary, Cache)> {
    let n = problem.vars.dim();
    let order = cfg.search.order();
    let mut eval = CachedEvaluator::new(problem.blackbox, problem.types.clone());
    let mut mesh = Mesh::uniform(n, cfg.mesh_size, cfg.frame_size);

    eval.evaluate(&problem.x0);
    let count = cfg.design_points.unwrap_or(2 * problem.vars.n_free());
    let tok = ReplayToken::new(cfg.seed);
    for x in sample_frame(&problem.x0, &mesh, &problem.vars, count, tok) {
        eval.evaluate(&x);
    }
    tracing::info!(problem = problem.name, n, design = eval.cache.len(), "cache seeded");

    let mut search = NelderMeadSearch::new(cfg.search.clone(), problem.vars.clone());
    let stop = StopFlag::new();
    let mut calls = Vec::new();
    for call in 0..cfg.max_calls {
        let (inc, _) = best_point(&eval.cache, &order).context("cache holds no defined point")?;
        let mesh_size = mesh.min_free_size(&problem.vars);
        let outcome = search
            .run_search(&mut eval, inc, &mesh, &stop)
            .with_context(|| format!("search call {call}"))?;
        update_mesh(&mut mesh, &outcome, cfg);
        let (_, best) = best_point(&eval.cache, &order).context("cache holds no defined point")?;
        tracing::info!(
            call,
            reason = %outcome.stop_reason,
            success = ?outcome.success,
            mesh_size,
            best_f = best.f,
            best_h = best.h,
            "search call finished"
        );
        calls.push(CallRecord {
            call,
            stop_reason: outcome.stop_reason,
            success: outcome.success,
            generated: outcome.stats.generated,
            accepted: outcome.stats.accepted,
            mesh_size,
            best_f: best.f,
            best_h: best.h,
        });
        if mesh.min_free_size(&problem.vars) < cfg.min_mesh_size {
            tracing::info!(call, "mesh below minimum size");
            break;
        }
    }

    let (best_id, best) = best_point(&eval.cache, &order).context("cache holds no defined point")?;
    let best_x = eval.cache.get(best_id)?.x.iter().copied().collect();
    let counters = eval.counters();
    let summary = RunSummary {
        problem: problem.name.to_string(),
        dim: n,
        calls,
        best_x,
        best_f: best.f,
        best_h: best.h,
        blackbox_calls: counters.blackbox_calls,
        cache_hits: counters.cache_hits,
        failures: counters.failures,
    };
    Ok((summary, eval.cache))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::problem;
    use nmsearch::search::{GeometrySnapshot, SearchStats};

    #[test]
    fn sphere_improves_on_the_start() {
        let p = problem("sphere", 2).unwrap();
        let cfg = RunCfg {
            max_calls: 20,
            seed: 11,
            ..RunCfg::default()
        };
        let (summary, cache) = run(&p, &cfg).unwrap();
        // f(x0) = 2
        assert!(summary.best_f < 2.0);
        assert!(!summary.calls.is_empty());
        assert!(summary.calls.len() <= 20);
        assert_eq!(summary.blackbox_calls, cache.len());
        // Best values never get worse across calls.
        for w in summary.calls.windows(2) {
            assert!(w[1].best_f <= w[0].best_f);
        }
    }

    #[test]
    fn failed_evaluations_rank_last() {
        let p = problem("crash", 2).unwrap();
        let cfg = RunCfg {
            max_calls: 10,
            frame_size: 2.0,
            mesh_size: 0.5,
            design_points: Some(12),
            seed: 5,
            ..RunCfg::default()
        };
        let (summary, _) = run(&p, &cfg).unwrap();
        assert!(summary.best_f.is_finite());
        assert!(summary.best_x[0] >= -0.5);
    }

    fn outcome(success: SuccessKind, stop_reason: StopReason) -> SearchOutcome {
        SearchOutcome {
            accepted: Vec::new(),
            success,
            stop: true,
            stop_reason,
            stats: SearchStats::default(),
            geometry: GeometrySnapshot::default(),
            simplex: Vec::new(),
        }
    }

    #[test]
    fn mesh_follows_success_and_shrink_requests() {
        let cfg = RunCfg::default();
        let start = || Mesh::uniform(2, 0.125, 0.5);
        let sizes = |m: &Mesh| (m.mesh_size[0], m.frame_size[0]);

        let mut m = start();
        update_mesh(&mut m, &outcome(SuccessKind::Full, StopReason::Completed), &cfg);
        assert_eq!(sizes(&m), (0.25, 1.0));
        // Capped at the initial sizes.
        update_mesh(&mut m, &outcome(SuccessKind::Full, StopReason::Completed), &cfg);
        assert_eq!(sizes(&m), (0.25, 1.0));

        let mut m = start();
        update_mesh(&mut m, &outcome(SuccessKind::Partial, StopReason::Completed), &cfg);
        assert_eq!(sizes(&m), (0.125, 0.5));
        update_mesh(&mut m, &outcome(SuccessKind::Partial, StopReason::ShrinkRequest), &cfg);
        assert_eq!(sizes(&m), (0.0625, 0.25));
        update_mesh(&mut m, &outcome(SuccessKind::None, StopReason::ReflectFailed), &cfg);
        assert_eq!(sizes(&m), (0.03125, 0.125));
    }

    #[test]
    fn config_json_fills_defaults() {
        let cfg: RunCfg =
            serde_json::from_str(r#"{"max_calls": 3, "search": {"perform_shrink": true}}"#).unwrap();
        assert_eq!(cfg.max_calls, 3);
        assert!(cfg.search.perform_shrink);
        assert_eq!(cfg.search.delta_e, 2.0);
        assert_eq!(cfg.mesh_size, RunCfg::default().mesh_size);
    }
}
