use super::*;
use crate::mesh::{Mesh, Variables};
use crate::order::{dominates, DominanceOrder};
use crate::point::{Cache, EvalPoint, PointId, PointStore, Score};
use nalgebra::{dvector, DVector};
use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn vertex(cache: &mut Cache, x: DVector<f64>, f: f64, h: f64) -> Vertex {
    let id = cache.insert(EvalPoint::evaluated(x, f, h));
    Vertex::resolve(cache, id).unwrap()
}

fn set2(cache: &mut Cache, pts: &[([f64; 2], f64)]) -> SimplexSet {
    let mut y = SimplexSet::new(DominanceOrder::default(), 3, GeomFrame::unscaled(2, 1e-2));
    for (x, f) in pts {
        let v = vertex(cache, dvector![x[0], x[1]], *f, 0.0);
        assert!(y.insert(v));
    }
    y
}

/// {(0,0), (1,0), (0,1)} with (0,0) ranked worst.
fn unit_triangle(cache: &mut Cache) -> SimplexSet {
    set2(cache, &[([1.0, 0.0], 1.0), ([0.0, 1.0], 2.0), ([0.0, 0.0], 3.0)])
}

#[test]
fn set_is_sorted_and_bounded() {
    let mut cache = Cache::new();
    let mut y = unit_triangle(&mut cache);
    let fs: Vec<f64> = y.vertices().iter().map(|v| v.score.f).collect();
    assert_eq!(fs, vec![1.0, 2.0, 3.0]);
    assert!(y.is_full());
    // Better than the worst: enters and evicts the worst.
    let evicted = y.worst().unwrap().id;
    let v = vertex(&mut cache, dvector![1.0, 1.0], 0.5, 0.0);
    let id = v.id;
    assert!(y.insert(v));
    assert!(y.contains(id));
    assert!(!y.contains(evicted));
    assert_eq!(y.len(), 3);
    assert_eq!(y.best().unwrap().score.f, 0.5);
    assert_eq!(y.worst().unwrap().score.f, 2.0);
    // Worse than everything in a full set: rejected.
    let bad = vertex(&mut cache, dvector![5.0, 5.0], 10.0, 0.0);
    assert!(!y.insert(bad));
    // Same point twice: tie under the order, rejected.
    let again = y.vertices()[1].clone();
    assert!(!y.insert(again));
}

#[test]
fn reflect_and_expand_on_unit_triangle() {
    let mut cache = Cache::new();
    let y = unit_triangle(&mut cache);
    let vars = Variables::free(2);
    let mesh = Mesh::uniform(2, 0.5, 1.0);
    let center = dvector![1.0, 0.0];
    let tb = TrialBuilder {
        vars: &vars,
        mesh: &mesh,
        center: &center,
        project: false,
    };
    assert_eq!(tb.centroid(&y).unwrap(), dvector![0.5, 0.5]);
    assert_eq!(tb.transform(&y, 1.0, &[]).unwrap(), dvector![1.0, 1.0]);
    assert_eq!(tb.transform(&y, 2.0, &[]).unwrap(), dvector![1.5, 1.5]);
    assert_eq!(tb.transform(&y, 0.5, &[]).unwrap(), dvector![0.75, 0.75]);
    assert_eq!(tb.transform(&y, -0.5, &[]).unwrap(), dvector![0.25, 0.25]);
    // Projected onto the 0.5-mesh anchored at (1, 0), expansion is already on it.
    let projected = TrialBuilder { project: true, ..tb };
    assert_eq!(projected.transform(&y, 2.0, &[]).unwrap(), dvector![1.5, 1.5]);
    // Outside contraction (0.75, 0.75) rounds half away from the center.
    assert_eq!(projected.transform(&y, 0.5, &[]).unwrap(), dvector![0.5, 1.0]);
    assert_eq!(
        projected.transform(&y, 0.5, &[dvector![0.5, 1.0]]),
        Err(TrialError::Duplicate)
    );
}

#[test]
fn trial_rejections() {
    let mut cache = Cache::new();
    let y = unit_triangle(&mut cache);
    let vars = Variables::free(2).with_bounds(dvector![-1.0, -1.0], dvector![1.2, 1.2]);
    let mesh = Mesh::uniform(2, 0.5, 1.0);
    let center = dvector![1.0, 0.0];
    let tb = TrialBuilder {
        vars: &vars,
        mesh: &mesh,
        center: &center,
        project: false,
    };
    assert_eq!(
        tb.transform(&y, 2.0, &[]),
        Err(TrialError::OutOfBounds { index: 0 })
    );
    // Inside contraction (0.25, 0.25) snaps onto the vertex (0, 0).
    let coarse = Mesh::uniform(2, 1.0, 1.0);
    let tc = TrialBuilder {
        mesh: &coarse,
        project: true,
        ..tb
    };
    assert_eq!(tc.transform(&y, -0.5, &[]), Err(TrialError::Collapsed));
}

#[test]
fn fixed_coordinates_are_copied_from_the_center() {
    let mut cache = Cache::new();
    let mut y = SimplexSet::new(DominanceOrder::default(), 3, GeomFrame::unscaled(3, 1e-2));
    for (x, f) in [([1.0, 0.0], 1.0), ([0.0, 1.0], 2.0), ([0.0, 0.0], 3.0)] {
        assert!(y.insert(vertex(&mut cache, dvector![x[0], 7.0, x[1]], f, 0.0)));
    }
    let vars = Variables::free(3).with_fixed(vec![false, true, false]);
    let mesh = Mesh::uniform(3, 0.5, 1.0);
    let center = dvector![1.0, 7.0, 0.0];
    let tb = TrialBuilder {
        vars: &vars,
        mesh: &mesh,
        center: &center,
        project: true,
    };
    let xr = tb.transform(&y, 1.0, &[]).unwrap();
    assert_eq!(xr, dvector![1.0, 7.0, 1.0]);

    // A direction living only in the fixed coordinate is a no-op move.
    let mut flat = SimplexSet::new(DominanceOrder::default(), 2, GeomFrame::unscaled(3, 1e-2));
    assert!(flat.insert(vertex(&mut cache, dvector![0.0, 1.0, 0.0], 1.0, 0.0)));
    assert!(flat.insert(vertex(&mut cache, dvector![0.0, 2.0, 0.0], 2.0, 0.0)));
    assert_eq!(
        tb.transform(&flat, 1.0, &[]),
        Err(TrialError::DegenerateDirection)
    );
}

#[test]
fn shrink_moves_toward_best() {
    let mut cache = Cache::new();
    let y = unit_triangle(&mut cache);
    let vars = Variables::free(2);
    let mesh = Mesh::uniform(2, 0.25, 1.0);
    let center = dvector![1.0, 0.0];
    let tb = TrialBuilder {
        vars: &vars,
        mesh: &mesh,
        center: &center,
        project: true,
    };
    let pts = tb.shrink(&y, 0.5, &[]).unwrap();
    assert_eq!(pts, vec![dvector![0.5, 0.5], dvector![0.5, 0.0]]);
}

#[test]
fn repeated_vertex_loses_rank() {
    let mut cache = Cache::new();
    let y = set2(&mut cache, &[([0.0, 0.0], 1.0), ([1.0, 0.0], 2.0), ([1.0, 0.0], 3.0)]);
    assert_eq!(y.len(), 3);
    assert!(y.geometry().rank < 2);
    assert!(y.geometry().volume < 1e-12);
}

#[test]
fn geometry_is_never_stale() {
    let mut cache = Cache::new();
    let mut y = unit_triangle(&mut cache);
    let g0 = y.geometry().clone();
    assert!((g0.volume - 0.5).abs() < 1e-12);
    assert_eq!(g0.rank, 2);
    // Replace the worst (0,0) with (3,3).
    assert!(y.insert(vertex(&mut cache, dvector![3.0, 3.0], 0.0, 0.0)));
    let g1 = y.geometry();
    assert_ne!(&g0, g1);
    // (3,3), (1,0), (0,1): area 2.5, diameter |(3,3)-(1,0)| = sqrt(13)
    assert!((g1.volume - 2.5).abs() < 1e-12);
    assert!((g1.diameter - 13f64.sqrt()).abs() < 1e-12);
    y.remove_worst();
    assert_eq!(y.geometry().rank, 1);
    assert!((y.geometry().diameter - 13f64.sqrt()).abs() < 1e-12);
    y.clear();
    assert_eq!(y.geometry().diameter, 0.0);
    assert!(y.geometry().witness.is_none());
}

#[test]
fn losing_a_diameter_witness_rescans() {
    let mut cache = Cache::new();
    let mut y = set2(&mut cache, &[([0.0, 0.0], 1.0), ([1.0, 0.0], 2.0), ([4.0, 0.0], 3.0)]);
    assert_eq!(y.geometry().diameter, 4.0);
    let (a, b) = y.geometry().witness.unwrap();
    assert_eq!((a, b), (y.vertices()[0].id, y.vertices()[2].id));
    // (0, 1) evicts the witness (4, 0); the remaining span is sqrt(2).
    assert!(y.insert(vertex(&mut cache, dvector![0.0, 1.0], 0.0, 0.0)));
    assert!((y.geometry().diameter - 2f64.sqrt()).abs() < 1e-12);
    // Removing a non-witness keeps the tracked span.
    let (a, b) = y.geometry().witness.unwrap();
    let other = y.ids().into_iter().find(|&id| id != a && id != b).unwrap();
    y.remove(other);
    assert!((y.geometry().diameter - 2f64.sqrt()).abs() < 1e-12);
    assert_eq!(y.geometry().witness, Some((a, b)));
}

#[test]
fn normalized_volume_uses_mesh_units() {
    let mut cache = Cache::new();
    let vars = Variables::free(2);
    let mesh = Mesh::new(dvector![0.5, 0.25], dvector![1.0, 1.0]);
    let mut y = SimplexSet::new(DominanceOrder::default(), 3, GeomFrame::new(&vars, &mesh, 1e-2));
    for (x, f) in [([1.0, 0.0], 1.0), ([0.0, 1.0], 2.0), ([0.0, 0.0], 3.0)] {
        assert!(y.insert(vertex(&mut cache, dvector![x[0], x[1]], f, 0.0)));
    }
    let g = y.geometry();
    assert!((g.volume - 0.5).abs() < 1e-12);
    // (2 mesh steps) x (4 mesh steps) / 2
    assert!((g.normalized_volume - 4.0).abs() < 1e-12);
}

#[test]
fn validate_detects_purged_vertices() {
    let mut cache = Cache::new();
    let y = unit_triangle(&mut cache);
    assert!(y.validate(&cache).is_ok());
    let victim = y.vertices()[1].id;
    cache.purge(victim).unwrap();
    assert!(y.validate(&cache).is_err());
}

#[test]
fn zones_under_both_policies() {
    let mut cache = Cache::new();
    let mut y = SimplexSet::new(DominanceOrder::default(), 3, GeomFrame::unscaled(2, 1e-2));
    // Infeasible trade-off pair plus one point dominated by both.
    let a = vertex(&mut cache, dvector![0.0, 0.0], 1.0, 0.5);
    let b = vertex(&mut cache, dvector![1.0, 0.0], 0.0, 1.0);
    let c = vertex(&mut cache, dvector![0.0, 1.0], 2.0, 2.0);
    for v in [a, b, c] {
        assert!(y.insert(v));
    }
    let z = Zones::new(&y, PartitionPolicy::Dominance);
    assert_eq!(z.y0(), &[0, 1]);
    assert_eq!(z.yn(), &[2]);
    assert!(!z.is_degenerate());
    assert!(z.point_dominates_y0(&Score::new(-1.0, 0.1, 99)));
    assert!(!z.point_dominates_y0(&Score::new(0.5, 0.1, 99)));
    assert!(z.point_dominates_pts_in_y(&Score::new(0.5, 0.5, 99), 2));
    assert!(!z.point_dominates_pts_in_y(&Score::new(1.5, 1.5, 99), 2));
    assert!(z.yn_dominates_point(&Score::new(3.0, 3.0, 99)));
    assert!(z.yn_dominates_point(&Score::new(f64::NAN, 0.0, 99)));

    let s = Zones::new(&y, PartitionPolicy::StrictOrder);
    assert_eq!(s.y0(), &[0]);
    assert_eq!(s.yn(), &[2]);
    // h = 0.4 beats the best (h = 0.5) under the strict order but not by dominance.
    let xt = Score::new(5.0, 0.4, 99);
    assert!(s.point_dominates_y0(&xt));
    assert!(!z.point_dominates_y0(&xt));
}

fn random_vertices(rng: &mut StdRng, cache: &mut Cache, n: usize, count: usize) -> Vec<Vertex> {
    (0..count)
        .map(|_| {
            let x = DVector::from_fn(n, |_, _| rng.gen_range(-5.0..5.0));
            vertex(cache, x, rng.gen_range(-1.0..1.0), 0.0)
        })
        .collect()
}

proptest! {
    #[test]
    fn diameter_bounds_every_pair_after_replacement(seed in any::<u64>(), n in 1usize..5) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cache = Cache::new();
        let mut y = SimplexSet::new(DominanceOrder::default(), n + 1, GeomFrame::unscaled(n, 1e-2));
        for v in random_vertices(&mut rng, &mut cache, n, n + 1) {
            y.insert(v);
        }
        let _ = y.geometry().diameter;
        // Replace one vertex by a point that ranks first.
        let x = DVector::from_fn(n, |_, _| rng.gen_range(-5.0..5.0));
        let fresh = vertex(&mut cache, x, -2.0, 0.0);
        prop_assert!(y.insert(fresh));
        let g = y.geometry().clone();
        let v = y.vertices();
        for i in 0..v.len() {
            for j in i + 1..v.len() {
                prop_assert!(g.diameter >= y.free_distance(&v[i], &v[j]));
            }
        }
        let (a, b) = g.witness.unwrap();
        let va = v.iter().find(|v| v.id == a).unwrap();
        let vb = v.iter().find(|v| v.id == b).unwrap();
        prop_assert_eq!(g.diameter, y.free_distance(va, vb));
    }

    #[test]
    fn tracked_diameter_matches_full_scan(seed in any::<u64>(), n in 1usize..5, steps in 1usize..12) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cache = Cache::new();
        let mut y = SimplexSet::new(DominanceOrder::default(), n + 1, GeomFrame::unscaled(n, 1e-2));
        for v in random_vertices(&mut rng, &mut cache, n, n + 1) {
            y.insert(v);
        }
        for _ in 0..steps {
            let _ = y.geometry();
            for v in random_vertices(&mut rng, &mut cache, n, 1) {
                y.insert(v);
            }
            if rng.gen_bool(0.2) {
                y.remove_worst();
            }
            let z: Vec<DVector<f64>> = y.vertices().iter().map(|v| v.x.clone()).collect();
            let (full, _) = geometry::diameter(&z);
            prop_assert!((y.geometry().diameter - full).abs() <= 1e-12 * full.max(1.0));
        }
    }

    #[test]
    fn zones_are_never_empty(
        scores in prop::collection::vec(
            (prop_oneof![4 => -3.0..3.0f64, 1 => Just(f64::NAN)], prop_oneof![Just(0.0), 0.0..2.0f64]),
            1..6,
        )
    ) {
        let mut cache = Cache::new();
        let mut y = SimplexSet::new(DominanceOrder::default(), scores.len(), GeomFrame::unscaled(1, 1e-2));
        for (i, (f, h)) in scores.into_iter().enumerate() {
            prop_assert!(y.insert(vertex(&mut cache, dvector![i as f64], f, h)));
        }
        for policy in [PartitionPolicy::Dominance, PartitionPolicy::StrictOrder] {
            let z = Zones::new(&y, policy);
            prop_assert!(!z.is_degenerate());
        }
    }

    #[test]
    fn insert_best_with_dominated_pair_keeps_best(seed in any::<u64>(), n in 1usize..4) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cache = Cache::new();
        let mut y = SimplexSet::new(DominanceOrder::default(), n + 1, GeomFrame::unscaled(n, 1e-2));
        for v in random_vertices(&mut rng, &mut cache, n, n + 1) {
            y.insert(v);
        }
        let best: PointId = y.best().unwrap().id;
        let best_score = y.best().unwrap().score;
        // x1 dominated by the best vertex, x2 dominated by x1.
        let f1 = best_score.f + rng.gen_range(0.01..1.0);
        let x1 = vertex(&mut cache, DVector::from_fn(n, |_, _| rng.gen_range(-5.0..5.0)), f1, 0.0);
        let x2 = vertex(&mut cache, DVector::from_fn(n, |_, _| rng.gen_range(-5.0..5.0)), f1 + 1.0, 0.0);
        prop_assert!(dominates(&best_score, &x1.score));
        prop_assert!(dominates(&x1.score, &x2.score));
        y.insert_best(x1, x2);
        prop_assert_eq!(y.best().unwrap().id, best);
    }
}

#[test]
fn resolve_reads_the_cache() {
    let mut cache = Cache::new();
    let id = cache.insert(EvalPoint::evaluated(dvector![1.0, 2.0], 3.0, 0.0));
    let v = Vertex::resolve(&cache, id).unwrap();
    assert_eq!(v.x, cache.get(id).unwrap().x);
    assert_eq!(v.score.f, 3.0);
}
