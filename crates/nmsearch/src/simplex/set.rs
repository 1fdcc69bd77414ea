//! The simplex `Y`: an ordered, bounded, duplicate-free set of evaluated points.
//!
//! Invariants:
//! - Vertices are sorted by the set's `DominanceOrder` (best first).
//! - No two vertices compare equal under that order.
//! - `len() <= capacity` (`n_free + 1` for a search).
//! - The cached `Geometry` always describes the current membership; every
//!   mutation drops it and the next read recomputes it.
//! - The diameter is tracked across mutations: an insertion that keeps both
//!   witness vertices only measures the new vertex against the others (O(k n)).
//!   Losing a witness falls back to the all-pairs scan on the next read.

use std::cell::{Cell, OnceCell};
use std::cmp::Ordering;

use nalgebra::DVector;

use crate::mesh::{Mesh, Variables};
use crate::order::DominanceOrder;
use crate::point::{PointId, PointStore, Score, StoreError};

use super::geometry::{diameter, direction_matrix, rank, volume};

/// A vertex: handle plus the snapshot of what ordering and geometry need.
#[derive(Clone, Debug)]
pub struct Vertex {
    pub id: PointId,
    pub score: Score,
    pub x: DVector<f64>,
}

impl Vertex {
    pub fn resolve<S: PointStore + ?Sized>(store: &S, id: PointId) -> Result<Self, StoreError> {
        let p = store.get(id)?;
        Ok(Self {
            id,
            score: p.score(),
            x: p.x.clone(),
        })
    }
}

/// Free-variable restriction and mesh scaling used by the geometry.
#[derive(Clone, Debug)]
pub struct GeomFrame {
    pub free: Vec<usize>,
    pub scale: DVector<f64>,
    pub rank_eps: f64,
}

impl GeomFrame {
    pub fn new(vars: &Variables, mesh: &Mesh, rank_eps: f64) -> Self {
        let free: Vec<usize> = vars.free_indices().collect();
        let scale = DVector::from_iterator(free.len(), free.iter().map(|&i| mesh.mesh_size[i]));
        Self {
            free,
            scale,
            rank_eps,
        }
    }

    /// Unit mesh, all coordinates free.
    pub fn unscaled(n: usize, rank_eps: f64) -> Self {
        Self {
            free: (0..n).collect(),
            scale: DVector::from_element(n, 1.0),
            rank_eps,
        }
    }

    fn restrict(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&i| x[i]))
    }
}

/// Geometry of the current simplex.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    /// Volume in free coordinates.
    pub volume: f64,
    /// Volume in mesh units (free coordinates divided by the mesh size).
    pub normalized_volume: f64,
    /// Largest pairwise distance in free coordinates.
    pub diameter: f64,
    /// Vertices realizing the diameter.
    pub witness: Option<(PointId, PointId)>,
    /// Numerical rank of the mesh-scaled direction matrix.
    pub rank: usize,
}

/// Diameter of the membership it was last measured on, with its witness pair.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Span {
    diameter: f64,
    pair: (PointId, PointId),
}

/// Ordered simplex container.
#[derive(Clone, Debug)]
pub struct SimplexSet {
    order: DominanceOrder,
    capacity: usize,
    frame: GeomFrame,
    vertices: Vec<Vertex>,
    geometry: OnceCell<Geometry>,
    span: Cell<Option<Span>>,
}

impl SimplexSet {
    pub fn new(order: DominanceOrder, capacity: usize, frame: GeomFrame) -> Self {
        Self {
            order,
            capacity,
            frame,
            vertices: Vec::with_capacity(capacity + 1),
            geometry: OnceCell::new(),
            span: Cell::new(None),
        }
    }

    #[inline]
    pub fn order(&self) -> &DominanceOrder {
        &self.order
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.vertices.len() == self.capacity
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn best(&self) -> Option<&Vertex> {
        self.vertices.first()
    }

    #[inline]
    pub fn worst(&self) -> Option<&Vertex> {
        self.vertices.last()
    }

    pub fn ids(&self) -> Vec<PointId> {
        self.vertices.iter().map(|v| v.id).collect()
    }

    pub fn contains(&self, id: PointId) -> bool {
        self.vertices.iter().any(|v| v.id == id)
    }

    /// Insert `v` at its rank.
    ///
    /// Returns `false` (leaving the set unchanged) when `v` ties with a member,
    /// or when the set is full and `v` would be the vertex evicted.
    pub fn insert(&mut self, v: Vertex) -> bool {
        let pos = match self
            .vertices
            .binary_search_by(|w| self.order.cmp(&w.score, &v.score))
        {
            Ok(_) => return false,
            Err(pos) => pos,
        };
        if pos >= self.capacity {
            return false;
        }
        self.vertices.insert(pos, v);
        let evicted = if self.vertices.len() > self.capacity {
            self.vertices.pop()
        } else {
            None
        };
        self.extend_span(pos, evicted.map(|v| v.id));
        self.geometry.take();
        true
    }

    /// Insert only the better of `x1` and `x2`.
    pub fn insert_best(&mut self, x1: Vertex, x2: Vertex) -> bool {
        match self.order.cmp(&x1.score, &x2.score) {
            Ordering::Greater => self.insert(x2),
            _ => self.insert(x1),
        }
    }

    pub fn remove_worst(&mut self) -> Option<Vertex> {
        let v = self.vertices.pop()?;
        self.drop_span_if_witness(v.id);
        self.geometry.take();
        Some(v)
    }

    /// Remove the vertex with handle `id`.
    pub fn remove(&mut self, id: PointId) -> Option<Vertex> {
        let pos = self.vertices.iter().position(|v| v.id == id)?;
        self.drop_span_if_witness(id);
        self.geometry.take();
        Some(self.vertices.remove(pos))
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.span.set(None);
        self.geometry.take();
    }

    /// Measure the vertex at `added` against the others, unless `evicted` was a witness.
    fn extend_span(&mut self, added: usize, evicted: Option<PointId>) {
        let Some(mut span) = self.span.get() else {
            return;
        };
        if evicted.is_some_and(|id| id == span.pair.0 || id == span.pair.1) {
            self.span.set(None);
            return;
        }
        let new = &self.vertices[added];
        for (j, other) in self.vertices.iter().enumerate() {
            if j == added {
                continue;
            }
            let d = self.free_distance(new, other);
            if d > span.diameter {
                span = Span {
                    diameter: d,
                    pair: (new.id, other.id),
                };
            }
        }
        self.span.set(Some(span));
    }

    fn drop_span_if_witness(&mut self, id: PointId) {
        if self
            .span
            .get()
            .is_some_and(|s| s.pair.0 == id || s.pair.1 == id)
        {
            self.span.set(None);
        }
    }

    /// Every vertex handle still resolves in `store`.
    pub fn validate<S: PointStore + ?Sized>(&self, store: &S) -> Result<(), StoreError> {
        self.vertices
            .iter()
            .try_for_each(|v| store.get(v.id).map(|_| ()))
    }

    /// Geometry of the current membership (recomputed after any mutation).
    pub fn geometry(&self) -> &Geometry {
        self.geometry.get_or_init(|| self.compute_geometry())
    }

    fn compute_geometry(&self) -> Geometry {
        let z: Vec<DVector<f64>> = self
            .vertices
            .iter()
            .map(|v| self.frame.restrict(&v.x))
            .collect();
        let scaled: Vec<DVector<f64>> = z.iter().map(|zi| zi.component_div(&self.frame.scale)).collect();
        let dz = direction_matrix(&z);
        let dz_scaled = direction_matrix(&scaled);
        let (diam, witness) = match self.span.get() {
            Some(span) => (span.diameter, Some(self.in_rank_order(span.pair))),
            None => {
                let (diam, pair) = diameter(&z);
                let witness = pair.map(|(i, j)| (self.vertices[i].id, self.vertices[j].id));
                if let Some(pair) = witness {
                    self.span.set(Some(Span {
                        diameter: diam,
                        pair,
                    }));
                }
                (diam, witness)
            }
        };
        Geometry {
            volume: volume(&dz),
            normalized_volume: volume(&dz_scaled),
            diameter: diam,
            witness,
            rank: rank(&dz_scaled, self.frame.rank_eps),
        }
    }

    /// `(a, b)` ordered by vertex rank.
    fn in_rank_order(&self, (a, b): (PointId, PointId)) -> (PointId, PointId) {
        let pos = |id| self.vertices.iter().position(|v| v.id == id);
        if pos(a) <= pos(b) {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Free-coordinate distance between two vertices.
    pub fn free_distance(&self, a: &Vertex, b: &Vertex) -> f64 {
        (self.frame.restrict(&a.x) - self.frame.restrict(&b.x)).norm()
    }
}
