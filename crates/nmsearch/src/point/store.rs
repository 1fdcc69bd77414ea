//! Point cache with validated arena handles.
//!
//! Purpose
//! - Own every evaluated point for the lifetime of an optimization run and hand
//!   out `PointId` handles instead of references.
//!
//! Why this design
//! - A handle carries the slot generation; once a point is purged its old
//!   handles fail with `StoreError::Purged` instead of aliasing a newer point.
//! - Lookups are linear scans. Caches of a blackbox run stay small (every entry
//!   cost one expensive evaluation), so an index structure is not needed.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::EvalPoint;

/// Relative tolerance used to decide that two coordinate vectors are the same point.
pub(crate) const SAME_POINT_EPS: f64 = 1e-13;

/// Arena handle into a [`Cache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId {
    pub index: u32,
    pub generation: u32,
}

/// Errors raised when resolving a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("point {0:?} was purged from the cache")]
    Purged(PointId),
    #[error("point {0:?} does not belong to this cache")]
    Unknown(PointId),
}

/// Read access to evaluated points.
pub trait PointStore {
    /// Resolve a handle.
    fn get(&self, id: PointId) -> Result<&EvalPoint, StoreError>;

    /// Live points inside the box `|x_i - center_i| <= radius_i`, in insertion order.
    fn nearby(&self, center: &DVector<f64>, radius: &DVector<f64>) -> Vec<PointId>;
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    point: Option<EvalPoint>,
}

/// In-memory point cache.
#[derive(Clone, Debug, Default)]
pub struct Cache {
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_tag: u64,
    live: usize,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store a point and assign it the next creation tag.
    pub fn insert(&mut self, mut point: EvalPoint) -> PointId {
        point.tag = self.next_tag;
        self.next_tag += 1;
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.point = Some(point);
            return PointId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            point: Some(point),
        });
        PointId {
            index,
            generation: 0,
        }
    }

    /// Remove a point; its handle (and copies of it) become stale.
    pub fn purge(&mut self, id: PointId) -> Result<EvalPoint, StoreError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .ok_or(StoreError::Unknown(id))?;
        if slot.generation != id.generation || slot.point.is_none() {
            return Err(StoreError::Purged(id));
        }
        let point = slot.point.take().ok_or(StoreError::Purged(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(point)
    }

    /// Existing point at the same coordinates, if any.
    pub fn find(&self, x: &DVector<f64>) -> Option<PointId> {
        self.iter()
            .find(|(_, p)| same_point(&p.x, x))
            .map(|(id, _)| id)
    }

    /// Live points with their handles, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PointId, &EvalPoint)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.point.as_ref().map(|p| {
                (
                    PointId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    p,
                )
            })
        })
    }
}

impl PointStore for Cache {
    fn get(&self, id: PointId) -> Result<&EvalPoint, StoreError> {
        let slot = self
            .slots
            .get(id.index as usize)
            .ok_or(StoreError::Unknown(id))?;
        if slot.generation != id.generation {
            return Err(StoreError::Purged(id));
        }
        slot.point.as_ref().ok_or(StoreError::Purged(id))
    }

    fn nearby(&self, center: &DVector<f64>, radius: &DVector<f64>) -> Vec<PointId> {
        let mut ids: Vec<(u64, PointId)> = self
            .iter()
            .filter(|(_, p)| {
                p.x.len() == center.len()
                    && p.x
                        .iter()
                        .zip(center.iter())
                        .zip(radius.iter())
                        .all(|((xi, ci), ri)| (xi - ci).abs() <= *ri)
            })
            .map(|(id, p)| (p.tag, id))
            .collect();
        ids.sort_by_key(|(tag, _)| *tag);
        ids.into_iter().map(|(_, id)| id).collect()
    }
}

/// Coordinate equality up to `SAME_POINT_EPS` (relative to the magnitude).
pub(crate) fn same_point(a: &DVector<f64>, b: &DVector<f64>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= SAME_POINT_EPS * x.abs().max(y.abs()).max(1.0))
}
