// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Vertex registry: the owned vertex store of one mesh plus the point index
//! used to merge near-coincident vertices.
//!
//! Vertices are pushed unchecked and merged afterwards in a single
//! [`consolidate`](VertexRegistry::consolidate) pass, so the outcome does not
//! depend on how the input happened to be ordered spatially.

use super::spatial::{SpatialEntry, SpatialTree};
use super::{Real, Vertex};
use nalgebra::Point3;
use tracing::debug;

/// Outcome of one consolidation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consolidation {
    /// Old slot -> new slot in the compacted store.
    pub remap: Vec<usize>,
    /// Old slot -> true when the vertex was merged into another one.
    pub merged: Vec<bool>,
}

impl Consolidation {
    fn identity(len: usize) -> Self {
        Self {
            remap: (0..len).collect(),
            merged: vec![false; len],
        }
    }

    pub fn merged_count(&self) -> usize {
        self.merged.iter().filter(|&&m| m).count()
    }

    /// True when no slot moved and nothing was merged.
    pub fn is_identity(&self) -> bool {
        self.merged_count() == 0 && self.remap.iter().enumerate().all(|(i, &j)| i == j)
    }
}

/// Owns the vertices of one mesh.
#[derive(Debug, Clone)]
pub struct VertexRegistry<T: Real> {
    vertices: Vec<Vertex<T>>,
    index: SpatialTree<T>,
    tolerance: T,
    /// Slots at and above this were pushed after the last consolidation.
    consolidated_len: usize,
    index_stale: bool,
}

impl<T: Real> VertexRegistry<T> {
    pub fn new(tolerance: T) -> Self {
        Self {
            vertices: Vec::new(),
            index: SpatialTree::empty(),
            tolerance: tolerance.magnitude(),
            consolidated_len: 0,
            index_stale: false,
        }
    }

    pub fn tolerance(&self) -> T {
        self.tolerance
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Vertex<T>> {
        self.vertices.get(slot)
    }

    pub fn position(&self, slot: usize) -> Point3<T> {
        self.vertices[slot].position
    }

    pub fn vertices(&self) -> &[Vertex<T>] {
        &self.vertices
    }

    /// True when every vertex has been through a consolidation pass.
    pub fn is_consolidated(&self) -> bool {
        self.consolidated_len == self.vertices.len()
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.index = SpatialTree::empty();
        self.consolidated_len = 0;
        self.index_stale = false;
    }

    /// Append without any duplicate check; returns the new slot.
    pub fn push_unchecked(&mut self, position: Point3<T>) -> usize {
        self.vertices.push(Vertex::new(position));
        self.index_stale = true;
        self.vertices.len() - 1
    }

    /// Merge every vertex into the lowest-slot canonical vertex within
    /// tolerance and compact the store.
    ///
    /// Slots are visited in order. A vertex is canonical when no earlier
    /// canonical vertex lies within tolerance, so after the pass no two
    /// retained vertices are within tolerance of each other and a second pass
    /// is the identity.
    pub fn consolidate(&mut self) -> Consolidation {
        let len = self.vertices.len();
        if len == 0 {
            self.consolidated_len = 0;
            return Consolidation::identity(0);
        }

        let index = SpatialTree::build(self.entries());

        // canonical[i] is the old slot that i collapses onto
        let mut canonical: Vec<usize> = (0..len).collect();
        let mut merged = vec![false; len];
        for slot in 0..len {
            let target = index
                .within(&self.vertices[slot].position, self.tolerance)
                .into_iter()
                .filter(|&other| other < slot && !merged[other])
                .min();
            if let Some(target) = target {
                canonical[slot] = target;
                merged[slot] = true;
            }
        }

        // Compact: canonical vertices keep their relative order
        let mut remap = vec![0usize; len];
        let mut kept = Vec::with_capacity(len);
        for slot in 0..len {
            if !merged[slot] {
                remap[slot] = kept.len();
                kept.push(self.vertices[slot]);
            }
        }
        for slot in 0..len {
            if merged[slot] {
                remap[slot] = remap[canonical[slot]];
            }
        }

        let merged_count = merged.iter().filter(|&&m| m).count();
        if merged_count > 0 {
            debug!(
                before = len,
                after = kept.len(),
                tolerance = %self.tolerance,
                "Consolidated vertices"
            );
            self.vertices = kept;
            self.rebuild_index();
        } else {
            self.index = index;
            self.index_stale = false;
        }
        self.consolidated_len = self.vertices.len();

        Consolidation { remap, merged }
    }

    /// Drop vertices not listed in `used`, returning old slot -> new slot
    /// (`None` for removed slots).
    pub fn retain_used(&mut self, used: &[bool]) -> Vec<Option<usize>> {
        let mut remap = vec![None; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len());
        for (slot, vertex) in self.vertices.iter().enumerate() {
            if used.get(slot).copied().unwrap_or(false) {
                remap[slot] = Some(kept.len());
                kept.push(*vertex);
            }
        }
        if kept.len() != self.vertices.len() {
            self.vertices = kept;
            self.consolidated_len = self.vertices.len();
            self.index_stale = true;
        }
        remap
    }

    /// Apply `f` to every position. The point index is marked stale.
    pub fn transform<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, &Point3<T>) -> Point3<T>,
    {
        for (slot, vertex) in self.vertices.iter_mut().enumerate() {
            vertex.position = f(slot, &vertex.position);
        }
        self.index_stale = true;
    }

    pub fn scale(&mut self, factor: T) {
        self.transform(|_, p| *p * factor);
    }

    pub fn is_index_stale(&self) -> bool {
        self.index_stale
    }

    pub fn rebuild_index(&mut self) {
        self.index = SpatialTree::build(self.entries());
        self.index_stale = false;
    }

    /// Slot of the vertex closest to `point`.
    pub fn nearest(&self, point: &Point3<T>) -> Option<usize> {
        if self.index_stale {
            return super::spatial::linear_nearest(&self.entries(), point);
        }
        self.index.nearest(point)
    }

    /// Slot of a vertex within tolerance of `point`, lowest slot first.
    pub fn find(&self, point: &Point3<T>) -> Option<usize> {
        if self.index_stale {
            return self
                .vertices
                .iter()
                .position(|v| v.distance_squared(point) <= self.tolerance * self.tolerance);
        }
        self.index.within(point, self.tolerance).into_iter().min()
    }

    fn entries(&self) -> Vec<SpatialEntry<T>> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(slot, vertex)| SpatialEntry::point(slot, vertex.position))
            .collect()
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.vertices.capacity() * std::mem::size_of::<Vertex<T>>()
            + self.index.memory_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(points: &[[f64; 3]], tolerance: f64) -> VertexRegistry<f64> {
        let mut registry = VertexRegistry::new(tolerance);
        for p in points {
            registry.push_unchecked(Point3::new(p[0], p[1], p[2]));
        }
        registry
    }

    #[test]
    fn test_merges_within_tolerance() {
        let mut registry = registry_with(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1e-9 / 2.0, 0.0, 0.0],
                [1.0, 1e-12, 0.0],
            ],
            1e-8,
        );
        let result = registry.consolidate();
        assert_eq!(registry.len(), 2);
        assert_eq!(result.remap, vec![0, 1, 0, 1]);
        assert_eq!(result.merged, vec![false, false, true, true]);
        assert_eq!(result.merged_count(), 2);
        assert!(registry.is_consolidated());
    }

    #[test]
    fn test_canonical_is_lowest_slot() {
        // 0 and 2 are both within tolerance of 1, but not of each other
        let mut registry = registry_with(&[[0.0, 0.0, 0.0], [0.6, 0.0, 0.0], [1.2, 0.0, 0.0]], 0.7);
        let result = registry.consolidate();
        // 1 merges into 0; 2 is 1.2 away from the only canonical vertex so it stays
        assert_eq!(result.remap, vec![0, 0, 1]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_second_pass_is_identity() {
        let mut registry = registry_with(
            &[[0.0, 0.0, 0.0], [0.05, 0.0, 0.0], [0.0, 0.3, 0.0], [0.0, 0.31, 0.0]],
            0.1,
        );
        registry.consolidate();
        let second = registry.consolidate();
        assert!(second.is_identity());
    }

    #[test]
    fn test_zero_tolerance_merges_exact_duplicates_only() {
        let mut registry = registry_with(&[[1.0, 2.0, 3.0], [1.0, 2.0, 3.0], [1.0, 2.0, 3.000001]], 0.0);
        registry.consolidate();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_retain_used_compacts() {
        let mut registry = registry_with(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], 0.0);
        let remap = registry.retain_used(&[true, false, true]);
        assert_eq!(remap, vec![Some(0), None, Some(1)]);
        assert_eq!(registry.position(1), Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_find_and_nearest() {
        let mut registry = registry_with(&[[0.0, 0.0, 0.0], [3.0, 0.0, 0.0]], 0.5);
        registry.consolidate();
        assert_eq!(registry.find(&Point3::new(2.8, 0.0, 0.0)), Some(1));
        assert_eq!(registry.find(&Point3::new(1.5, 0.0, 0.0)), None);
        assert_eq!(registry.nearest(&Point3::new(1.4, 0.0, 0.0)), Some(0));

        registry.scale(2.0);
        assert!(registry.is_index_stale());
        assert_eq!(registry.nearest(&Point3::new(5.0, 0.0, 0.0)), Some(1));
    }
}
