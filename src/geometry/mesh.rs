// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh: ordered indexed triangles over a vertex registry, plus the triangle
//! spatial index.
//!
//! Mutations (`add`, `displace`) leave the mesh dirty; the index reflects the
//! triangle sequence again only after [`Mesh::rebuild`].

use super::registry::VertexRegistry;
use super::spatial::{self, SpatialEntry, SpatialTree, DEFAULT_LEAF_CAPACITY};
use super::triangle::{centroid, derive_normal_area, Facet, MeshTriangle, TriangleId};
use super::{BoundingBox, Real};
use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};
use std::fmt;
use tracing::{debug, warn};

/// Outcome of [`Mesh::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Triangles that made it into the mesh.
    pub added: usize,
    /// Mesh-local ids that collided; the later triangle was dropped.
    pub duplicate_ids: Vec<TriangleId>,
    /// Vertices merged into existing ones during consolidation.
    pub merged_vertices: usize,
}

/// Triangle mesh with tolerance-consolidated vertices.
#[derive(Debug, Clone)]
pub struct Mesh<T: Real> {
    triangles: Vec<MeshTriangle<T>>,
    registry: VertexRegistry<T>,
    index: SpatialTree<T>,
    bbox: BoundingBox<T>,
    dirty: bool,
    leaf_capacity: usize,
}

impl<T: Real> Mesh<T> {
    pub fn new(tolerance: T) -> Self {
        Self::with_leaf_capacity(tolerance, DEFAULT_LEAF_CAPACITY)
    }

    pub fn with_leaf_capacity(tolerance: T, leaf_capacity: usize) -> Self {
        Self {
            triangles: Vec::new(),
            registry: VertexRegistry::new(tolerance),
            index: SpatialTree::empty(),
            bbox: BoundingBox::empty(),
            dirty: false,
            leaf_capacity,
        }
    }

    /// Built mesh over `facets`.
    pub fn from_facets(facets: &[Facet<T>], tolerance: T) -> Self {
        let mut mesh = Self::new(tolerance);
        mesh.initialize(facets);
        mesh
    }

    /// Replace all triangles with `facets` and rebuild everything.
    ///
    /// Triangles sharing a mesh-local id keep only the first occurrence.
    pub fn initialize(&mut self, facets: &[Facet<T>]) {
        self.triangles.clear();
        self.registry.clear();
        self.triangles.reserve(facets.len());
        for facet in facets {
            self.push_facet(facet);
        }
        self.consolidate(0);
        self.drop_duplicate_ids();
        self.build();
    }

    /// Append deep copies of `facets`, merge their vertices into the registry,
    /// order the sequence by mesh-local id and drop id collisions.
    ///
    /// On a collision the triangle already resident (or the earlier one in
    /// `facets`) is kept. The mesh is left dirty.
    pub fn add(&mut self, facets: &[Facet<T>]) -> AddReport {
        let first_new = self.triangles.len();
        self.triangles.reserve(facets.len());
        for facet in facets {
            self.push_facet(facet);
        }
        let merged_vertices = self.consolidate(first_new);
        let duplicate_ids = self.drop_duplicate_ids();

        self.dirty = true;
        AddReport {
            added: self.triangles.len() - first_new,
            duplicate_ids,
            merged_vertices,
        }
    }

    /// Order triangles by mesh-local id and keep the first of each id.
    ///
    /// The sort is stable, so resident triangles win over later ones.
    fn drop_duplicate_ids(&mut self) -> Vec<TriangleId> {
        self.triangles.sort_by_key(|tri| tri.id);

        let mut duplicate_ids = Vec::new();
        let mut last_id = None;
        self.triangles.retain(|tri| {
            if last_id == Some(tri.id) {
                duplicate_ids.push(tri.id);
                false
            } else {
                last_id = Some(tri.id);
                true
            }
        });
        for id in &duplicate_ids {
            warn!(id, "Duplicate mesh-local triangle id, dropping later triangle");
        }
        if !duplicate_ids.is_empty() {
            self.remove_orphaned_vertices();
        }
        duplicate_ids
    }

    /// [`initialize`](Self::initialize) from flat buffers, see [`Facet::from_buffers`].
    pub fn initialize_from_buffers(
        &mut self,
        vertices: &[T],
        ids: &[TriangleId],
        start_tri: usize,
        start_id: usize,
        count: usize,
    ) -> Result<()> {
        let facets = Facet::from_buffers(vertices, ids, start_tri, start_id, count)?;
        self.initialize(&facets);
        Ok(())
    }

    /// [`add`](Self::add) from flat buffers, see [`Facet::from_buffers`].
    pub fn add_from_buffers(
        &mut self,
        vertices: &[T],
        ids: &[TriangleId],
        start_tri: usize,
        start_id: usize,
        count: usize,
    ) -> Result<AddReport> {
        let facets = Facet::from_buffers(vertices, ids, start_tri, start_id, count)?;
        Ok(self.add(&facets))
    }

    fn push_facet(&mut self, facet: &Facet<T>) {
        let vertices = [
            self.registry.push_unchecked(facet.vertices[0]),
            self.registry.push_unchecked(facet.vertices[1]),
            self.registry.push_unchecked(facet.vertices[2]),
        ];
        let (derived, area) = derive_normal_area(&facet.vertices);
        let length = facet.normal.norm();
        let normal = if length > T::narrow(0.0) && length.is_finite() {
            facet.normal / length
        } else {
            derived
        };
        self.triangles.push(MeshTriangle {
            vertices,
            normal,
            area,
            id: facet.id,
            external_id: facet.external_id,
            state: facet.state,
        });
    }

    /// Run a registry consolidation and rewrite triangle references.
    ///
    /// Triangles with a merged reference get fresh normal and area; zero-area
    /// triangles at or after `first_new`, or freshly remapped, are reported.
    fn consolidate(&mut self, first_new: usize) -> usize {
        let result = self.registry.consolidate();
        for (i, tri) in self.triangles.iter_mut().enumerate() {
            let changed = tri.vertices.iter().any(|&v| result.merged[v]);
            tri.vertices = tri.vertices.map(|v| result.remap[v]);
            if changed {
                let corners = tri.vertices.map(|v| self.registry.position(v));
                let (normal, area) = derive_normal_area(&corners);
                tri.normal = normal;
                tri.area = area;
            }
            if (changed || i >= first_new) && tri.area == T::narrow(0.0) {
                warn!(id = tri.id, "Degenerate triangle with zero area");
            }
        }
        result.merged_count()
    }

    /// Drop registry vertices no triangle references any more.
    fn remove_orphaned_vertices(&mut self) {
        let mut used = vec![false; self.registry.len()];
        for tri in &self.triangles {
            for &v in &tri.vertices {
                used[v] = true;
            }
        }
        let remap = self.registry.retain_used(&used);
        for tri in &mut self.triangles {
            tri.vertices = tri.vertices.map(|v| remap[v].unwrap_or(v));
        }
    }

    fn recompute_derived(&mut self) {
        for tri in &mut self.triangles {
            let corners = tri.vertices.map(|v| self.registry.position(v));
            let (normal, area) = derive_normal_area(&corners);
            tri.normal = normal;
            tri.area = area;
        }
    }

    /// Recompute the enclosing box and the triangle index. Clears the dirty flag.
    pub fn build(&mut self) {
        if self.registry.is_index_stale() {
            self.registry.rebuild_index();
        }
        let entries = self.entries();
        let mut bbox = BoundingBox::empty();
        for entry in &entries {
            bbox.merge(&entry.bbox);
        }
        self.bbox = bbox;
        self.index = SpatialTree::build_with_capacity(entries, self.leaf_capacity);
        self.dirty = false;

        debug!(
            triangles = self.triangles.len(),
            vertices = self.registry.len(),
            nodes = self.index.node_count(),
            "Built mesh index"
        );
    }

    /// [`build`](Self::build) if dirty. Returns whether anything was rebuilt.
    pub fn rebuild(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.build();
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn corners(&self, tri: &MeshTriangle<T>) -> [Point3<T>; 3] {
        tri.vertices.map(|v| self.registry.position(v))
    }

    fn entries(&self) -> Vec<SpatialEntry<T>> {
        self.triangles
            .iter()
            .enumerate()
            .map(|(i, tri)| SpatialEntry::triangle(i, &self.corners(tri)))
            .collect()
    }

    fn refs(&self, indices: Vec<usize>) -> Vec<TriangleRef<'_, T>> {
        if self.dirty {
            warn!("Querying a dirty mesh; results reflect the last build");
        }
        indices
            .into_iter()
            .filter(|&i| i < self.triangles.len())
            .map(|index| TriangleRef { mesh: self, index })
            .collect()
    }

    /// Indexed range query.
    pub fn search(&self, query: &BoundingBox<T>, every: bool) -> Vec<TriangleRef<'_, T>> {
        self.refs(self.index.search(query, every))
    }

    /// Exhaustive range query over the current triangle sequence.
    pub fn linear_search(&self, query: &BoundingBox<T>, every: bool) -> Vec<TriangleRef<'_, T>> {
        let indices = spatial::linear_search(&self.entries(), query, every);
        indices
            .into_iter()
            .map(|index| TriangleRef { mesh: self, index })
            .collect()
    }

    /// Overlap query that skips the listed mesh-local ids.
    pub fn search_outbounded(
        &self,
        neighbour: &BoundingBox<T>,
        exclude_ids: &[TriangleId],
    ) -> Vec<TriangleRef<'_, T>> {
        let mut hits = self.search(neighbour, false);
        hits.retain(|hit| !exclude_ids.contains(&hit.id()));
        hits
    }

    /// Triangle whose centroid is closest to `point`.
    pub fn nearest(&self, point: &Point3<T>) -> Option<TriangleRef<'_, T>> {
        let found = self.index.nearest(point)?;
        self.refs(vec![found]).into_iter().next()
    }

    /// Exhaustive nearest query.
    pub fn linear_nearest(&self, point: &Point3<T>) -> Option<TriangleRef<'_, T>> {
        spatial::linear_nearest(&self.entries(), point).map(|index| TriangleRef { mesh: self, index })
    }

    /// Overwrite every triangle's external id. Geometry is untouched.
    pub fn set_all_external_ids(&mut self, external_id: i32) {
        for tri in &mut self.triangles {
            tri.external_id = Some(external_id);
        }
    }

    /// Multiply every coordinate by `factor`, re-consolidate and rebuild.
    pub fn rescale(&mut self, factor: T) -> Result<()> {
        if !factor.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "scale factor {} is not finite",
                factor
            )));
        }
        self.registry.scale(factor);
        self.recompute_derived();
        self.consolidate(self.triangles.len());
        self.build();
        Ok(())
    }

    /// Move vertices in place through `f`. Registry slots keep their
    /// identity; the mesh is left dirty.
    pub fn displace<F>(&mut self, mut f: F)
    where
        F: FnMut(&Point3<T>) -> Point3<T>,
    {
        self.registry.transform(|_, p| f(p));
        self.recompute_derived();
        self.dirty = true;
    }

    pub fn translate(&mut self, offset: &Vector3<T>) {
        self.displace(|p| p + offset);
    }

    /// Corner positions of every triangle, in sequence order.
    pub fn corner_snapshot(&self) -> Vec<[Point3<T>; 3]> {
        self.triangles.iter().map(|tri| self.corners(tri)).collect()
    }

    pub fn triangles(&self) -> &[MeshTriangle<T>] {
        &self.triangles
    }

    /// Tag access; vertex references stay private to the mesh.
    pub fn triangles_mut(&mut self) -> &mut [MeshTriangle<T>] {
        &mut self.triangles
    }

    pub fn triangle(&self, index: usize) -> Option<TriangleRef<'_, T>> {
        (index < self.triangles.len()).then_some(TriangleRef { mesh: self, index })
    }

    pub fn iter(&self) -> impl Iterator<Item = TriangleRef<'_, T>> + '_ {
        (0..self.triangles.len()).map(move |index| TriangleRef { mesh: self, index })
    }

    pub fn registry(&self) -> &VertexRegistry<T> {
        &self.registry
    }

    pub fn tolerance(&self) -> T {
        self.registry.tolerance()
    }

    /// Enclosing box as of the last build.
    pub fn bounding_box(&self) -> BoundingBox<T> {
        self.bbox
    }

    pub fn vertex_count(&self) -> usize {
        self.registry.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn total_area(&self) -> T {
        self.triangles
            .iter()
            .fold(T::narrow(0.0), |sum, tri| sum + tri.area)
    }

    /// Owned copies of all triangles, in sequence order.
    pub fn facets(&self) -> Vec<Facet<T>> {
        self.iter().map(|tri| tri.to_facet()).collect()
    }

    /// Approximate heap footprint in bytes.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.triangles.capacity() * std::mem::size_of::<MeshTriangle<T>>()
            + self.registry.memory_size()
            + self.index.memory_size()
    }
}

/// Borrowed view of one mesh triangle with its resolved corners.
#[derive(Clone, Copy)]
pub struct TriangleRef<'a, T: Real> {
    mesh: &'a Mesh<T>,
    index: usize,
}

impl<'a, T: Real> TriangleRef<'a, T> {
    /// Position in the mesh's triangle sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn triangle(&self) -> &'a MeshTriangle<T> {
        &self.mesh.triangles[self.index]
    }

    pub fn id(&self) -> TriangleId {
        self.triangle().id
    }

    pub fn external_id(&self) -> i32 {
        self.triangle().external_id()
    }

    pub fn has_external_id(&self) -> bool {
        self.triangle().has_external_id()
    }

    pub fn state(&self) -> i32 {
        self.triangle().state
    }

    pub fn normal(&self) -> Vector3<T> {
        self.triangle().normal
    }

    pub fn area(&self) -> T {
        self.triangle().area
    }

    pub fn vertex_indices(&self) -> [usize; 3] {
        self.triangle().vertices
    }

    pub fn vertices(&self) -> [Point3<T>; 3] {
        self.mesh.corners(self.triangle())
    }

    pub fn centroid(&self) -> Point3<T> {
        centroid(&self.vertices())
    }

    pub fn bounding_box(&self) -> BoundingBox<T> {
        BoundingBox::from_points(self.vertices().iter())
    }

    pub fn to_facet(&self) -> Facet<T> {
        let tri = self.triangle();
        Facet {
            vertices: self.vertices(),
            normal: tri.normal,
            id: tri.id,
            external_id: tri.external_id,
            state: tri.state,
        }
    }
}

impl<T: Real> fmt::Debug for TriangleRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriangleRef")
            .field("index", &self.index)
            .field("id", &self.id())
            .field("vertices", &self.vertices())
            .finish()
    }
}
