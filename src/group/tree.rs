// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Group tree: the registry that owns every group of one system instance.
//!
//! Groups live in a flat arena in creation order and refer to each other by
//! [`GroupId`]. The tree enforces name uniqueness among siblings, loads leaf
//! geometry and fans queries out to the leaf meshes below a group.

use super::behavior::{LeapedVertex, MoveParams, BASE_CLASS};
use super::factory::GroupFactory;
use super::node::{Group, GroupId, GroupSpec, GroupState};
use crate::config::{keys, ConfigNode, ROOT_NAME};
use crate::error::{Error, Result};
use crate::geometry::{AddReport, BoundingBox, Facet, Mesh, Real, TriangleId, TriangleRef};
use crate::io::{self, MeshFormat};
use ahash::AHashMap;
use nalgebra::Point3;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Tolerance used when neither the group nor any ancestor sets one.
pub const DEFAULT_TOLERANCE: f64 = 1e-10;

/// A triangle found by a tree-level query, with the leaf it came from.
#[derive(Debug, Clone, Copy)]
pub struct GroupHit<'a, T: Real> {
    pub group: GroupId,
    pub triangle: TriangleRef<'a, T>,
}

/// Outcome of [`GroupTree::move_groups`].
#[derive(Debug, Clone, Default)]
pub struct MoveReport<T: Real> {
    /// Leaves that were moved and rebuilt, in tree order.
    pub moved: Vec<GroupId>,
    /// Vertices flagged by the leap grid, one entry per triangle corner. A
    /// vertex shared by several triangles appears once for each of them.
    pub leaped: Vec<LeapedVertex<T>>,
}

/// Owner of all groups of one system instance.
#[derive(Debug)]
pub struct GroupTree<T: Real = f64> {
    groups: Vec<Group<T>>,
    paths: AHashMap<String, GroupId>,
    factory: GroupFactory<T>,
    default_tolerance: T,
    base_dir: Option<PathBuf>,
}

impl<T: Real> Default for GroupTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> GroupTree<T> {
    pub fn new() -> Self {
        Self::with_factory(GroupFactory::new())
    }

    pub fn with_factory(factory: GroupFactory<T>) -> Self {
        Self {
            groups: Vec::new(),
            paths: AHashMap::new(),
            factory,
            default_tolerance: T::narrow(DEFAULT_TOLERANCE),
            base_dir: None,
        }
    }

    pub fn factory_mut(&mut self) -> &mut GroupFactory<T> {
        &mut self.factory
    }

    pub fn default_tolerance(&self) -> T {
        self.default_tolerance
    }

    pub fn set_default_tolerance(&mut self, tolerance: T) {
        self.default_tolerance = tolerance;
    }

    /// Directory relative mesh paths are resolved against.
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.base_dir = Some(dir.into());
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Read a configuration file, build the hierarchy and load all leaf
    /// geometry, scaling coordinates by `scale`.
    pub fn load(&mut self, config: impl AsRef<Path>, scale: T) -> Result<()> {
        let config = config.as_ref();
        let root = ConfigNode::from_file(config).inspect_err(|e| {
            error!(config = %config.display(), "Failed to read configuration: {}", e);
        })?;
        if self.base_dir.is_none() {
            self.base_dir = config.parent().map(Path::to_path_buf);
        }
        self.build_from_config(&root)?;
        self.load_geometry(scale)?;
        info!(
            config = %config.display(),
            groups = self.groups.len(),
            triangles = self.total_triangle_count(),
            "Loaded group tree"
        );
        Ok(())
    }

    /// Create groups for every node below `root`, depth first.
    ///
    /// A root-level `tolerance` leaf sets the default tolerance. The first
    /// error aborts the walk; groups created before it stay attached.
    pub fn build_from_config(&mut self, root: &ConfigNode) -> Result<()> {
        if let Some(value) = root.leaf(keys::TOLERANCE) {
            let tolerance = value
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::Attribute {
                    group: ROOT_NAME.to_string(),
                    key: keys::TOLERANCE.to_string(),
                    value: value.to_string(),
                })?;
            self.default_tolerance = T::narrow(tolerance);
        }
        for node in root.children() {
            self.build_node(node, None)?;
        }
        Ok(())
    }

    fn build_node(&mut self, node: &ConfigNode, parent: Option<GroupId>) -> Result<GroupId> {
        let spec = GroupSpec::from_config(node)?;
        let id = self.attach_inner(spec, parent, Some(node)).inspect_err(|e| {
            error!(group = node.name(), "Failed to create group: {}", e);
        })?;
        for child in node.children() {
            self.build_node(child, Some(id))?;
        }
        Ok(id)
    }

    /// Attach a new group under `parent` (or as a root).
    ///
    /// Fails, leaving the tree unchanged, when the name is rejected by
    /// [`check_group_name`](Self::check_group_name), the class is unknown or
    /// the parent holds geometry.
    pub fn attach(&mut self, spec: GroupSpec<T>, parent: Option<GroupId>) -> Result<GroupId> {
        self.attach_inner(spec, parent, None)
    }

    fn attach_inner(
        &mut self,
        spec: GroupSpec<T>,
        parent: Option<GroupId>,
        node: Option<&ConfigNode>,
    ) -> Result<GroupId> {
        let (parent_path, inherited) = match parent {
            Some(pid) => {
                let p = self
                    .get(pid)
                    .ok_or_else(|| Error::GroupNotFound(pid.to_string()))?;
                if p.triangle_count() > 0 {
                    return Err(Error::InvalidArgument(format!(
                        "group `{}` owns geometry and cannot take children",
                        p.full_path()
                    )));
                }
                (p.full_path().to_string(), p.tolerance())
            }
            None => (String::new(), self.default_tolerance),
        };
        self.check_group_name(&spec.name, &parent_path)?;

        let class_name = spec.class_name.as_deref().unwrap_or(BASE_CLASS);
        let mut behavior = self.factory.create(class_name)?;
        if let Some(node) = node {
            behavior.configure(&spec.name, node)?;
        }

        let id = GroupId(self.groups.len());
        let tolerance = spec.tolerance.unwrap_or(inherited);
        let mut group = Group::new(id, spec.name.clone(), behavior, tolerance);
        group.attach(parent.map(|pid| (pid, parent_path.as_str())), spec);

        if let Some(pid) = parent {
            let p = &mut self.groups[pid.0];
            p.children.push(id);
            p.mesh = None;
        }
        debug!(
            group = group.full_path(),
            class = group.class_name(),
            id = id.0,
            "Attached group"
        );
        self.paths.insert(group.full_path().to_string(), id);
        self.groups.push(group);
        Ok(id)
    }

    /// Reject an empty name, a name containing the path separator, or a name
    /// already used under `parent_path`.
    pub fn check_group_name(&self, name: &str, parent_path: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyGroupName {
                parent_path: parent_path.to_string(),
            });
        }
        if name.contains('/') {
            return Err(Error::InvalidArgument(format!(
                "group name `{}` must not contain `/`",
                name
            )));
        }
        let full_path = if parent_path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent_path, name)
        };
        let taken = self.paths.contains_key(&full_path)
            || self
                .groups
                .iter()
                .any(|g| g.name == name && g.parent_path == parent_path);
        if taken {
            return Err(Error::DuplicateGroup {
                name: name.to_string(),
                parent_path: parent_path.to_string(),
            });
        }
        Ok(())
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Load the source files of every leaf. Leaves without files get an
    /// empty, built mesh.
    pub fn load_geometry(&mut self, scale: T) -> Result<()> {
        let ids: Vec<GroupId> = self.groups.iter().map(|g| g.id).collect();
        for id in ids {
            let group = &self.groups[id.0];
            if !group.is_leaf() {
                if !group.files.is_empty() {
                    warn!(
                        group = group.full_path(),
                        "Ignoring files on a group that has children"
                    );
                }
                continue;
            }
            self.load_leaf(id, scale)?;
        }
        Ok(())
    }

    /// (Re)load one leaf from its source files. The previous mesh survives a
    /// failed load.
    pub fn reload_group(&mut self, name: &str, scale: T) -> Result<()> {
        let id = self.leaf_id(name)?;
        self.load_leaf(id, scale)
    }

    fn load_leaf(&mut self, id: GroupId, scale: T) -> Result<()> {
        let group = &self.groups[id.0];
        let paths: Vec<PathBuf> = group.files.iter().map(|f| self.resolve_path(f)).collect();
        let facets = io::load_files(&paths, 0, scale).inspect_err(|e| {
            error!(
                group = group.full_path(),
                files = %group.file_names(),
                "Failed to load geometry: {}",
                e
            );
        })?;

        let group = &mut self.groups[id.0];
        let mut mesh = Mesh::new(group.tolerance);
        mesh.initialize(&facets);
        if let Some(external_id) = group.external_id {
            mesh.set_all_external_ids(external_id);
        }
        group.mesh = Some(mesh);
        group.state = GroupState::Built;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Group<T>> {
        self.groups.iter()
    }

    /// Lookup by internal id.
    pub fn get(&self, id: GroupId) -> Option<&Group<T>> {
        self.groups.get(id.0)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut Group<T>> {
        self.groups.get_mut(id.0)
    }

    /// Lookup by full path, falling back to the first group with that bare
    /// name.
    pub fn find(&self, name: &str) -> Option<GroupId> {
        self.paths
            .get(name)
            .copied()
            .or_else(|| self.groups.iter().find(|g| g.name == name).map(|g| g.id))
    }

    pub fn group(&self, name: &str) -> Result<&Group<T>> {
        let id = self.resolve(name)?;
        Ok(&self.groups[id.0])
    }

    pub fn resolve(&self, name: &str) -> Result<GroupId> {
        self.find(name)
            .ok_or_else(|| Error::GroupNotFound(name.to_string()))
    }

    fn leaf_id(&self, name: &str) -> Result<GroupId> {
        let id = self.resolve(name)?;
        if !self.groups[id.0].is_leaf() {
            return Err(Error::NotALeaf(name.to_string()));
        }
        Ok(id)
    }

    /// Groups without a parent, in creation order.
    pub fn roots(&self) -> Vec<GroupId> {
        self.groups
            .iter()
            .filter(|g| g.parent.is_none())
            .map(|g| g.id)
            .collect()
    }

    /// `id` and all its descendants.
    pub fn descendants(&self, id: GroupId) -> Vec<GroupId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(group) = self.get(current) {
                stack.extend(group.children.iter().rev().copied());
            }
        }
        out
    }

    /// Leaves at or below `id`, in creation order.
    pub fn leaves_under(&self, id: GroupId) -> Vec<GroupId> {
        let mut leaves: Vec<GroupId> = self
            .descendants(id)
            .into_iter()
            .filter(|&g| self.groups[g.0].is_leaf())
            .collect();
        leaves.sort_unstable();
        leaves
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn leaf_meshes(&self, name: &str) -> Result<Vec<(GroupId, &Mesh<T>)>> {
        let id = self.resolve(name)?;
        Ok(self
            .leaves_under(id)
            .into_iter()
            .filter_map(|leaf| self.groups[leaf.0].mesh.as_ref().map(|m| (leaf, m)))
            .collect())
    }

    /// Triangles below `name` inside the box spanned by `min` and `max`,
    /// grouped by leaf in creation order.
    pub fn search_polygons(
        &self,
        name: &str,
        min: Point3<T>,
        max: Point3<T>,
        every: bool,
    ) -> Result<Vec<GroupHit<'_, T>>> {
        let query = BoundingBox::from_corners(min, max);
        let mut hits = Vec::new();
        for (group, mesh) in self.leaf_meshes(name)? {
            hits.extend(
                mesh.search(&query, every)
                    .into_iter()
                    .map(|triangle| GroupHit { group, triangle }),
            );
        }
        Ok(hits)
    }

    /// [`search_polygons`](Self::search_polygons) through the exhaustive scan.
    pub fn linear_search_polygons(
        &self,
        name: &str,
        min: Point3<T>,
        max: Point3<T>,
        every: bool,
    ) -> Result<Vec<GroupHit<'_, T>>> {
        let query = BoundingBox::from_corners(min, max);
        let mut hits = Vec::new();
        for (group, mesh) in self.leaf_meshes(name)? {
            hits.extend(
                mesh.linear_search(&query, every)
                    .into_iter()
                    .map(|triangle| GroupHit { group, triangle }),
            );
        }
        Ok(hits)
    }

    /// Triangle below `name` whose centroid is closest to `point`. On equal
    /// distance the earlier leaf wins.
    pub fn search_nearest_polygon(
        &self,
        name: &str,
        point: &Point3<T>,
    ) -> Result<Option<GroupHit<'_, T>>> {
        let mut best: Option<(T, GroupHit<'_, T>)> = None;
        for (group, mesh) in self.leaf_meshes(name)? {
            if let Some(triangle) = mesh.nearest(point) {
                let d2 = (triangle.centroid() - point).norm_squared();
                if best.as_ref().map_or(true, |(current, _)| d2 < *current) {
                    best = Some((d2, GroupHit { group, triangle }));
                }
            }
        }
        Ok(best.map(|(_, hit)| hit))
    }

    /// Overlap search against a neighbour's box, skipping `exclude_ids`.
    pub fn search_outbounded(
        &self,
        name: &str,
        neighbour: &BoundingBox<T>,
        exclude_ids: &[TriangleId],
    ) -> Result<Vec<GroupHit<'_, T>>> {
        let mut hits = Vec::new();
        for (group, mesh) in self.leaf_meshes(name)? {
            hits.extend(
                mesh.search_outbounded(neighbour, exclude_ids)
                    .into_iter()
                    .map(|triangle| GroupHit { group, triangle }),
            );
        }
        Ok(hits)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Replace the geometry of leaf `name`.
    pub fn init_triangles(&mut self, name: &str, facets: &[Facet<T>]) -> Result<()> {
        let id = self.leaf_id(name)?;
        let group = &mut self.groups[id.0];
        group.ensure_mesh().initialize(facets);
        group.state = GroupState::Built;
        Ok(())
    }

    /// Add triangles to leaf `name`; the leaf needs a rebuild afterwards.
    pub fn add_triangles(&mut self, name: &str, facets: &[Facet<T>]) -> Result<AddReport> {
        let id = self.leaf_id(name)?;
        let group = &mut self.groups[id.0];
        let report = group.ensure_mesh().add(facets);
        group.state = GroupState::GeometryLoaded;
        Ok(report)
    }

    /// [`init_triangles`](Self::init_triangles) from flat buffers.
    pub fn init_triangles_from_buffers(
        &mut self,
        name: &str,
        vertices: &[T],
        ids: &[TriangleId],
        start_tri: usize,
        start_id: usize,
        count: usize,
    ) -> Result<()> {
        let facets = Facet::from_buffers(vertices, ids, start_tri, start_id, count)?;
        self.init_triangles(name, &facets)
    }

    /// [`add_triangles`](Self::add_triangles) from flat buffers.
    pub fn add_triangles_from_buffers(
        &mut self,
        name: &str,
        vertices: &[T],
        ids: &[TriangleId],
        start_tri: usize,
        start_id: usize,
        count: usize,
    ) -> Result<AddReport> {
        let facets = Facet::from_buffers(vertices, ids, start_tri, start_id, count)?;
        self.add_triangles(name, &facets)
    }

    /// Rebuild dirty leaves at or below `name`. Returns how many were rebuilt.
    pub fn rebuild_polygons(&mut self, name: &str) -> Result<usize> {
        let id = self.resolve(name)?;
        Ok(self.rebuild_leaves(self.leaves_under(id)))
    }

    /// Rebuild every dirty leaf of the tree.
    pub fn rebuild_all(&mut self) -> usize {
        let leaves: Vec<GroupId> = self.groups.iter().filter(|g| g.is_leaf()).map(|g| g.id).collect();
        self.rebuild_leaves(leaves)
    }

    fn rebuild_leaves(&mut self, leaves: Vec<GroupId>) -> usize {
        let mut rebuilt = 0;
        for leaf in leaves {
            let group = &mut self.groups[leaf.0];
            if let Some(mesh) = group.mesh.as_mut() {
                if mesh.rebuild() {
                    rebuilt += 1;
                }
                group.state = GroupState::Built;
            }
        }
        rebuilt
    }

    /// Scale the geometry of every leaf at or below `name`.
    pub fn rescale_group(&mut self, name: &str, factor: T) -> Result<()> {
        let id = self.resolve(name)?;
        for leaf in self.leaves_under(id) {
            let group = &mut self.groups[leaf.0];
            if let Some(mesh) = group.mesh.as_mut() {
                mesh.rescale(factor)?;
                group.state = GroupState::Built;
            }
        }
        Ok(())
    }

    /// Tag `name`, its descendants and all their triangles with `external_id`.
    pub fn set_all_external_ids(&mut self, name: &str, external_id: i32) -> Result<()> {
        let id = self.resolve(name)?;
        for gid in self.descendants(id) {
            let group = &mut self.groups[gid.0];
            group.external_id = Some(external_id);
            if let Some(mesh) = group.mesh.as_mut() {
                mesh.set_all_external_ids(external_id);
            }
        }
        Ok(())
    }

    /// Run one motion step on every movable leaf, then rebuild it.
    ///
    /// With a leap grid in `params`, vertices whose previous position is
    /// more than one cell away from their new cell are logged and reported.
    pub fn move_groups(&mut self, params: &MoveParams<T>) -> Result<MoveReport<T>> {
        let mut report = MoveReport {
            moved: Vec::new(),
            leaped: Vec::new(),
        };

        for group in self.groups.iter_mut() {
            if !group.movable || !group.is_leaf() {
                continue;
            }
            let Some(mesh) = group.mesh.as_mut() else {
                continue;
            };

            let before = params.leap_grid.as_ref().map(|_| mesh.corner_snapshot());
            group
                .behavior
                .move_geometry(mesh, params)
                .inspect_err(|e| error!(group = %group.full_path, "Move failed: {}", e))?;
            mesh.rebuild();
            group.state = GroupState::Built;
            report.moved.push(group.id);

            let (Some(grid), Some(before)) = (params.leap_grid.as_ref(), before) else {
                continue;
            };
            for (tri, old) in mesh.triangles().iter().zip(before) {
                let new = tri.vertex_indices().map(|v| mesh.registry().position(v));
                for k in 0..3 {
                    if grid.is_far(&old[k], &new[k]) {
                        warn!(
                            group = %group.full_path,
                            triangle = tri.id(),
                            "Vertex leaped more than one cell: {:?} -> {:?}",
                            old[k],
                            new[k]
                        );
                        report.leaped.push(LeapedVertex {
                            group: group.full_path.clone(),
                            triangle: tri.id(),
                            before: old[k],
                            after: new[k],
                        });
                    }
                }
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Configuration tree describing the current groups.
    pub fn to_config(&self) -> Result<ConfigNode> {
        let mut root = ConfigNode::new(ROOT_NAME);
        root.set_leaf(keys::TOLERANCE, self.default_tolerance.to_string());
        for id in self.roots() {
            root.add_child(self.config_subtree(id, None)?);
        }
        Ok(root)
    }

    /// With `written`, leaf file lists are replaced by the files just saved;
    /// leaves that wrote nothing lose theirs.
    fn config_subtree(
        &self,
        id: GroupId,
        written: Option<&AHashMap<GroupId, PathBuf>>,
    ) -> Result<ConfigNode> {
        let group = &self.groups[id.0];
        let mut node = group.to_config()?;
        if let Some(written) = written {
            match written.get(&id) {
                Some(file) => {
                    node.set_indexed_leaves(keys::FILEPATH, &[file.display().to_string()])
                }
                None => node.remove_leaves(keys::FILEPATH),
            }
        }
        for &child in &group.children {
            node.add_child(self.config_subtree(child, written)?);
        }
        Ok(node)
    }

    /// Write every non-empty leaf to `out_dir` and a configuration that
    /// reloads them. Returns the configuration path.
    ///
    /// Mesh files are named after the group path with `/` replaced by `_`,
    /// followed by `_<extend>`; `extend` defaults to a local timestamp.
    pub fn save(&self, out_dir: &Path, format: MeshFormat, extend: Option<&str>) -> Result<PathBuf> {
        let extend = extend
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Local::now().format("%Y%m%d%H%M%S").to_string());
        std::fs::create_dir_all(out_dir)?;

        let mut written = AHashMap::new();
        for group in self.groups.iter().filter(|g| g.is_leaf()) {
            let Some(mesh) = group.mesh.as_ref().filter(|m| !m.is_empty()) else {
                continue;
            };
            let file_name = format!(
                "{}_{}.{}",
                group.full_path.replace('/', "_"),
                extend,
                format.extension()
            );
            io::save_mesh(mesh, &out_dir.join(&file_name), format).inspect_err(|e| {
                error!(group = %group.full_path, file = %file_name, "Failed to save: {}", e);
            })?;
            written.insert(group.id, PathBuf::from(file_name));
        }

        let mut root = ConfigNode::new(ROOT_NAME);
        root.set_leaf(keys::TOLERANCE, self.default_tolerance.to_string());
        for id in self.roots() {
            root.add_child(self.config_subtree(id, Some(&written))?);
        }
        let config_path = out_dir.join(format!("meshgroup_config_{}.toml", extend));
        root.save(&config_path)?;

        info!(
            dir = %out_dir.display(),
            meshes = written.len(),
            config = %config_path.display(),
            "Saved group tree"
        );
        Ok(config_path)
    }

    // ------------------------------------------------------------------
    // Reporting
    // ------------------------------------------------------------------

    pub fn total_triangle_count(&self) -> usize {
        self.groups.iter().map(Group::triangle_count).sum()
    }

    /// Indented dump of the hierarchy.
    pub fn show_group_hierarchy(&self) -> String {
        let mut out = String::new();
        for id in self.roots() {
            self.hierarchy_lines(id, 0, &mut out);
        }
        out
    }

    fn hierarchy_lines(&self, id: GroupId, depth: usize, out: &mut String) {
        let group = &self.groups[id.0];
        let mut line = format!("{}{} [{}]", "  ".repeat(depth), group.name, group.class_name());
        if !group.files.is_empty() {
            line.push_str(&format!(" files={}", group.file_names()));
        }
        if let Some(id) = group.external_id {
            line.push_str(&format!(" id={}", id));
        }
        if let Some(label) = &group.label {
            line.push_str(&format!(" label={}", label));
        }
        if let Some(kind) = &group.kind {
            line.push_str(&format!(" type={}", kind));
        }
        if group.movable {
            line.push_str(" movable");
        }
        if let Some(mesh) = &group.mesh {
            line.push_str(&format!(" triangles={}", mesh.triangle_count()));
        }
        out.push_str(&line);
        out.push('\n');
        for &child in &group.children {
            self.hierarchy_lines(child, depth + 1, out);
        }
    }

    /// Detailed description of one group.
    pub fn group_info(&self, name: &str) -> Result<String> {
        Ok(self.group(name)?.info())
    }

    /// Approximate footprint of the tree and every mesh, in bytes.
    pub fn used_memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.groups.capacity() * std::mem::size_of::<Group<T>>()
            + self
                .groups
                .iter()
                .filter_map(|g| g.mesh.as_ref().map(Mesh::memory_size))
                .sum::<usize>()
            + self
                .paths
                .keys()
                .map(|k| k.capacity() + std::mem::size_of::<(String, GroupId)>())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::behavior::{TranslatingGroup, TRANSLATING_CLASS};

    fn tri(x: f64, id: TriangleId) -> Facet<f64> {
        Facet::new(
            [
                Point3::new(x, 0.0, 0.0),
                Point3::new(x + 1.0, 0.0, 0.0),
                Point3::new(x, 1.0, 0.0),
            ],
            id,
        )
    }

    fn sample_tree() -> GroupTree<f64> {
        let mut tree = GroupTree::new();
        let car = tree
            .attach(GroupSpec::new("car").class(TRANSLATING_CLASS), None)
            .unwrap();
        tree.attach(GroupSpec::new("body").movable(true), Some(car))
            .unwrap();
        tree.attach(GroupSpec::new("ground").tolerance(1e-6), None)
            .unwrap();
        tree
    }

    #[test]
    fn test_paths_ids_and_roots() {
        let tree = sample_tree();
        assert_eq!(tree.len(), 3);
        let body = tree.group("car/body").unwrap();
        assert_eq!(body.full_path(), "car/body");
        assert_eq!(body.id(), GroupId(1));
        assert_eq!(tree.find("body"), Some(GroupId(1)));
        assert_eq!(tree.roots(), vec![GroupId(0), GroupId(2)]);
        assert!(tree.group("nope").unwrap_err().is_not_found());
        assert_eq!(tree.get(GroupId(2)).unwrap().name(), "ground");
    }

    #[test]
    fn test_tolerance_inherited() {
        let mut tree = GroupTree::<f64>::new();
        let a = tree.attach(GroupSpec::new("a").tolerance(0.25), None).unwrap();
        let b = tree.attach(GroupSpec::new("b"), Some(a)).unwrap();
        assert_eq!(tree.get(b).unwrap().tolerance(), 0.25);
        let c = tree.attach(GroupSpec::new("c"), None).unwrap();
        assert_eq!(tree.get(c).unwrap().tolerance(), DEFAULT_TOLERANCE);
    }

    #[test]
    fn test_duplicate_and_empty_names() {
        let mut tree = sample_tree();
        let car = tree.resolve("car").unwrap();
        let err = tree.attach(GroupSpec::new("body"), Some(car)).unwrap_err();
        assert!(matches!(err, Error::DuplicateGroup { .. }));
        assert_eq!(tree.len(), 3);

        // same name under a different parent is fine
        tree.attach(GroupSpec::new("body"), None).unwrap();
        assert!(matches!(
            tree.attach(GroupSpec::new(""), None),
            Err(Error::EmptyGroupName { .. })
        ));
        assert!(matches!(
            tree.attach(GroupSpec::new("x").class("Nope"), None),
            Err(Error::UnknownClass(_))
        ));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_fan_out_search_in_creation_order() {
        let mut tree = sample_tree();
        tree.init_triangles("ground", &[tri(5.0, 0)]).unwrap();
        tree.init_triangles("car/body", &[tri(0.0, 0), tri(2.0, 1)]).unwrap();

        let hits = tree
            .search_polygons("car", Point3::new(-1.0, -1.0, -1.0), Point3::new(10.0, 2.0, 1.0), false)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.group == GroupId(1)));

        let mut tree_all = GroupTree::<f64>::new();
        let root = tree_all.attach(GroupSpec::new("all"), None).unwrap();
        let b = tree_all.attach(GroupSpec::new("b"), Some(root)).unwrap();
        let a = tree_all.attach(GroupSpec::new("a"), Some(root)).unwrap();
        tree_all.init_triangles("all/a", &[tri(0.0, 0)]).unwrap();
        tree_all.init_triangles("all/b", &[tri(0.0, 0)]).unwrap();
        let hits = tree_all
            .search_polygons("all", Point3::new(-1.0, -1.0, -1.0), Point3::new(2.0, 2.0, 1.0), true)
            .unwrap();
        let groups: Vec<_> = hits.iter().map(|h| h.group).collect();
        assert_eq!(groups, vec![b, a]);
    }

    #[test]
    fn test_nearest_across_leaves() {
        let mut tree = sample_tree();
        tree.init_triangles("car/body", &[tri(0.0, 0)]).unwrap();
        tree.init_triangles("ground", &[tri(10.0, 0)]).unwrap();
        tree.attach(GroupSpec::new("world"), None).unwrap();
        // a leaf without geometry has nothing to offer
        assert!(tree
            .search_nearest_polygon("world", &Point3::origin())
            .unwrap()
            .is_none());

        let hit = tree
            .search_nearest_polygon("car", &Point3::new(9.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert_eq!(hit.group, GroupId(1));
    }

    #[test]
    fn test_parent_with_geometry_rejects_children() {
        let mut tree = sample_tree();
        tree.init_triangles("ground", &[tri(0.0, 0)]).unwrap();
        let ground = tree.resolve("ground").unwrap();
        assert!(matches!(
            tree.attach(GroupSpec::new("rock"), Some(ground)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            tree.init_triangles("car", &[tri(0.0, 0)]),
            Err(Error::NotALeaf(_))
        ));
    }

    #[test]
    fn test_add_then_rebuild_polygons() {
        let mut tree = sample_tree();
        tree.init_triangles("ground", &[tri(0.0, 0)]).unwrap();
        let report = tree.add_triangles("ground", &[tri(3.0, 1)]).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(tree.group("ground").unwrap().state(), GroupState::GeometryLoaded);
        assert_eq!(tree.rebuild_polygons("ground").unwrap(), 1);
        assert_eq!(tree.rebuild_all(), 0);
        assert_eq!(tree.group("ground").unwrap().state(), GroupState::Built);
    }

    #[test]
    fn test_move_only_movable_leaves() {
        let mut tree = GroupTree::<f64>::new();
        let car = tree
            .attach(GroupSpec::new("car").class(TRANSLATING_CLASS).movable(true), None)
            .unwrap();
        let still = tree.attach(GroupSpec::new("still"), None).unwrap();
        tree.init_triangles("car", &[tri(0.0, 0)]).unwrap();
        tree.init_triangles("still", &[tri(0.0, 0)]).unwrap();
        tree.get_mut(car).unwrap().behavior = Box::new(TranslatingGroup::new([1.0, 0.0, 0.0]));

        let report = tree.move_groups(&MoveParams::new(0, 1, 0.5)).unwrap();
        assert_eq!(report.moved, vec![car]);
        assert!(report.leaped.is_empty());
        assert_eq!(tree.get(car).unwrap().bounding_box().min.x, 0.5);
        assert_eq!(tree.get(still).unwrap().bounding_box().min.x, 0.0);
    }

    #[test]
    fn test_move_reports_leaped_vertices() {
        let mut tree = GroupTree::<f64>::new();
        let car = tree
            .attach(GroupSpec::new("car").class(TRANSLATING_CLASS).movable(true), None)
            .unwrap();
        tree.init_triangles("car", &[tri(0.0, 7)]).unwrap();
        tree.get_mut(car).unwrap().behavior = Box::new(TranslatingGroup::new([5.0, 0.0, 0.0]));

        let params = MoveParams::new(0, 1, 1.0)
            .with_leap_grid(Point3::origin(), nalgebra::Vector3::new(1.0, 1.0, 1.0));
        let report = tree.move_groups(&params).unwrap();
        assert_eq!(report.leaped.len(), 3);
        assert!(report.leaped.iter().all(|v| v.triangle == 7 && v.group == "car"));
    }

    #[test]
    fn test_hierarchy_and_memory() {
        let mut tree = sample_tree();
        tree.init_triangles("car/body", &[tri(0.0, 0)]).unwrap();
        let dump = tree.show_group_hierarchy();
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("car [TranslatingGroup]"));
        assert!(lines[1].starts_with("  body [BaseGroup]"));
        assert!(lines[1].contains("triangles=1"));
        assert!(tree.used_memory_size() > 0);
        assert!(tree.group_info("car/body").unwrap().contains("triangles    : 1"));
    }

    #[test]
    fn test_set_all_external_ids_covers_subtree() {
        let mut tree = sample_tree();
        tree.init_triangles("car/body", &[tri(0.0, 0)]).unwrap();
        tree.set_all_external_ids("car", 9).unwrap();
        let body = tree.group("car/body").unwrap();
        assert_eq!(body.external_id(), Some(9));
        assert!(body.mesh().unwrap().iter().all(|t| t.external_id() == 9));
        assert_eq!(tree.group("ground").unwrap().external_id(), None);
    }
}
