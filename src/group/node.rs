// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! A single group of the hierarchy and the attributes it is created from.

use super::behavior::{GroupBehavior, BASE_CLASS};
use crate::config::{keys, parse_bool, ConfigNode};
use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, Mesh, Real};
use std::fmt;
use std::path::PathBuf;

/// Internal id of a group: its slot in the owning tree, assigned in
/// creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) usize);

impl GroupId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle position of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Constructed, not yet linked into a tree.
    Unattached,
    /// Linked to its parent with attributes applied.
    Attributed,
    /// Leaf geometry present, triangle index possibly stale.
    GeometryLoaded,
    /// Triangle index reflects the geometry.
    Built,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unattached => "unattached",
            Self::Attributed => "attributed",
            Self::GeometryLoaded => "geometry loaded",
            Self::Built => "built",
        };
        f.write_str(name)
    }
}

/// Attributes a group is created with.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec<T: Real> {
    pub name: String,
    pub class_name: Option<String>,
    /// Inherited from the parent when `None`.
    pub tolerance: Option<T>,
    pub movable: bool,
    pub external_id: Option<i32>,
    pub label: Option<String>,
    pub kind: Option<String>,
    pub files: Vec<PathBuf>,
    /// Leaves the tree does not interpret, kept for saving.
    pub extra: Vec<(String, String)>,
}

impl<T: Real> GroupSpec<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: None,
            tolerance: None,
            movable: false,
            external_id: None,
            label: None,
            kind: None,
            files: Vec::new(),
            extra: Vec::new(),
        }
    }

    pub fn class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = Some(class_name.into());
        self
    }

    pub fn tolerance(mut self, tolerance: T) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn movable(mut self, movable: bool) -> Self {
        self.movable = movable;
        self
    }

    pub fn external_id(mut self, external_id: i32) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    /// Read the recognised keys of a configuration node.
    pub fn from_config(node: &ConfigNode) -> Result<Self> {
        let name = node.name();
        let invalid = |key: &str, value: &str| Error::Attribute {
            group: name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        };

        let mut spec = Self::new(name);
        for (key, value) in node.leaves() {
            match key.as_str() {
                keys::CLASS_NAME => spec.class_name = Some(value.clone()),
                keys::TOLERANCE => {
                    let tolerance = value
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|t| t.is_finite() && *t >= 0.0)
                        .ok_or_else(|| invalid(key, value))?;
                    spec.tolerance = Some(T::narrow(tolerance));
                }
                keys::MOVABLE => {
                    spec.movable = parse_bool(value).ok_or_else(|| invalid(key, value))?;
                }
                keys::ID => {
                    let id = value.trim().parse::<i32>().map_err(|_| invalid(key, value))?;
                    spec.external_id = Some(id);
                }
                keys::LABEL => spec.label = Some(value.clone()),
                keys::TYPE => spec.kind = Some(value.clone()),
                _ if key == keys::FILEPATH || key.starts_with("filepath[") => {}
                _ => spec.extra.push((key.clone(), value.clone())),
            }
        }
        spec.files = node
            .indexed_leaves(keys::FILEPATH)
            .into_iter()
            .map(PathBuf::from)
            .collect();
        Ok(spec)
    }
}

/// A node of the group hierarchy. Leaves own a mesh, interior groups own
/// only children.
#[derive(Debug)]
pub struct Group<T: Real> {
    pub(crate) id: GroupId,
    pub(crate) name: String,
    pub(crate) parent_path: String,
    pub(crate) full_path: String,
    pub(crate) parent: Option<GroupId>,
    pub(crate) children: Vec<GroupId>,
    pub(crate) mesh: Option<Mesh<T>>,
    pub(crate) files: Vec<PathBuf>,
    pub(crate) movable: bool,
    pub(crate) external_id: Option<i32>,
    pub(crate) label: Option<String>,
    pub(crate) kind: Option<String>,
    pub(crate) tolerance: T,
    pub(crate) extra: Vec<(String, String)>,
    pub(crate) behavior: Box<dyn GroupBehavior<T>>,
    pub(crate) state: GroupState,
}

impl<T: Real> Group<T> {
    /// Freshly constructed group, not yet part of any tree.
    pub(crate) fn new(id: GroupId, name: String, behavior: Box<dyn GroupBehavior<T>>, tolerance: T) -> Self {
        Self {
            id,
            full_path: name.clone(),
            name,
            parent_path: String::new(),
            parent: None,
            children: Vec::new(),
            mesh: None,
            files: Vec::new(),
            movable: false,
            external_id: None,
            label: None,
            kind: None,
            tolerance,
            extra: Vec::new(),
            behavior,
            state: GroupState::Unattached,
        }
    }

    /// Link under `parent` and apply `spec`.
    pub(crate) fn attach(&mut self, parent: Option<(GroupId, &str)>, spec: GroupSpec<T>) {
        if let Some((parent_id, parent_path)) = parent {
            self.parent = Some(parent_id);
            self.parent_path = parent_path.to_string();
            self.full_path = format!("{}/{}", parent_path, self.name);
        }
        self.movable = spec.movable && self.behavior.supports_movable();
        self.external_id = spec.external_id;
        self.label = spec.label;
        self.kind = spec.kind;
        self.files = spec.files;
        self.extra = spec.extra;
        self.state = GroupState::Attributed;
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_path(&self) -> &str {
        &self.parent_path
    }

    /// Parent path and name joined with `/`.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn parent(&self) -> Option<GroupId> {
        self.parent
    }

    pub fn children(&self) -> &[GroupId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn mesh(&self) -> Option<&Mesh<T>> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut Mesh<T>> {
        self.mesh.as_mut()
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Comma-separated source files.
    pub fn file_names(&self) -> String {
        self.files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_movable(&self) -> bool {
        self.movable
    }

    pub fn external_id(&self) -> Option<i32> {
        self.external_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn tolerance(&self) -> T {
        self.tolerance
    }

    pub fn extra_attributes(&self) -> &[(String, String)] {
        &self.extra
    }

    pub fn class_name(&self) -> &str {
        self.behavior.class_name()
    }

    pub fn behavior(&self) -> &dyn GroupBehavior<T> {
        self.behavior.as_ref()
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, Mesh::triangle_count)
    }

    pub fn area(&self) -> T {
        self.mesh
            .as_ref()
            .map_or(T::narrow(0.0), Mesh::total_area)
    }

    pub fn bounding_box(&self) -> BoundingBox<T> {
        self.mesh
            .as_ref()
            .map_or_else(BoundingBox::empty, Mesh::bounding_box)
    }

    /// Mesh of a leaf, created empty on first use.
    pub(crate) fn ensure_mesh(&mut self) -> &mut Mesh<T> {
        let tolerance = self.tolerance;
        self.mesh.get_or_insert_with(|| Mesh::new(tolerance))
    }

    /// Configuration node describing this group, without children.
    pub(crate) fn to_config(&self) -> Result<ConfigNode> {
        let mut node = ConfigNode::new(&self.name);
        node.set_leaf(keys::CLASS_NAME, self.class_name());
        node.set_leaf(keys::TOLERANCE, self.tolerance.to_string());
        if self.behavior.supports_movable() {
            node.set_leaf(keys::MOVABLE, self.movable.to_string());
        }
        if let Some(id) = self.external_id {
            node.set_leaf(keys::ID, id.to_string());
        }
        if let Some(label) = &self.label {
            node.set_leaf(keys::LABEL, label.as_str());
        }
        if let Some(kind) = &self.kind {
            node.set_leaf(keys::TYPE, kind.as_str());
        }
        for (key, value) in &self.extra {
            node.set_leaf(key.as_str(), value.as_str());
        }
        let files: Vec<String> = self.files.iter().map(|f| f.display().to_string()).collect();
        node.set_indexed_leaves(keys::FILEPATH, &files);
        self.behavior.emit_params(&mut node)?;
        Ok(node)
    }

    /// Multi-line description used by the tree's info dump.
    pub fn info(&self) -> String {
        let mut lines = vec![
            format!("group        : {}", self.full_path),
            format!("internal id  : {}", self.id),
            format!("class        : {}", self.class_name()),
            format!("state        : {}", self.state),
            format!("tolerance    : {}", self.tolerance),
            format!("movable      : {}", self.movable),
        ];
        if let Some(id) = self.external_id {
            lines.push(format!("id           : {}", id));
        }
        if let Some(label) = &self.label {
            lines.push(format!("label        : {}", label));
        }
        if let Some(kind) = &self.kind {
            lines.push(format!("type         : {}", kind));
        }
        if !self.files.is_empty() {
            lines.push(format!("files        : {}", self.file_names()));
        }
        if let Some(mesh) = &self.mesh {
            let bbox = mesh.bounding_box();
            lines.push(format!("triangles    : {}", mesh.triangle_count()));
            lines.push(format!("vertices     : {}", mesh.vertex_count()));
            lines.push(format!("area         : {}", mesh.total_area()));
            if !bbox.is_empty() {
                lines.push(format!(
                    "bounds       : ({}, {}, {}) - ({}, {}, {})",
                    bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z
                ));
            }
        } else {
            lines.push(format!("children     : {}", self.children.len()));
        }
        lines.join("\n")
    }
}
