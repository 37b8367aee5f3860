// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - mesh file dialects and the STL codec

mod format;
pub mod stl;

pub use format::MeshFormat;
pub use stl::{load_files, load_stl, save_stl};

use crate::error::Result;
use crate::geometry::{Mesh, Real, TriangleId};
use std::path::Path;

/// Load `path` (dialect from extension or content) into a freshly built mesh.
pub fn load_mesh<T: Real>(path: &Path, tolerance: T, id_base: TriangleId, scale: T) -> Result<Mesh<T>> {
    let format = MeshFormat::from_path(path)?;
    let facets = load_stl(path, format, id_base, scale)?;
    Ok(Mesh::from_facets(&facets, tolerance))
}

/// Write every triangle of `mesh` to `path`.
pub fn save_mesh<T: Real>(mesh: &Mesh<T>, path: &Path, format: MeshFormat) -> Result<()> {
    save_stl(path, format, &mesh.facets())
}
