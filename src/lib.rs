// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! meshgroup
//!
//! Named hierarchies of triangulated surfaces. Every leaf group owns a mesh
//! whose vertices are consolidated within a tolerance and whose triangles are
//! indexed by a bounding-box partition tree for range and nearest queries.
//! Geometry is read from and written to ASCII and binary STL, the hierarchy
//! from TOML configuration files.

pub mod config;
pub mod error;
pub mod geometry;
pub mod group;
pub mod io;

pub use config::ConfigNode;
pub use error::{Error, Result};
pub use geometry::{BoundingBox, Facet, Mesh, Real, SpatialTree, TriangleId, TriangleRef, VertexRegistry};
pub use group::{GroupBehavior, GroupFactory, GroupId, GroupSpec, GroupTree, MoveParams};
pub use io::MeshFormat;

use std::path::Path;

/// Build a group tree from a configuration file, loading all leaf geometry
/// with coordinates multiplied by `scale`.
pub fn load<T: Real>(config: impl AsRef<Path>, scale: T) -> Result<GroupTree<T>> {
    let mut tree = GroupTree::new();
    tree.load(config, scale)?;
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config() {
        let err = load::<f64>("does/not/exist.toml", 1.0).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
    }
}
