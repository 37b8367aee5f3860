// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - vertices, triangles, spatial index and meshes

mod bbox;
mod mesh;
mod real;
pub mod registry;
pub mod spatial;
mod triangle;
mod vertex;

pub use bbox::BoundingBox;
pub use mesh::{AddReport, Mesh, TriangleRef};
pub use real::{format_significant, Real};
pub use registry::{Consolidation, VertexRegistry};
pub use spatial::{SpatialEntry, SpatialTree, DEFAULT_LEAF_CAPACITY};
pub use triangle::{centroid, derive_normal_area, Facet, MeshTriangle, TriangleId};
pub use vertex::Vertex;
