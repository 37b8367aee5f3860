// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle values: the owned [`Facet`] used for exchange and the indexed
//! [`MeshTriangle`] stored inside a mesh.

use super::{BoundingBox, Real};
use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Mesh-local triangle id.
pub type TriangleId = u32;

/// Normal and area of the triangle `p0 p1 p2`.
///
/// The normal is `normalize((p1 - p0) x (p2 - p0))`. A degenerate triangle
/// has area zero and a zero normal.
pub fn derive_normal_area<T: Real>(points: &[Point3<T>; 3]) -> (Vector3<T>, T) {
    let cross = (points[1] - points[0]).cross(&(points[2] - points[0]));
    let length = cross.norm();
    if length > T::narrow(0.0) {
        (cross / length, length * T::narrow(0.5))
    } else {
        (Vector3::zeros(), T::narrow(0.0))
    }
}

/// Arithmetic mean of the three corners.
pub fn centroid<T: Real>(points: &[Point3<T>; 3]) -> Point3<T> {
    let third = T::narrow(1.0 / 3.0);
    Point3::from((points[0].coords + points[1].coords + points[2].coords) * third)
}

/// A self-contained triangle: three positions plus its tags.
///
/// This is what goes into [`Mesh::add`](super::Mesh::add), what the codec
/// produces, and what query results can be turned back into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Real")]
pub struct Facet<T: Real> {
    pub vertices: [Point3<T>; 3],
    pub normal: Vector3<T>,
    pub id: TriangleId,
    pub external_id: Option<i32>,
    pub state: i32,
}

impl<T: Real> Facet<T> {
    /// Facet with a normal derived from its winding.
    pub fn new(vertices: [Point3<T>; 3], id: TriangleId) -> Self {
        let (normal, _) = derive_normal_area(&vertices);
        Self {
            vertices,
            normal,
            id,
            external_id: None,
            state: 0,
        }
    }

    /// Facet carrying an externally supplied normal. The normal is
    /// unit-normalised; a zero or non-finite one is replaced by the derived
    /// normal.
    pub fn with_normal(vertices: [Point3<T>; 3], normal: Vector3<T>, id: TriangleId) -> Self {
        let mut facet = Self::new(vertices, id);
        let length = normal.norm();
        if length > T::narrow(0.0) && length.is_finite() {
            facet.normal = normal / length;
        }
        facet
    }

    pub fn with_external_id(mut self, external_id: i32) -> Self {
        self.external_id = Some(external_id);
        self
    }

    pub fn area(&self) -> T {
        derive_normal_area(&self.vertices).1
    }

    pub fn centroid(&self) -> Point3<T> {
        centroid(&self.vertices)
    }

    pub fn bounding_box(&self) -> BoundingBox<T> {
        BoundingBox::from_points(self.vertices.iter())
    }

    /// Decodes `count` facets from flat buffers.
    ///
    /// `vertices` holds nine scalars per triangle (three corners, xyz each);
    /// facet `i` reads `vertices[(start_tri + i) * 9..][..9]` and takes its id
    /// from `ids[start_id + i]`.
    pub fn from_buffers(
        vertices: &[T],
        ids: &[TriangleId],
        start_tri: usize,
        start_id: usize,
        count: usize,
    ) -> Result<Vec<Self>> {
        let coords_needed = (start_tri + count) * 9;
        if vertices.len() < coords_needed {
            return Err(Error::InvalidArgument(format!(
                "vertex buffer holds {} scalars, {} needed",
                vertices.len(),
                coords_needed
            )));
        }
        if ids.len() < start_id + count {
            return Err(Error::InvalidArgument(format!(
                "id buffer holds {} ids, {} needed",
                ids.len(),
                start_id + count
            )));
        }

        let facets = (0..count)
            .map(|i| {
                let c = &vertices[(start_tri + i) * 9..(start_tri + i + 1) * 9];
                let corners = [
                    Point3::new(c[0], c[1], c[2]),
                    Point3::new(c[3], c[4], c[5]),
                    Point3::new(c[6], c[7], c[8]),
                ];
                Self::new(corners, ids[start_id + i])
            })
            .collect();
        Ok(facets)
    }
}

/// A triangle stored in a mesh, referencing registry vertices by index.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTriangle<T: Real> {
    pub(crate) vertices: [usize; 3],
    pub(crate) normal: Vector3<T>,
    pub(crate) area: T,
    pub(crate) id: TriangleId,
    pub(crate) external_id: Option<i32>,
    pub(crate) state: i32,
}

impl<T: Real> MeshTriangle<T> {
    pub fn vertex_indices(&self) -> [usize; 3] {
        self.vertices
    }

    pub fn normal(&self) -> Vector3<T> {
        self.normal
    }

    pub fn area(&self) -> T {
        self.area
    }

    pub fn id(&self) -> TriangleId {
        self.id
    }

    /// External id, `0` when never set.
    pub fn external_id(&self) -> i32 {
        self.external_id.unwrap_or(0)
    }

    /// Distinguishes "never set" from "set to 0".
    pub fn has_external_id(&self) -> bool {
        self.external_id.is_some()
    }

    pub fn set_external_id(&mut self, external_id: i32) {
        self.external_id = Some(external_id);
    }

    pub fn state(&self) -> i32 {
        self.state
    }

    pub fn set_state(&mut self, state: i32) {
        self.state = state;
    }

    /// True when two references point at the same registry slot.
    pub fn has_repeated_vertex(&self) -> bool {
        let [a, b, c] = self.vertices;
        a == b || b == c || a == c
    }
}
