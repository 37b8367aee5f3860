// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Owned vertex value

use super::Real;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A point in 3-D space, identified by its slot in a vertex registry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Real")]
pub struct Vertex<T: Real> {
    pub position: Point3<T>,
}

impl<T: Real> Vertex<T> {
    pub fn new(position: Point3<T>) -> Self {
        Self { position }
    }

    pub fn from_coords(x: T, y: T, z: T) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    pub fn x(&self) -> T {
        self.position.x
    }

    pub fn y(&self) -> T {
        self.position.y
    }

    pub fn z(&self) -> T {
        self.position.z
    }

    pub fn distance_squared(&self, other: &Point3<T>) -> T {
        (self.position - other).norm_squared()
    }

    pub fn translate(&mut self, offset: &Vector3<T>) {
        self.position += offset;
    }

    pub fn scale(&mut self, factor: T) {
        self.position *= factor;
    }
}

impl<T: Real> From<Point3<T>> for Vertex<T> {
    fn from(position: Point3<T>) -> Self {
        Self::new(position)
    }
}

impl<T: Real> Index<usize> for Vertex<T> {
    type Output = T;

    fn index(&self, axis: usize) -> &T {
        &self.position[axis]
    }
}

impl<T: Real> IndexMut<usize> for Vertex<T> {
    fn index_mut(&mut self, axis: usize) -> &mut T {
        &mut self.position[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexed_access() {
        let mut v = Vertex::from_coords(1.0f32, 2.0, 3.0);
        assert_eq!(v[0], 1.0);
        assert_eq!(v[2], 3.0);
        v[1] = 5.0;
        assert_eq!(v.y(), 5.0);
    }

    #[test]
    fn test_translate_and_scale() {
        let mut v = Vertex::from_coords(1.0f64, 1.0, 1.0);
        v.translate(&Vector3::new(1.0, 0.0, -1.0));
        v.scale(2.0);
        assert_eq!(v.position, Point3::new(4.0, 2.0, 0.0));
        assert_eq!(v.distance_squared(&Point3::new(4.0, 2.0, 1.0)), 1.0);
    }
}
