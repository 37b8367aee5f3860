// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding box utilities

use super::Real;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Real")]
pub struct BoundingBox<T: Real> {
    pub min: Point3<T>,
    pub max: Point3<T>,
}

impl<T: Real> BoundingBox<T> {
    pub fn new(min: Point3<T>, max: Point3<T>) -> Self {
        Self { min, max }
    }

    /// Inverted box that contains nothing and absorbs the first point added.
    pub fn empty() -> Self {
        let inf = T::infinity();
        let neg = T::neg_infinity();
        Self {
            min: Point3::new(inf, inf, inf),
            max: Point3::new(neg, neg, neg),
        }
    }

    /// Box spanning two arbitrary corners, normalised so `min <= max`.
    pub fn from_corners(a: Point3<T>, b: Point3<T>) -> Self {
        let mut bbox = Self::empty();
        bbox.expand_to_include(&a);
        bbox.expand_to_include(&b);
        bbox
    }

    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3<T>>,
    {
        let mut bbox = Self::empty();
        for point in points {
            bbox.expand_to_include(point);
        }
        bbox
    }

    /// Degenerate box around a single point.
    pub fn from_point(point: Point3<T>) -> Self {
        Self::new(point, point)
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(&mut self, point: &Point3<T>) {
        for axis in 0..3 {
            if point[axis] < self.min[axis] {
                self.min[axis] = point[axis];
            }
            if point[axis] > self.max[axis] {
                self.max[axis] = point[axis];
            }
        }
    }

    pub fn merge(&mut self, other: &BoundingBox<T>) {
        if other.is_empty() {
            return;
        }
        self.expand_to_include(&other.min);
        self.expand_to_include(&other.max);
    }

    pub fn union(&self, other: &BoundingBox<T>) -> BoundingBox<T> {
        let mut bbox = *self;
        bbox.merge(other);
        bbox
    }

    pub fn center(&self) -> Point3<T> {
        let half = T::narrow(0.5);
        Point3::new(
            (self.min.x + self.max.x) * half,
            (self.min.y + self.max.y) * half,
            (self.min.z + self.max.z) * half,
        )
    }

    pub fn size(&self) -> Vector3<T> {
        if self.is_empty() {
            return Vector3::zeros();
        }
        self.max - self.min
    }

    /// Index of the longest axis (x wins ties, then y).
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    /// Inclusive point containment.
    pub fn contains_point(&self, point: &Point3<T>) -> bool {
        (0..3).all(|axis| point[axis] >= self.min[axis] && point[axis] <= self.max[axis])
    }

    /// True when `other` lies entirely inside this box, boundaries included.
    pub fn contains_box(&self, other: &BoundingBox<T>) -> bool {
        !other.is_empty() && self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Box-box overlap, inclusive of touching faces.
    pub fn intersects(&self, other: &BoundingBox<T>) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Squared distance from `point` to the closest point of the box; zero inside.
    pub fn distance_squared(&self, point: &Point3<T>) -> T {
        let zero = T::narrow(0.0);
        let mut sum = zero;
        for axis in 0..3 {
            let d = if point[axis] < self.min[axis] {
                self.min[axis] - point[axis]
            } else if point[axis] > self.max[axis] {
                point[axis] - self.max[axis]
            } else {
                zero
            };
            sum += d * d;
        }
        sum
    }

    /// Scales both corners about the origin, keeping `min <= max`.
    pub fn scaled(&self, factor: T) -> BoundingBox<T> {
        if self.is_empty() {
            return *self;
        }
        Self::from_corners(self.min * factor, self.max * factor)
    }

    /// Check if two bounding boxes are approximately equal within tolerance
    pub fn approx_eq(&self, other: &BoundingBox<T>, tolerance: T) -> bool {
        (0..3).all(|axis| {
            (self.min[axis] - other.min[axis]).magnitude() < tolerance
                && (self.max[axis] - other.max[axis]).magnitude() < tolerance
        })
    }
}

impl<T: Real> Default for BoundingBox<T> {
    fn default() -> Self {
        Self::empty()
    }
}
