// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding volume tree over indexed items.
//!
//! Items are triangles (box of three corners, anchored at the centroid) or
//! vertices (degenerate box at the point itself). The same tree answers range
//! queries in two inclusion modes and nearest-anchor queries. The exhaustive
//! [`linear_search`] and [`linear_nearest`] return exactly the same answers and
//! back the cross-check tests.

use super::{BoundingBox, Real};
use nalgebra::Point3;
use std::cmp::Ordering;

/// Items per leaf before a node is split.
pub const DEFAULT_LEAF_CAPACITY: usize = 15;

const MAX_DEPTH: usize = 48;

/// One indexed item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry<T: Real> {
    /// Caller-side index of the item.
    pub item: usize,
    /// Box over all defining points.
    pub bbox: BoundingBox<T>,
    /// Representative point used by nearest queries.
    pub anchor: Point3<T>,
}

impl<T: Real> SpatialEntry<T> {
    pub fn point(item: usize, position: Point3<T>) -> Self {
        Self {
            item,
            bbox: BoundingBox::from_point(position),
            anchor: position,
        }
    }

    pub fn triangle(item: usize, corners: &[Point3<T>; 3]) -> Self {
        Self {
            item,
            bbox: BoundingBox::from_points(corners.iter()),
            anchor: super::triangle::centroid(corners),
        }
    }

    /// Inclusion predicate shared by the tree and the linear scan.
    ///
    /// With `every` the whole box must sit inside `query`, which for an
    /// axis-aligned query is the same as every defining point being inside.
    /// Otherwise any overlap, touching included, is enough.
    #[inline]
    pub fn matches(&self, query: &BoundingBox<T>, every: bool) -> bool {
        if every {
            query.contains_box(&self.bbox)
        } else {
            query.intersects(&self.bbox)
        }
    }
}

#[derive(Debug, Clone)]
struct SpatialNode<T: Real> {
    /// Union of the item boxes below this node.
    bbox: BoundingBox<T>,
    /// Union of the anchors below this node, used to prune nearest queries.
    anchor_bounds: BoundingBox<T>,
    left: Option<Box<SpatialNode<T>>>,
    right: Option<Box<SpatialNode<T>>>,
    /// Items (leaf nodes only).
    entries: Vec<SpatialEntry<T>>,
}

impl<T: Real> SpatialNode<T> {
    fn leaf(entries: Vec<SpatialEntry<T>>) -> Self {
        let (bbox, anchor_bounds) = bounds_of(&entries);
        Self {
            bbox,
            anchor_bounds,
            left: None,
            right: None,
            entries,
        }
    }

    fn internal(left: Box<SpatialNode<T>>, right: Box<SpatialNode<T>>) -> Self {
        Self {
            bbox: left.bbox.union(&right.bbox),
            anchor_bounds: left.anchor_bounds.union(&right.anchor_bounds),
            left: Some(left),
            right: Some(right),
            entries: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn children(&self) -> impl Iterator<Item = &SpatialNode<T>> {
        self.left.iter().chain(self.right.iter()).map(|child| &**child)
    }
}

fn bounds_of<T: Real>(entries: &[SpatialEntry<T>]) -> (BoundingBox<T>, BoundingBox<T>) {
    let mut bbox = BoundingBox::empty();
    let mut anchors = BoundingBox::empty();
    for entry in entries {
        bbox.merge(&entry.bbox);
        anchors.expand_to_include(&entry.anchor);
    }
    (bbox, anchors)
}

/// Running best candidate of a nearest query.
#[derive(Debug, Clone, Copy)]
struct Best<T: Real> {
    item: usize,
    distance_squared: T,
}

impl<T: Real> Best<T> {
    /// Smaller distance wins; equal distances go to the smaller item index so
    /// traversal order never changes the answer.
    fn offer(best: &mut Option<Best<T>>, item: usize, distance_squared: T) {
        let better = match best {
            None => true,
            Some(current) => {
                distance_squared < current.distance_squared
                    || (distance_squared == current.distance_squared && item < current.item)
            }
        };
        if better {
            *best = Some(Best {
                item,
                distance_squared,
            });
        }
    }
}

/// Bounding volume tree with median splits along the longest axis.
#[derive(Debug, Clone)]
pub struct SpatialTree<T: Real> {
    root: SpatialNode<T>,
    len: usize,
    leaf_capacity: usize,
}

impl<T: Real> Default for SpatialTree<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Real> SpatialTree<T> {
    /// A valid tree with no items.
    pub fn empty() -> Self {
        Self {
            root: SpatialNode::leaf(Vec::new()),
            len: 0,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
        }
    }

    /// Build with the default leaf capacity.
    pub fn build(entries: Vec<SpatialEntry<T>>) -> Self {
        Self::build_with_capacity(entries, DEFAULT_LEAF_CAPACITY)
    }

    pub fn build_with_capacity(entries: Vec<SpatialEntry<T>>, leaf_capacity: usize) -> Self {
        let leaf_capacity = leaf_capacity.max(1);
        let len = entries.len();
        if entries.is_empty() {
            return Self {
                leaf_capacity,
                ..Self::empty()
            };
        }

        let root = Self::build_recursive(entries, leaf_capacity, 0);
        Self {
            root,
            len,
            leaf_capacity,
        }
    }

    fn build_recursive(
        mut entries: Vec<SpatialEntry<T>>,
        leaf_capacity: usize,
        depth: usize,
    ) -> SpatialNode<T> {
        if entries.len() <= leaf_capacity || depth >= MAX_DEPTH {
            return SpatialNode::leaf(entries);
        }

        // Split along the longest axis of the item box centres
        let mut centres = BoundingBox::empty();
        for entry in &entries {
            centres.expand_to_include(&entry.bbox.center());
        }
        let axis = centres.longest_axis();

        // Stable sort keeps equal keys in input order, so builds are reproducible
        entries.sort_by(|a, b| {
            let ca = a.bbox.center()[axis];
            let cb = b.bbox.center()[axis];
            ca.partial_cmp(&cb).unwrap_or(Ordering::Equal)
        });

        let right_entries = entries.split_off(entries.len() / 2);
        let left = Box::new(Self::build_recursive(entries, leaf_capacity, depth + 1));
        let right = Box::new(Self::build_recursive(right_entries, leaf_capacity, depth + 1));

        SpatialNode::internal(left, right)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn leaf_capacity(&self) -> usize {
        self.leaf_capacity
    }

    /// Union of all item boxes; empty for an empty tree.
    pub fn bounds(&self) -> BoundingBox<T> {
        self.root.bbox
    }

    /// Items matching `query` under the chosen inclusion mode, in traversal order.
    pub fn search(&self, query: &BoundingBox<T>, every: bool) -> Vec<usize> {
        let mut result = Vec::new();
        if !self.is_empty() {
            Self::search_recursive(&self.root, query, every, &mut result);
        }
        result
    }

    fn search_recursive(
        node: &SpatialNode<T>,
        query: &BoundingBox<T>,
        every: bool,
        result: &mut Vec<usize>,
    ) {
        // Both modes need the item box to touch the query box
        if !query.intersects(&node.bbox) {
            return;
        }

        if node.is_leaf() {
            // A fully enclosed leaf needs no per-item test
            if query.contains_box(&node.bbox) {
                result.extend(node.entries.iter().map(|entry| entry.item));
            } else {
                result.extend(
                    node.entries
                        .iter()
                        .filter(|entry| entry.matches(query, every))
                        .map(|entry| entry.item),
                );
            }
            return;
        }

        for child in node.children() {
            Self::search_recursive(child, query, every, result);
        }
    }

    /// Item whose anchor is closest to `point`, with its squared distance.
    pub fn nearest_with_distance(&self, point: &Point3<T>) -> Option<(usize, T)> {
        if self.is_empty() {
            return None;
        }
        let mut best = None;
        Self::nearest_recursive(&self.root, point, &mut best);
        best.map(|b| (b.item, b.distance_squared))
    }

    /// Item whose anchor is closest to `point`; `None` for an empty tree.
    pub fn nearest(&self, point: &Point3<T>) -> Option<usize> {
        self.nearest_with_distance(point).map(|(item, _)| item)
    }

    fn nearest_recursive(node: &SpatialNode<T>, point: &Point3<T>, best: &mut Option<Best<T>>) {
        if let Some(current) = best {
            // Equal bound is still explored: it may hold a tie with a smaller index
            if node.anchor_bounds.distance_squared(point) > current.distance_squared {
                return;
            }
        }

        if node.is_leaf() {
            for entry in &node.entries {
                let d2 = (entry.anchor - point).norm_squared();
                Best::offer(best, entry.item, d2);
            }
            return;
        }

        let (Some(left), Some(right)) = (&node.left, &node.right) else {
            return;
        };
        let dl = left.anchor_bounds.distance_squared(point);
        let dr = right.anchor_bounds.distance_squared(point);
        let (first, second) = if dr < dl { (right, left) } else { (left, right) };
        Self::nearest_recursive(first, point, best);
        Self::nearest_recursive(second, point, best);
    }

    /// Items whose anchor lies within `radius` of `point`, boundary included.
    pub fn within(&self, point: &Point3<T>, radius: T) -> Vec<usize> {
        let mut result = Vec::new();
        if !self.is_empty() {
            Self::within_recursive(&self.root, point, radius * radius, &mut result);
        }
        result
    }

    fn within_recursive(
        node: &SpatialNode<T>,
        point: &Point3<T>,
        radius_squared: T,
        result: &mut Vec<usize>,
    ) {
        if node.anchor_bounds.distance_squared(point) > radius_squared {
            return;
        }
        if node.is_leaf() {
            result.extend(
                node.entries
                    .iter()
                    .filter(|entry| (entry.anchor - point).norm_squared() <= radius_squared)
                    .map(|entry| entry.item),
            );
            return;
        }
        for child in node.children() {
            Self::within_recursive(child, point, radius_squared, result);
        }
    }

    pub fn node_count(&self) -> usize {
        fn count<T: Real>(node: &SpatialNode<T>) -> usize {
            1 + node.children().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    pub fn depth(&self) -> usize {
        fn depth<T: Real>(node: &SpatialNode<T>) -> usize {
            1 + node.children().map(depth).max().unwrap_or(0)
        }
        depth(&self.root)
    }

    /// Approximate heap footprint in bytes: nodes plus item storage.
    pub fn memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.node_count() * std::mem::size_of::<SpatialNode<T>>()
            + self.len * std::mem::size_of::<SpatialEntry<T>>()
    }
}

/// Exhaustive counterpart of [`SpatialTree::search`], in input order.
pub fn linear_search<T: Real>(
    entries: &[SpatialEntry<T>],
    query: &BoundingBox<T>,
    every: bool,
) -> Vec<usize> {
    entries
        .iter()
        .filter(|entry| entry.matches(query, every))
        .map(|entry| entry.item)
        .collect()
}

/// Exhaustive counterpart of [`SpatialTree::nearest`], same tie rule.
pub fn linear_nearest<T: Real>(entries: &[SpatialEntry<T>], point: &Point3<T>) -> Option<usize> {
    let mut best = None;
    for entry in entries {
        Best::offer(&mut best, entry.item, (entry.anchor - point).norm_squared());
    }
    best.map(|b| b.item)
}
