// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-class group behaviour: motion, custom attributes and parameter
//! emission.

use crate::config::{parse_triple, ConfigNode};
use crate::error::{Error, Result};
use crate::geometry::{Mesh, Real, TriangleId};
use nalgebra::{Point3, Vector3};
use std::fmt;

/// Class name of the default behaviour.
pub const BASE_CLASS: &str = "BaseGroup";

/// Class name of [`TranslatingGroup`].
pub const TRANSLATING_CLASS: &str = "TranslatingGroup";

/// Arguments of one motion step.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveParams<T: Real> {
    pub current_step: i32,
    pub next_step: i32,
    pub delta_t: f64,
    /// When set, vertices are checked against this grid after the move.
    pub leap_grid: Option<LeapGrid<T>>,
}

impl<T: Real> MoveParams<T> {
    pub fn new(current_step: i32, next_step: i32, delta_t: f64) -> Self {
        Self {
            current_step,
            next_step,
            delta_t,
            leap_grid: None,
        }
    }

    pub fn with_leap_grid(mut self, origin: Point3<T>, cell_size: Vector3<T>) -> Self {
        self.leap_grid = Some(LeapGrid { origin, cell_size });
        self
    }

    /// Elapsed simulated time between the two steps.
    pub fn elapsed(&self) -> f64 {
        f64::from(self.next_step - self.current_step) * self.delta_t
    }
}

/// Background grid used to detect vertices that jumped more than one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeapGrid<T: Real> {
    pub origin: Point3<T>,
    pub cell_size: Vector3<T>,
}

impl<T: Real> LeapGrid<T> {
    /// True when `before` lies outside the cell holding `after` grown by one
    /// cell on each side, on any axis.
    pub fn is_far(&self, before: &Point3<T>, after: &Point3<T>) -> bool {
        (0..3).any(|axis| {
            let cell = self.cell_size[axis].widen();
            if cell <= 0.0 {
                return false;
            }
            let origin = self.origin[axis].widen();
            let lower = origin + ((after[axis].widen() - origin) / cell).floor() * cell;
            let old = before[axis].widen();
            old < lower - cell || old > lower + 2.0 * cell
        })
    }
}

/// A vertex that moved farther than the leap grid allows.
#[derive(Debug, Clone, PartialEq)]
pub struct LeapedVertex<T: Real> {
    pub group: String,
    pub triangle: TriangleId,
    pub before: Point3<T>,
    pub after: Point3<T>,
}

/// Behaviour a group class plugs into the tree.
pub trait GroupBehavior<T: Real>: fmt::Debug + Send + Sync {
    /// Class name this behaviour was registered under.
    fn class_name(&self) -> &str;

    /// Whether the `movable` attribute is honoured.
    fn supports_movable(&self) -> bool {
        true
    }

    /// Read class-specific attributes from the group's configuration node.
    fn configure(&mut self, _group: &str, _node: &ConfigNode) -> Result<()> {
        Ok(())
    }

    /// Displace the leaf's geometry for one step. The tree rebuilds the mesh
    /// afterwards.
    fn move_geometry(&mut self, _mesh: &mut Mesh<T>, _params: &MoveParams<T>) -> Result<()> {
        Ok(())
    }

    /// Write class-specific parameters into the node saved for this group.
    fn emit_params(&self, _node: &mut ConfigNode) -> Result<()> {
        Ok(())
    }
}

/// Default behaviour: static geometry.
#[derive(Debug, Clone, Default)]
pub struct BaseGroup;

impl<T: Real> GroupBehavior<T> for BaseGroup {
    fn class_name(&self) -> &str {
        BASE_CLASS
    }

    fn supports_movable(&self) -> bool {
        false
    }
}

/// Rigid translation at constant velocity.
#[derive(Debug, Clone, Default)]
pub struct TranslatingGroup {
    velocity: [f64; 3],
}

impl TranslatingGroup {
    pub const VELOCITY: &'static str = "velocity";

    pub fn new(velocity: [f64; 3]) -> Self {
        Self { velocity }
    }

    pub fn velocity(&self) -> [f64; 3] {
        self.velocity
    }
}

impl<T: Real> GroupBehavior<T> for TranslatingGroup {
    fn class_name(&self) -> &str {
        TRANSLATING_CLASS
    }

    fn configure(&mut self, group: &str, node: &ConfigNode) -> Result<()> {
        if let Some(value) = node.leaf(Self::VELOCITY) {
            self.velocity = parse_triple(value).ok_or_else(|| Error::Attribute {
                group: group.to_string(),
                key: Self::VELOCITY.to_string(),
                value: value.to_string(),
            })?;
        }
        Ok(())
    }

    fn move_geometry(&mut self, mesh: &mut Mesh<T>, params: &MoveParams<T>) -> Result<()> {
        let elapsed = params.elapsed();
        let offset = Vector3::new(
            T::narrow(self.velocity[0] * elapsed),
            T::narrow(self.velocity[1] * elapsed),
            T::narrow(self.velocity[2] * elapsed),
        );
        mesh.translate(&offset);
        Ok(())
    }

    fn emit_params(&self, node: &mut ConfigNode) -> Result<()> {
        let [x, y, z] = self.velocity;
        node.set_leaf(Self::VELOCITY, format!("{}, {}, {}", x, y, z));
        Ok(())
    }
}
