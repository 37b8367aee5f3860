// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Group hierarchy: behaviours, the class factory, group nodes and the
//! tree that owns them.

pub mod behavior;
mod factory;
mod node;
mod tree;

pub use behavior::{
    BaseGroup, GroupBehavior, LeapGrid, LeapedVertex, MoveParams, TranslatingGroup, BASE_CLASS,
    TRANSLATING_CLASS,
};
pub use factory::{GroupConstructor, GroupFactory};
pub use node::{Group, GroupId, GroupSpec, GroupState};
pub use tree::{GroupHit, GroupTree, MoveReport, DEFAULT_TOLERANCE};
