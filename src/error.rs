// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types shared by the mesh, codec and group layers.
//!
//! Geometric degeneracies (zero-area triangles, colliding mesh-local ids,
//! leaped vertices) are not errors: they are logged and reported back in the
//! operation's report value.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by configuration, file I/O, lookups and argument checks.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed configuration document.
    #[error("configuration error: {0}")]
    Config(String),

    /// A recognised attribute carries a value that cannot be interpreted.
    #[error("group `{group}`: invalid value `{value}` for attribute `{key}`")]
    Attribute {
        group: String,
        key: String,
        value: String,
    },

    /// No behaviour is registered under this class name.
    #[error("unknown group class `{0}`")]
    UnknownClass(String),

    /// A group was declared without a name.
    #[error("group name is empty (parent path `{parent_path}`)")]
    EmptyGroupName { parent_path: String },

    /// Another group with the same name already hangs off the same parent.
    #[error("duplicate group `{name}` under `{parent_path}`")]
    DuplicateGroup { name: String, parent_path: String },

    /// Lookup miss by path, bare name or internal id.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// The operation needs geometry but the group is an interior node.
    #[error("group `{0}` does not own a mesh")]
    NotALeaf(String),

    /// The file extension maps to no known mesh dialect.
    #[error("unknown mesh file format: {}", path.display())]
    UnknownFormat { path: PathBuf },

    /// A mesh file could not be opened or created.
    #[error("cannot open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mesh file was opened but its content is not valid for the dialect.
    #[error("malformed mesh file {}: {reason}", path.display())]
    MalformedMesh { path: PathBuf, reason: String },

    /// The binary dialect stores external ids in 16 bits.
    #[error("triangle {triangle}: external id {external_id} does not fit the 16-bit field")]
    ExternalIdOutOfRange { triangle: u32, external_id: i32 },

    /// A caller-supplied argument violates the operation's contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

impl Error {
    /// Shorthand for [`Error::MalformedMesh`].
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedMesh {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the lookup-miss family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::GroupNotFound(_))
    }
}
