// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Group configuration tree.
//!
//! A configuration is a tree of named nodes, each carrying ordered key/value
//! leaves. On disk it is TOML: tables are nodes, scalar values are leaves.
//! Arrays of strings under `key` become the indexed leaves `key[0]`,
//! `key[1]`, ..., arrays of other scalars become one comma-joined leaf.
//!
//! ```toml
//! tolerance = 1e-8
//!
//! [car]
//! class_name = "TranslatingGroup"
//! movable = true
//! velocity = [1.0, 0.0, 0.0]
//!
//! [car.body]
//! filepath = ["body.stl", "doors.stlb"]
//! ```

use crate::error::{Error, Result};
use std::path::Path;
use toml::{Table, Value};

/// Recognised leaf keys.
pub mod keys {
    pub const CLASS_NAME: &str = "class_name";
    pub const TOLERANCE: &str = "tolerance";
    pub const MOVABLE: &str = "movable";
    pub const ID: &str = "id";
    pub const LABEL: &str = "label";
    pub const TYPE: &str = "type";
    pub const FILEPATH: &str = "filepath";
}

/// Name given to the document root.
pub const ROOT_NAME: &str = "root";

/// One node of the configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigNode {
    name: String,
    leaves: Vec<(String, String)>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            leaves: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leaves(&self) -> &[(String, String)] {
        &self.leaves
    }

    pub fn leaf(&self, key: &str) -> Option<&str> {
        self.leaves
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the value of `key` or append it.
    pub fn set_leaf(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.leaves.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.leaves.push((key, value)),
        }
    }

    pub fn with_leaf(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_leaf(key, value);
        self
    }

    /// Remove `key` and every indexed form `key[i]`.
    pub fn remove_leaves(&mut self, key: &str) {
        self.leaves
            .retain(|(k, _)| k != key && !is_indexed_form(k, key));
    }

    /// Values of `key`: the single leaf when present, otherwise `key[0]`,
    /// `key[1]`, ... up to the first missing index.
    pub fn indexed_leaves(&self, key: &str) -> Vec<&str> {
        if let Some(value) = self.leaf(key) {
            return vec![value];
        }
        let mut values = Vec::new();
        while let Some(value) = self.leaf(&format!("{}[{}]", key, values.len())) {
            values.push(value);
        }
        values
    }

    /// Write `values` as `key[0]`, `key[1]`, ... after clearing old entries.
    pub fn set_indexed_leaves<S: AsRef<str>>(&mut self, key: &str, values: &[S]) {
        self.remove_leaves(key);
        for (i, value) in values.iter().enumerate() {
            self.leaves
                .push((format!("{}[{}]", key, i), value.as_ref().to_string()));
        }
    }

    pub fn children(&self) -> &[ConfigNode] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&ConfigNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn add_child(&mut self, child: ConfigNode) -> &mut ConfigNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Parse a TOML document; its top-level tables become root children.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: Table = text.parse()?;
        Self::from_table(ROOT_NAME, &table)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    fn from_table(name: &str, table: &Table) -> Result<Self> {
        let mut node = ConfigNode::new(name);
        for (key, value) in table {
            match value {
                Value::Table(child) => {
                    node.children.push(Self::from_table(key, child)?);
                }
                Value::Array(items) if items.iter().all(Value::is_str) => {
                    let values: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                    node.set_indexed_leaves(key, &values);
                }
                Value::Array(items) => {
                    let parts = items
                        .iter()
                        .map(|item| scalar_text(key, item))
                        .collect::<Result<Vec<_>>>()?;
                    node.leaves.push((key.clone(), parts.join(", ")));
                }
                other => node.leaves.push((key.clone(), scalar_text(key, other)?)),
            }
        }
        Ok(node)
    }

    fn to_table(&self) -> Table {
        let mut table = Table::new();
        for (key, value) in &self.leaves {
            table.insert(key.clone(), Value::String(value.clone()));
        }
        for child in &self.children {
            table.insert(child.name.clone(), Value::Table(child.to_table()));
        }
        table
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(&self.to_table())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_toml_string()?).map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn is_indexed_form(candidate: &str, key: &str) -> bool {
    candidate
        .strip_prefix(key)
        .and_then(|rest| rest.strip_prefix('['))
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|index| index.parse::<usize>().is_ok())
}

fn scalar_text(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(d) => Ok(d.to_string()),
        Value::Array(_) | Value::Table(_) => Err(Error::Config(format!(
            "`{}`: nested arrays and arrays of tables are not supported",
            key
        ))),
    }
}

/// Interpret a boolean leaf: `true/false`, `yes/no`, `on/off`, `1/0`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse `"x, y, z"` (commas or whitespace) into three numbers.
pub fn parse_triple(value: &str) -> Option<[f64; 3]> {
    let parts: Vec<f64> = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, z] => Some([*x, *y, *z]),
        _ => None,
    }
}
