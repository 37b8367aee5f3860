// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Class-name registry for group behaviours

use super::behavior::{BaseGroup, GroupBehavior, TranslatingGroup, BASE_CLASS, TRANSLATING_CLASS};
use crate::error::{Error, Result};
use crate::geometry::Real;
use ahash::AHashMap;

/// Constructor stored per class name.
pub type GroupConstructor<T> = fn() -> Box<dyn GroupBehavior<T>>;

fn base_group<T: Real>() -> Box<dyn GroupBehavior<T>> {
    Box::new(BaseGroup)
}

fn translating_group<T: Real>() -> Box<dyn GroupBehavior<T>> {
    Box::<TranslatingGroup>::default()
}

/// Maps configuration class names to behaviour constructors.
pub struct GroupFactory<T: Real> {
    constructors: AHashMap<String, GroupConstructor<T>>,
}

impl<T: Real> GroupFactory<T> {
    /// Factory with no classes registered.
    pub fn empty() -> Self {
        Self {
            constructors: AHashMap::new(),
        }
    }

    /// Factory with the built-in classes.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        factory.register(BASE_CLASS, base_group::<T>);
        factory.register(TRANSLATING_CLASS, translating_group::<T>);
        factory
    }

    /// Register or replace a class.
    pub fn register(&mut self, class_name: impl Into<String>, constructor: GroupConstructor<T>) {
        self.constructors.insert(class_name.into(), constructor);
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.constructors.contains_key(class_name)
    }

    pub fn create(&self, class_name: &str) -> Result<Box<dyn GroupBehavior<T>>> {
        self.constructors
            .get(class_name)
            .map(|constructor| constructor())
            .ok_or_else(|| Error::UnknownClass(class_name.to_string()))
    }

    /// Registered class names, sorted.
    pub fn class_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl<T: Real> Default for GroupFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> std::fmt::Debug for GroupFactory<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupFactory")
            .field("classes", &self.class_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Marker;

    impl GroupBehavior<f64> for Marker {
        fn class_name(&self) -> &str {
            "Marker"
        }
    }

    #[test]
    fn test_builtin_classes() {
        let factory = GroupFactory::<f64>::new();
        assert_eq!(factory.class_names(), vec![BASE_CLASS, TRANSLATING_CLASS]);
        assert_eq!(factory.create(TRANSLATING_CLASS).unwrap().class_name(), TRANSLATING_CLASS);
    }

    #[test]
    fn test_unknown_class() {
        let factory = GroupFactory::<f64>::new();
        let err = factory.create("Spaceship").unwrap_err();
        assert!(matches!(err, Error::UnknownClass(name) if name == "Spaceship"));
    }

    #[test]
    fn test_register_custom_class() {
        let mut factory = GroupFactory::<f64>::empty();
        assert!(!factory.contains("Marker"));
        factory.register("Marker", || Box::new(Marker));
        assert_eq!(factory.create("Marker").unwrap().class_name(), "Marker");
    }
}
