//! Immutable name-to-handler table.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use super::Method;

/// Errors raised while populating a [`MethodRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A handler was already registered under this name.
    #[error("method '{name}' is already registered")]
    Duplicate { name: String },
    /// Handlers cannot be registered under an empty name.
    #[error("method names must not be empty")]
    EmptyName,
}

/// Mapping from method name to handler, fixed once built.
///
/// The registry has no interior mutability, so sharing it behind an `Arc`
/// across client sessions needs no locking.
pub struct MethodRegistry {
    methods: HashMap<String, Box<dyn Method>>,
}

impl MethodRegistry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> MethodRegistryBuilder {
        MethodRegistryBuilder::default()
    }

    /// Looks up the handler registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&dyn Method> {
        self.methods.get(name).map(Box::as_ref)
    }

    /// Registered method names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered methods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Returns `true` when no methods are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}

/// Collects handlers before freezing them into a [`MethodRegistry`].
#[derive(Default)]
pub struct MethodRegistryBuilder {
    methods: HashMap<String, Box<dyn Method>>,
}

impl MethodRegistryBuilder {
    /// Registers `method` under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the name is taken and
    /// [`RegistryError::EmptyName`] for an empty name.
    pub fn register(
        mut self,
        name: impl Into<String>,
        method: impl Method + 'static,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.methods.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        self.methods.insert(name, Box::new(method));
        Ok(self)
    }

    /// Freezes the collected handlers.
    #[must_use]
    pub fn build(self) -> MethodRegistry {
        MethodRegistry {
            methods: self.methods,
        }
    }
}
