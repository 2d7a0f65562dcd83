//! Per-class field declarations.
//!
//! A [`FieldRegistry`] records the input and output names a service class
//! declares, their optional type constraints, and whether writes to the
//! invocation context are restricted to those names. A subclass registry
//! holds a reference to its parent and reads the parent's declarations live,
//! so the effective set is always ancestors followed by own declarations.
//! Declarations only ever grow.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::context::WriteGate;
use crate::error::ServiceError;
use crate::type_check::TypeSpec;

/// Context keys that every class may write regardless of its declarations.
pub const BASE_KEYS: [&str; 4] = ["result", "data", "errors", "error_messages"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

/// One declared field.
#[derive(Debug, Clone)]
pub struct FieldDeclaration {
    pub name: String,
    pub role: Role,
    pub constraint: Option<TypeSpec>,
}

impl FieldDeclaration {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Input,
            constraint: None,
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: Role::Output,
            constraint: None,
        }
    }

    #[must_use]
    pub fn typed(mut self, constraint: impl Into<TypeSpec>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }
}

#[derive(Debug, Default)]
struct Declarations {
    inputs: IndexSet<String>,
    outputs: IndexSet<String>,
    constraints: IndexMap<String, TypeSpec>,
    /// `None` inherits from the parent (or defaults to restricted).
    restricted: Option<bool>,
}

/// Declared inputs, outputs and type constraints of one service class.
#[derive(Debug)]
pub struct FieldRegistry {
    class_name: String,
    parent: Option<Arc<FieldRegistry>>,
    own: RwLock<Declarations>,
}

impl FieldRegistry {
    #[must_use]
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            parent: None,
            own: RwLock::new(Declarations::default()),
        }
    }

    /// Creates an empty registry that inherits every declaration of `parent`.
    #[must_use]
    pub fn inheriting(class_name: impl Into<String>, parent: Arc<FieldRegistry>) -> Self {
        Self {
            class_name: class_name.into(),
            parent: Some(parent),
            own: RwLock::new(Declarations::default()),
        }
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Takes this class's declaration lock. Concurrent writers on the same
    /// class wait; other classes are unaffected.
    pub fn writer(&self) -> RegistryWriter<'_> {
        RegistryWriter {
            class_name: &self.class_name,
            own: self.own.write(),
        }
    }

    /// Declares a single field under the declaration lock.
    pub fn declare(&self, declaration: FieldDeclaration) {
        self.writer().declare(declaration);
    }

    /// Declared input names, ancestors first.
    #[must_use]
    pub fn inputs(&self) -> IndexSet<String> {
        let mut names = self.parent.as_ref().map(|p| p.inputs()).unwrap_or_default();
        names.extend(self.own.read().inputs.iter().cloned());
        names
    }

    /// Declared output names, ancestors first.
    #[must_use]
    pub fn outputs(&self) -> IndexSet<String> {
        let mut names = self.parent.as_ref().map(|p| p.outputs()).unwrap_or_default();
        names.extend(self.own.read().outputs.iter().cloned());
        names
    }

    /// Inputs followed by outputs, without duplicates.
    #[must_use]
    pub fn fields(&self) -> IndexSet<String> {
        let mut names = self.inputs();
        names.extend(self.outputs());
        names
    }

    /// The constraint for `name`; a subclass redeclaration shadows the ancestor's.
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<TypeSpec> {
        if let Some(spec) = self.own.read().constraints.get(name) {
            return Some(spec.clone());
        }
        self.parent.as_ref().and_then(|p| p.constraint(name))
    }

    /// Every declared constraint, ancestors first.
    #[must_use]
    pub fn constraints(&self) -> IndexMap<String, TypeSpec> {
        let mut all = self
            .parent
            .as_ref()
            .map(|p| p.constraints())
            .unwrap_or_default();
        for (name, spec) in &self.own.read().constraints {
            all.insert(name.clone(), spec.clone());
        }
        all
    }

    /// Whether context writes are limited to [`allowed_keys`](Self::allowed_keys).
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        if let Some(restricted) = self.own.read().restricted {
            return restricted;
        }
        self.parent.as_ref().map_or(true, |p| p.is_restricted())
    }

    /// `inputs ∪ outputs ∪ BASE_KEYS`.
    #[must_use]
    pub fn allowed_keys(&self) -> HashSet<String> {
        let mut keys: HashSet<String> = BASE_KEYS.iter().map(|k| (*k).to_string()).collect();
        keys.extend(self.fields());
        keys
    }

    /// Builds the write gate for one invocation from the current declarations.
    #[must_use]
    pub fn write_gate(&self) -> WriteGate {
        if self.is_restricted() {
            WriteGate::restricted(&self.class_name, self.allowed_keys())
        } else {
            WriteGate::Open
        }
    }
}

/// Exclusive access to one registry's own declarations.
pub struct RegistryWriter<'a> {
    class_name: &'a str,
    own: RwLockWriteGuard<'a, Declarations>,
}

impl RegistryWriter<'_> {
    /// Registers the field. Redeclaring a name is idempotent; a new
    /// constraint replaces the previous one for that name.
    pub fn declare(&mut self, declaration: FieldDeclaration) {
        let FieldDeclaration {
            name,
            role,
            constraint,
        } = declaration;
        if let Some(spec) = constraint {
            self.own.constraints.insert(name.clone(), spec);
        }
        match role {
            Role::Input => self.own.inputs.insert(name),
            Role::Output => self.own.outputs.insert(name),
        };
    }

    /// Turns restriction off for this class and subclasses that don't restore it.
    pub fn unrestrict(&mut self) {
        self.own.restricted = Some(false);
    }

    /// Restores restriction in a subclass of an unrestricted class.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::RestrictionLocked` if this same class already
    /// called [`unrestrict`](Self::unrestrict).
    pub fn restrict(&mut self) -> Result<(), ServiceError> {
        if self.own.restricted == Some(false) {
            return Err(ServiceError::RestrictionLocked {
                class: self.class_name.to_string(),
            });
        }
        self.own.restricted = Some(true);
        Ok(())
    }
}
