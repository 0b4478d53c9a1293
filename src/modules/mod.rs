//! Persisted module configuration
//!
//! Each configurable scope stores a list of module declarations in a single
//! property, plus the time it was last changed in a sibling property.

pub mod aggregator;
pub mod codec;

pub use aggregator::{ModuleConfigStore, MODULES_CHANGED_KEY, MODULES_KEY};

use crate::errors::ConfigError;
use crate::scope::{ScopeId, ScopeKind};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::fmt;

/// A named literal handed to a module at activation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub value: String,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One configured module: a catalog type name and its bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDeclaration {
    type_name: String,
    parameters: Vec<Binding>,
    properties: Vec<Binding>,
}

impl ModuleDeclaration {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            parameters: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Binding::new(name, value));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(Binding::new(name, value));
        self
    }

    pub(crate) fn from_parts(type_name: String, parameters: Vec<Binding>, properties: Vec<Binding>) -> Self {
        Self {
            type_name,
            parameters,
            properties,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parameters(&self) -> &[Binding] {
        &self.parameters
    }

    pub fn properties(&self) -> &[Binding] {
        &self.properties
    }
}

impl fmt::Display for ModuleDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name)?;
        let bindings = self
            .parameters
            .iter()
            .map(|b| format!("{}={}", b.name, b.value))
            .chain(self.properties.iter().map(|b| format!(".{}={}", b.name, b.value)))
            .collect::<Vec<_>>();
        if !bindings.is_empty() {
            write!(f, "({})", bindings.join(", "))?;
        }
        Ok(())
    }
}

/// The module configuration stored at one scope level.
///
/// Immutable once read; the parsed list is computed on first access and
/// cached for the lifetime of the instance.
#[derive(Debug)]
pub struct ModuleConfiguration {
    raw: String,
    parsed: OnceCell<Vec<ModuleDeclaration>>,
    scope_kind: ScopeKind,
    scope_id: ScopeId,
    modified_at: DateTime<Utc>,
    stamp_unreadable: bool,
}

impl ModuleConfiguration {
    pub fn new(
        raw: impl Into<String>,
        scope_kind: ScopeKind,
        scope_id: ScopeId,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceCell::new(),
            scope_kind,
            scope_id,
            modified_at,
            stamp_unreadable: false,
        }
    }

    /// Marks the persisted timestamp as present but unparseable.
    pub fn with_unreadable_stamp(mut self) -> Self {
        self.stamp_unreadable = true;
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed declarations, in document order.
    pub fn modules(&self) -> Result<&[ModuleDeclaration], ConfigError> {
        self.parsed
            .get_or_try_init(|| codec::parse(&self.raw))
            .map(Vec::as_slice)
    }

    pub fn scope_kind(&self) -> ScopeKind {
        self.scope_kind
    }

    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    /// Last modification; `DateTime::<Utc>::MIN_UTC` when never stamped.
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// True when a timestamp was stored but could not be parsed.
    ///
    /// Such a level cannot be compared by time, so the registry cache treats
    /// its payload as changed until a build has consumed it.
    pub fn stamp_unreadable(&self) -> bool {
        self.stamp_unreadable
    }
}
