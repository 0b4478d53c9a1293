//! Reads module configuration along a scope chain and persists it per scope.

use super::{codec, ModuleConfiguration, ModuleDeclaration};
use crate::clock::Clock;
use crate::errors::{ConfigError, RegistryResult, StoreError};
use crate::scope::{Scope, ScopeChain, ScopeHierarchy};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Property holding the serialized module list.
pub const MODULES_KEY: &str = "_scopecache_modules";
/// Property holding the time the module list last changed.
pub const MODULES_CHANGED_KEY: &str = "_scopecache_modules_changed";

/// Read/write access to module configuration across the scope hierarchy.
#[derive(Clone)]
pub struct ModuleConfigStore {
    hierarchy: Arc<dyn ScopeHierarchy>,
    clock: Arc<dyn Clock>,
}

impl ModuleConfigStore {
    pub fn new(hierarchy: Arc<dyn ScopeHierarchy>, clock: Arc<dyn Clock>) -> Self {
        Self { hierarchy, clock }
    }

    pub fn hierarchy(&self) -> &Arc<dyn ScopeHierarchy> {
        &self.hierarchy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Configuration stored at exactly `scope`, `None` if nothing is configured there.
    pub fn read(&self, scope: &Scope) -> RegistryResult<Option<ModuleConfiguration>> {
        let store = self.hierarchy.properties(scope)?;
        let mut values = store
            .get_many(&[MODULES_KEY, MODULES_CHANGED_KEY])
            .into_iter();
        let raw = values.next().flatten();
        let changed = values.next().flatten();

        let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };

        let (modified_at, unreadable) = match changed.as_deref() {
            None | Some("") => (DateTime::<Utc>::MIN_UTC, false),
            Some(text) => match codec::parse_timestamp(text) {
                Some(at) => (at, false),
                None => {
                    warn!(scope = %scope, value = text, "unparseable module timestamp, forcing a rebuild");
                    (DateTime::<Utc>::MIN_UTC, true)
                }
            },
        };

        let configuration = ModuleConfiguration::new(raw, scope.kind(), scope.id(), modified_at);
        Ok(Some(if unreadable {
            configuration.with_unreadable_stamp()
        } else {
            configuration
        }))
    }

    /// Configuration of every level of `chain`, narrowest first; unconfigured levels are omitted.
    pub fn read_chain(&self, chain: &ScopeChain) -> RegistryResult<Vec<ModuleConfiguration>> {
        let mut configurations = Vec::with_capacity(chain.len());
        for scope in chain.iter() {
            if let Some(configuration) = self.read(scope)? {
                configurations.push(configuration);
            }
        }
        debug!(
            leaf = %chain.leaf(),
            levels = configurations.len(),
            "read module configuration chain"
        );
        Ok(configurations)
    }

    /// All declarations that apply to the chain's leaf, farm level first.
    pub fn read_modules(&self, chain: &ScopeChain) -> RegistryResult<Vec<ModuleDeclaration>> {
        let configurations = self.read_chain(chain)?;
        Ok(Self::modules_from(&configurations)?)
    }

    /// Flattens configurations produced by [`read_chain`](Self::read_chain).
    ///
    /// Broader levels come first so a narrower scope's registration of the
    /// same service is applied last and wins.
    pub fn modules_from(
        configurations: &[ModuleConfiguration],
    ) -> Result<Vec<ModuleDeclaration>, ConfigError> {
        let mut modules = Vec::new();
        for configuration in configurations.iter().rev() {
            modules.extend_from_slice(configuration.modules()?);
        }
        Ok(modules)
    }

    /// Replaces the module list stored at `scope` and stamps it with the current time.
    ///
    /// Payload and timestamp are staged together and published by a single commit.
    pub fn persist(
        &self,
        scope: &Scope,
        modules: &[ModuleDeclaration],
    ) -> RegistryResult<DateTime<Utc>> {
        let store = self.hierarchy.properties(scope)?;
        // Stored text keeps microseconds; return what a later read reports.
        let stamp = self.clock.now().trunc_subsecs(6);
        store.set(MODULES_KEY, codec::serialize(modules));
        store.set(MODULES_CHANGED_KEY, codec::format_timestamp(stamp));
        store.commit().map_err(|e| StoreError::CommitFailed {
            scope: scope.to_string(),
            reason: format!("{:#}", e),
        })?;
        debug!(scope = %scope, modules = modules.len(), "persisted module configuration");
        Ok(stamp)
    }
}
