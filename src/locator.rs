//! Service locator facade
//!
//! The entry point a host constructs once at startup: resolves a scope's
//! chain, fetches its container from the registry cache and opens lifetime
//! scopes on it.

use crate::container::{Container, LifetimeScope};
use crate::errors::RegistryResult;
use crate::registry::{RegistryCache, TeardownReport, UnitOfWork};
use crate::scope::{Scope, ScopeChain};
use std::sync::Arc;

#[derive(Clone)]
pub struct ServiceLocator {
    cache: Arc<RegistryCache>,
}

impl ServiceLocator {
    pub fn new(cache: Arc<RegistryCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<RegistryCache> {
        &self.cache
    }

    /// Container carrying the modules configured for `scope` and its ancestors.
    pub fn container_for(&self, scope: &Scope) -> RegistryResult<Arc<Container>> {
        let chain = ScopeChain::resolve(self.cache.store().hierarchy().as_ref(), scope.clone())?;
        self.cache.get_or_build(&chain)
    }

    /// A fresh lifetime scope owned by the caller, optionally tagged.
    pub fn new_disposable_lifetime(
        &self,
        scope: &Scope,
        name: Option<&str>,
    ) -> RegistryResult<LifetimeScope> {
        let container = self.container_for(scope)?;
        Ok(match name {
            Some(name) => container.begin_named_scope(name),
            None => container.begin_scope(),
        })
    }

    /// The request scope of `unit` in `scope`'s container; `None` without a unit of work.
    pub fn unit_lifetime(
        &self,
        scope: &Scope,
        unit: Option<&UnitOfWork>,
    ) -> RegistryResult<Option<Arc<LifetimeScope>>> {
        let Some(unit) = unit else {
            return Ok(None);
        };
        let container = self.container_for(scope)?;
        Ok(container.scope_for_unit(Some(unit.id()))?)
    }

    pub fn begin_unit(&self) -> UnitOfWork {
        UnitOfWork::begin(self.cache.clone())
    }

    /// Disposes every cached container.
    pub fn shutdown(&self) -> TeardownReport {
        self.cache.invalidate_all()
    }
}
