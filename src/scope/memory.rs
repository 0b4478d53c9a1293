//! In-process scope hierarchy, used by the binary's demo and by tests.

use super::property::{InMemoryPropertyStore, PropertyStore};
use super::{Scope, ScopeHierarchy, ScopeId, ScopeKind};
use crate::errors::ScopeError;
use dashmap::DashMap;
use std::sync::Arc;

struct Node {
    scope: Scope,
    parent: Option<Scope>,
    store: Option<Arc<InMemoryPropertyStore>>,
}

/// A farm with applications, sites and webs registered at runtime.
pub struct InMemoryHierarchy {
    nodes: DashMap<ScopeId, Node>,
}

impl InMemoryHierarchy {
    /// Creates a hierarchy holding only the farm.
    pub fn new() -> Self {
        let nodes = DashMap::new();
        nodes.insert(
            ScopeId::FARM,
            Node {
                scope: Scope::farm(),
                parent: None,
                store: Some(Arc::new(InMemoryPropertyStore::new())),
            },
        );
        Self { nodes }
    }

    pub fn add_application(&self, name: &str) -> Scope {
        let scope = Scope::application(ScopeId::new_v4(), name);
        self.insert(scope.clone(), Some(Scope::farm()));
        scope
    }

    pub fn add_site(&self, application: &Scope, name: &str) -> Result<Scope, ScopeError> {
        self.expect_kind(application, ScopeKind::Application)?;
        let scope = Scope::site(ScopeId::new_v4(), name);
        self.insert(scope.clone(), Some(application.clone()));
        Ok(scope)
    }

    pub fn add_web(&self, site: &Scope, name: &str) -> Result<Scope, ScopeError> {
        self.expect_kind(site, ScopeKind::Site)?;
        let scope = Scope::web(ScopeId::new_v4(), name);
        self.insert(scope.clone(), Some(site.clone()));
        Ok(scope)
    }

    /// Concrete store behind `scope`, for callers that need to inspect it directly.
    pub fn store(&self, scope: &Scope) -> Option<Arc<InMemoryPropertyStore>> {
        self.nodes.get(&scope.id()).and_then(|node| node.store.clone())
    }

    fn insert(&self, scope: Scope, parent: Option<Scope>) {
        let store = scope
            .kind()
            .has_properties()
            .then(|| Arc::new(InMemoryPropertyStore::new()));
        self.nodes.insert(scope.id(), Node { scope, parent, store });
    }

    fn expect_kind(&self, scope: &Scope, kind: ScopeKind) -> Result<(), ScopeError> {
        match self.nodes.get(&scope.id()) {
            Some(node) if node.scope.kind() == kind => Ok(()),
            Some(node) => Err(ScopeError::BrokenChain {
                scope: node.scope.to_string(),
                reason: format!("expected a {} scope", kind),
            }),
            None => Err(ScopeError::UnknownScope(scope.to_string())),
        }
    }
}

impl Default for InMemoryHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeHierarchy for InMemoryHierarchy {
    fn parent(&self, scope: &Scope) -> Result<Option<Scope>, ScopeError> {
        self.nodes
            .get(&scope.id())
            .map(|node| node.parent.clone())
            .ok_or_else(|| ScopeError::UnknownScope(scope.to_string()))
    }

    fn properties(&self, scope: &Scope) -> Result<Arc<dyn PropertyStore>, ScopeError> {
        let node = self
            .nodes
            .get(&scope.id())
            .ok_or_else(|| ScopeError::UnknownScope(scope.to_string()))?;
        match &node.store {
            Some(store) => Ok(store.clone() as Arc<dyn PropertyStore>),
            None => Err(ScopeError::NoPropertyStore(scope.to_string())),
        }
    }
}
