//! Administrative scope hierarchy
//!
//! Scopes form a strict tree `Farm > Application > Site > Web`. Configuration
//! is declared on the first three; a `Web` always defers to its owning site.

pub mod memory;
pub mod property;

pub use memory::InMemoryHierarchy;
pub use property::{InMemoryPropertyStore, PropertyStore};

use crate::errors::ScopeError;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Scope levels, ordered from broadest to narrowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeKind {
    Farm,
    Application,
    Site,
    Web,
}

impl ScopeKind {
    /// Whether this level owns a property store and therefore its own module configuration.
    pub fn has_properties(self) -> bool {
        !matches!(self, ScopeKind::Web)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Farm => "Farm",
            ScopeKind::Application => "Application",
            ScopeKind::Site => "Site",
            ScopeKind::Web => "Web",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// There is exactly one farm, so its identity is a fixed sentinel.
    pub const FARM: ScopeId = ScopeId(Uuid::nil());

    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    kind: ScopeKind,
    id: ScopeId,
    name: String,
}

impl Scope {
    pub fn farm() -> Self {
        Self {
            kind: ScopeKind::Farm,
            id: ScopeId::FARM,
            name: String::new(),
        }
    }

    pub fn application(id: ScopeId, name: impl Into<String>) -> Self {
        Self::new(ScopeKind::Application, id, name)
    }

    pub fn site(id: ScopeId, name: impl Into<String>) -> Self {
        Self::new(ScopeKind::Site, id, name)
    }

    pub fn web(id: ScopeId, name: impl Into<String>) -> Self {
        Self::new(ScopeKind::Web, id, name)
    }

    fn new(kind: ScopeKind, id: ScopeId, name: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScopeKind::Farm => f.write_str("Farm"),
            kind => write!(f, "{} {} (ID={})", kind, self.name, self.id),
        }
    }
}

/// The host's view of its administrative tree.
///
/// Implementations answer two questions: who is a scope's parent, and where
/// its properties live.
pub trait ScopeHierarchy: Send + Sync {
    /// Parent of `scope`, `None` for the farm.
    fn parent(&self, scope: &Scope) -> Result<Option<Scope>, ScopeError>;

    /// Property store owned by `scope`.
    fn properties(&self, scope: &Scope) -> Result<Arc<dyn PropertyStore>, ScopeError>;
}

/// Narrowest-first list of the scopes whose configuration applies to a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    /// Walks parents from `leaf` up to the farm.
    ///
    /// A `Web` leaf is replaced by its site, since webs carry no
    /// configuration. The walk fails if a parent is not strictly broader than
    /// its child or the chain ends anywhere but the farm.
    pub fn resolve(hierarchy: &dyn ScopeHierarchy, leaf: Scope) -> Result<Self, ScopeError> {
        let mut current = leaf;
        if !current.kind().has_properties() {
            current = hierarchy.parent(&current)?.ok_or_else(|| ScopeError::BrokenChain {
                scope: current.to_string(),
                reason: "web has no owning site".to_string(),
            })?;
        }

        let mut scopes = Vec::with_capacity(3);
        let mut child = current;
        while child.kind() != ScopeKind::Farm {
            let parent = hierarchy.parent(&child)?.ok_or_else(|| ScopeError::BrokenChain {
                scope: child.to_string(),
                reason: "chain does not terminate at the farm".to_string(),
            })?;
            if parent.kind() >= child.kind() {
                return Err(ScopeError::BrokenChain {
                    scope: child.to_string(),
                    reason: format!("parent {} is not broader than {}", parent, child.kind()),
                });
            }
            scopes.push(std::mem::replace(&mut child, parent));
        }
        scopes.push(child);

        Ok(Self { scopes })
    }

    /// Chain for the farm alone.
    pub fn farm() -> Self {
        Self {
            scopes: vec![Scope::farm()],
        }
    }

    /// The scope the chain was resolved for; identifies the cache entry.
    pub fn leaf(&self) -> &Scope {
        &self.scopes[0]
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_kind_ordering() {
        assert!(ScopeKind::Farm < ScopeKind::Application);
        assert!(ScopeKind::Application < ScopeKind::Site);
        assert!(ScopeKind::Site < ScopeKind::Web);
        assert!(!ScopeKind::Web.has_properties());
    }

    #[test]
    fn test_site_chain_terminates_at_farm() {
        let hierarchy = InMemoryHierarchy::new();
        let app = hierarchy.add_application("portal");
        let site = hierarchy.add_site(&app, "intranet").unwrap();

        let chain = ScopeChain::resolve(&hierarchy, site.clone()).unwrap();
        let kinds: Vec<_> = chain.iter().map(|s| s.kind()).collect();

        assert_eq!(kinds, vec![ScopeKind::Site, ScopeKind::Application, ScopeKind::Farm]);
        assert_eq!(chain.leaf(), &site);
        assert_eq!(chain.iter().last().unwrap().id(), ScopeId::FARM);
    }

    #[test]
    fn test_web_resolves_through_its_site() {
        let hierarchy = InMemoryHierarchy::new();
        let app = hierarchy.add_application("portal");
        let site = hierarchy.add_site(&app, "intranet").unwrap();
        let web = hierarchy.add_web(&site, "team").unwrap();

        let chain = ScopeChain::resolve(&hierarchy, web).unwrap();

        assert_eq!(chain.leaf(), &site);
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn test_unknown_scope_is_rejected() {
        let hierarchy = InMemoryHierarchy::new();
        let stray = Scope::site(ScopeId::new_v4(), "stray");

        let result = ScopeChain::resolve(&hierarchy, stray);

        assert!(matches!(result, Err(ScopeError::UnknownScope(_))));
    }

    #[test]
    fn test_farm_display_has_no_identity() {
        assert_eq!(Scope::farm().to_string(), "Farm");
        let id = ScopeId::new_v4();
        assert_eq!(
            Scope::site(id, "hr").to_string(),
            format!("Site hr (ID={})", id)
        );
    }
}
