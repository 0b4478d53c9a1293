//! Administrative registration surface
//!
//! Adds and removes module declarations in a scope's persisted
//! configuration. Cached containers pick the change up on their next
//! staleness check; nothing here touches the registry cache.

use crate::errors::RegistryResult;
use crate::modules::{ModuleConfigStore, ModuleDeclaration};
use crate::scope::{Scope, ScopeChain};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Added,
    Replaced,
    /// Already declared and `replace_if_exists` was false.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// Declaration removed from this many levels.
    Removed { levels: usize },
    /// No level of the chain carries any configuration.
    NotConfigured,
    /// The chain is configured, but not at the scope's own level.
    ScopeNotConfigured,
    /// No targeted level declares the module.
    NotFound,
}

pub struct ModuleRegistrar {
    store: ModuleConfigStore,
}

impl ModuleRegistrar {
    pub fn new(store: ModuleConfigStore) -> Self {
        Self { store }
    }

    /// Declares a module at `scope`'s own level.
    ///
    /// An existing declaration of the same type is removed first, so the
    /// replacement ends up last in the list.
    pub fn register_module(
        &self,
        scope: &Scope,
        declaration: ModuleDeclaration,
        replace_if_exists: bool,
    ) -> RegistryResult<RegisterOutcome> {
        let target = self.own_level(scope)?;
        let mut modules = match self.store.read(&target)? {
            Some(configuration) => configuration.modules()?.to_vec(),
            None => Vec::new(),
        };

        let exists = modules
            .iter()
            .any(|m| m.type_name() == declaration.type_name());
        if exists && !replace_if_exists {
            debug!(scope = %target, module = declaration.type_name(), "module already declared, skipping");
            return Ok(RegisterOutcome::Skipped);
        }

        modules.retain(|m| m.type_name() != declaration.type_name());
        info!(scope = %target, module = %declaration, replaced = exists, "registering module");
        modules.push(declaration);
        self.store.persist(&target, &modules)?;

        Ok(if exists {
            RegisterOutcome::Replaced
        } else {
            RegisterOutcome::Added
        })
    }

    /// Removes every declaration of `type_name` at `scope`'s own level, or
    /// at every configured level of its chain when `recursive` is set.
    ///
    /// Mismatches are reported through the outcome, not as errors.
    pub fn remove_module(
        &self,
        scope: &Scope,
        type_name: &str,
        recursive: bool,
    ) -> RegistryResult<RemoveOutcome> {
        let chain = ScopeChain::resolve(self.store.hierarchy().as_ref(), scope.clone())?;
        let configurations = self.store.read_chain(&chain)?;

        let Some(own) = configurations.first() else {
            info!(scope = %chain.leaf(), module = type_name, "nothing configured along the chain, cannot remove");
            return Ok(RemoveOutcome::NotConfigured);
        };
        if own.scope_id() != chain.leaf().id() {
            info!(scope = %chain.leaf(), module = type_name, "scope has no configuration of its own, cannot remove");
            return Ok(RemoveOutcome::ScopeNotConfigured);
        }

        let targets = if recursive {
            &configurations[..]
        } else {
            &configurations[..1]
        };

        let mut levels = 0;
        for configuration in targets {
            let modules = configuration.modules()?;
            if !modules.iter().any(|m| m.type_name() == type_name) {
                continue;
            }
            let Some(level) = chain.iter().find(|s| s.id() == configuration.scope_id()) else {
                continue;
            };

            let remaining: Vec<ModuleDeclaration> = modules
                .iter()
                .filter(|m| m.type_name() != type_name)
                .cloned()
                .collect();
            self.store.persist(level, &remaining)?;
            info!(scope = %level, module = type_name, "module removed");
            levels += 1;
        }

        if levels == 0 {
            Ok(RemoveOutcome::NotFound)
        } else {
            Ok(RemoveOutcome::Removed { levels })
        }
    }

    // Webs carry no configuration; their site's level is used instead.
    fn own_level(&self, scope: &Scope) -> RegistryResult<Scope> {
        if scope.kind().has_properties() {
            return Ok(scope.clone());
        }
        let chain = ScopeChain::resolve(self.store.hierarchy().as_ref(), scope.clone())?;
        Ok(chain.leaf().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scope::InMemoryHierarchy;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn setup() -> (Arc<InMemoryHierarchy>, ModuleConfigStore, ModuleRegistrar) {
        let hierarchy = Arc::new(InMemoryHierarchy::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        let store = ModuleConfigStore::new(hierarchy.clone(), Arc::new(clock));
        let registrar = ModuleRegistrar::new(store.clone());
        (hierarchy, store, registrar)
    }

    fn names(store: &ModuleConfigStore, scope: &Scope) -> Vec<String> {
        store
            .read(scope)
            .unwrap()
            .map(|c| c.modules().unwrap().iter().map(|m| m.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_register_add_replace_skip() {
        let (_, store, registrar) = setup();
        let farm = Scope::farm();

        let added = registrar
            .register_module(&farm, ModuleDeclaration::new("A").with_parameter("n", "1"), true)
            .unwrap();
        registrar
            .register_module(&farm, ModuleDeclaration::new("B"), true)
            .unwrap();
        let skipped = registrar
            .register_module(&farm, ModuleDeclaration::new("A").with_parameter("n", "2"), false)
            .unwrap();
        assert_eq!(added, RegisterOutcome::Added);
        assert_eq!(skipped, RegisterOutcome::Skipped);
        assert_eq!(names(&store, &farm), vec!["A(n=1)", "B"]);

        let replaced = registrar
            .register_module(&farm, ModuleDeclaration::new("A").with_parameter("n", "3"), true)
            .unwrap();
        assert_eq!(replaced, RegisterOutcome::Replaced);
        assert_eq!(names(&store, &farm), vec!["B", "A(n=3)"]);
    }

    #[test]
    fn test_remove_reports_unconfigured_scopes() {
        let (hierarchy, _, registrar) = setup();
        let app = hierarchy.add_application("portal");
        let site = hierarchy.add_site(&app, "hr").unwrap();

        assert_eq!(
            registrar.remove_module(&site, "A", false).unwrap(),
            RemoveOutcome::NotConfigured
        );

        registrar
            .register_module(&Scope::farm(), ModuleDeclaration::new("A"), true)
            .unwrap();
        assert_eq!(
            registrar.remove_module(&site, "A", true).unwrap(),
            RemoveOutcome::ScopeNotConfigured
        );
    }

    #[test]
    fn test_remove_own_level_only_unless_recursive() {
        let (hierarchy, store, registrar) = setup();
        let app = hierarchy.add_application("portal");
        let site = hierarchy.add_site(&app, "hr").unwrap();
        for scope in [Scope::farm(), app.clone(), site.clone()] {
            registrar
                .register_module(&scope, ModuleDeclaration::new("A"), true)
                .unwrap();
        }
        registrar
            .register_module(&app, ModuleDeclaration::new("B"), true)
            .unwrap();

        assert_eq!(
            registrar.remove_module(&site, "A", false).unwrap(),
            RemoveOutcome::Removed { levels: 1 }
        );
        assert!(names(&store, &site).is_empty());
        assert_eq!(names(&store, &app), vec!["A", "B"]);

        assert_eq!(
            registrar.remove_module(&site, "A", false).unwrap(),
            RemoveOutcome::NotFound
        );
        assert_eq!(
            registrar.remove_module(&site, "A", true).unwrap(),
            RemoveOutcome::Removed { levels: 2 }
        );
        // Each level is rewritten in its own store.
        assert_eq!(names(&store, &app), vec!["B"]);
        assert!(names(&store, &Scope::farm()).is_empty());
    }

    #[test]
    fn test_web_registers_at_its_site() {
        let (hierarchy, store, registrar) = setup();
        let app = hierarchy.add_application("portal");
        let site = hierarchy.add_site(&app, "hr").unwrap();
        let web = hierarchy.add_web(&site, "payroll").unwrap();

        registrar
            .register_module(&web, ModuleDeclaration::new("A"), true)
            .unwrap();

        assert_eq!(names(&store, &site), vec!["A"]);
    }
}
