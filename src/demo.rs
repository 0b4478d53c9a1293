//! Walks through registration, caching, removal and rebuild on an in-memory farm.

use anyhow::Result;
use scopecache::admin::ModuleRegistrar;
use scopecache::clock::{Clock, ManualClock, SystemClock};
use scopecache::config::AppConfig;
use scopecache::container::{
    CatalogContainerFactory, ContainerBuilder, Disposable, Module, ModuleCatalog, ServiceLifetime,
};
use scopecache::errors::ContainerError;
use scopecache::locator::ServiceLocator;
use scopecache::modules::{ModuleConfigStore, ModuleDeclaration};
use scopecache::registry::RegistryCache;
use scopecache::scope::{InMemoryHierarchy, Scope, ScopeChain};
use std::sync::Arc;
use std::time::Duration;

pub struct Logger {
    category: String,
}

impl Logger {
    fn log(&self, message: &str) {
        println!("    [{}] {}", self.category, message);
    }
}

struct LoggerModule {
    category: String,
}

impl Module for LoggerModule {
    fn load(&self, builder: &mut ContainerBuilder) -> Result<(), ContainerError> {
        let category = self.category.clone();
        builder.register_singleton(move |_| {
            Ok(Logger {
                category: category.clone(),
            })
        });
        Ok(())
    }
}

pub struct Cache {
    capacity: usize,
    logger: Arc<Logger>,
}

impl Disposable for Cache {
    fn dispose(&self) -> anyhow::Result<()> {
        self.logger
            .log(&format!("cache with capacity {} released", self.capacity));
        Ok(())
    }
}

struct CacheModule {
    capacity: usize,
}

impl Module for CacheModule {
    fn load(&self, builder: &mut ContainerBuilder) -> Result<(), ContainerError> {
        if self.capacity == 0 {
            return Err(ContainerError::ModuleLoad {
                module: "CacheModule".to_string(),
                reason: "capacity must be positive".to_string(),
            });
        }
        let capacity = self.capacity;
        builder.register_disposable(ServiceLifetime::Scoped, move |scope| {
            Ok(Cache {
                capacity,
                logger: scope.resolve::<Logger>()?,
            })
        });
        Ok(())
    }
}

fn catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog
        .register("LoggerModule", |args| {
            Ok(LoggerModule {
                category: args.parameter_or("category", "default".to_string())?,
            })
        })
        .register("CacheModule", |args| {
            Ok(CacheModule {
                capacity: args.parameter("capacity")?,
            })
        });
    catalog
}

pub fn run(config: &AppConfig) -> Result<()> {
    let hierarchy = Arc::new(InMemoryHierarchy::new());
    let clock = ManualClock::new(SystemClock.now());
    let store = ModuleConfigStore::new(hierarchy.clone(), Arc::new(clock.clone()));
    let cache = Arc::new(RegistryCache::new(
        store.clone(),
        Arc::new(CatalogContainerFactory::new(catalog())),
        config.registry.clone(),
    ));
    let locator = ServiceLocator::new(cache.clone());
    let registrar = ModuleRegistrar::new(store.clone());

    let app = hierarchy.add_application("portal");
    let site = hierarchy.add_site(&app, "intranet")?;

    println!("1. Declare LoggerModule at the farm and CacheModule at {}", site);
    registrar.register_module(
        &Scope::farm(),
        ModuleDeclaration::new("LoggerModule").with_parameter("category", "demo"),
        true,
    )?;
    registrar.register_module(
        &site,
        ModuleDeclaration::new("CacheModule").with_parameter("capacity", "64"),
        true,
    )?;
    print_modules(&store, &hierarchy, &site)?;

    println!("2. Resolve through a unit of work");
    let container = locator.container_for(&site)?;
    println!("    container #{} with {:?}", container.id(), container.registered_services());
    {
        let unit = locator.begin_unit();
        if let Some(scope) = locator.unit_lifetime(&site, Some(&unit))? {
            let cache_service = scope.resolve::<Cache>()?;
            cache_service
                .logger
                .log(&format!("resolved cache with capacity {}", cache_service.capacity));
        }
        unit.end();
    }

    clock.advance(Duration::from_secs(1));
    println!("3. Remove CacheModule from {}", site);
    let outcome = registrar.remove_module(&site, "CacheModule", false)?;
    println!("    {:?}", outcome);
    print_modules(&store, &hierarchy, &site)?;

    let same = locator.container_for(&site)?;
    println!(
        "    within the refresh period the cached container #{} is still served",
        same.id()
    );

    println!(
        "4. Advance the clock by the refresh period ({}s)",
        cache.refresh_period().as_secs()
    );
    clock.advance(cache.refresh_period());
    let rebuilt = locator.container_for(&site)?;
    println!(
        "    container #{} at {} with {:?}",
        rebuilt.id(),
        clock.now().format("%H:%M:%S"),
        rebuilt.registered_services()
    );

    let report = locator.shutdown();
    println!(
        "5. Shutdown: {} container(s) disposed, {} failure(s)",
        report.disposed,
        report.failures.len()
    );
    println!("    cache stats: {:?}", cache.stats());
    Ok(())
}

fn print_modules(store: &ModuleConfigStore, hierarchy: &InMemoryHierarchy, scope: &Scope) -> Result<()> {
    let chain = ScopeChain::resolve(hierarchy, scope.clone())?;
    let modules: Vec<String> = store
        .read_modules(&chain)?
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("    effective modules: [{}]", modules.join(", "));
    Ok(())
}
