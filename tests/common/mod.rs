//! 集成测试共用的作用域树、模块目录与缓存

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use scopecache::admin::ModuleRegistrar;
use scopecache::clock::ManualClock;
use scopecache::config::RegistrySettings;
use scopecache::container::{
    CatalogContainerFactory, Container, ContainerBuilder, ContainerFactory, Disposable, Module,
    ModuleCatalog, ServiceLifetime,
};
use scopecache::errors::ContainerError;
use scopecache::locator::ServiceLocator;
use scopecache::modules::{codec, ModuleConfigStore, ModuleDeclaration, MODULES_CHANGED_KEY, MODULES_KEY};
use scopecache::registry::RegistryCache;
use scopecache::scope::{InMemoryHierarchy, PropertyStore, Scope, ScopeChain};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const REFRESH: Duration = Duration::from_secs(30);

/// 按模块类型名注册的标记服务
pub struct FarmService;
pub struct AppService;
pub struct SiteService;

#[derive(Debug)]
pub struct Greeting(pub String);

/// 作用域内共享的服务
#[derive(Debug)]
pub struct RequestState {
    pub serial: usize,
}

/// 释放时记录名称；名称以 "bad" 开头时释放失败
pub struct Resource {
    pub name: String,
    pub released: Arc<Mutex<Vec<String>>>,
}

impl Disposable for Resource {
    fn dispose(&self) -> anyhow::Result<()> {
        self.released.lock().push(self.name.clone());
        if self.name.starts_with("bad") {
            anyhow::bail!("{} could not be released", self.name);
        }
        Ok(())
    }
}

struct MarkerModule<F: Fn(&mut ContainerBuilder) + Send + Sync>(F);

impl<F: Fn(&mut ContainerBuilder) + Send + Sync> Module for MarkerModule<F> {
    fn load(&self, builder: &mut ContainerBuilder) -> Result<(), ContainerError> {
        (self.0)(builder);
        Ok(())
    }
}

struct FailingModule;

impl Module for FailingModule {
    fn load(&self, _builder: &mut ContainerBuilder) -> Result<(), ContainerError> {
        Err(ContainerError::ModuleLoad {
            module: "FailingModule".to_string(),
            reason: "deliberately broken".to_string(),
        })
    }
}

fn catalog(released: Arc<Mutex<Vec<String>>>) -> ModuleCatalog {
    let serial = Arc::new(AtomicUsize::new(0));
    let mut catalog = ModuleCatalog::new();
    catalog
        .register("FarmModule", |_| {
            Ok(MarkerModule(|b: &mut ContainerBuilder| {
                b.register_instance(FarmService);
            }))
        })
        .register("AppModule", |_| {
            Ok(MarkerModule(|b: &mut ContainerBuilder| {
                b.register_instance(AppService);
            }))
        })
        .register("SiteModule", |_| {
            Ok(MarkerModule(|b: &mut ContainerBuilder| {
                b.register_instance(SiteService);
            }))
        })
        .register("GreetingModule", |args| {
            let text: String = args.parameter("text")?;
            Ok(MarkerModule(move |b: &mut ContainerBuilder| {
                b.register_instance(Greeting(text.clone()));
            }))
        })
        .register("RequestModule", move |_| {
            let serial = serial.clone();
            Ok(MarkerModule(move |b: &mut ContainerBuilder| {
                let serial = serial.clone();
                b.register_scoped(move |_| {
                    Ok(RequestState {
                        serial: serial.fetch_add(1, Ordering::SeqCst),
                    })
                });
            }))
        })
        .register("ResourceModule", move |args| {
            let name: String = args.parameter_or("name", "resource".to_string())?;
            let lifetime = if args.property_or("singleton", false)? {
                ServiceLifetime::Singleton
            } else {
                ServiceLifetime::Scoped
            };
            let released = released.clone();
            Ok(MarkerModule(move |b: &mut ContainerBuilder| {
                let name = name.clone();
                let released = released.clone();
                b.register_disposable(lifetime, move |_| {
                    Ok(Resource {
                        name: name.clone(),
                        released: released.clone(),
                    })
                });
            }))
        })
        .register("FailingModule", |_| Ok(FailingModule));
    catalog
}

/// 统计构建次数的工厂
pub struct CountingFactory {
    inner: CatalogContainerFactory,
    pub builds: AtomicUsize,
    delay: Duration,
}

impl ContainerFactory for CountingFactory {
    fn build(&self, modules: &[ModuleDeclaration]) -> Result<Container, ContainerError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.inner.build(modules)
    }
}

pub struct Fixture {
    pub hierarchy: Arc<InMemoryHierarchy>,
    pub clock: ManualClock,
    pub store: ModuleConfigStore,
    pub factory: Arc<CountingFactory>,
    pub cache: Arc<RegistryCache>,
    pub locator: ServiceLocator,
    pub registrar: ModuleRegistrar,
    pub released: Arc<Mutex<Vec<String>>>,
    pub app: Scope,
    pub site: Scope,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_build_delay(Duration::ZERO)
    }

    pub fn with_build_delay(delay: Duration) -> Self {
        let hierarchy = Arc::new(InMemoryHierarchy::new());
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap());
        let store = ModuleConfigStore::new(hierarchy.clone(), Arc::new(clock.clone()));
        let released = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(CountingFactory {
            inner: CatalogContainerFactory::new(catalog(released.clone())),
            builds: AtomicUsize::new(0),
            delay,
        });
        let cache = Arc::new(RegistryCache::new(
            store.clone(),
            factory.clone(),
            RegistrySettings::with_refresh_period(REFRESH),
        ));
        let locator = ServiceLocator::new(cache.clone());
        let registrar = ModuleRegistrar::new(store.clone());
        let app = hierarchy.add_application("portal");
        let site = hierarchy
            .add_site(&app, "intranet")
            .expect("application accepts sites");

        Self {
            hierarchy,
            clock,
            store,
            factory,
            cache,
            locator,
            registrar,
            released,
            app,
            site,
        }
    }

    pub fn declare(&self, scope: &Scope, declaration: ModuleDeclaration) {
        self.registrar
            .register_module(scope, declaration, true)
            .expect("module registration");
    }

    /// Writes a module list with an arbitrary timestamp text, bypassing the store.
    pub fn write_raw(&self, scope: &Scope, modules: &[ModuleDeclaration], stamp: &str) {
        let properties = self.hierarchy.store(scope).expect("scope carries properties");
        properties.set(MODULES_KEY, codec::serialize(modules));
        properties.set(MODULES_CHANGED_KEY, stamp.to_string());
        properties.commit().expect("commit");
    }

    pub fn chain(&self, scope: &Scope) -> ScopeChain {
        ScopeChain::resolve(self.hierarchy.as_ref(), scope.clone()).expect("scope chain")
    }

    pub fn module_names(&self, scope: &Scope) -> Vec<String> {
        self.store
            .read_modules(&self.chain(scope))
            .expect("read modules")
            .iter()
            .map(|m| m.type_name().to_string())
            .collect()
    }

    pub fn builds(&self) -> usize {
        self.factory.builds.load(Ordering::SeqCst)
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}
