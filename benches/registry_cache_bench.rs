//! 注册缓存与容器解析的性能基准测试

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scopecache::clock::ManualClock;
use scopecache::config::RegistrySettings;
use scopecache::container::{
    CatalogContainerFactory, ContainerBuilder, ContainerFactory, Module, ModuleCatalog,
};
use scopecache::errors::ContainerError;
use scopecache::modules::{ModuleConfigStore, ModuleDeclaration};
use scopecache::registry::RegistryCache;
use scopecache::scope::{InMemoryHierarchy, Scope, ScopeChain};
use std::sync::Arc;
use std::time::Duration;

/// 测试用的简单服务
struct SimpleService {
    value: usize,
}

/// 作用域内共享的服务
struct ScopedService {
    value: usize,
}

struct SimpleModule {
    value: usize,
}

impl Module for SimpleModule {
    fn load(&self, builder: &mut ContainerBuilder) -> Result<(), ContainerError> {
        let value = self.value;
        builder.register_singleton(move |_| Ok(SimpleService { value }));
        builder.register_scoped(move |_| Ok(ScopedService { value }));
        Ok(())
    }
}

fn catalog() -> ModuleCatalog {
    let mut catalog = ModuleCatalog::new();
    catalog.register("SimpleModule", |args| {
        Ok(SimpleModule {
            value: args.parameter_or("value", 0)?,
        })
    });
    catalog
}

struct Setup {
    clock: ManualClock,
    cache: RegistryCache,
    chain: ScopeChain,
}

fn setup(refresh: Duration) -> Setup {
    let hierarchy = Arc::new(InMemoryHierarchy::new());
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let store = ModuleConfigStore::new(hierarchy.clone(), Arc::new(clock.clone()));
    let app = hierarchy.add_application("bench");
    let site = hierarchy.add_site(&app, "bench").unwrap();

    store
        .persist(
            &Scope::farm(),
            &[ModuleDeclaration::new("SimpleModule").with_parameter("value", "1")],
        )
        .unwrap();
    store
        .persist(
            &site,
            &[ModuleDeclaration::new("SimpleModule").with_parameter("value", "2")],
        )
        .unwrap();

    let chain = ScopeChain::resolve(hierarchy.as_ref(), site).unwrap();
    let cache = RegistryCache::new(
        store,
        Arc::new(CatalogContainerFactory::new(catalog())),
        RegistrySettings::with_refresh_period(refresh),
    );
    Setup { clock, cache, chain }
}

/// 基准测试：刷新周期内的缓存命中
fn bench_cache_hit(c: &mut Criterion) {
    let setup = setup(Duration::from_secs(3600));
    setup.cache.get_or_build(&setup.chain).unwrap();

    c.bench_function("registry_cache_hit", |b| {
        b.iter(|| black_box(setup.cache.get_or_build(&setup.chain).unwrap()))
    });
}

/// 基准测试：超过刷新周期但配置未变化
fn bench_staleness_check(c: &mut Criterion) {
    let setup = setup(Duration::from_secs(1));
    setup.cache.get_or_build(&setup.chain).unwrap();

    c.bench_function("registry_cache_staleness_check", |b| {
        b.iter(|| {
            setup.clock.advance(Duration::from_secs(2));
            black_box(setup.cache.get_or_build(&setup.chain).unwrap())
        })
    });
}

/// 基准测试：按模块数量构建容器
fn bench_container_build(c: &mut Criterion) {
    let factory = CatalogContainerFactory::new(catalog());
    let mut group = c.benchmark_group("container_build");

    for module_count in [1, 10, 100].iter() {
        let modules: Vec<ModuleDeclaration> = (0..*module_count)
            .map(|i| ModuleDeclaration::new("SimpleModule").with_parameter("value", i.to_string()))
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(module_count),
            &modules,
            |b, modules| b.iter(|| black_box(factory.build(modules).unwrap())),
        );
    }
    group.finish();
}

/// 基准测试：单例与作用域服务解析
fn bench_resolution(c: &mut Criterion) {
    let setup = setup(Duration::from_secs(3600));
    let container = setup.cache.get_or_build(&setup.chain).unwrap();
    let mut group = c.benchmark_group("service_resolution");

    group.bench_function("singleton", |b| {
        let scope = container.begin_scope();
        b.iter(|| black_box(scope.resolve::<SimpleService>().unwrap().value))
    });

    group.bench_function("scoped_fresh_scope", |b| {
        b.iter(|| {
            let scope = container.begin_scope();
            black_box(scope.resolve::<ScopedService>().unwrap().value)
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_staleness_check,
    bench_container_build,
    bench_resolution
);
criterion_main!(benches);
