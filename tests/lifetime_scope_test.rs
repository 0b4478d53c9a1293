//! 生命周期作用域与工作单元

mod common;

use common::{Fixture, RequestState, Resource};
use scopecache::container::{ContainerBuilder, ServiceLifetime};
use scopecache::errors::ContainerError;
use scopecache::modules::ModuleDeclaration;
use scopecache::scope::Scope;
use std::sync::Arc;

fn with_request_module() -> Fixture {
    let fx = Fixture::new();
    fx.declare(&Scope::farm(), ModuleDeclaration::new("RequestModule"));
    fx.declare(&fx.app, ModuleDeclaration::new("ResourceModule").with_parameter("name", "conn"));
    fx
}

#[test]
fn test_sibling_scopes_are_isolated() {
    let fx = with_request_module();
    let first = fx.locator.new_disposable_lifetime(&fx.site, None).unwrap();
    let second = fx.locator.new_disposable_lifetime(&fx.site, None).unwrap();

    let a1 = first.resolve::<RequestState>().unwrap();
    let a2 = first.resolve::<RequestState>().unwrap();
    let b = second.resolve::<RequestState>().unwrap();

    assert!(Arc::ptr_eq(&a1, &a2));
    assert!(!Arc::ptr_eq(&a1, &b));
    assert_ne!(a1.serial, b.serial);
}

#[test]
fn test_closing_scope_releases_only_its_components() {
    let fx = with_request_module();
    let first = fx.locator.new_disposable_lifetime(&fx.site, Some("first")).unwrap();
    let second = fx.locator.new_disposable_lifetime(&fx.site, Some("second")).unwrap();
    first.resolve::<Resource>().unwrap();
    let kept = second.resolve::<Resource>().unwrap();

    first.close();

    assert_eq!(fx.released.lock().len(), 1);
    assert!(!second.is_closed());
    assert!(Arc::ptr_eq(&kept, &second.resolve::<Resource>().unwrap()));
}

#[test]
fn test_double_close_is_safe() {
    let fx = with_request_module();
    let scope = fx.locator.new_disposable_lifetime(&fx.site, Some("job")).unwrap();
    scope.resolve::<Resource>().unwrap();

    scope.close();
    scope.close();
    drop(scope);

    assert_eq!(*fx.released.lock(), vec!["conn"]);
}

#[test]
fn test_closed_scope_rejects_resolution() {
    let fx = with_request_module();
    let scope = fx.locator.new_disposable_lifetime(&fx.site, Some("job")).unwrap();
    scope.close();

    let err = scope.resolve::<RequestState>().unwrap_err();
    assert!(matches!(err, ContainerError::ScopeClosed(name) if name == "job"));
}

#[test]
fn test_nested_scope_is_released_independently() {
    let fx = with_request_module();
    let outer = fx.locator.new_disposable_lifetime(&fx.site, Some("outer")).unwrap();
    let inner = outer.begin_named_scope("inner");

    assert_eq!(inner.depth(), outer.depth() + 1);
    let outer_state = outer.resolve::<RequestState>().unwrap();
    let inner_state = inner.resolve::<RequestState>().unwrap();
    assert!(!Arc::ptr_eq(&outer_state, &inner_state));

    inner.resolve::<Resource>().unwrap();
    drop(inner);
    assert_eq!(fx.released.lock().len(), 1);
    assert!(!outer.is_closed());
}

#[test]
fn test_unit_lifetime_without_unit_is_none() {
    let fx = with_request_module();
    assert!(fx.locator.unit_lifetime(&fx.site, None).unwrap().is_none());
    // 不构建容器
    assert!(fx.cache.is_empty());
}

#[test]
fn test_unit_of_work_shares_one_scope_per_container() {
    let fx = with_request_module();
    let unit = fx.locator.begin_unit();

    let first = fx.locator.unit_lifetime(&fx.site, Some(&unit)).unwrap().unwrap();
    let second = fx.locator.unit_lifetime(&fx.site, Some(&unit)).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = fx.locator.begin_unit();
    let foreign = fx.locator.unit_lifetime(&fx.site, Some(&other)).unwrap().unwrap();
    assert!(!Arc::ptr_eq(&first, &foreign));
}

#[test]
fn test_ending_unit_closes_its_scopes_in_every_container() {
    let fx = with_request_module();
    let unit = fx.locator.begin_unit();

    let site_scope = fx.locator.unit_lifetime(&fx.site, Some(&unit)).unwrap().unwrap();
    let app_scope = fx.locator.unit_lifetime(&fx.app, Some(&unit)).unwrap().unwrap();
    site_scope.resolve::<Resource>().unwrap();
    app_scope.resolve::<Resource>().unwrap();
    let site_container = fx.locator.container_for(&fx.site).unwrap();
    assert_eq!(site_container.active_unit_scopes(), 1);

    unit.end();

    assert!(site_scope.is_closed());
    assert!(app_scope.is_closed());
    assert_eq!(site_container.active_unit_scopes(), 0);
    assert_eq!(fx.released.lock().len(), 2);
}

#[test]
fn test_dropping_unit_ends_it() {
    let fx = with_request_module();
    let scope = {
        let unit = fx.locator.begin_unit();
        let scope = fx.locator.unit_lifetime(&fx.site, Some(&unit)).unwrap().unwrap();
        scope.resolve::<RequestState>().unwrap();
        scope
    };

    assert!(scope.is_closed());
}

#[test]
fn test_unit_scope_on_disposed_container_fails() {
    let fx = with_request_module();
    let container = fx.locator.container_for(&fx.site).unwrap();
    let unit = fx.locator.begin_unit();
    fx.locator.shutdown();

    let err = unit.scope(&container).unwrap_err();
    assert!(matches!(err, ContainerError::Disposed(id) if id == container.id()));
}

struct Pool(Arc<Resource>);

#[test]
fn test_singleton_keeps_its_scoped_dependency_alive() {
    let released = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let mut builder = ContainerBuilder::new();
    let log = released.clone();
    builder.register_disposable(ServiceLifetime::Scoped, move |_| {
        Ok(Resource {
            name: "conn".to_string(),
            released: log.clone(),
        })
    });
    builder.register_singleton(|scope| Ok(Pool(scope.resolve::<Resource>()?)));
    let container = builder.build();

    let pool = {
        let request = container.begin_named_scope("request-a");
        request.resolve::<Pool>().unwrap()
    };
    assert!(released.lock().is_empty());

    let other = container.begin_named_scope("request-b");
    assert!(Arc::ptr_eq(&pool, &other.resolve::<Pool>().unwrap()));
    drop(other);

    container.dispose().unwrap();
    assert_eq!(*released.lock(), vec!["conn"]);
}
