//! 容器构建器
//!
//! 模块在构建阶段向构建器注册服务工厂；构建完成后注册表不可变。

use super::core::Container;
use super::lifetime::LifetimeScope;
use super::ServiceLifetime;
use crate::errors::ContainerError;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
pub(crate) type Factory = Arc<dyn Fn(&LifetimeScope) -> Result<Instance, ContainerError> + Send + Sync>;
pub(crate) type Release = Arc<dyn Fn(&Instance) -> anyhow::Result<()> + Send + Sync>;

/// 需要显式释放的组件
///
/// 释放由拥有该实例的生命周期作用域（或单例所在的容器）在关闭时调用，且只调用一次。
pub trait Disposable: Send + Sync + 'static {
    fn dispose(&self) -> anyhow::Result<()>;
}

/// 服务注册信息
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) type_name: &'static str,
    pub(crate) lifetime: ServiceLifetime,
    pub(crate) factory: Factory,
    pub(crate) release: Option<Release>,
}

/// 容器构建器
#[derive(Default)]
pub struct ContainerBuilder {
    registrations: HashMap<TypeId, Registration>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册服务工厂；同一类型重复注册时后者覆盖前者
    pub fn register<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&LifetimeScope) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.insert::<T>(lifetime, erase(factory), None)
    }

    /// 注册单例服务
    pub fn register_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&LifetimeScope) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Singleton, factory)
    }

    /// 注册作用域服务
    pub fn register_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&LifetimeScope) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Scoped, factory)
    }

    /// 注册瞬态服务
    pub fn register_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&LifetimeScope) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Transient, factory)
    }

    /// 注册已创建好的实例（单例语义）
    pub fn register_instance<T>(&mut self, instance: T) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        let instance: Instance = Arc::new(instance);
        let factory: Factory = Arc::new(move |_| Ok(instance.clone()));
        self.insert::<T>(ServiceLifetime::Singleton, factory, None)
    }

    /// 注册需要显式释放的服务
    pub fn register_disposable<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: Disposable,
        F: Fn(&LifetimeScope) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let release: Release = Arc::new(|instance: &Instance| match instance.downcast_ref::<T>() {
            Some(component) => component.dispose(),
            None => Ok(()),
        });
        self.insert::<T>(lifetime, erase(factory), Some(release))
    }

    /// 检查服务是否已注册
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn build(self) -> Container {
        Container::from_registrations(self.registrations)
    }

    fn insert<T: 'static>(
        &mut self,
        lifetime: ServiceLifetime,
        factory: Factory,
        release: Option<Release>,
    ) -> &mut Self {
        let type_name = std::any::type_name::<T>();
        let previous = self.registrations.insert(
            TypeId::of::<T>(),
            Registration {
                type_name,
                lifetime,
                factory,
                release,
            },
        );
        if previous.is_some() {
            tracing::debug!(service = type_name, "registration overrides an earlier one");
        }
        self
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Send + Sync + 'static,
    F: Fn(&LifetimeScope) -> Result<T, ContainerError> + Send + Sync + 'static,
{
    let service = std::any::type_name::<T>();
    Arc::new(move |scope| {
        factory(scope)
            .map(|instance| Arc::new(instance) as Instance)
            .map_err(|e| match e {
                // 生命周期错误原样返回
                ContainerError::Disposed(_) | ContainerError::ScopeClosed(_) => e,
                other => ContainerError::CreationFailed {
                    service,
                    reason: other.to_string(),
                },
            })
    })
}
