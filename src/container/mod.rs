//! 依赖注入容器模块
//!
//! 模块向 [`ContainerBuilder`] 注册服务；构建出的 [`Container`] 不可变，
//! 服务通过从容器打开的 [`LifetimeScope`] 解析。

pub mod builder;
pub mod catalog;
pub mod core;
pub mod lifetime;

pub use self::builder::{ContainerBuilder, Disposable};
pub use self::catalog::{CatalogContainerFactory, ContainerFactory, Module, ModuleArgs, ModuleCatalog};
pub use self::core::{Container, ContainerStats};
pub use self::lifetime::{LifetimeScope, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifetime {
    /// 每个容器一个实例，由容器打开的所有作用域共享
    Singleton,
    /// 每次解析创建新实例
    Transient,
    /// 每个生命周期作用域一个实例
    Scoped,
}
