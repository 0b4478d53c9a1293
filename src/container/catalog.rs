//! 模块目录与容器工厂
//!
//! 配置按类型名引用模块，目录把类型名映射到构造函数。构造函数通过
//! [`ModuleArgs`] 读取声明中的绑定，返回一个负责注册服务的 [`Module`]。

use super::builder::ContainerBuilder;
use super::core::Container;
use crate::errors::ContainerError;
use crate::modules::{Binding, ModuleDeclaration};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// 一组服务注册
pub trait Module: Send + Sync {
    fn load(&self, builder: &mut ContainerBuilder) -> Result<(), ContainerError>;
}

/// 按类型读取单个模块声明的绑定
///
/// 参数用于构造模块，属性是构造之后设置的普通配置；两者都以字面量保存，在此转换。
pub struct ModuleArgs<'a> {
    declaration: &'a ModuleDeclaration,
}

impl<'a> ModuleArgs<'a> {
    pub fn new(declaration: &'a ModuleDeclaration) -> Self {
        Self { declaration }
    }

    pub fn type_name(&self) -> &str {
        self.declaration.type_name()
    }

    pub fn raw_parameter(&self, name: &str) -> Option<&'a str> {
        lookup(self.declaration.parameters(), name)
    }

    pub fn raw_property(&self, name: &str) -> Option<&'a str> {
        lookup(self.declaration.properties(), name)
    }

    /// 必需的构造参数
    pub fn parameter<T: FromStr>(&self, name: &str) -> Result<T, ContainerError> {
        let raw = self
            .raw_parameter(name)
            .ok_or_else(|| self.missing(name))?;
        self.convert(name, raw)
    }

    pub fn parameter_or<T: FromStr>(&self, name: &str, default: T) -> Result<T, ContainerError> {
        match self.raw_parameter(name) {
            Some(raw) => self.convert(name, raw),
            None => Ok(default),
        }
    }

    /// 必需的属性
    pub fn property<T: FromStr>(&self, name: &str) -> Result<T, ContainerError> {
        let raw = self.raw_property(name).ok_or_else(|| self.missing(name))?;
        self.convert(name, raw)
    }

    pub fn property_or<T: FromStr>(&self, name: &str, default: T) -> Result<T, ContainerError> {
        match self.raw_property(name) {
            Some(raw) => self.convert(name, raw),
            None => Ok(default),
        }
    }

    fn missing(&self, name: &str) -> ContainerError {
        ContainerError::MissingBinding {
            module: self.type_name().to_string(),
            name: name.to_string(),
        }
    }

    fn convert<T: FromStr>(&self, name: &str, raw: &str) -> Result<T, ContainerError> {
        raw.parse::<T>().map_err(|_| ContainerError::BindingConversion {
            module: self.type_name().to_string(),
            name: name.to_string(),
            value: raw.to_string(),
            target: std::any::type_name::<T>(),
        })
    }
}

// 同名绑定以最后一个为准
fn lookup<'a>(bindings: &'a [Binding], name: &str) -> Option<&'a str> {
    bindings
        .iter()
        .rev()
        .find(|b| b.name == name)
        .map(|b| b.value.as_str())
}

type Constructor =
    Arc<dyn Fn(&ModuleArgs<'_>) -> Result<Box<dyn Module>, ContainerError> + Send + Sync>;

/// 模块类型名到构造函数的映射
#[derive(Default, Clone)]
pub struct ModuleCatalog {
    constructors: HashMap<String, Constructor>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M, F>(&mut self, type_name: impl Into<String>, constructor: F) -> &mut Self
    where
        M: Module + 'static,
        F: Fn(&ModuleArgs<'_>) -> Result<M, ContainerError> + Send + Sync + 'static,
    {
        let constructor: Constructor =
            Arc::new(move |args| constructor(args).map(|m| Box::new(m) as Box<dyn Module>));
        self.constructors.insert(type_name.into(), constructor);
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 构造声明所指定的模块
    pub fn activate(&self, declaration: &ModuleDeclaration) -> Result<Box<dyn Module>, ContainerError> {
        let constructor = self
            .constructors
            .get(declaration.type_name())
            .ok_or_else(|| ContainerError::UnknownModuleType(declaration.type_name().to_string()))?;
        constructor(&ModuleArgs::new(declaration))
    }
}

/// 根据展开后的模块列表构建新容器
pub trait ContainerFactory: Send + Sync {
    fn build(&self, modules: &[ModuleDeclaration]) -> Result<Container, ContainerError>;
}

/// 从 [`ModuleCatalog`] 激活模块并按给定顺序注册的 [`ContainerFactory`]
pub struct CatalogContainerFactory {
    catalog: Arc<ModuleCatalog>,
}

impl CatalogContainerFactory {
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }
}

impl ContainerFactory for CatalogContainerFactory {
    fn build(&self, modules: &[ModuleDeclaration]) -> Result<Container, ContainerError> {
        let mut builder = ContainerBuilder::new();
        for declaration in modules {
            let module = self.catalog.activate(declaration)?;
            module.load(&mut builder)?;
            debug!(module = %declaration, "module registered");
        }
        let container = builder.build();
        info!(
            container = container.id(),
            modules = modules.len(),
            services = container.registered_services().len(),
            "container assembled"
        );
        Ok(container)
    }
}
