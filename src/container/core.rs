//! 已构建的依赖注入容器
//!
//! - 注册表在构建后不可变，无需加锁即可并发读取
//! - 单例实例缓存使用 `DashMap` + `OnceCell`，保证每个类型只创建一次
//! - 释放（dispose）只执行一次，之后的解析请求返回 `Disposed`

use super::builder::{Instance, Registration};
use super::lifetime::{release_state, LifetimeScope, ScopeState, UnitId, ROOT_SCOPE_NAME};
use super::ServiceLifetime;
use crate::errors::ContainerError;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// 依赖注入容器
///
/// 克隆开销很小，所有克隆共享同一组单例与释放状态。
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    id: u64,
    registrations: HashMap<TypeId, Registration>,
    /// 单例实例缓存 - 使用OnceCell确保只创建一次
    singletons: DashMap<TypeId, Arc<OnceCell<Instance>>>,
    /// 单例创建顺序，释放时逆序处理
    singleton_order: Mutex<Vec<TypeId>>,
    /// 根作用域状态：单例工厂解析到的作用域与瞬态组件归容器所有
    root_state: Arc<Mutex<ScopeState>>,
    /// 每个工作单元对应的请求作用域
    unit_scopes: DashMap<UnitId, Arc<LifetimeScope>>,
    disposed: AtomicBool,
    stats: InnerStats,
}

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
}

impl Container {
    pub(crate) fn from_registrations(registrations: HashMap<TypeId, Registration>) -> Self {
        let id = NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed);
        debug!(container = id, services = registrations.len(), "container built");
        Self {
            inner: Arc::new(ContainerInner {
                id,
                registrations,
                singletons: DashMap::new(),
                singleton_order: Mutex::new(Vec::new()),
                root_state: Arc::new(Mutex::new(ScopeState::default())),
                unit_scopes: DashMap::new(),
                disposed: AtomicBool::new(false),
                stats: InnerStats::default(),
            }),
        }
    }

    /// 进程内唯一的容器编号
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// 检查服务是否已注册
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.inner.registrations.contains_key(&TypeId::of::<T>())
    }

    /// 已注册的服务类型名称（排序后）
    pub fn registered_services(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .inner
            .registrations
            .values()
            .map(|r| r.type_name)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// 打开一个匿名生命周期作用域，调用方负责关闭（或直接 drop）
    pub fn begin_scope(&self) -> LifetimeScope {
        LifetimeScope::root(self.inner.clone(), None)
    }

    /// 打开一个带标签的生命周期作用域
    pub fn begin_named_scope(&self, name: impl Into<String>) -> LifetimeScope {
        LifetimeScope::root(self.inner.clone(), Some(name.into()))
    }

    /// 获取工作单元对应的请求作用域，不存在时创建
    ///
    /// 没有工作单元时返回 `Ok(None)`。
    pub fn scope_for_unit(
        &self,
        unit: Option<UnitId>,
    ) -> Result<Option<Arc<LifetimeScope>>, ContainerError> {
        match unit {
            Some(unit) => self.unit_scope(unit).map(Some),
            None => Ok(None),
        }
    }

    pub(crate) fn unit_scope(&self, unit: UnitId) -> Result<Arc<LifetimeScope>, ContainerError> {
        self.inner.ensure_live()?;

        let scope = self
            .inner
            .unit_scopes
            .entry(unit)
            .or_insert_with(|| {
                Arc::new(LifetimeScope::root(
                    self.inner.clone(),
                    Some(format!("unit-{}", unit)),
                ))
            })
            .clone();

        // 与 dispose 并发时，dispose 可能已经清空了映射表
        if self.is_disposed() {
            self.inner.unit_scopes.remove(&unit);
            scope.close();
            return Err(ContainerError::Disposed(self.inner.id));
        }
        Ok(scope)
    }

    /// 结束工作单元，关闭其请求作用域；该单元未使用此容器时返回 false
    pub fn end_unit(&self, unit: UnitId) -> bool {
        match self.inner.unit_scopes.remove(&unit) {
            Some((_, scope)) => {
                scope.close();
                true
            }
            None => false,
        }
    }

    /// 当前打开的请求作用域数量
    pub fn active_unit_scopes(&self) -> usize {
        self.inner.unit_scopes.len()
    }

    /// 释放容器：关闭所有请求作用域，逆序释放已创建的单例，最后关闭根作用域
    ///
    /// 只有第一次调用会执行释放，之后的调用直接返回 `Ok(())`。
    /// 单个组件释放失败不会中断其余组件的释放，失败信息汇总在 `DisposalFailed` 中。
    pub fn dispose(&self) -> Result<(), ContainerError> {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let unit_ids: Vec<UnitId> = self.inner.unit_scopes.iter().map(|e| *e.key()).collect();
        for unit in unit_ids {
            if let Some((_, scope)) = self.inner.unit_scopes.remove(&unit) {
                scope.close();
            }
        }

        let order = std::mem::take(&mut *self.inner.singleton_order.lock());
        let mut failures = Vec::new();
        for type_id in order.into_iter().rev() {
            let Some((_, cell)) = self.inner.singletons.remove(&type_id) else {
                continue;
            };
            let Some(registration) = self.inner.registrations.get(&type_id) else {
                continue;
            };
            let (Some(release), Some(instance)) = (&registration.release, cell.get()) else {
                continue;
            };
            if let Err(e) = release(instance) {
                warn!(
                    container = self.inner.id,
                    service = registration.type_name,
                    error = %e,
                    "singleton failed to release"
                );
                failures.push(format!("{}: {}", registration.type_name, e));
            }
        }
        self.inner.singletons.clear();
        // 单例之后释放其依赖
        failures.extend(release_state(&self.inner.root_state, ROOT_SCOPE_NAME));

        debug!(container = self.inner.id, failures = failures.len(), "container disposed");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContainerError::DisposalFailed(failures))
        }
    }

    /// 获取容器统计信息
    pub fn get_stats(&self) -> ContainerStats {
        let stats = &self.inner.stats;
        ContainerStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("services", &self.inner.registrations.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl ContainerInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn ensure_live(&self) -> Result<(), ContainerError> {
        if self.disposed.load(Ordering::Acquire) {
            Err(ContainerError::Disposed(self.id))
        } else {
            Ok(())
        }
    }

    pub(crate) fn root_state(&self) -> Arc<Mutex<ScopeState>> {
        self.root_state.clone()
    }

    pub(crate) fn registration(&self, type_id: &TypeId) -> Option<&Registration> {
        self.registrations.get(type_id)
    }

    /// 按生命周期解析服务；作用域与瞬态实例由请求的作用域负责持有
    pub(crate) fn resolve_in(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        scope: &LifetimeScope,
    ) -> Result<Instance, ContainerError> {
        self.stats.total_resolutions.fetch_add(1, Ordering::Relaxed);
        self.ensure_live()?;

        let registration = self
            .registration(&type_id)
            .ok_or(ContainerError::ServiceNotRegistered(type_name))?;

        match registration.lifetime {
            ServiceLifetime::Singleton => self.singleton(type_id, registration, scope),
            ServiceLifetime::Scoped => scope.scoped_instance(type_id, registration),
            ServiceLifetime::Transient => scope.transient_instance(registration),
        }
    }

    fn singleton(
        &self,
        type_id: TypeId,
        registration: &Registration,
        scope: &LifetimeScope,
    ) -> Result<Instance, ContainerError> {
        // 获取或创建OnceCell；克隆后立即释放 DashMap 的分片锁
        let cell = self
            .singletons
            .entry(type_id)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(instance) = cell.get() {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(instance.clone());
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        cell.get_or_try_init(|| {
            // 单例不依赖于发起解析的作用域
            let root = LifetimeScope::container_root(scope.container().clone());
            let instance = (registration.factory)(&root)?;
            self.singleton_order.lock().push(type_id);
            Ok(instance)
        })
        .cloned()
    }
}

/// 容器统计信息
#[derive(Debug, Clone)]
pub struct ContainerStats {
    pub total_resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

impl ContainerStats {
    /// 获取总解析次数
    pub fn total(&self) -> usize {
        self.total_resolutions
    }

    /// 单例缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}
