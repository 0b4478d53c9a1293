//! 生命周期作用域
//!
//! 作用域持有自己创建的作用域实例，以及经由它解析的可释放瞬态实例。
//! 关闭时按创建的逆序释放；单例及其依赖归容器所有。

use super::builder::{Instance, Registration, Release};
use super::core::ContainerInner;
use crate::errors::ContainerError;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) const ROOT_SCOPE_NAME: &str = "root";

/// 工作单元标识（通常对应一次请求）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Owned {
    type_name: &'static str,
    instance: Instance,
    release: Release,
}

#[derive(Default)]
pub(crate) struct ScopeState {
    closed: bool,
    instances: HashMap<TypeId, Instance>,
    owned: Vec<Owned>,
}

/// 从 [`Container`](super::Container) 打开的解析上下文
///
/// 作用域被丢弃时自动关闭。
pub struct LifetimeScope {
    container: Arc<ContainerInner>,
    id: u64,
    name: Option<String>,
    depth: usize,
    state: Arc<Mutex<ScopeState>>,
    /// 容器根状态的视图：不能关闭，由容器在释放时关闭
    container_owned: bool,
}

impl LifetimeScope {
    pub(crate) fn root(container: Arc<ContainerInner>, name: Option<String>) -> Self {
        Self::with_depth(container, name, 0)
    }

    /// 单例工厂使用的根作用域视图，依赖归容器所有
    pub(crate) fn container_root(container: Arc<ContainerInner>) -> Self {
        let state = container.root_state();
        Self {
            container,
            id: 0,
            name: Some(ROOT_SCOPE_NAME.to_string()),
            depth: 0,
            state,
            container_owned: true,
        }
    }

    fn with_depth(container: Arc<ContainerInner>, name: Option<String>, depth: usize) -> Self {
        let id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(container = container.id(), scope = id, name = ?name, depth, "lifetime scope opened");
        Self {
            container,
            id,
            name,
            depth,
            state: Arc::new(Mutex::new(ScopeState::default())),
            container_owned: false,
        }
    }

    pub(crate) fn container(&self) -> &Arc<ContainerInner> {
        &self.container
    }

    /// 在同一容器上打开嵌套作用域
    pub fn begin_scope(&self) -> LifetimeScope {
        Self::with_depth(self.container.clone(), None, self.depth + 1)
    }

    pub fn begin_named_scope(&self, name: impl Into<String>) -> LifetimeScope {
        Self::with_depth(self.container.clone(), Some(name.into()), self.depth + 1)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn container_id(&self) -> u64 {
        self.container.id()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// 按注册的生命周期解析 `T`
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        if self.is_closed() {
            return Err(ContainerError::ScopeClosed(self.label()));
        }

        let type_name = std::any::type_name::<T>();
        let instance = self
            .container
            .resolve_in(TypeId::of::<T>(), type_name, self)?;

        instance
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeCastFailed {
                expected: type_name.to_string(),
                actual: "unknown type".to_string(),
            })
    }

    /// 按创建的逆序释放本作用域持有的组件；重复调用无效果
    ///
    /// 容器根作用域只随容器释放。
    pub fn close(&self) {
        if self.container_owned {
            return;
        }
        release_state(&self.state, &self.label());
    }

    pub(crate) fn scoped_instance(
        &self,
        type_id: TypeId,
        registration: &Registration,
    ) -> Result<Instance, ContainerError> {
        if let Some(existing) = self.state.lock().instances.get(&type_id) {
            return Ok(existing.clone());
        }

        // 工厂在锁外执行，以便解析自身的依赖
        let created = (registration.factory)(self)?;

        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            self.discard(registration, &created);
            return Err(ContainerError::ScopeClosed(self.label()));
        }
        if let Some(existing) = state.instances.get(&type_id).cloned() {
            drop(state);
            self.discard(registration, &created);
            return Ok(existing);
        }
        state.instances.insert(type_id, created.clone());
        if let Some(release) = &registration.release {
            state.owned.push(Owned {
                type_name: registration.type_name,
                instance: created.clone(),
                release: release.clone(),
            });
        }
        Ok(created)
    }

    pub(crate) fn transient_instance(
        &self,
        registration: &Registration,
    ) -> Result<Instance, ContainerError> {
        let created = (registration.factory)(self)?;
        if let Some(release) = &registration.release {
            let mut state = self.state.lock();
            if state.closed {
                drop(state);
                self.discard(registration, &created);
                return Err(ContainerError::ScopeClosed(self.label()));
            }
            state.owned.push(Owned {
                type_name: registration.type_name,
                instance: created.clone(),
                release: release.clone(),
            });
        }
        Ok(created)
    }

    fn discard(&self, registration: &Registration, instance: &Instance) {
        if let Some(release) = &registration.release {
            if let Err(e) = release(instance) {
                warn!(scope = %self.label(), service = registration.type_name, error = %e, "discarded instance failed to release");
            }
        }
    }

    fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.id),
        }
    }
}

/// 关闭作用域状态并逆序释放其组件，返回释放失败的说明
pub(crate) fn release_state(state: &Mutex<ScopeState>, label: &str) -> Vec<String> {
    let (instances, owned) = {
        let mut state = state.lock();
        if state.closed {
            return Vec::new();
        }
        state.closed = true;
        (
            std::mem::take(&mut state.instances),
            std::mem::take(&mut state.owned),
        )
    };

    let released = owned.len();
    let mut failures = Vec::new();
    for component in owned.into_iter().rev() {
        if let Err(e) = (component.release)(&component.instance) {
            warn!(
                scope = %label,
                service = component.type_name,
                error = %e,
                "component failed to release"
            );
            failures.push(format!("{}: {}", component.type_name, e));
        }
    }
    drop(instances);
    debug!(scope = %label, released, "lifetime scope closed");
    failures
}

impl Drop for LifetimeScope {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("container", &self.container.id())
            .finish()
    }
}
