//! 工作单元：一次请求或任务，由调用方显式传递

use super::RegistryCache;
use crate::container::{Container, LifetimeScope, UnitId};
use crate::errors::ContainerError;
use std::sync::Arc;
use tracing::debug;

/// 请求作用域在每个容器内以工作单元标识为键；结束工作单元时关闭所有缓存容器中的对应作用域。
pub struct UnitOfWork {
    id: UnitId,
    cache: Arc<RegistryCache>,
    ended: bool,
}

impl UnitOfWork {
    pub fn begin(cache: Arc<RegistryCache>) -> Self {
        let id = UnitId::new();
        debug!(unit = %id, "unit of work started");
        Self {
            id,
            cache,
            ended: false,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    /// 本工作单元在 `container` 中的请求作用域，首次使用时打开
    pub fn scope(&self, container: &Container) -> Result<Arc<LifetimeScope>, ContainerError> {
        container.unit_scope(self.id)
    }

    /// 关闭本工作单元的请求作用域；丢弃工作单元时同样会关闭
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let closed = self
            .cache
            .snapshot()
            .iter()
            .filter(|container| container.end_unit(self.id))
            .count();
        debug!(unit = %self.id, closed, "unit of work ended");
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.finish();
    }
}
