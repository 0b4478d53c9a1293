//! 容器注册缓存
//!
//! 以作用域标识为键缓存已构建的容器。读取时分两级校验：
//! 1. 距上次刷新不足刷新周期，直接返回缓存的容器；
//! 2. 超过刷新周期后重新读取作用域链上的配置时间戳，任一级别比上次刷新更新时整体重建。
//!    时间戳无法解析的级别视为已修改，直到该级别的内容被一次构建（成功或失败）处理过。
//!
//! 构建过程中不持有任何锁；发布新条目时比较代次（generation），
//! 并发构建中只有一个结果被发布，其余的容器会被立即释放。

pub mod unit;

pub use unit::UnitOfWork;

use crate::clock::Clock;
use crate::config::RegistrySettings;
use crate::container::{Container, ContainerFactory};
use crate::errors::{RegistryError, RegistryResult};
use crate::logging::OperationTimer;
use crate::modules::{ModuleConfigStore, ModuleConfiguration};
use crate::scope::{ScopeChain, ScopeId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 缓存项
struct RegistryCacheEntry {
    container: Arc<Container>,
    /// 本次构建开始（读取配置之前）的时间
    last_refresh: DateTime<Utc>,
    generation: u64,
    /// 构建失败的最新配置时间戳；不超过它的配置不再触发重建
    rejected_through: Option<DateTime<Utc>>,
    /// 已处理过的、时间戳无法解析的级别及其内容
    unreadable_seen: Vec<(ScopeId, String)>,
}

/// 缓存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// 在刷新周期内直接命中的次数
    pub hits: u64,
    /// 超过刷新周期后重新读取配置的次数
    pub staleness_checks: u64,
    /// 成功发布的构建次数（含首次构建）
    pub rebuilds: u64,
    pub failed_builds: u64,
}

impl CacheStats {
    /// 计算命中率（未重建即视为命中）
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.staleness_checks + self.rebuilds;
        if total == 0 {
            0.0
        } else {
            (total - self.rebuilds) as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct InnerStats {
    hits: AtomicU64,
    staleness_checks: AtomicU64,
    rebuilds: AtomicU64,
    failed_builds: AtomicU64,
}

/// `invalidate_all` 的结果
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    pub disposed: usize,
    /// 释放失败的容器及原因
    pub failures: Vec<String>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 进程内的容器注册缓存，由宿主在启动时创建，以 `Arc` 共享
pub struct RegistryCache {
    store: ModuleConfigStore,
    factory: Arc<dyn ContainerFactory>,
    refresh_period: Duration,
    entries: RwLock<HashMap<ScopeId, RegistryCacheEntry>>,
    next_generation: AtomicU64,
    stats: InnerStats,
}

impl RegistryCache {
    pub fn new(
        store: ModuleConfigStore,
        factory: Arc<dyn ContainerFactory>,
        settings: RegistrySettings,
    ) -> Self {
        Self {
            store,
            factory,
            refresh_period: settings.refresh_period,
            entries: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            stats: InnerStats::default(),
        }
    }

    pub fn store(&self) -> &ModuleConfigStore {
        &self.store
    }

    pub fn refresh_period(&self) -> Duration {
        self.refresh_period
    }

    /// 返回作用域链末端对应的容器，必要时构建或重建
    ///
    /// 构建失败时错误直接返回，原有容器保留；此后在配置再次变化之前，
    /// 调用方会继续拿到原有容器。
    pub fn get_or_build(&self, chain: &ScopeChain) -> RegistryResult<Arc<Container>> {
        let key = chain.leaf().id();
        // 在读取配置之前取时间，避免漏掉构建期间发生的修改
        let now = self.store.clock().now();

        let cached = {
            let entries = self.entries.read();
            entries.get(&key).map(|entry| {
                (
                    entry.container.clone(),
                    entry.last_refresh,
                    entry.generation,
                    entry.rejected_through,
                    entry.unreadable_seen.clone(),
                )
            })
        };

        let Some((container, last_refresh, generation, rejected_through, unreadable_seen)) = cached
        else {
            debug!(scope = %chain.leaf(), "no cached container");
            return self.build(chain, None, now, None);
        };

        if !self.period_elapsed(now, last_refresh) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            debug!(scope = %chain.leaf(), container = container.id(), "cache hit within refresh period");
            return Ok(container);
        }

        self.stats.staleness_checks.fetch_add(1, Ordering::Relaxed);
        let configurations = self.store.read_chain(chain)?;
        let newest = newest_change(&configurations);
        let changed = newest.is_some_and(|newest| {
            newest > last_refresh && rejected_through.map_or(true, |rejected| newest > rejected)
        }) || unreadable_levels(&configurations)
            .iter()
            .any(|level| !unreadable_seen.contains(level));

        if !changed {
            debug!(scope = %chain.leaf(), container = container.id(), "module configuration unchanged");
            return Ok(container);
        }

        info!(scope = %chain.leaf(), "module configuration changed, rebuilding container");
        self.build(chain, Some(generation), now, Some(configurations))
    }

    fn period_elapsed(&self, now: DateTime<Utc>, last_refresh: DateTime<Utc>) -> bool {
        match (now - last_refresh).to_std() {
            Ok(elapsed) => elapsed >= self.refresh_period,
            // 时钟回拨：视为仍在刷新周期内
            Err(_) => false,
        }
    }

    fn build(
        &self,
        chain: &ScopeChain,
        expected_generation: Option<u64>,
        started: DateTime<Utc>,
        configurations: Option<Vec<ModuleConfiguration>>,
    ) -> RegistryResult<Arc<Container>> {
        let key = chain.leaf().id();
        let configurations = match configurations {
            Some(configurations) => configurations,
            None => self.store.read_chain(chain)?,
        };

        let timer = OperationTimer::new("registry.build")
            .with_metadata("scope", chain.leaf())
            .with_metadata("levels", configurations.len());

        let built = ModuleConfigStore::modules_from(&configurations)
            .map_err(RegistryError::from)
            .and_then(|modules| {
                self.factory
                    .build(&modules)
                    .map_err(|source| RegistryError::Build {
                        scope: chain.leaf().to_string(),
                        source,
                    })
            });

        let container = match built {
            Ok(container) => Arc::new(container),
            Err(err) => {
                self.stats.failed_builds.fetch_add(1, Ordering::Relaxed);
                warn!(scope = %chain.leaf(), error = %err, "container build failed, keeping previous container");
                self.reject(key, expected_generation, &configurations);
                return Err(err);
            }
        };
        timer.finish();

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (lost_to, displaced) = {
            let mut entries = self.entries.write();
            let current = entries.get(&key).map(|entry| entry.generation);
            if current.is_none() || current == expected_generation {
                let displaced = entries.insert(
                    key,
                    RegistryCacheEntry {
                        container: container.clone(),
                        last_refresh: started,
                        generation,
                        rejected_through: None,
                        unreadable_seen: unreadable_levels(&configurations),
                    },
                );
                (None, displaced.map(|entry| entry.container))
            } else {
                (entries.get(&key).map(|entry| entry.container.clone()), None)
            }
        };

        // 锁外释放
        if let Some(winner) = lost_to {
            debug!(scope = %chain.leaf(), container = container.id(), "concurrent build already published, discarding ours");
            if let Err(e) = container.dispose() {
                warn!(container = container.id(), error = %e, "discarded container failed to release");
            }
            return Ok(winner);
        }

        self.stats.rebuilds.fetch_add(1, Ordering::Relaxed);
        if let Some(old) = displaced {
            info!(scope = %chain.leaf(), old = old.id(), new = container.id(), "container replaced");
            if let Err(e) = old.dispose() {
                warn!(container = old.id(), error = %e, "replaced container failed to release");
            }
        } else {
            info!(scope = %chain.leaf(), container = container.id(), "container built");
        }
        Ok(container)
    }

    fn reject(
        &self,
        key: ScopeId,
        expected_generation: Option<u64>,
        configurations: &[ModuleConfiguration],
    ) {
        let Some(generation) = expected_generation else {
            return;
        };
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&key) else {
            return;
        };
        if entry.generation != generation {
            return;
        }
        if let Some(newest) = newest_change(configurations) {
            entry.rejected_through = Some(entry.rejected_through.map_or(newest, |r| r.max(newest)));
        }
        for level in unreadable_levels(configurations) {
            if !entry.unreadable_seen.contains(&level) {
                entry.unreadable_seen.push(level);
            }
        }
    }

    /// 释放并移除单个作用域的容器
    pub fn invalidate(&self, scope: ScopeId) -> bool {
        let removed = self.entries.write().remove(&scope);
        match removed {
            Some(entry) => {
                if let Err(e) = entry.container.dispose() {
                    warn!(container = entry.container.id(), error = %e, "invalidated container failed to release");
                }
                true
            }
            None => false,
        }
    }

    /// 释放所有容器并清空缓存；单个容器释放失败不会中断其余容器的释放
    pub fn invalidate_all(&self) -> TeardownReport {
        let drained: Vec<(ScopeId, RegistryCacheEntry)> = self.entries.write().drain().collect();

        let mut report = TeardownReport::default();
        for (scope, entry) in drained {
            report.disposed += 1;
            if let Err(e) = entry.container.dispose() {
                warn!(scope = %scope, container = entry.container.id(), error = %e, "container failed to release during teardown");
                report.failures.push(format!("{}: {}", scope, e));
            }
        }

        info!(disposed = report.disposed, failures = report.failures.len(), "registry cache torn down");
        report
    }

    /// 当前缓存的所有容器
    pub fn snapshot(&self) -> Vec<Arc<Container>> {
        self.entries
            .read()
            .values()
            .map(|entry| entry.container.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// 获取缓存统计信息
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            staleness_checks: self.stats.staleness_checks.load(Ordering::Relaxed),
            rebuilds: self.stats.rebuilds.load(Ordering::Relaxed),
            failed_builds: self.stats.failed_builds.load(Ordering::Relaxed),
        }
    }
}

fn newest_change(configurations: &[ModuleConfiguration]) -> Option<DateTime<Utc>> {
    configurations.iter().map(ModuleConfiguration::modified_at).max()
}

fn unreadable_levels(configurations: &[ModuleConfiguration]) -> Vec<(ScopeId, String)> {
    configurations
        .iter()
        .filter(|c| c.stamp_unreadable())
        .map(|c| (c.scope_id(), c.raw().to_string()))
        .collect()
}
