//! 依赖注入容器实现

use crate::registration::{downcast, ErasedInstance, Registration};
use crate::resolution::{self, ResolutionGuard};
use async_trait::async_trait;
use di_abstractions::{
    AnyToken, CircularDependencyDetector, ContainerStats, DefaultCircularDependencyDetector,
    DependencyGraphNode, DiContainer, DisposeFailure, DisposeReport, ResolutionPath,
    ServiceDescriptor, ServiceRegistrar, ServiceResolver, ServiceToken, TokenId,
};
use futures::future::BoxFuture;
use futures::FutureExt;
use infrastructure_common::{DependencyError, DependencyResult};
use parking_lot::RwLock;
use std::any::Any;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 依赖注入容器
///
/// 句柄可以廉价克隆，所有克隆共享同一份注册表和单例缓存。
///
/// - 单例在首次解析时构造，之后始终返回同一实例；
///   并发解析同一个尚未构造的单例时，工厂只会执行一次，其余调用方等待结果。
/// - 瞬时服务每次解析都会调用工厂。
/// - 工厂失败时不缓存任何结果，下一次解析会重新调用工厂。
#[derive(Clone, Default)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
}

#[derive(Default)]
struct ContainerInner {
    registrations: RwLock<HashMap<TokenId, Arc<Registration>>>,
    next_sequence: AtomicU64,
    next_construction: AtomicU64,
    factory_invocations: AtomicU64,
    factory_failures: AtomicU64,
}

impl ServiceContainer {
    /// 创建空容器
    pub fn new() -> Self {
        Self::default()
    }

    fn registration(&self, token: AnyToken) -> DependencyResult<Arc<Registration>> {
        self.inner
            .registrations
            .read()
            .get(&token.id())
            .cloned()
            .ok_or_else(|| DependencyError::not_registered(token))
    }

    fn sorted_registrations(&self) -> Vec<Arc<Registration>> {
        let mut registrations: Vec<_> = self.inner.registrations.read().values().cloned().collect();
        registrations.sort_by_key(|registration| registration.sequence);
        registrations
    }

    fn dependency_graph(&self) -> Vec<DependencyGraphNode> {
        self.sorted_registrations()
            .iter()
            .map(|registration| DependencyGraphNode {
                token: registration.token,
                dependencies: registration.dependencies.clone(),
            })
            .collect()
    }

    fn next_construction_order(&self) -> u64 {
        self.inner.next_construction.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn resolve_erased(
        &self,
        token: AnyToken,
        parent: ResolutionPath,
    ) -> BoxFuture<'_, DependencyResult<ErasedInstance>> {
        Box::pin(async move {
            let registration = self.registration(token)?;
            if let Some(instance) = registration.cached() {
                return Ok(instance);
            }

            let path = parent.child(token)?;
            let guard = ResolutionGuard::enter(&registration);

            if !registration.lifetime.is_singleton() {
                return self.construct(&registration, &path).await;
            }

            if guard.is_contended() {
                // 另一条调用链正在构造该单例，等待之前先确认声明的依赖中没有环
                DefaultCircularDependencyDetector.detect_from(&self.dependency_graph(), token)?;
            }

            let instance = registration
                .instance_cell()
                .get_or_try_init(|| self.construct(&registration, &path))
                .await?;
            Ok(Arc::clone(instance))
        })
    }

    async fn construct(
        &self,
        registration: &Registration,
        path: &ResolutionPath,
    ) -> DependencyResult<ErasedInstance> {
        for dependency in &registration.dependencies {
            self.resolve_erased(*dependency, path.clone()).await?;
        }

        let Some(factory) = registration.factory() else {
            return Err(DependencyError::NotResolved {
                token: registration.token.to_string(),
            });
        };

        debug!("调用服务工厂: {} ({})", registration.token, registration.lifetime);
        self.inner.factory_invocations.fetch_add(1, Ordering::Relaxed);

        match resolution::within(path.clone(), factory(self.clone())).await {
            Ok(instance) => {
                if registration.lifetime.is_singleton() {
                    registration.mark_constructed(self.next_construction_order());
                    info!("单例服务构造完成: {}", registration.token);
                }
                Ok(instance)
            }
            Err(source) => {
                self.inner.factory_failures.fetch_add(1, Ordering::Relaxed);
                warn!("服务工厂执行失败: {} - {}", registration.token, source);
                // 工厂内部解析其他服务产生的容器错误直接向上传递
                match source.downcast::<DependencyError>() {
                    Ok(inner) => Err(*inner),
                    Err(source) => Err(DependencyError::Factory(source)),
                }
            }
        }
    }

    async fn dispose_registration(registration: &Registration) -> DisposeReport {
        let mut report = DisposeReport::default();
        let Some(pending) = registration.begin_dispose() else {
            return report;
        };

        let outcome = match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(outcome) => outcome.map_err(|error| error.to_string()),
            Err(_) => Err("释放钩子发生 panic".to_string()),
        };

        match outcome {
            Ok(()) => {
                debug!("服务已释放: {}", registration.token);
                report.disposed.push(registration.token);
            }
            Err(message) => {
                error!("服务释放失败: {} - {}", registration.token, message);
                report.failures.push(DisposeFailure {
                    token: registration.token,
                    message,
                });
            }
        }

        report
    }
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("registered_services", &self.inner.registrations.read().len())
            .finish()
    }
}

impl ServiceRegistrar for ServiceContainer {
    fn register<T>(&self, descriptor: ServiceDescriptor<Self, T>) -> DependencyResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let token = descriptor.token.erase();
        let mut registrations = self.inner.registrations.write();

        if registrations.contains_key(&token.id()) {
            error!("服务重复注册: {}", token);
            return Err(DependencyError::DuplicateRegistration {
                token: token.to_string(),
            });
        }

        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::SeqCst);
        let registration = Registration::from_descriptor(descriptor, sequence);
        if registration.cached().is_some() {
            registration.mark_constructed(self.next_construction_order());
        }

        info!(
            "注册服务: {} ({}, 依赖 {} 项)",
            token,
            registration.lifetime,
            registration.dependencies.len()
        );
        registrations.insert(token.id(), Arc::new(registration));

        Ok(())
    }

    fn is_registered<T>(&self, token: &ServiceToken<T>) -> bool
    where
        T: ?Sized + 'static,
    {
        self.inner.registrations.read().contains_key(&token.id())
    }

    fn get_registered_services(&self) -> Vec<AnyToken> {
        self.sorted_registrations()
            .iter()
            .map(|registration| registration.token)
            .collect()
    }
}

#[async_trait]
impl ServiceResolver for ServiceContainer {
    /// 解析服务
    ///
    /// 在工厂内部调用时沿用该工厂所在调用链的解析路径，同一调用链上
    /// 重复出现的服务立即报告循环依赖。工厂内部 `tokio::spawn` 出去的
    /// 解析不在同一调用链上：只存在于工厂代码中、又跨越任务的环无法
    /// 被发现，会一直等待对方构造完成，这类依赖必须通过注册时的依赖
    /// 声明表达出来。
    async fn resolve<T>(&self, token: &ServiceToken<T>) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let erased = token.erase();
        let instance = self
            .resolve_erased(erased, resolution::current_path())
            .await?;
        downcast::<T>(erased, &instance)
    }

    async fn resolve_any(&self, token: AnyToken) -> DependencyResult<Arc<dyn Any + Send + Sync>> {
        self.resolve_erased(token, resolution::current_path()).await
    }

    fn resolve_sync<T>(&self, token: &ServiceToken<T>) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let erased = token.erase();
        let registration = self.registration(erased)?;

        if !registration.lifetime.is_singleton() {
            return Err(DependencyError::TransientNotCached {
                token: erased.to_string(),
            });
        }

        match registration.cached() {
            Some(instance) => downcast::<T>(erased, &instance),
            None if registration.is_resolving() => Err(DependencyError::AlreadyResolving {
                token: erased.to_string(),
            }),
            None => Err(DependencyError::NotResolved {
                token: erased.to_string(),
            }),
        }
    }
}

#[async_trait]
impl DiContainer for ServiceContainer {
    fn clear(&self) {
        let mut registrations = self.inner.registrations.write();
        let count = registrations.len();
        registrations.clear();
        debug!("容器已清空, 移除 {} 项注册", count);
    }

    async fn dispose(&self) -> DisposeReport {
        let drained: Vec<Arc<Registration>> = self
            .inner
            .registrations
            .write()
            .drain()
            .map(|(_, registration)| registration)
            .collect();

        let mut pending: Vec<Arc<Registration>> = drained
            .into_iter()
            .filter(|registration| registration.has_disposer() && registration.cached().is_some())
            .collect();
        // 后构造的先释放，保证依赖方先于被依赖方释放
        pending.sort_by_key(|registration| Reverse(registration.constructed_at()));

        let mut report = DisposeReport::default();
        for registration in &pending {
            report.merge(Self::dispose_registration(registration).await);
        }

        info!(
            "容器释放完成: 成功 {} 项, 失败 {} 项",
            report.disposed.len(),
            report.failures.len()
        );
        report
    }

    async fn dispose_service<T>(&self, token: &ServiceToken<T>) -> DependencyResult<DisposeReport>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let registration = self.registration(token.erase())?;
        Ok(Self::dispose_registration(&registration).await)
    }

    fn validate(&self) -> DependencyResult<()> {
        let graph = self.dependency_graph();
        let known: HashSet<AnyToken> = graph.iter().map(|node| node.token).collect();

        for node in &graph {
            if let Some(missing) = node.dependencies.iter().find(|d| !known.contains(d)) {
                error!("服务 {} 依赖的 {} 未注册", node.token, missing);
                return Err(DependencyError::NotRegistered {
                    token: format!("{} (被 {} 依赖)", missing, node.token),
                });
            }
        }

        DefaultCircularDependencyDetector.detect_circular_dependencies(&graph)
    }

    fn stats(&self) -> ContainerStats {
        let registrations = self.inner.registrations.read();
        ContainerStats {
            registered_services: registrations.len(),
            cached_singletons: registrations
                .values()
                .filter(|r| r.lifetime.is_singleton() && r.cached().is_some())
                .count(),
            in_flight: registrations.values().filter(|r| r.is_resolving()).count(),
            factory_invocations: self.inner.factory_invocations.load(Ordering::Relaxed),
            factory_failures: self.inner.factory_failures.load(Ordering::Relaxed),
        }
    }
}
