//! 服务工厂与注册描述
//!
//! 工厂以容器句柄为唯一参数，异步返回 `Arc<T>`；描述符把工厂、生命周期、
//! 依赖声明和释放钩子打包交给容器注册。

use crate::token::{AnyToken, ServiceToken};
use async_trait::async_trait;
use futures::future::BoxFuture;
use infrastructure_common::{BoxError, Lifetime};
use std::future::Future;
use std::sync::Arc;

/// 工厂返回的 future
pub type FactoryFuture<T> = BoxFuture<'static, Result<Arc<T>, BoxError>>;

/// 类型化的服务工厂，`C` 为容器句柄类型
pub type ServiceFactoryFn<C, T> = Arc<dyn Fn(C) -> FactoryFuture<T> + Send + Sync>;

/// 释放钩子返回的 future
pub type DisposeFuture = BoxFuture<'static, Result<(), BoxError>>;

/// 类型化的释放钩子
pub type DisposerFn<T> = Arc<dyn Fn(Arc<T>) -> DisposeFuture + Send + Sync>;

/// 可释放资源的服务
///
/// 容器在 `dispose` 时对每个已缓存的实例最多调用一次。
#[async_trait]
pub trait Disposable: Send + Sync {
    /// 释放持有的资源
    async fn dispose(&self) -> Result<(), BoxError>;
}

/// 服务实例来源
pub enum ServiceSource<C, T: ?Sized> {
    /// 由工厂构造
    Factory(ServiceFactoryFn<C, T>),
    /// 预先构造好的实例
    Instance(Arc<T>),
}

/// 服务注册描述
pub struct ServiceDescriptor<C, T: ?Sized> {
    /// 服务标识
    pub token: ServiceToken<T>,
    /// 生命周期
    pub lifetime: Lifetime,
    /// 声明的依赖，按声明顺序解析
    pub dependencies: Vec<AnyToken>,
    /// 实例来源
    pub source: ServiceSource<C, T>,
    /// 释放钩子
    pub disposer: Option<DisposerFn<T>>,
}

impl<C, T> ServiceDescriptor<C, T>
where
    C: Send + 'static,
    T: ?Sized + Send + Sync + 'static,
{
    /// 创建单例服务描述
    pub fn singleton<F, Fut, E>(token: &ServiceToken<T>, factory: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_factory(token, Lifetime::Singleton, factory)
    }

    /// 创建瞬时服务描述
    pub fn transient<F, Fut, E>(token: &ServiceToken<T>, factory: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_factory(token, Lifetime::Transient, factory)
    }

    /// 创建实例服务描述，实例按单例对待
    pub fn instance(token: &ServiceToken<T>, instance: Arc<T>) -> Self {
        Self {
            token: *token,
            lifetime: Lifetime::Singleton,
            dependencies: Vec::new(),
            source: ServiceSource::Instance(instance),
            disposer: None,
        }
    }

    fn from_factory<F, Fut, E>(token: &ServiceToken<T>, lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let factory: ServiceFactoryFn<C, T> = Arc::new(move |container: C| -> FactoryFuture<T> {
            let pending = factory(container);
            Box::pin(async move { pending.await.map_err(Into::into) })
        });

        Self {
            token: *token,
            lifetime,
            dependencies: Vec::new(),
            source: ServiceSource::Factory(factory),
            disposer: None,
        }
    }

    /// 声明一个依赖
    pub fn depends_on<D>(mut self, dependency: &ServiceToken<D>) -> Self
    where
        D: ?Sized + 'static,
    {
        self.dependencies.push(dependency.erase());
        self
    }

    /// 追加一组依赖
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = AnyToken>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    /// 设置自定义释放钩子
    pub fn with_disposer<F, Fut>(mut self, disposer: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.disposer = Some(Arc::new(move |instance: Arc<T>| -> DisposeFuture {
            Box::pin(disposer(instance))
        }));
        self
    }
}

impl<C, T> ServiceDescriptor<C, T>
where
    C: Send + 'static,
    T: ?Sized + Disposable + 'static,
{
    /// 使用 [`Disposable`] 实现作为释放钩子
    pub fn disposable(self) -> Self {
        self.with_disposer(|instance: Arc<T>| async move { instance.dispose().await })
    }
}

impl<C, T: ?Sized> std::fmt::Debug for ServiceDescriptor<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match self.source {
            ServiceSource::Factory(_) => "<factory>",
            ServiceSource::Instance(_) => "<instance>",
        };
        f.debug_struct("ServiceDescriptor")
            .field("token", &self.token)
            .field("lifetime", &self.lifetime)
            .field("dependencies", &self.dependencies)
            .field("source", &source)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}
