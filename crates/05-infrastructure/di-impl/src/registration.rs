//! 服务注册信息

use crate::container::ServiceContainer;
use di_abstractions::{AnyToken, DisposeFuture, ServiceDescriptor, ServiceSource};
use futures::future::BoxFuture;
use infrastructure_common::{BoxError, DependencyError, DependencyResult, Lifetime};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// 擦除类型后的实例，内部保存的是 `Arc<T>`
pub(crate) type ErasedInstance = Arc<dyn Any + Send + Sync>;

type ErasedFactory =
    Arc<dyn Fn(ServiceContainer) -> BoxFuture<'static, Result<ErasedInstance, BoxError>> + Send + Sync>;

type ErasedDisposer = Arc<dyn Fn(&ErasedInstance) -> Option<DisposeFuture> + Send + Sync>;

/// 服务注册信息
pub(crate) struct Registration {
    /// 服务标识
    pub(crate) token: AnyToken,
    /// 生命周期
    pub(crate) lifetime: Lifetime,
    /// 声明的依赖
    pub(crate) dependencies: Vec<AnyToken>,
    /// 注册顺序
    pub(crate) sequence: u64,
    factory: Option<ErasedFactory>,
    /// 单例实例，构造中的调用方在此等待同一次构造
    instance: OnceCell<ErasedInstance>,
    disposer: Option<ErasedDisposer>,
    /// 正在进行中的解析数量
    resolving: AtomicUsize,
    /// 构造完成顺序，0 表示尚未构造
    constructed_at: AtomicU64,
    disposed: AtomicBool,
}

impl Registration {
    /// 从类型化描述创建注册信息
    pub(crate) fn from_descriptor<T>(
        descriptor: ServiceDescriptor<ServiceContainer, T>,
        sequence: u64,
    ) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let token = descriptor.token.erase();

        let (factory, instance) = match descriptor.source {
            ServiceSource::Factory(typed) => {
                let factory: ErasedFactory = Arc::new(move |container: ServiceContainer| {
                    let pending = typed(container);
                    let erased: BoxFuture<'static, Result<ErasedInstance, BoxError>> =
                        Box::pin(async move {
                            let instance = pending.await?;
                            Ok(Arc::new(instance) as ErasedInstance)
                        });
                    erased
                });
                (Some(factory), OnceCell::new())
            }
            ServiceSource::Instance(value) => (None, OnceCell::from(Arc::new(value) as ErasedInstance)),
        };

        let disposer = descriptor.disposer.map(|typed| -> ErasedDisposer {
            Arc::new(move |instance: &ErasedInstance| {
                instance
                    .downcast_ref::<Arc<T>>()
                    .map(|value| typed(Arc::clone(value)))
            })
        });

        Self {
            token,
            lifetime: descriptor.lifetime,
            dependencies: descriptor.dependencies,
            sequence,
            factory,
            instance,
            disposer,
            resolving: AtomicUsize::new(0),
            constructed_at: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn factory(&self) -> Option<&ErasedFactory> {
        self.factory.as_ref()
    }

    pub(crate) fn instance_cell(&self) -> &OnceCell<ErasedInstance> {
        &self.instance
    }

    /// 已缓存的单例实例
    pub(crate) fn cached(&self) -> Option<ErasedInstance> {
        self.instance.get().cloned()
    }

    /// 标记开始解析，返回此前正在进行的解析数量
    pub(crate) fn begin_resolving(&self) -> usize {
        self.resolving.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn end_resolving(&self) {
        self.resolving.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn is_resolving(&self) -> bool {
        self.resolving.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn mark_constructed(&self, order: u64) {
        self.constructed_at.store(order, Ordering::SeqCst);
    }

    pub(crate) fn constructed_at(&self) -> u64 {
        self.constructed_at.load(Ordering::SeqCst)
    }

    pub(crate) fn has_disposer(&self) -> bool {
        self.disposer.is_some()
    }

    /// 取得释放任务，每个实例最多返回一次
    pub(crate) fn begin_dispose(&self) -> Option<DisposeFuture> {
        let instance = self.instance.get()?;
        let disposer = self.disposer.as_ref()?;
        if self.disposed.swap(true, Ordering::SeqCst) {
            return None;
        }
        disposer(instance)
    }
}

/// 把擦除类型的实例还原为 `Arc<T>`
pub(crate) fn downcast<T>(token: AnyToken, instance: &ErasedInstance) -> DependencyResult<Arc<T>>
where
    T: ?Sized + Send + Sync + 'static,
{
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| DependencyError::TypeMismatch {
            token: token.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
}
