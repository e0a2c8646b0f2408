//! 依赖注入容器抽象接口
//!
//! 提供依赖注入容器的核心抽象

use crate::registry::ServiceRegistrar;
use crate::resolver::ServiceResolver;
use crate::token::{AnyToken, ServiceToken};
use async_trait::async_trait;
use infrastructure_common::DependencyResult;

/// 依赖注入容器 trait
///
/// 在注册与解析之外负责实例释放和依赖关系校验
#[async_trait]
pub trait DiContainer: ServiceRegistrar + ServiceResolver {
    /// 清空所有注册信息，不调用释放钩子，仅用于测试隔离
    fn clear(&self);

    /// 释放所有已缓存实例并清空容器
    ///
    /// 单个实例释放失败只记录日志，不会中断其余实例的释放。
    async fn dispose(&self) -> DisposeReport;

    /// 提前释放单个已缓存实例，之后的整体释放会跳过它
    async fn dispose_service<T>(&self, token: &ServiceToken<T>) -> DependencyResult<DisposeReport>
    where
        T: ?Sized + Send + Sync + 'static;

    /// 校验声明的依赖关系（未注册的依赖、循环依赖）
    fn validate(&self) -> DependencyResult<()>;

    /// 获取容器统计信息
    fn stats(&self) -> ContainerStats;
}

/// 单个实例释放失败的记录
#[derive(Debug, Clone)]
pub struct DisposeFailure {
    /// 服务标识
    pub token: AnyToken,
    /// 错误信息
    pub message: String,
}

/// 释放结果汇总
#[derive(Debug, Clone, Default)]
pub struct DisposeReport {
    /// 成功释放的服务，按释放顺序排列
    pub disposed: Vec<AnyToken>,
    /// 释放失败的服务
    pub failures: Vec<DisposeFailure>,
}

impl DisposeReport {
    /// 是否全部释放成功
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// 尝试释放的实例总数
    pub fn attempted(&self) -> usize {
        self.disposed.len() + self.failures.len()
    }

    /// 合并另一份释放结果
    pub fn merge(&mut self, other: Self) {
        self.disposed.extend(other.disposed);
        self.failures.extend(other.failures);
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 已注册服务数量
    pub registered_services: usize,
    /// 已缓存的单例数量
    pub cached_singletons: usize,
    /// 正在构造中的服务数量
    pub in_flight: usize,
    /// 工厂调用总次数
    pub factory_invocations: u64,
    /// 工厂失败次数
    pub factory_failures: u64,
}
