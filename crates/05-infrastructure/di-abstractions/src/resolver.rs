//! 服务解析抽象接口
//!
//! 提供依赖解析和服务实例化的能力

use crate::token::{format_chain, AnyToken, ServiceToken};
use async_trait::async_trait;
use infrastructure_common::{DependencyError, DependencyResult};
use std::any::Any;
use std::sync::Arc;

/// 服务解析器 trait
#[async_trait]
pub trait ServiceResolver: Send + Sync {
    /// 异步解析服务，必要时先递归解析其声明的依赖
    async fn resolve<T>(&self, token: &ServiceToken<T>) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static;

    /// 按擦除类型的标识解析服务
    async fn resolve_any(&self, token: AnyToken) -> DependencyResult<Arc<dyn Any + Send + Sync>>;

    /// 同步获取已缓存的单例
    ///
    /// 只适用于至少成功异步解析过一次的单例服务。
    fn resolve_sync<T>(&self, token: &ServiceToken<T>) -> DependencyResult<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static;
}

/// 解析路径
///
/// 记录一条解析调用链上正在解析的服务，用于检测循环依赖。
/// 解析依赖时通过 [`ResolutionPath::child`] 派生新路径，
/// 同一父路径派生出的兄弟分支互不可见。
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    chain: Vec<AnyToken>,
}

impl ResolutionPath {
    /// 创建空的解析路径
    pub fn new() -> Self {
        Self::default()
    }

    /// 路径上是否已包含该服务
    pub fn contains(&self, token: AnyToken) -> bool {
        self.chain.contains(&token)
    }

    /// 把服务加入路径，若已在路径上则返回包含完整路径的循环依赖错误
    pub fn push(&mut self, token: AnyToken) -> DependencyResult<()> {
        if let Some(position) = self.chain.iter().position(|t| *t == token) {
            let mut cycle = self.chain[position..].to_vec();
            cycle.push(token);
            return Err(DependencyError::CircularDependency {
                dependency_chain: format_chain(&cycle),
            });
        }
        self.chain.push(token);
        Ok(())
    }

    /// 派生一条追加了该服务的新路径，原路径保持不变
    pub fn child(&self, token: AnyToken) -> DependencyResult<Self> {
        let mut path = self.clone();
        path.push(token)?;
        Ok(path)
    }

    /// 当前路径
    pub fn tokens(&self) -> &[AnyToken] {
        &self.chain
    }

    /// 当前深度
    pub fn depth(&self) -> usize {
        self.chain.len()
    }
}
