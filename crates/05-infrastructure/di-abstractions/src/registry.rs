//! 服务注册抽象接口

use crate::factory::ServiceDescriptor;
use crate::token::{format_chain, AnyToken, ServiceToken};
use infrastructure_common::{BoxError, DependencyError, DependencyResult};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

/// 服务注册 trait
///
/// 注册是同步操作：重复注册属于配置错误，在调用处立即返回，
/// 而不是推迟到解析时才暴露。
pub trait ServiceRegistrar: Clone + Send + Sync + Sized + 'static {
    /// 按描述注册服务
    fn register<T>(&self, descriptor: ServiceDescriptor<Self, T>) -> DependencyResult<()>
    where
        T: ?Sized + Send + Sync + 'static;

    /// 注册单例服务
    fn register_singleton<T, F, Fut, E>(
        &self,
        token: &ServiceToken<T>,
        dependencies: &[AnyToken],
        factory: F,
    ) -> DependencyResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Self) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.register(
            ServiceDescriptor::singleton(token, factory)
                .with_dependencies(dependencies.iter().copied()),
        )
    }

    /// 注册瞬时服务
    fn register_transient<T, F, Fut, E>(
        &self,
        token: &ServiceToken<T>,
        dependencies: &[AnyToken],
        factory: F,
    ) -> DependencyResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Self) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<T>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.register(
            ServiceDescriptor::transient(token, factory)
                .with_dependencies(dependencies.iter().copied()),
        )
    }

    /// 注册现成实例
    fn register_instance<T>(&self, token: &ServiceToken<T>, instance: Arc<T>) -> DependencyResult<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(ServiceDescriptor::instance(token, instance))
    }

    /// 检查服务是否已注册
    fn is_registered<T>(&self, token: &ServiceToken<T>) -> bool
    where
        T: ?Sized + 'static;

    /// 按注册顺序列出所有服务标识
    fn get_registered_services(&self) -> Vec<AnyToken>;
}

/// 依赖图节点
#[derive(Debug, Clone)]
pub struct DependencyGraphNode {
    /// 服务标识
    pub token: AnyToken,
    /// 声明的依赖
    pub dependencies: Vec<AnyToken>,
}

/// 循环依赖检测器
///
/// 基于声明的依赖关系做静态检查，不构造任何实例。
pub trait CircularDependencyDetector: Send + Sync {
    /// 检测整张图中的循环依赖
    fn detect_circular_dependencies(&self, graph: &[DependencyGraphNode]) -> DependencyResult<()>;

    /// 只检测从指定服务出发可达的循环依赖
    fn detect_from(&self, graph: &[DependencyGraphNode], start: AnyToken) -> DependencyResult<()>;
}

/// 默认循环依赖检测器
#[derive(Debug, Default)]
pub struct DefaultCircularDependencyDetector;

impl CircularDependencyDetector for DefaultCircularDependencyDetector {
    fn detect_circular_dependencies(&self, graph: &[DependencyGraphNode]) -> DependencyResult<()> {
        let index = Self::index(graph);
        let mut finished = HashSet::new();

        for node in graph {
            let mut path = Vec::new();
            Self::visit(node.token, &index, &mut path, &mut finished)?;
        }

        Ok(())
    }

    fn detect_from(&self, graph: &[DependencyGraphNode], start: AnyToken) -> DependencyResult<()> {
        let index = Self::index(graph);
        let mut path = Vec::new();
        Self::visit(start, &index, &mut path, &mut HashSet::new())
    }
}

impl DefaultCircularDependencyDetector {
    fn index(graph: &[DependencyGraphNode]) -> HashMap<AnyToken, &DependencyGraphNode> {
        graph.iter().map(|node| (node.token, node)).collect()
    }

    // path 保持访问顺序，用于输出完整的循环路径
    fn visit(
        current: AnyToken,
        index: &HashMap<AnyToken, &DependencyGraphNode>,
        path: &mut Vec<AnyToken>,
        finished: &mut HashSet<AnyToken>,
    ) -> DependencyResult<()> {
        if let Some(position) = path.iter().position(|token| *token == current) {
            let mut cycle = path[position..].to_vec();
            cycle.push(current);
            return Err(DependencyError::CircularDependency {
                dependency_chain: format_chain(&cycle),
            });
        }

        if finished.contains(&current) {
            return Ok(());
        }

        path.push(current);
        if let Some(node) = index.get(&current) {
            for dependency in &node.dependencies {
                Self::visit(*dependency, index, path, finished)?;
            }
        }
        path.pop();
        finished.insert(current);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(token: &ServiceToken<()>, dependencies: &[&ServiceToken<()>]) -> DependencyGraphNode {
        DependencyGraphNode {
            token: token.erase(),
            dependencies: dependencies.iter().map(|d| d.erase()).collect(),
        }
    }

    #[test]
    fn test_detects_three_node_cycle_in_order() {
        let a = ServiceToken::new("a");
        let b = ServiceToken::new("b");
        let c = ServiceToken::new("c");
        let graph = vec![node(&a, &[&b]), node(&b, &[&c]), node(&c, &[&a])];

        let error = DefaultCircularDependencyDetector
            .detect_from(&graph, a.erase())
            .unwrap_err();
        match error {
            DependencyError::CircularDependency { dependency_chain } => {
                assert_eq!(dependency_chain, "a -> b -> c -> a");
            }
            other => panic!("期望循环依赖错误, 实际: {other:?}"),
        }
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let config = ServiceToken::new("config");
        let logger = ServiceToken::new("logger");
        let database = ServiceToken::new("database");
        let graph = vec![
            node(&config, &[]),
            node(&logger, &[&config]),
            node(&database, &[&config, &logger]),
        ];

        assert!(DefaultCircularDependencyDetector
            .detect_circular_dependencies(&graph)
            .is_ok());
    }
}
