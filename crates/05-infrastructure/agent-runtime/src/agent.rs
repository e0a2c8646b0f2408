//! 智能体接口

use crate::config::AgentConfig;
use crate::context::AgentContext;
use crate::error::AgentError;
use async_trait::async_trait;
use di_impl::ServiceContainer;
use infrastructure_common::HealthStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 智能体业务接口
///
/// 实现者只关心业务逻辑，重试、超时、panic 捕获和状态管理都由
/// [`AgentRuntime`](crate::AgentRuntime) 负责。
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// 输入类型
    type Input: Send + Sync + 'static;
    /// 输出类型
    type Output: Send + 'static;

    /// 运行参数
    fn config(&self) -> &AgentConfig;

    /// 启动时调用一次，声明的依赖已在调用前解析完成
    async fn on_start(&self, _container: &ServiceContainer) -> Result<(), AgentError> {
        Ok(())
    }

    /// 处理一次请求，可能被多次调用（重试）
    async fn process(
        &self,
        input: &Self::Input,
        context: &AgentContext,
    ) -> Result<Self::Output, AgentError>;

    /// 停止时调用，只要执行过启动流程就会调用
    async fn on_stop(&self) -> Result<(), AgentError> {
        Ok(())
    }

    /// 健康检查
    async fn check_health(&self) -> HealthStatus {
        HealthStatus::healthy()
    }

    /// 判断错误是否可以重试
    fn is_retriable(&self, error: &AgentError) -> bool {
        error.is_retriable()
    }
}

/// 智能体运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// 已创建，尚未启动
    Created,
    /// 已启动，可以执行
    Started,
    /// 至少有一个请求正在执行
    Executing,
    /// 已停止
    Stopped,
    /// 启动失败或发生不可恢复错误
    Failed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Started => "Started",
            Self::Executing => "Executing",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}
