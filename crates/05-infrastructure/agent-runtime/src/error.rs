//! 智能体错误类型

use crate::agent::AgentState;
use infrastructure_common::{DependencyError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 业务错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    Validation,
    Transient,
    Timeout,
    Failed,
    Fatal,
    Panicked,
    Dependency,
}

/// 智能体业务错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("输入校验失败: {0}")]
    Validation(String),

    #[error("暂时性错误: {0}")]
    Transient(String),

    #[error("执行超时: {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("执行失败: {0}")]
    Failed(String),

    /// 不可恢复，运行时会进入失败状态
    #[error("不可恢复的错误: {0}")]
    Fatal(String),

    #[error("业务逻辑发生 panic: {0}")]
    Panicked(String),

    #[error("依赖解析失败: {0}")]
    Dependency(#[from] DependencyError),
}

impl AgentError {
    /// 输入校验失败，不重试
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 暂时性失败，可以重试
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// 一般业务失败，不重试
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// 不可恢复的错误，运行时会进入 `Failed`
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// 默认的重试判定：暂时性错误和超时可以重试
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }

    /// 错误类别
    pub fn kind(&self) -> AgentErrorKind {
        match self {
            Self::Validation(_) => AgentErrorKind::Validation,
            Self::Transient(_) => AgentErrorKind::Transient,
            Self::Timeout { .. } => AgentErrorKind::Timeout,
            Self::Failed(_) => AgentErrorKind::Failed,
            Self::Fatal(_) => AgentErrorKind::Fatal,
            Self::Panicked(_) => AgentErrorKind::Panicked,
            Self::Dependency(_) => AgentErrorKind::Dependency,
        }
    }
}

/// 违反生命周期约定的错误
#[derive(Error, Debug)]
pub enum AgentLifecycleError {
    #[error("智能体 {agent_id} 处于 {state} 状态, 不能执行 {operation}")]
    InvalidState {
        agent_id: String,
        state: AgentState,
        operation: &'static str,
    },

    #[error("智能体已禁用: {agent_id}")]
    Disabled { agent_id: String },

    #[error("智能体配置无效: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("智能体启动失败: {agent_id}, 原因: {source}")]
    StartFailed {
        agent_id: String,
        #[source]
        source: AgentError,
    },
}

/// 生命周期操作结果
pub type AgentLifecycleResult<T> = Result<T, AgentLifecycleError>;
