//! # Agent Runtime
//!
//! 智能体运行时：为每个智能体提供统一的生命周期管理。
//!
//! - [`Agent`] - 智能体需要实现的业务接口
//! - [`AgentRuntime`] - 生命周期状态机（启动、执行、停止、心跳）
//! - [`AgentConfig`] - 重试、超时、健康检查等运行参数
//!
//! 执行期间的业务错误都以 [`AgentResult`] 返回，
//! 只有违反生命周期约定（例如未启动就执行）才返回 [`AgentLifecycleError`]。

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod runtime;

pub use agent::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use runtime::*;
