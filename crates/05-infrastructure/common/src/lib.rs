//! # Infrastructure Common
//!
//! 这个 crate 提供了 Lorn DocFlow 服务生命周期核心的公共类型。
//!
//! ## 核心内容
//!
//! - [`DependencyError`] / [`ConfigError`] / [`InfrastructureError`] - 统一的错误分类
//! - [`Lifetime`] - 服务生命周期（单例 / 瞬时）
//! - [`HealthCheckable`] - 健康检查 trait 与聚合检查器
//! - [`ConfigSection`] - 可绑定到具体类型的配置节
//!
//! ## 设计原则
//!
//! - 配置类错误立即暴露，业务类错误以结构化结果返回
//! - 异步优先
//! - 不提供任何进程级全局可变状态

pub mod configuration;
pub mod errors;
pub mod health;
pub mod lifecycle;

pub use configuration::*;
pub use errors::*;
pub use health::*;
pub use lifecycle::*;
