//! # Configuration Abstractions
//!
//! 配置管理抽象层，定义配置来源的统一接口。
//!
//! ## 核心接口
//!
//! - [`ConfigProvider`] - 配置提供者接口，按优先级叠加

pub mod provider;

pub use provider::*;
