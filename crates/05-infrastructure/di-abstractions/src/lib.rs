//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义服务标识、服务注册和依赖解析的核心接口。
//!
//! ## 核心接口
//!
//! - [`ServiceToken`] - 类型化、基于标识相等的服务标识
//! - [`ServiceDescriptor`] - 服务注册描述（工厂、生命周期、依赖、释放钩子）
//! - [`ServiceRegistrar`] - 服务注册接口
//! - [`ServiceResolver`] - 服务解析接口
//! - [`DiContainer`] - 完整的容器接口（含释放与校验）

pub mod container;
pub mod factory;
pub mod registry;
pub mod resolver;
pub mod token;

pub use container::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
pub use token::*;
