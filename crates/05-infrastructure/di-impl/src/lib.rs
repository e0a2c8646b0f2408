//! # 依赖注入具体实现
//!
//! 提供 [`ServiceContainer`]：基于服务标识的注册表，负责按依赖顺序构造服务、
//! 缓存单例、检测循环依赖，并在关闭时统一释放资源。
//!
//! 容器句柄可以廉价克隆，工厂以容器句柄为唯一参数，可以在工厂内部继续解析其他服务。

mod container;
mod registration;
mod resolution;

pub use container::ServiceContainer;
