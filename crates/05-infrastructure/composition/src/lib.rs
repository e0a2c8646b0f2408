//! # 基础设施组合层
//!
//! 将配置、日志和外部客户端组合到同一个服务容器中，并管理它们的
//! 启动与关闭。
//!
//! ## 主要功能
//!
//! - **核心服务**: 配置服务和日志服务，日志服务依赖配置服务
//! - **外部客户端**: 通过 [`ClientRegistration`] 接入，启动时自检
//! - **生命周期管理**: [`ServiceRegistry::bootstrap`] 与 [`ServiceRegistry::shutdown`]
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{ServiceRegistry, CONFIG};
//! use di_abstractions::ServiceResolver;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ServiceRegistry::builder()
//!         .add_config_toml("config/app.toml")?
//!         .add_env_vars("DOCAI")
//!         .build();
//!
//!     let container = registry.bootstrap().await?;
//!     let config = container.resolve(&*CONFIG).await?;
//!     let name: String = config.get("app.name").await?;
//!     println!("应用名称: {}", name);
//!
//!     registry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod registry;
pub mod services;

pub use logging::{AppLogger, LoggingConfig, LOGGING_SECTION};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder, DEFAULT_SELF_TEST_TIMEOUT};
pub use services::{
    ClientRegistration, ServiceAvailability, ServiceClient, AI_CLIENT, CONFIG, DATABASE_CLIENT,
    LOGGER, MAIL_CLIENT,
};

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
