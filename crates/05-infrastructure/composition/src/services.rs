//! 核心服务标识与外部客户端接入点

use crate::logging::AppLogger;
use async_trait::async_trait;
use config_impl::AppConfig;
use di_abstractions::{Disposable, FactoryFuture, ServiceToken};
use di_impl::ServiceContainer;
use infrastructure_common::BoxError;
use once_cell::sync::Lazy;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// 配置服务
pub static CONFIG: Lazy<ServiceToken<AppConfig>> = Lazy::new(|| ServiceToken::new("config"));

/// 日志服务，依赖配置服务
pub static LOGGER: Lazy<ServiceToken<AppLogger>> = Lazy::new(|| ServiceToken::new("logger"));

/// 数据库客户端
pub static DATABASE_CLIENT: Lazy<ServiceToken<dyn ServiceClient>> =
    Lazy::new(|| ServiceToken::new("database"));

/// AI 服务客户端
pub static AI_CLIENT: Lazy<ServiceToken<dyn ServiceClient>> = Lazy::new(|| ServiceToken::new("ai"));

/// 邮件客户端
pub static MAIL_CLIENT: Lazy<ServiceToken<dyn ServiceClient>> =
    Lazy::new(|| ServiceToken::new("mail"));

/// 外部服务客户端
///
/// 具体实现由应用提供，注册表只负责构造、自检和释放。
#[async_trait]
pub trait ServiceClient: Disposable {
    /// 客户端名称，用于日志
    fn name(&self) -> &str;

    /// 启动自检，失败时客户端被标记为不可用
    async fn self_test(&self) -> Result<(), BoxError>;
}

type ClientFactory = Arc<dyn Fn(ServiceContainer) -> FactoryFuture<dyn ServiceClient> + Send + Sync>;

/// 客户端注册信息
#[derive(Clone)]
pub struct ClientRegistration {
    pub(crate) token: ServiceToken<dyn ServiceClient>,
    pub(crate) factory: ClientFactory,
    pub(crate) mandatory: bool,
    pub(crate) required_settings: Vec<String>,
}

impl ClientRegistration {
    /// 创建客户端注册，默认为必需客户端
    pub fn new<F, Fut, E>(token: &ServiceToken<dyn ServiceClient>, factory: F) -> Self
    where
        F: Fn(ServiceContainer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn ServiceClient>, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let factory: ClientFactory = Arc::new(move |container| -> FactoryFuture<dyn ServiceClient> {
            let pending = factory(container);
            Box::pin(async move { pending.await.map_err(Into::into) })
        });

        Self {
            token: *token,
            factory,
            mandatory: true,
            required_settings: Vec::new(),
        }
    }

    /// 标记为可选客户端，自检失败不影响启动
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// 声明客户端构造前必须存在的配置键
    pub fn require_setting(mut self, key: impl Into<String>) -> Self {
        self.required_settings.push(key.into());
        self
    }

    /// 客户端注册使用的令牌
    pub fn token(&self) -> &ServiceToken<dyn ServiceClient> {
        &self.token
    }

    /// 是否为必需客户端
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// 注册前必须存在的配置键
    pub fn required_settings(&self) -> &[String] {
        &self.required_settings
    }
}

impl fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("token", &self.token)
            .field("mandatory", &self.mandatory)
            .field("required_settings", &self.required_settings)
            .finish()
    }
}

/// 客户端可用性
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAvailability {
    Available,
    Unavailable { reason: String },
}

impl ServiceAvailability {
    /// 是否可用
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}
