//! 服务注册表
//!
//! 负责核心服务的注册、启动自检、健康汇总和有序关闭。

use crate::logging::AppLogger;
use crate::services::{ClientRegistration, ServiceAvailability, ServiceClient, CONFIG, LOGGER};
use config_abstractions::ConfigProvider;
use config_impl::{
    AppConfig, EnvironmentConfigProvider, JsonConfigProvider, MemoryConfigProvider,
    TomlConfigProvider,
};
use dashmap::DashMap;
use di_abstractions::{
    DiContainer, DisposeReport, ServiceDescriptor, ServiceRegistrar, ServiceResolver, ServiceToken,
    TokenId,
};
use di_impl::ServiceContainer;
use infrastructure_common::{
    AggregateHealthChecker, BoxError, HealthCheckResult, HealthCheckable, HealthStatus,
    InfrastructureError, InfrastructureResult,
};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

/// 默认自检超时
pub const DEFAULT_SELF_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// 服务注册表
///
/// 持有容器和客户端注册信息。启动顺序为注册、校验、自检；
/// 关闭时按注册的逆序释放客户端，最后释放整个容器。
pub struct ServiceRegistry {
    container: ServiceContainer,
    providers: Vec<Arc<dyn ConfigProvider>>,
    clients: Vec<ClientRegistration>,
    self_test_timeout: Duration,
    availability: DashMap<TokenId, ServiceAvailability>,
    health_checks: RwLock<Vec<Arc<dyn HealthCheckable>>>,
    shut_down: AtomicBool,
}

impl ServiceRegistry {
    /// 创建注册表构建器
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::new()
    }

    /// 注册表使用的容器
    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    /// 注册配置、日志和所有客户端
    ///
    /// 客户端声明的必需配置键在这里检查，缺失时立即失败。
    pub async fn register_core_services(&self) -> InfrastructureResult<()> {
        info!("注册核心服务, 客户端数量: {}", self.clients.len());

        let providers = self.providers.clone();
        self.container
            .register_singleton(&*CONFIG, &[], move |_| {
                let providers = providers.clone();
                async move { Ok::<_, BoxError>(Arc::new(AppConfig::from_providers(providers))) }
            })?;

        self.container
            .register_singleton(&*LOGGER, &[CONFIG.erase()], |container: ServiceContainer| async move {
                let config = container.resolve(&*CONFIG).await?;
                let logger = AppLogger::from_config(&config).await?;
                Ok::<_, BoxError>(Arc::new(logger))
            })?;

        for client in &self.clients {
            let factory = client.factory.clone();
            let descriptor: ServiceDescriptor<ServiceContainer, dyn ServiceClient> =
                ServiceDescriptor::singleton(&client.token, move |container: ServiceContainer| {
                    factory(container)
                })
                    .depends_on(&*CONFIG)
                    .depends_on(&*LOGGER)
                    .disposable();
            self.container.register(descriptor)?;
            debug!("注册客户端: {}", client.token);
        }

        self.check_required_settings().await
    }

    async fn check_required_settings(&self) -> InfrastructureResult<()> {
        let config = self.container.resolve(&*CONFIG).await?;
        for client in &self.clients {
            for key in &client.required_settings {
                if let Err(e) = config.require(key).await {
                    error!("客户端 {} 缺少必需配置: {}", client.token, key);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// 构造并自检所有客户端
    ///
    /// 自检失败的客户端被标记为不可用；只有必需客户端失败时返回错误。
    pub async fn initialize_services(&self) -> InfrastructureResult<()> {
        self.container.resolve(&*LOGGER).await?;

        for client in &self.clients {
            let availability = self.self_test_client(client).await;
            self.availability.insert(client.token.id(), availability.clone());

            match availability {
                ServiceAvailability::Available => info!("客户端可用: {}", client.token),
                ServiceAvailability::Unavailable { reason } if client.mandatory => {
                    error!("必需客户端不可用: {}, 原因: {}", client.token, reason);
                    return Err(InfrastructureError::ServiceUnavailable {
                        service: client.token.to_string(),
                        message: reason,
                    });
                }
                ServiceAvailability::Unavailable { reason } => {
                    warn!("可选客户端不可用: {}, 原因: {}", client.token, reason);
                }
            }
        }

        Ok(())
    }

    async fn self_test_client(&self, client: &ClientRegistration) -> ServiceAvailability {
        let instance = match self.container.resolve(&client.token).await {
            Ok(instance) => instance,
            Err(e) => {
                return ServiceAvailability::Unavailable {
                    reason: format!("构造失败: {}", e),
                }
            }
        };

        match tokio::time::timeout(self.self_test_timeout, instance.self_test()).await {
            Ok(Ok(())) => ServiceAvailability::Available,
            Ok(Err(e)) => ServiceAvailability::Unavailable {
                reason: format!("{} 自检失败: {}", instance.name(), e),
            },
            Err(_) => ServiceAvailability::Unavailable {
                reason: format!(
                    "{} 自检超时: {}ms",
                    instance.name(),
                    self.self_test_timeout.as_millis()
                ),
            },
        }
    }

    /// 查询客户端可用性，尚未自检时返回 `None`
    pub fn availability(&self, token: &ServiceToken<dyn ServiceClient>) -> Option<ServiceAvailability> {
        self.availability.get(&token.id()).map(|entry| entry.value().clone())
    }

    /// 客户端是否已通过自检
    pub fn is_available(&self, token: &ServiceToken<dyn ServiceClient>) -> bool {
        self.availability(token)
            .map(|availability| availability.is_available())
            .unwrap_or(false)
    }

    /// 登记需要纳入健康汇总的组件，例如托管在容器中的智能体运行时
    pub fn add_health_check(&self, checker: Arc<dyn HealthCheckable>) {
        debug!("登记健康检查: {}", checker.name());
        self.health_checks.write().push(checker);
    }

    fn health_checker(&self) -> AggregateHealthChecker {
        let mut aggregate = AggregateHealthChecker::new();
        for checker in self.health_checks.read().iter() {
            aggregate.add_checker(Arc::clone(checker));
        }
        aggregate
    }

    /// 逐项执行已登记的健康检查
    pub async fn health_report(&self) -> Vec<HealthCheckResult> {
        self.health_checker().check_all().await
    }

    /// 汇总已登记组件的健康状态，没有登记任何组件时视为健康
    pub async fn check_health(&self) -> HealthStatus {
        self.health_checker().get_overall_health().await
    }

    /// 注册、校验并初始化，返回可用的容器
    pub async fn bootstrap(&self) -> InfrastructureResult<ServiceContainer> {
        info!("开始启动基础设施");
        self.register_core_services().await?;
        self.container.validate()?;
        self.initialize_services().await?;
        info!(
            "基础设施启动完成: 已注册 {} 个服务",
            self.container.stats().registered_services
        );
        Ok(self.container.clone())
    }

    /// 关闭所有服务
    ///
    /// 客户端按注册的逆序逐个释放，随后释放容器中的其余实例。
    /// 重复调用返回空报告。
    pub async fn shutdown(&self) -> DisposeReport {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("服务注册表已关闭, 忽略重复调用");
            return DisposeReport::default();
        }

        let span = match self.container.resolve_sync(&*LOGGER) {
            Ok(logger) => logger.span("shutdown"),
            Err(e) => {
                debug!("日志服务未初始化, 关闭过程不附加日志上下文: {}", e);
                tracing::Span::none()
            }
        };

        async {
            info!("开始关闭服务");
            let mut report = DisposeReport::default();

            for client in self.clients.iter().rev() {
                match self.container.dispose_service(&client.token).await {
                    Ok(disposed) => report.merge(disposed),
                    Err(e) => warn!("释放客户端 {} 失败: {}", client.token, e),
                }
            }

            report.merge(self.container.dispose().await);
            self.availability.clear();
            self.health_checks.write().clear();

            info!(
                "服务关闭完成: 成功 {} 项, 失败 {} 项",
                report.disposed.len(),
                report.failures.len()
            );
            report
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("container", &self.container)
            .field("clients", &self.clients)
            .field("self_test_timeout", &self.self_test_timeout)
            .field("health_checks", &self.health_checks.read().len())
            .finish()
    }
}

/// 服务注册表构建器
pub struct ServiceRegistryBuilder {
    providers: Vec<Arc<dyn ConfigProvider>>,
    clients: Vec<ClientRegistration>,
    self_test_timeout: Duration,
    container: Option<ServiceContainer>,
}

impl ServiceRegistryBuilder {
    /// 创建空的构建器
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            clients: Vec::new(),
            self_test_timeout: DEFAULT_SELF_TEST_TIMEOUT,
            container: None,
        }
    }

    /// 添加配置提供者
    pub fn add_provider<P>(mut self, provider: P) -> Self
    where
        P: ConfigProvider + 'static,
    {
        self.providers.push(Arc::new(provider));
        self
    }

    /// 添加 TOML 配置文件
    pub fn add_config_toml<P: AsRef<Path>>(self, path: P) -> InfrastructureResult<Self> {
        Ok(self.add_provider(TomlConfigProvider::new(path)?))
    }

    /// 添加 JSON 配置文件
    pub fn add_config_json<P: AsRef<Path>>(self, path: P) -> InfrastructureResult<Self> {
        Ok(self.add_provider(JsonConfigProvider::new(path)?))
    }

    /// 添加带前缀的环境变量配置
    pub fn add_env_vars(self, prefix: impl Into<String>) -> Self {
        self.add_provider(EnvironmentConfigProvider::new(prefix))
    }

    /// 添加内存配置
    pub fn add_memory(self, provider: MemoryConfigProvider) -> Self {
        self.add_provider(provider)
    }

    /// 添加外部客户端
    pub fn add_client(mut self, client: ClientRegistration) -> Self {
        self.clients.push(client);
        self
    }

    /// 设置单个客户端的自检超时
    pub fn with_self_test_timeout(mut self, timeout: Duration) -> Self {
        self.self_test_timeout = timeout;
        self
    }

    /// 使用已有容器，可以预先注册应用自己的服务
    pub fn with_container(mut self, container: ServiceContainer) -> Self {
        self.container = Some(container);
        self
    }

    /// 构建注册表
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            container: self.container.unwrap_or_default(),
            providers: self.providers,
            clients: self.clients,
            self_test_timeout: self.self_test_timeout,
            availability: DashMap::new(),
            health_checks: RwLock::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }
}

impl Default for ServiceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
