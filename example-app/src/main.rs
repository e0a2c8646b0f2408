//! # 示例应用程序
//!
//! 演示服务注册表的启动与关闭，以及在容器中托管一个文档摘要智能体。

use agent_runtime::{Agent, AgentConfig, AgentContext, AgentError, AgentPolicy, AgentRuntime};
use async_trait::async_trait;
use clap::Parser;
use config_impl::MemoryConfigProvider;
use di_abstractions::{Disposable, ServiceDescriptor, ServiceRegistrar, ServiceResolver, ServiceToken};
use di_impl::ServiceContainer;
use infrastructure_common::{BoxError, ConfigError};
use infrastructure_composition::{
    ClientRegistration, ServiceClient, ServiceRegistry, AI_CLIENT, CONFIG, DATABASE_CLIENT,
    MAIL_CLIENT,
};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "Lorn DocFlow 示例应用")]
struct Args {
    /// 配置文件路径（.toml 或 .json）
    #[arg(short, long, default_value = "config/app.toml")]
    config: String,

    /// 环境变量前缀
    #[arg(long, default_value = "DOCAI")]
    env_prefix: String,

    /// 日志过滤规则，覆盖配置文件中的 logging.level
    #[arg(long)]
    log_level: Option<String>,

    /// 交给摘要智能体处理的文本
    #[arg(long, default_value = "多智能体文档处理后端 负责解析 摘要 归档 以及通知 等多个环节")]
    text: String,

    /// 处理完成后等待 Ctrl+C 再退出
    #[arg(long)]
    wait: bool,
}

/// 摘要智能体运行时
static SUMMARY_AGENT: Lazy<ServiceToken<AgentRuntime<SummaryAgent>>> =
    Lazy::new(|| ServiceToken::new("summary-agent"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let container = ServiceContainer::new();
    register_summary_agent(&container)?;

    let registry = build_registry(&args, container)?;
    let container = registry.bootstrap().await?;
    info!("启动 Lorn DocFlow 示例应用");

    for token in [&*DATABASE_CLIENT, &*AI_CLIENT, &*MAIL_CLIENT] {
        info!("客户端 {} 可用: {}", token, registry.is_available(token));
    }

    let runtime = container.resolve(&*SUMMARY_AGENT).await?;
    runtime.start().await?;

    let context = AgentContext::new_session().with_user("demo");
    let result = runtime.execute(args.text.clone(), context).await?;
    if result.is_success() {
        info!(
            "摘要完成: {:?} (尝试 {} 次, 耗时 {}ms)",
            result.data, result.attempts, result.duration_ms
        );
    } else {
        warn!("摘要失败: {:?}", result.error);
    }

    if args.wait {
        info!("等待退出信号");
        tokio::signal::ctrl_c().await?;
        info!("收到退出信号，正在关闭应用");
    }

    let report = registry.shutdown().await;
    if !report.is_clean() {
        warn!("部分服务释放失败: {:?}", report.failures);
    }

    info!("应用已关闭");
    Ok(())
}

/// 构建服务注册表
fn build_registry(args: &Args, container: ServiceContainer) -> anyhow::Result<ServiceRegistry> {
    let mut builder = ServiceRegistry::builder()
        .with_container(container)
        .add_memory(
            MemoryConfigProvider::new()
                .with_value("app.name", "docflow-example")
                .with_value("database.url", "memory://docflow")
                .with_value("summary.max_words", 8),
        );

    if Path::new(&args.config).exists() {
        if args.config.ends_with(".json") {
            builder = builder.add_config_json(&args.config)?;
        } else {
            builder = builder.add_config_toml(&args.config)?;
        }
    }

    builder = builder.add_env_vars(args.env_prefix.as_str());

    if let Some(level) = &args.log_level {
        builder = builder.add_memory(
            MemoryConfigProvider::new()
                .with_value("logging.level", level.as_str())
                .with_priority(300),
        );
    }

    Ok(builder
        .add_client(
            loopback_client(&DATABASE_CLIENT, "database", "database.url")
                .require_setting("database.url"),
        )
        .add_client(loopback_client(&AI_CLIENT, "ai", "ai.endpoint").optional())
        .add_client(loopback_client(&MAIL_CLIENT, "mail", "mail.smtp_host").optional())
        .build())
}

/// 用配置键中的地址构造本地回环客户端，地址缺失时客户端自检失败
fn loopback_client(
    token: &ServiceToken<dyn ServiceClient>,
    name: &'static str,
    address_key: &'static str,
) -> ClientRegistration {
    ClientRegistration::new(token, move |container: ServiceContainer| async move {
        let config = container.resolve(&*CONFIG).await?;
        let address = match config.get::<String>(address_key).await {
            Ok(address) => Some(address),
            Err(ConfigError::KeyNotFound { .. }) => None,
            Err(e) => return Err(BoxError::from(e)),
        };
        let client: Arc<dyn ServiceClient> = Arc::new(LoopbackClient { name, address });
        Ok::<_, BoxError>(client)
    })
}

struct LoopbackClient {
    name: &'static str,
    address: Option<String>,
}

#[async_trait]
impl Disposable for LoopbackClient {
    async fn dispose(&self) -> Result<(), BoxError> {
        info!("关闭客户端连接: {}", self.name);
        Ok(())
    }
}

#[async_trait]
impl ServiceClient for LoopbackClient {
    fn name(&self) -> &str {
        self.name
    }

    async fn self_test(&self) -> Result<(), BoxError> {
        match &self.address {
            Some(address) => {
                info!("客户端 {} 连接到 {}", self.name, address);
                Ok(())
            }
            None => Err(format!("{} 未配置连接地址", self.name).into()),
        }
    }
}

/// 截取前若干个词作为摘要
struct SummaryAgent {
    config: AgentConfig,
    max_words: usize,
}

#[async_trait]
impl Agent for SummaryAgent {
    type Input = String;
    type Output = String;

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn on_start(&self, container: &ServiceContainer) -> Result<(), AgentError> {
        let config = container.resolve(&*CONFIG).await?;
        let app: String = config
            .get_or("app.name", "docflow".to_string())
            .await
            .map_err(|e| AgentError::failed(e.to_string()))?;
        info!("摘要智能体已接入应用 {}", app);
        Ok(())
    }

    async fn process(&self, input: &String, _context: &AgentContext) -> Result<String, AgentError> {
        if input.trim().is_empty() {
            return Err(AgentError::validation("待摘要文本为空"));
        }
        let words: Vec<&str> = input.split_whitespace().take(self.max_words).collect();
        Ok(words.join(" "))
    }
}

/// 注册摘要智能体，运行策略可由 `agents.summary` 配置节覆盖
fn register_summary_agent(container: &ServiceContainer) -> anyhow::Result<()> {
    let descriptor = ServiceDescriptor::singleton(
        &*SUMMARY_AGENT,
        |container: ServiceContainer| async move {
            let config = container.resolve(&*CONFIG).await?;

            let mut agent_config = AgentConfig::new("summary", "文档摘要")
                .with_max_retries(2)
                .with_timeout_ms(5_000)
                .depends_on(&*CONFIG);
            match config.bind::<AgentPolicy>("agents.summary").await {
                Ok(policy) => agent_config = agent_config.with_policy(&policy),
                Err(ConfigError::KeyNotFound { .. }) => {}
                Err(e) => return Err(BoxError::from(e)),
            }

            let max_words = config.get_or("summary.max_words", 8_usize).await?;
            let agent = SummaryAgent {
                config: agent_config,
                max_words,
            };
            Ok::<_, BoxError>(Arc::new(AgentRuntime::new(agent, container)))
        },
    )
    .depends_on(&*CONFIG)
    .disposable();

    container.register(descriptor)?;
    Ok(())
}
