//! 日志配置与日志服务

use config_impl::AppConfig;
use infrastructure_common::{ConfigError, InfrastructureError, InfrastructureResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 配置文件中的日志节名称
pub const LOGGING_SECTION: &str = "logging";

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志过滤规则，`RUST_LOG` 存在时以其为准
    pub level: String,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    fn env_filter(&self) -> InfrastructureResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| InfrastructureError::ConfigError {
            source: ConfigError::ParseError {
                source: Box::new(e),
            },
        })
    }

    /// 安装全局日志订阅器
    ///
    /// 已有订阅器时不覆盖，返回 `false`。
    pub fn install(&self) -> InfrastructureResult<bool> {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        let installed = if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        };

        match installed {
            Ok(()) => {
                info!("日志系统初始化完成");
                Ok(true)
            }
            Err(e) => {
                debug!("已存在全局日志订阅器, 跳过初始化: {}", e);
                Ok(false)
            }
        }
    }
}

/// 日志服务
///
/// 由容器构造，依赖配置服务；构造时按 `logging` 配置节安装日志订阅器。
#[derive(Debug)]
pub struct AppLogger {
    config: LoggingConfig,
    installed: bool,
}

impl AppLogger {
    /// 按应用配置创建日志服务，缺少 `logging` 节时使用默认配置
    pub async fn from_config(config: &AppConfig) -> InfrastructureResult<Self> {
        let logging = match config.bind::<LoggingConfig>(LOGGING_SECTION).await {
            Ok(logging) => logging,
            Err(ConfigError::KeyNotFound { .. }) => LoggingConfig::default(),
            Err(e) => return Err(e.into()),
        };
        Self::new(logging)
    }

    /// 使用给定配置创建日志服务
    pub fn new(config: LoggingConfig) -> InfrastructureResult<Self> {
        let installed = config.install()?;
        Ok(Self { config, installed })
    }

    /// 生效的日志配置
    pub fn config(&self) -> &LoggingConfig {
        &self.config
    }

    /// 本实例是否安装了全局订阅器
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// 为某个阶段创建日志 span
    pub fn span(&self, stage: &'static str) -> tracing::Span {
        tracing::info_span!("lifecycle", stage)
    }
}
