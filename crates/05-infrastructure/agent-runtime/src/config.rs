//! 智能体配置

use di_abstractions::{AnyToken, ServiceToken};
use infrastructure_common::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 默认最大重试次数
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// 默认执行超时（毫秒）
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// 默认健康检查间隔（毫秒）
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 60_000;
/// 默认重试退避基数（毫秒）
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

const MAX_RETRIES_LIMIT: u32 = 10;

/// 智能体配置
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// 智能体唯一标识
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 版本
    pub version: String,
    /// 是否启用
    pub enabled: bool,
    /// 首次执行之外的最大重试次数
    pub max_retries: u32,
    /// 单次 `execute` 的总超时，包含所有重试
    pub timeout_ms: u64,
    /// 心跳间隔
    pub health_check_interval_ms: u64,
    /// 重试退避基数，第 n 次重试等待 `retry_backoff_ms * 2^(n-1)`
    pub retry_backoff_ms: u64,
    /// 启动时需要先解析的服务
    pub dependencies: Vec<AnyToken>,
}

impl AgentConfig {
    /// 使用默认参数创建配置
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: "1.0.0".to_string(),
            enabled: true,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            dependencies: Vec::new(),
        }
    }

    /// 设置版本号
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// 启用或禁用智能体，禁用后 `start` 会被拒绝
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// 设置首次执行之外的最大重试次数
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// 设置单次 `execute` 的总超时（毫秒），同时限制 `stop` 等待执行结束的时间
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// 设置心跳间隔（毫秒）
    pub fn with_health_check_interval_ms(mut self, interval_ms: u64) -> Self {
        self.health_check_interval_ms = interval_ms;
        self
    }

    /// 设置重试退避基数（毫秒）
    pub fn with_retry_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.retry_backoff_ms = backoff_ms;
        self
    }

    /// 声明启动时需要的服务
    pub fn depends_on<T>(mut self, token: &ServiceToken<T>) -> Self
    where
        T: ?Sized + 'static,
    {
        self.dependencies.push(token.erase());
        self
    }

    /// 用配置文件中的策略覆盖运行参数
    pub fn with_policy(mut self, policy: &AgentPolicy) -> Self {
        if let Some(enabled) = policy.enabled {
            self.enabled = enabled;
        }
        if let Some(max_retries) = policy.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(timeout_ms) = policy.timeout_ms {
            self.timeout_ms = timeout_ms;
        }
        if let Some(interval_ms) = policy.health_check_interval_ms {
            self.health_check_interval_ms = interval_ms;
        }
        if let Some(backoff_ms) = policy.retry_backoff_ms {
            self.retry_backoff_ms = backoff_ms;
        }
        self
    }

    /// 最多执行次数（首次 + 重试）
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// 执行超时
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 心跳间隔，同时作为单次健康检查的超时
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// 第 `attempt` 次失败后的等待时间
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }

    /// 校验配置
    pub fn validate(&self) -> ValidationResult<()> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::required_field_missing("id"));
        }
        if self.name.trim().is_empty() {
            return Err(ValidationError::required_field_missing("name"));
        }
        if self.timeout_ms == 0 {
            return Err(ValidationError::value_out_of_range("timeout_ms", 0, "> 0"));
        }
        if self.health_check_interval_ms == 0 {
            return Err(ValidationError::value_out_of_range(
                "health_check_interval_ms",
                0,
                "> 0",
            ));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(ValidationError::value_out_of_range(
                "max_retries",
                self.max_retries,
                format!("0..={MAX_RETRIES_LIMIT}"),
            ));
        }
        Ok(())
    }
}

/// 可从配置文件读取的运行策略，未设置的字段保持代码中的默认值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPolicy {
    /// 覆盖 `enabled`
    pub enabled: Option<bool>,
    /// 覆盖 `max_retries`
    pub max_retries: Option<u32>,
    /// 覆盖 `timeout_ms`
    pub timeout_ms: Option<u64>,
    /// 覆盖 `health_check_interval_ms`
    pub health_check_interval_ms: Option<u64>,
    /// 覆盖 `retry_backoff_ms`
    pub retry_backoff_ms: Option<u64>,
}
