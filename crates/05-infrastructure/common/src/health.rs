//! 健康检查相关接口定义

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 健康状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", content = "data")]
pub enum HealthStatus {
    /// 健康状态
    Healthy,
    /// 降级状态
    Degraded { message: String },
    /// 不健康状态
    Unhealthy { error: String },
}

impl HealthStatus {
    /// 创建健康状态
    pub fn healthy() -> Self {
        Self::Healthy
    }

    /// 创建降级状态
    pub fn degraded(message: impl Into<String>) -> Self {
        Self::Degraded {
            message: message.into(),
        }
    }

    /// 创建不健康状态
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self::Unhealthy {
            error: error.into(),
        }
    }

    /// 检查是否健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 检查是否降级
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// 检查是否不健康
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy { .. })
    }
}

/// 健康检查结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// 组件名称
    pub component_name: String,
    /// 健康状态
    pub status: HealthStatus,
    /// 检查耗时
    pub duration: Duration,
    /// 检查时间
    pub checked_at: chrono::DateTime<chrono::Utc>,
    /// 额外信息
    pub additional_info: HashMap<String, String>,
}

impl HealthCheckResult {
    /// 创建新的健康检查结果
    pub fn new(component_name: impl Into<String>, status: HealthStatus, duration: Duration) -> Self {
        Self {
            component_name: component_name.into(),
            status,
            duration,
            checked_at: chrono::Utc::now(),
            additional_info: HashMap::new(),
        }
    }

    /// 添加额外信息
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }

    /// 距离本次检查已经过去的时间
    pub fn age(&self) -> chrono::Duration {
        chrono::Utc::now() - self.checked_at
    }
}

/// 健康检查 trait
#[async_trait]
pub trait HealthCheckable: Send + Sync {
    /// 执行健康检查
    async fn check_health(&self) -> HealthStatus;

    /// 获取组件名称
    fn name(&self) -> &str;

    /// 获取检查超时时间
    fn timeout(&self) -> Duration {
        Duration::from_secs(30)
    }

    /// 获取检查间隔
    fn check_interval(&self) -> Duration {
        Duration::from_secs(60)
    }

    /// 是否启用健康检查
    fn is_enabled(&self) -> bool {
        true
    }
}

/// 在超时约束下执行一次健康检查
pub async fn run_health_check(checker: &dyn HealthCheckable) -> HealthCheckResult {
    let start = Instant::now();
    let status = match tokio::time::timeout(checker.timeout(), checker.check_health()).await {
        Ok(status) => status,
        Err(_) => {
            warn!(
                "健康检查超时: {} ({}ms)",
                checker.name(),
                checker.timeout().as_millis()
            );
            HealthStatus::unhealthy("健康检查超时")
        }
    };
    match &status {
        HealthStatus::Unhealthy { error } => warn!("组件不健康: {} - {}", checker.name(), error),
        HealthStatus::Degraded { message } => debug!("组件降级: {} - {}", checker.name(), message),
        HealthStatus::Healthy => {}
    }
    HealthCheckResult::new(checker.name(), status, start.elapsed())
}

/// 聚合健康检查器
///
/// 并发执行所有已启用的检查器，并汇总出整体状态。
#[derive(Default)]
pub struct AggregateHealthChecker {
    checkers: Vec<Arc<dyn HealthCheckable>>,
}

impl std::fmt::Debug for AggregateHealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateHealthChecker")
            .field("checkers", &format!("{} checkers", self.checkers.len()))
            .finish()
    }
}

impl AggregateHealthChecker {
    /// 创建新的聚合健康检查器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加健康检查器
    pub fn add_checker(&mut self, checker: Arc<dyn HealthCheckable>) {
        self.checkers.push(checker);
    }

    /// 检查器数量
    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    /// 是否没有任何检查器
    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }

    /// 执行所有健康检查
    pub async fn check_all(&self) -> Vec<HealthCheckResult> {
        let checks = self
            .checkers
            .iter()
            .filter(|checker| checker.is_enabled())
            .map(|checker| run_health_check(checker.as_ref()));
        futures::future::join_all(checks).await
    }

    /// 获取整体健康状态
    pub async fn get_overall_health(&self) -> HealthStatus {
        let results = self.check_all().await;

        let unhealthy: Vec<&str> = results
            .iter()
            .filter(|r| r.status.is_unhealthy())
            .map(|r| r.component_name.as_str())
            .collect();
        if !unhealthy.is_empty() {
            warn!("整体健康检查未通过, 不健康组件: {}", unhealthy.join(", "));
            return HealthStatus::unhealthy(format!("不健康组件: {}", unhealthy.join(", ")));
        }

        let degraded: Vec<&str> = results
            .iter()
            .filter(|r| r.status.is_degraded())
            .map(|r| r.component_name.as_str())
            .collect();
        if !degraded.is_empty() {
            warn!("整体健康状态降级, 降级组件: {}", degraded.join(", "));
            return HealthStatus::degraded(format!("降级组件: {}", degraded.join(", ")));
        }

        HealthStatus::healthy()
    }
}
