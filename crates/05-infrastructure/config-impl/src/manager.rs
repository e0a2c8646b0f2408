//! 分层配置

use config_abstractions::ConfigProvider;
use infrastructure_common::{ConfigError, ConfigResult, ConfigSection};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// 应用配置
///
/// 协调多个配置提供者，按优先级从高到低查询，第一个包含该键的提供者胜出。
/// 配置节则从低到高合并，高优先级的键覆盖低优先级的同名键。
#[derive(Clone, Default)]
pub struct AppConfig {
    /// 配置提供者列表（按优先级排序，高的在前）
    providers: Vec<Arc<dyn ConfigProvider>>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("providers", &self.provider_names())
            .finish()
    }
}

impl AppConfig {
    /// 创建空配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 由一组提供者创建
    pub fn from_providers(providers: impl IntoIterator<Item = Arc<dyn ConfigProvider>>) -> Self {
        let mut config = Self::new();
        for provider in providers {
            config.add_provider(provider);
        }
        config
    }

    /// 添加配置提供者
    pub fn add_provider(&mut self, provider: Arc<dyn ConfigProvider>) {
        info!(
            "注册配置提供者: {} (优先级 {})",
            provider.name(),
            provider.priority()
        );
        self.providers.push(provider);
        // 稳定排序，同优先级保持添加顺序
        self.providers
            .sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// 按优先级排列的提供者名称
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// 获取原始配置值
    pub async fn get_value(&self, key: &str) -> ConfigResult<Value> {
        debug!("获取配置: {}", key);

        for provider in &self.providers {
            match provider.get_configuration(key).await {
                Ok(value) => {
                    debug!("配置 {} 来自 {}", key, provider.name());
                    return Ok(value);
                }
                Err(ConfigError::KeyNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(ConfigError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// 获取配置并转换为指定类型
    pub async fn get<T>(&self, key: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.get_value(key).await?;
        serde_json::from_value(value).map_err(|e| ConfigError::TypeConversionError {
            message: format!("{key}: {e}"),
        })
    }

    /// 获取配置，键不存在时返回默认值
    ///
    /// 只有键不存在才回退到默认值，类型不匹配仍然返回错误。
    pub async fn get_or<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        match self.get(key).await {
            Err(ConfigError::KeyNotFound { .. }) => Ok(default),
            other => other,
        }
    }

    /// 获取必需的配置
    pub async fn require(&self, key: &str) -> ConfigResult<Value> {
        self.get_value(key).await.map_err(|e| {
            error!("缺少必需配置: {} - {}", key, e);
            e
        })
    }

    /// 检查配置键是否存在
    pub async fn contains_key(&self, key: &str) -> bool {
        for provider in &self.providers {
            if matches!(provider.contains_key(key).await, Ok(true)) {
                return true;
            }
        }
        false
    }

    /// 获取合并后的配置节
    pub async fn section(&self, section_name: &str) -> ConfigResult<ConfigSection> {
        let mut merged = ConfigSection::new();
        let mut found = false;

        for provider in self.providers.iter().rev() {
            match provider.get_section(section_name).await {
                Ok(section) => {
                    found = true;
                    merged.merge(section);
                }
                Err(ConfigError::KeyNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        if found {
            Ok(merged)
        } else {
            Err(ConfigError::KeyNotFound {
                key: section_name.to_string(),
            })
        }
    }

    /// 把配置节绑定到具体类型
    pub async fn bind<T>(&self, section_name: &str) -> ConfigResult<T>
    where
        T: DeserializeOwned,
    {
        self.section(section_name).await?.bind()
    }

    /// 所有提供者的配置键（去重并排序）
    pub async fn all_keys(&self) -> ConfigResult<Vec<String>> {
        let mut keys = BTreeSet::new();
        for provider in &self.providers {
            keys.extend(provider.get_all_keys().await?);
        }
        Ok(keys.into_iter().collect())
    }
}
