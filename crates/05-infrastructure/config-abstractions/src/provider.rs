//! 配置提供者抽象接口

use async_trait::async_trait;
use infrastructure_common::{ConfigResult, ConfigSection};
use serde_json::Value;

/// 配置提供者 trait
///
/// 定义从不同数据源获取配置的统一接口。配置键使用点号分隔的路径，
/// 例如 `logging.level`。多个提供者叠加时，优先级高的覆盖优先级低的。
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// 获取配置值，键不存在时返回 `ConfigError::KeyNotFound`
    async fn get_configuration(&self, key: &str) -> ConfigResult<Value>;

    /// 获取配置节
    async fn get_section(&self, section_name: &str) -> ConfigResult<ConfigSection>;

    /// 检查配置键是否存在
    async fn contains_key(&self, key: &str) -> ConfigResult<bool>;

    /// 获取所有配置键
    async fn get_all_keys(&self) -> ConfigResult<Vec<String>>;

    /// 获取提供者名称
    fn name(&self) -> &str;

    /// 获取提供者优先级
    fn priority(&self) -> i32 {
        0
    }
}
