//! 配置提供者实现
//!
//! 所有提供者在加载时把数据源转换为同一种 JSON 树，查询逻辑共用。

use async_trait::async_trait;
use config_abstractions::ConfigProvider;
use infrastructure_common::{ConfigError, ConfigResult, ConfigSection};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// TOML 文件默认优先级
pub const TOML_PRIORITY: i32 = 100;
/// JSON 文件默认优先级
pub const JSON_PRIORITY: i32 = 90;
/// 环境变量默认优先级
pub const ENVIRONMENT_PRIORITY: i32 = 200;
/// 内存配置默认优先级
pub const MEMORY_PRIORITY: i32 = 50;

/// 以点号路径访问的配置树
#[derive(Debug, Clone, Default)]
struct ConfigTree {
    root: Map<String, Value>,
}

impl ConfigTree {
    fn from_value(value: Value) -> ConfigResult<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ConfigError::TypeConversionError {
                message: format!("配置根节点必须是对象, 实际为: {other}"),
            }),
        }
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = self.root.get(parts.next()?)?;
        parts.try_fold(first, |current, part| current.get(part))
    }

    fn value(&self, key: &str) -> ConfigResult<Value> {
        self.lookup(key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound {
                key: key.to_string(),
            })
    }

    fn section(&self, section_name: &str) -> ConfigResult<ConfigSection> {
        match self.lookup(section_name) {
            Some(Value::Object(table)) => {
                let mut section = ConfigSection::new();
                for (key, value) in table {
                    section.insert(key.clone(), value.clone());
                }
                Ok(section)
            }
            Some(_) => Err(ConfigError::TypeConversionError {
                message: format!("配置节 {section_name} 不是对象类型"),
            }),
            None => Err(ConfigError::KeyNotFound {
                key: section_name.to_string(),
            }),
        }
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        Self::collect_keys(&self.root, "", &mut keys);
        keys
    }

    fn collect_keys(table: &Map<String, Value>, prefix: &str, keys: &mut Vec<String>) {
        for (key, value) in table {
            let full_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };

            if let Value::Object(nested) = value {
                Self::collect_keys(nested, &full_key, keys);
            }
            keys.push(full_key);
        }
    }

    /// 按点号路径写入，沿途缺失或非对象的节点会被替换为对象
    fn insert(&mut self, key: &str, value: Value) {
        let mut parts: Vec<&str> = key.split('.').collect();
        let Some(last) = parts.pop() else {
            return;
        };

        let mut current = &mut self.root;
        for part in parts {
            let entry = current
                .entry(part)
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                return;
            };
            current = next;
        }
        current.insert(last.to_string(), value);
    }
}

fn read_file(path: &Path) -> ConfigResult<String> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(std::fs::read_to_string(path)?)
}

/// 将 TOML 值转换为 JSON 值
fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(Number::from(i)),
        toml::Value::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
    }
}

/// 把环境变量字符串解析为最贴近的 JSON 标量
fn parse_scalar(raw: &str) -> Value {
    if let Ok(flag) = raw.parse::<bool>() {
        return Value::Bool(flag);
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Value::Number(Number::from(integer));
    }
    if let Some(number) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}

/// TOML 配置提供者
#[derive(Debug)]
pub struct TomlConfigProvider {
    source: String,
    tree: ConfigTree,
    priority: i32,
}

impl TomlConfigProvider {
    /// 从文件加载
    pub fn new<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!("加载 TOML 配置文件: {}", path.display());
        let content = read_file(path)?;
        Self::parse(path.display().to_string(), &content)
    }

    /// 从字符串加载
    pub fn from_content(content: &str) -> ConfigResult<Self> {
        Self::parse("<inline>".to_string(), content)
    }

    fn parse(source: String, content: &str) -> ConfigResult<Self> {
        let table: toml::Table = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            source: Box::new(e),
        })?;
        let tree = ConfigTree::from_value(toml_to_json(toml::Value::Table(table)))?;
        debug!("TOML 配置加载完成: {} ({} 个键)", source, tree.keys().len());

        Ok(Self {
            source,
            tree,
            priority: TOML_PRIORITY,
        })
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 配置来源
    pub fn source(&self) -> &str {
        &self.source
    }
}

#[async_trait]
impl ConfigProvider for TomlConfigProvider {
    async fn get_configuration(&self, key: &str) -> ConfigResult<Value> {
        self.tree.value(key)
    }

    async fn get_section(&self, section_name: &str) -> ConfigResult<ConfigSection> {
        self.tree.section(section_name)
    }

    async fn contains_key(&self, key: &str) -> ConfigResult<bool> {
        Ok(self.tree.lookup(key).is_some())
    }

    async fn get_all_keys(&self) -> ConfigResult<Vec<String>> {
        Ok(self.tree.keys())
    }

    fn name(&self) -> &str {
        "TomlConfigProvider"
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// JSON 配置提供者
#[derive(Debug)]
pub struct JsonConfigProvider {
    file_path: PathBuf,
    tree: ConfigTree,
    priority: i32,
}

impl JsonConfigProvider {
    /// 从文件加载
    pub fn new<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let file_path = path.as_ref().to_path_buf();
        debug!("加载 JSON 配置文件: {}", file_path.display());

        let content = read_file(&file_path)?;
        let tree = ConfigTree::from_value(serde_json::from_str(&content)?)?;

        Ok(Self {
            file_path,
            tree,
            priority: JSON_PRIORITY,
        })
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 文件路径
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

#[async_trait]
impl ConfigProvider for JsonConfigProvider {
    async fn get_configuration(&self, key: &str) -> ConfigResult<Value> {
        self.tree.value(key)
    }

    async fn get_section(&self, section_name: &str) -> ConfigResult<ConfigSection> {
        self.tree.section(section_name)
    }

    async fn contains_key(&self, key: &str) -> ConfigResult<bool> {
        Ok(self.tree.lookup(key).is_some())
    }

    async fn get_all_keys(&self) -> ConfigResult<Vec<String>> {
        Ok(self.tree.keys())
    }

    fn name(&self) -> &str {
        "JsonConfigProvider"
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 环境变量配置提供者
///
/// `DOCAI_LOGGING_LEVEL=debug` 在前缀为 `DOCAI`、分隔符为 `_` 时映射为 `logging.level`。
/// 键名中本身含下划线时可以改用 `__` 作为分隔符。
#[derive(Debug)]
pub struct EnvironmentConfigProvider {
    prefix: String,
    separator: String,
    priority: i32,
    raw: BTreeMap<String, String>,
    tree: ConfigTree,
}

impl EnvironmentConfigProvider {
    /// 从当前进程环境变量加载
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::from_vars(prefix, std::env::vars())
    }

    /// 从给定的变量集合加载
    pub fn from_vars(
        prefix: impl Into<String>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let prefix = prefix.into();
        let raw: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .collect();

        let mut provider = Self {
            prefix,
            separator: "_".to_string(),
            priority: ENVIRONMENT_PRIORITY,
            raw,
            tree: ConfigTree::default(),
        };
        provider.rebuild();
        provider
    }

    /// 设置分隔符
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self.rebuild();
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 环境变量前缀
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn rebuild(&mut self) {
        let mut tree = ConfigTree::default();
        for (env_key, raw_value) in &self.raw {
            if let Some(config_key) = self.env_key_to_config_key(env_key) {
                tree.insert(&config_key, parse_scalar(raw_value));
            }
        }
        debug!("加载了 {} 个环境变量, 前缀: {}", self.raw.len(), self.prefix);
        self.tree = tree;
    }

    /// 将环境变量键转换为配置键
    fn env_key_to_config_key(&self, env_key: &str) -> Option<String> {
        let key = env_key
            .strip_prefix(&self.prefix)?
            .strip_prefix(self.separator.as_str())?;
        if key.is_empty() {
            return None;
        }
        Some(key.replace(self.separator.as_str(), ".").to_lowercase())
    }
}

#[async_trait]
impl ConfigProvider for EnvironmentConfigProvider {
    async fn get_configuration(&self, key: &str) -> ConfigResult<Value> {
        self.tree.value(key)
    }

    async fn get_section(&self, section_name: &str) -> ConfigResult<ConfigSection> {
        self.tree.section(section_name)
    }

    async fn contains_key(&self, key: &str) -> ConfigResult<bool> {
        Ok(self.tree.lookup(key).is_some())
    }

    async fn get_all_keys(&self) -> ConfigResult<Vec<String>> {
        Ok(self.tree.keys())
    }

    fn name(&self) -> &str {
        "EnvironmentConfigProvider"
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置提供者，用于默认值和测试
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    tree: ConfigTree,
    priority: Option<i32>,
}

impl MemoryConfigProvider {
    /// 创建空的内存配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 JSON 对象创建
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        Ok(Self {
            tree: ConfigTree::from_value(value)?,
            priority: None,
        })
    }

    /// 按点号路径设置配置值
    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.tree.insert(key, value.into());
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn get_configuration(&self, key: &str) -> ConfigResult<Value> {
        self.tree.value(key)
    }

    async fn get_section(&self, section_name: &str) -> ConfigResult<ConfigSection> {
        self.tree.section(section_name)
    }

    async fn contains_key(&self, key: &str) -> ConfigResult<bool> {
        Ok(self.tree.lookup(key).is_some())
    }

    async fn get_all_keys(&self) -> ConfigResult<Vec<String>> {
        Ok(self.tree.keys())
    }

    fn name(&self) -> &str {
        "MemoryConfigProvider"
    }

    fn priority(&self) -> i32 {
        self.priority.unwrap_or(MEMORY_PRIORITY)
    }
}
