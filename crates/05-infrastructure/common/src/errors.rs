//! 错误类型定义

use thiserror::Error;

/// 可跨线程传递的装箱错误
///
/// 服务工厂与释放钩子统一使用该类型返回错误，容器原样透传。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError { source: BoxError },

    #[error("配置序列化失败: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },

    #[error("配置类型转换失败: {message}")]
    TypeConversionError { message: String },
}

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("服务未注册: {token}")]
    NotRegistered { token: String },

    #[error("服务重复注册: {token}")]
    DuplicateRegistration { token: String },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("服务正在解析中: {token}")]
    AlreadyResolving { token: String },

    #[error("服务尚未解析, 需要先异步解析一次: {token}")]
    NotResolved { token: String },

    #[error("瞬时服务不支持同步解析: {token}")]
    TransientNotCached { token: String },

    #[error("服务类型不匹配: {token}, 期望 {expected}")]
    TypeMismatch { token: String, expected: String },

    /// 工厂原始错误，不做任何包装
    #[error(transparent)]
    Factory(BoxError),
}

impl DependencyError {
    /// 创建未注册错误
    pub fn not_registered(token: impl ToString) -> Self {
        Self::NotRegistered {
            token: token.to_string(),
        }
    }

    /// 是否为工厂错误
    pub fn is_factory_error(&self) -> bool {
        matches!(self, Self::Factory(_))
    }

    /// 获取工厂返回的原始错误
    pub fn factory_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Factory(source) => Some(source.as_ref()),
            _ => None,
        }
    }

    /// 将工厂原始错误向下转型为具体类型
    pub fn downcast_factory_error<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.factory_error().and_then(|source| source.downcast_ref::<E>())
    }

    /// 取出工厂原始错误
    pub fn into_factory_error(self) -> Result<BoxError, Self> {
        match self {
            Self::Factory(source) => Ok(source),
            other => Err(other),
        }
    }
}

/// 验证错误类型
#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("验证失败: {message}")]
    ValidationFailed { message: String },

    #[error("必需字段缺失: {field_name}")]
    RequiredFieldMissing { field_name: String },

    #[error("字段值超出范围: {field_name}, 值: {value}, 范围: {range}")]
    ValueOutOfRange {
        field_name: String,
        value: String,
        range: String,
    },
}

impl ValidationError {
    /// 创建新的验证错误
    pub fn new(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// 创建必需字段缺失错误
    pub fn required_field_missing(field_name: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            field_name: field_name.into(),
        }
    }

    /// 创建值超出范围错误
    pub fn value_out_of_range(
        field_name: impl Into<String>,
        value: impl ToString,
        range: impl Into<String>,
    ) -> Self {
        Self::ValueOutOfRange {
            field_name: field_name.into(),
            value: value.to_string(),
            range: range.into(),
        }
    }
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    DependencyError {
        #[from]
        source: DependencyError,
    },

    #[error("验证错误: {source}")]
    ValidationError {
        #[from]
        source: ValidationError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("必需服务不可用: {service}, 原因: {message}")]
    ServiceUnavailable { service: String, message: String },
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DependencyResult<T> = Result<T, DependencyError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;
