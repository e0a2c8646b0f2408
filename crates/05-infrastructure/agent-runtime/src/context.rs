//! 执行上下文与执行结果

use crate::error::{AgentError, AgentErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// 单次执行的上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    /// 会话标识
    pub session_id: String,
    /// 发起请求的用户
    pub user_id: Option<String>,
    /// 执行的智能体，未设置时由运行时填入
    pub agent_id: Option<String>,
    /// 创建时间
    pub timestamp: DateTime<Utc>,
    /// 附加信息
    pub metadata: HashMap<String, Value>,
}

impl AgentContext {
    /// 创建上下文
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            agent_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// 使用新生成的会话标识创建上下文
    pub fn new_session() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// 设置发起请求的用户
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// 附加一项元数据，同名键会被覆盖
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 执行结果
///
/// `execute` 的所有业务结果（成功、失败、超时、panic）都通过该结构返回。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult<T> {
    /// 是否成功
    pub success: bool,
    /// 输出数据
    pub data: Option<T>,
    /// 错误信息
    pub error: Option<String>,
    /// 错误类别
    pub error_kind: Option<AgentErrorKind>,
    /// 实际执行次数
    pub attempts: u32,
    /// 总耗时（毫秒）
    pub duration_ms: u64,
}

impl<T> AgentResult<T> {
    /// 成功结果
    pub fn success(data: T, attempts: u32, elapsed: Duration) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            attempts,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// 失败结果，只保留错误描述和类别
    pub fn failure(error: &AgentError, attempts: u32, elapsed: Duration) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            attempts,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// 是否成功
    pub fn is_success(&self) -> bool {
        self.success
    }
}
