use thiserror::Error;

use crate::types::RoleKind;

/// 工作流错误分类
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WorkflowError {
    /// 数据集函数调用失败或返回的结构不合法，只影响对应的键
    #[error("dataset `{key}` unavailable: {reason}")]
    DataUnavailable { key: String, reason: String },

    /// 推理后端调用失败或超时，运行无法继续
    #[error("reasoning backend error during {role} role: {reason}")]
    ReasoningBackend { role: RoleKind, reason: String },

    #[error("workflow run timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl WorkflowError {
    pub fn data_unavailable(key: &str, reason: impl Into<String>) -> Self {
        WorkflowError::DataUnavailable {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn backend(role: RoleKind, reason: impl Into<String>) -> Self {
        WorkflowError::ReasoningBackend {
            role,
            reason: reason.into(),
        }
    }
}
