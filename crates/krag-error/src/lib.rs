use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

/// 客户端统一错误类型
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum KragError {
    // === 传输错误 ===
    #[error("网络错误: {operation} - {message}")]
    Network { operation: String, message: String },

    #[error("超时错误: {operation} 超过 {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("服务端返回非成功状态: {operation} status={status}")]
    Status { operation: String, status: u16 },

    // === 本地错误 ===
    #[error("序列化错误: {format} - {message}")]
    Serialization { format: String, message: String },

    #[error("配置错误: {key} - {reason}")]
    Configuration { key: String, reason: String },

    #[error("文件读取失败: {path} - {message}")]
    Io { path: String, message: String },
}

/// 错误严重级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Low,      // 可预期的调用方错误
    Medium,   // 远端或网络问题
    High,     // 本地数据无法处理
    Critical, // 配置错误，客户端无法工作
}

/// 错误元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetadata {
    pub error_id: String,
    pub severity: ErrorSeverity,
    pub component: String,
    pub operation: Option<String>,
    pub tenant_id: Option<String>,
    pub kb_id: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub context: std::collections::HashMap<String, String>,
}

impl KragError {
    /// 由 reqwest 传输错误构造，`timeout_ms` 为客户端配置的超时。
    /// 响应体由调用方自行解码，这里只区分超时与其他网络错误。
    pub fn from_transport(operation: &str, err: &reqwest::Error, timeout_ms: Option<u64>) -> Self {
        if err.is_timeout() {
            KragError::Timeout {
                operation: operation.to_string(),
                timeout_ms: timeout_ms.unwrap_or_default(),
            }
        } else {
            KragError::Network {
                operation: operation.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// 获取错误的严重级别
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            KragError::Status { status, .. } if *status < 500 => ErrorSeverity::Low,
            KragError::Io { .. } => ErrorSeverity::Low,
            KragError::Status { .. } | KragError::Network { .. } | KragError::Timeout { .. } => {
                ErrorSeverity::Medium
            }
            KragError::Serialization { .. } => ErrorSeverity::High,
            KragError::Configuration { .. } => ErrorSeverity::Critical,
        }
    }

    /// 是否为可重试错误。客户端本身从不重试，由调用方决定。
    pub fn is_retryable(&self) -> bool {
        match self {
            KragError::Network { .. } | KragError::Timeout { .. } => true,
            KragError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// 非成功响应的 HTTP 状态码
    pub fn status(&self) -> Option<u16> {
        match self {
            KragError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 记录错误日志
    pub fn log(&self, metadata: &ErrorMetadata) {
        match metadata.severity {
            ErrorSeverity::Low | ErrorSeverity::Medium => {
                warn!(
                    error_id = %metadata.error_id,
                    component = %metadata.component,
                    operation = ?metadata.operation,
                    tenant_id = ?metadata.tenant_id,
                    kb_id = ?metadata.kb_id,
                    error = %self,
                    context = ?metadata.context,
                    "请求失败"
                );
            }
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!(
                    error_id = %metadata.error_id,
                    component = %metadata.component,
                    operation = ?metadata.operation,
                    tenant_id = ?metadata.tenant_id,
                    kb_id = ?metadata.kb_id,
                    error = %self,
                    context = ?metadata.context,
                    severity = ?metadata.severity,
                    "严重错误"
                );
            }
        }
    }

    /// 获取用户友好的错误消息
    pub fn user_message(&self) -> String {
        match self {
            KragError::Network { .. } => "无法连接知识库服务，请检查地址或网络".to_string(),
            KragError::Timeout { .. } => "请求超时，请重试".to_string(),
            KragError::Status { status, .. } if *status == 400 => {
                "请求参数有误，请检查后重试".to_string()
            }
            KragError::Status { status, .. } if *status == 404 => "请求的资源不存在".to_string(),
            KragError::Status { .. } => "知识库服务返回错误".to_string(),
            KragError::Io { .. } => "无法读取待上传的文件".to_string(),
            KragError::Serialization { .. } => "服务响应无法解析".to_string(),
            KragError::Configuration { .. } => "客户端配置错误".to_string(),
        }
    }
}

/// 创建错误元数据的便捷构造器
pub struct ErrorMetadataBuilder {
    metadata: ErrorMetadata,
}

impl ErrorMetadataBuilder {
    pub fn new(component: &str) -> Self {
        Self {
            metadata: ErrorMetadata {
                error_id: uuid::Uuid::new_v4().to_string(),
                severity: ErrorSeverity::Medium,
                component: component.to_string(),
                operation: None,
                tenant_id: None,
                kb_id: None,
                timestamp: chrono::Utc::now(),
                context: std::collections::HashMap::new(),
            },
        }
    }

    pub fn operation(mut self, operation: &str) -> Self {
        self.metadata.operation = Some(operation.to_string());
        self
    }

    pub fn tenant_id(mut self, tenant_id: &str) -> Self {
        self.metadata.tenant_id = Some(tenant_id.to_string());
        self
    }

    pub fn kb_id(mut self, kb_id: &str) -> Self {
        self.metadata.kb_id = Some(kb_id.to_string());
        self
    }

    pub fn context(mut self, key: &str, value: &str) -> Self {
        self.metadata
            .context
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(mut self, error: &KragError) -> ErrorMetadata {
        self.metadata.severity = error.severity();
        self.metadata
    }
}

pub type Result<T> = std::result::Result<T, KragError>;

// === 转换实现 ===

impl From<serde_json::Error> for KragError {
    fn from(err: serde_json::Error) -> Self {
        KragError::Serialization {
            format: "json".to_string(),
            message: err.to_string(),
        }
    }
}
