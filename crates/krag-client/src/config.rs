use krag_error::{KragError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const ENV_BASE_URL: &str = "KRAG_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "KRAG_API_TIMEOUT_MS";

/// 客户端配置，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[derive(Debug, Deserialize)]
struct ClientConfigYaml {
    base_url: Option<String>,
    timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout.map(|t| t.as_millis() as u64)
    }

    /// ```yaml
    /// base_url: http://localhost:8080
    /// timeout_ms: 15000
    /// ```
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let raw: ClientConfigYaml =
            serde_yaml::from_str(s).map_err(|e| KragError::Serialization {
                format: "yaml".to_string(),
                message: e.to_string(),
            })?;
        let mut cfg = Self::new(raw.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        if let Some(ms) = raw.timeout_ms {
            cfg = cfg.with_timeout(Duration::from_millis(ms));
        }
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|e| KragError::Configuration {
            key: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml_str(&s)
    }

    /// 读取环境变量 `KRAG_API_BASE_URL` 与 `KRAG_API_TIMEOUT_MS`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut cfg = Self::new(base_url);
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| KragError::Configuration {
                key: ENV_TIMEOUT_MS.to_string(),
                reason: format!("not a number of milliseconds: {}", raw),
            })?;
            cfg = cfg.with_timeout(Duration::from_millis(ms));
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| KragError::Configuration {
            key: "base_url".to_string(),
            reason: format!("{}: {}", self.base_url, e),
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(KragError::Configuration {
                key: "base_url".to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(KragError::Configuration {
                key: "timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
