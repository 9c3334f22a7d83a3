use std::time::Duration;
use thiserror::Error;

/// 云服务商调用错误
///
/// 客户端层不做任何重试，重试由轮询器负责。
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("云服务商配置缺失: {0}")]
    Configuration(String),

    #[error("云服务商返回错误 {status}: {body}")]
    Api { status: u16, body: String },

    #[error("请求云服务商失败: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// 上游 HTTP 状态码（传输错误时可能没有）
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            ProviderError::Transport(e) => e.status().map(|s| s.as_u16()),
            ProviderError::Configuration(_) => None,
        }
    }
}

/// 状态轮询错误
#[derive(Error, Debug)]
pub enum PollError {
    #[error("等待状态 '{desired}' 超时: 尝试 {attempts} 次, 耗时 {elapsed:?}")]
    Timeout {
        desired: String,
        elapsed: Duration,
        attempts: u32,
        /// 最后一次观察到的原始状态
        last_observed: Option<String>,
        /// 最后一次查询失败的原因
        last_error: Option<String>,
    },

    #[error("等待状态 '{desired}' 已取消: 耗时 {elapsed:?}")]
    Cancelled { desired: String, elapsed: Duration },
}

impl PollError {
    pub fn desired(&self) -> &str {
        match self {
            PollError::Timeout { desired, .. } | PollError::Cancelled { desired, .. } => desired,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            PollError::Timeout { elapsed, .. } | PollError::Cancelled { elapsed, .. } => *elapsed,
        }
    }
}
