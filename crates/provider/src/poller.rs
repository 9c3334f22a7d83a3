/// 状态轮询器
/// 
/// 发出电源操作后，按固定间隔查询服务器原始状态，直到达到目标状态或超时。
/// 间隔固定，不做退避。

use panel_common::utils::max_attempts;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::CloudApi;
use crate::error::PollError;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// 轮询成功结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// 实际查询次数
    pub attempts: u32,
    pub elapsed: Duration,
}

/// 状态轮询器
#[derive(Clone)]
pub struct StatePoller {
    api: Arc<dyn CloudApi>,
    interval: Duration,
}

impl StatePoller {
    pub fn new(api: Arc<dyn CloudApi>, interval: Duration) -> Self {
        Self { api, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 等待服务器进入目标原始状态
    ///
    /// 最多查询 `ceil(timeout / interval)` 次，同一时间只有一个请求在途。
    /// 单次查询失败只记录并计入次数，不中断轮询。
    /// `cancel` 被触发时立即返回 `PollError::Cancelled`。
    pub async fn await_state(
        &self,
        server_id: &str,
        desired: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<PollOutcome, PollError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let max_tries = max_attempts(timeout, self.interval);

        let mut last_observed: Option<String> = None;
        let mut last_error: Option<String> = None;
        let mut attempts = 0;

        while attempts < max_tries {
            attempts += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(cancelled(desired, started));
                }
                result = self.api.get_raw_status(server_id) => result,
            };

            match result {
                Ok(raw) if raw.status == desired => {
                    let elapsed = started.elapsed();
                    info!(
                        "✅ 服务器 {} 已进入状态 '{}' (第 {} 次查询, 耗时 {:?})",
                        server_id, desired, attempts, elapsed
                    );
                    return Ok(PollOutcome { attempts, elapsed });
                }
                Ok(raw) => {
                    debug!(
                        "服务器 {} 当前状态 '{}', 等待 '{}' ({}/{})",
                        server_id, raw.status, desired, attempts, max_tries
                    );
                    last_observed = Some(raw.status);
                }
                Err(e) => {
                    warn!(
                        "轮询服务器 {} 状态失败 ({}/{}): {}",
                        server_id, attempts, max_tries, e
                    );
                    last_error = Some(e.to_string());
                }
            }

            if attempts == max_tries {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(cancelled(desired, started));
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        let elapsed = started.elapsed();
        warn!(
            "⏰ 等待服务器 {} 进入状态 '{}' 超时 (查询 {} 次, 耗时 {:?})",
            server_id, desired, attempts, elapsed
        );
        Err(PollError::Timeout {
            desired: desired.to_string(),
            elapsed,
            attempts,
            last_observed,
            last_error,
        })
    }
}

fn cancelled(desired: &str, started: Instant) -> PollError {
    let elapsed = started.elapsed();
    info!("等待状态 '{}' 已取消 (耗时 {:?})", desired, elapsed);
    PollError::Cancelled {
        desired: desired.to_string(),
        elapsed,
    }
}
