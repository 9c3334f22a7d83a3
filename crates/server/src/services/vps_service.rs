/// 真实 VPS 生命周期控制
/// 
/// 电源操作 = 发送操作 + 轮询等待目标状态。
/// 最近一次已知的服务器记录由控制器自己持有，读路径在云服务商不可用时退化为离线记录。

use panel_common::models::{raw_state, REAL_SERVER_ID};
use panel_common::{MemoryUsage, PowerAction, ServerId, ServerRecord, ServerStatus};
use panel_provider::{CloudApi, PollError, ProviderError, StatePoller, DEFAULT_POLL_INTERVAL};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::services::metrics::MetricsSource;

/// 真实 VPS 的内存容量（MB）
pub const VPS_MEMORY_TOTAL_MB: f64 = 15870.0;

/// 电源操作的时间参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTimings {
    pub poll_interval: Duration,
    /// 开机 / 关机确认的等待上限
    pub power_timeout: Duration,
    /// 重启时关机与开机之间的间隔
    pub reboot_grace: Duration,
}

impl Default for LifecycleTimings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            power_timeout: Duration::from_secs(15),
            reboot_grace: Duration::from_secs(10),
        }
    }
}

/// 控制器视角的电源状态
///
/// 确认超时后状态记为 `Unknown`：操作可能已经在云服务商生效，只是没有等到确认。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Unknown,
    Online,
    Offline,
}

impl From<ServerStatus> for PowerState {
    fn from(status: ServerStatus) -> Self {
        match status {
            ServerStatus::Online => PowerState::Online,
            ServerStatus::Offline => PowerState::Offline,
        }
    }
}

/// 重启失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebootStage {
    /// 没能关机：服务器可能一直没有下线
    PowerOff,
    /// 已关机但没能开机：服务器可能停在关机状态
    PowerOn,
}

impl fmt::Display for RebootStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebootStage::PowerOff => f.write_str("power_off"),
            RebootStage::PowerOn => f.write_str("power_on"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    /// 操作请求本身被云服务商拒绝或未送达
    #[error("电源操作 {action} 请求失败: {source}")]
    ActionRejected {
        action: PowerAction,
        source: ProviderError,
    },

    /// 操作已发送，但没有在时限内确认目标状态，当前状态未知
    #[error("电源操作 {action} 未确认完成: {source}")]
    PowerOperationFailed { action: PowerAction, source: PollError },

    #[error("重启在 {stage} 阶段失败: {source}")]
    RebootFailed {
        stage: RebootStage,
        source: Box<LifecycleError>,
    },
}

impl LifecycleError {
    pub fn action(&self) -> PowerAction {
        match self {
            LifecycleError::ActionRejected { action, .. }
            | LifecycleError::PowerOperationFailed { action, .. } => *action,
            LifecycleError::RebootFailed { .. } => PowerAction::Reboot,
        }
    }

    /// 去掉重启包装后的根本原因
    pub fn root(&self) -> &LifecycleError {
        match self {
            LifecycleError::RebootFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

struct VpsState {
    record: ServerRecord,
    power: PowerState,
}

/// 可以单独确认完成的电源操作（重启由两者组合而成）
#[derive(Debug, Clone, Copy)]
enum PowerSwitch {
    On,
    Off,
}

impl PowerSwitch {
    fn action(self) -> PowerAction {
        match self {
            PowerSwitch::On => PowerAction::On,
            PowerSwitch::Off => PowerAction::Off,
        }
    }

    fn desired_raw(self) -> &'static str {
        match self {
            PowerSwitch::On => raw_state::RUNNING,
            PowerSwitch::Off => raw_state::OFF,
        }
    }

    fn target(self) -> ServerStatus {
        match self {
            PowerSwitch::On => ServerStatus::Online,
            PowerSwitch::Off => ServerStatus::Offline,
        }
    }

    /// 操作在等待确认之前就被取消
    fn cancelled(self, started: Instant) -> LifecycleError {
        LifecycleError::PowerOperationFailed {
            action: self.action(),
            source: PollError::Cancelled {
                desired: self.desired_raw().to_string(),
                elapsed: started.elapsed(),
            },
        }
    }
}

/// 真实 VPS 控制器
#[derive(Clone)]
pub struct VpsController {
    api: Arc<dyn CloudApi>,
    poller: StatePoller,
    server_id: String,
    timings: LifecycleTimings,
    metrics: Arc<MetricsSource>,
    state: Arc<RwLock<VpsState>>,
    /// 同一台服务器的电源操作串行执行
    action_lock: Arc<Mutex<()>>,
}

impl VpsController {
    pub fn new(
        api: Arc<dyn CloudApi>,
        server_id: impl Into<String>,
        timings: LifecycleTimings,
        metrics: Arc<MetricsSource>,
    ) -> Self {
        let record = ServerRecord {
            id: ServerId::real(),
            name: "VPS Real".to_string(),
            ip: "127.0.0.1".to_string(),
            status: ServerStatus::Offline,
            services: vec![
                "Hosting".to_string(),
                "Node.js".to_string(),
                "React".to_string(),
            ],
            cpu_load: 0.0,
            memory_usage: MemoryUsage::idle(VPS_MEMORY_TOTAL_MB),
        };

        Self {
            poller: StatePoller::new(api.clone(), timings.poll_interval),
            api,
            server_id: server_id.into(),
            timings,
            metrics,
            state: Arc::new(RwLock::new(VpsState {
                record,
                power: PowerState::Unknown,
            })),
            action_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 云服务商侧的服务器 ID
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub async fn power_state(&self) -> PowerState {
        self.state.read().await.power
    }

    /// 最近一次已知的记录（不访问云服务商）
    pub async fn last_known(&self) -> ServerRecord {
        self.state.read().await.record.clone()
    }

    /// 开机并等待进入 `running`
    pub async fn power_on(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        let started = Instant::now();
        let Some(_guard) = self.lock_actions(cancel).await else {
            return Err(PowerSwitch::On.cancelled(started));
        };
        self.switch_power(PowerSwitch::On, cancel).await
    }

    /// 强制关机（不等待进程退出）并等待进入 `off`
    pub async fn power_off(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        let started = Instant::now();
        let Some(_guard) = self.lock_actions(cancel).await else {
            return Err(PowerSwitch::Off.cancelled(started));
        };
        self.switch_power(PowerSwitch::Off, cancel).await
    }

    /// 重启 = 关机 → 固定间隔 → 开机
    ///
    /// 关机失败时不会尝试开机；返回的错误带有失败阶段。
    pub async fn reboot(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        let started = Instant::now();
        let Some(_guard) = self.lock_actions(cancel).await else {
            return Err(LifecycleError::RebootFailed {
                stage: RebootStage::PowerOff,
                source: Box::new(PowerSwitch::Off.cancelled(started)),
            });
        };
        info!("🔄 开始重启 VPS {}", self.server_id);

        self.switch_power(PowerSwitch::Off, cancel)
            .await
            .map_err(|e| LifecycleError::RebootFailed {
                stage: RebootStage::PowerOff,
                source: Box::new(e),
            })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("重启 VPS {} 在关机后被取消", self.server_id);
                return Err(LifecycleError::RebootFailed {
                    stage: RebootStage::PowerOn,
                    source: Box::new(PowerSwitch::On.cancelled(Instant::now())),
                });
            }
            _ = tokio::time::sleep(self.timings.reboot_grace) => {}
        }

        self.switch_power(PowerSwitch::On, cancel)
            .await
            .map_err(|e| LifecycleError::RebootFailed {
                stage: RebootStage::PowerOn,
                source: Box::new(e),
            })?;

        info!("✅ VPS {} 重启完成", self.server_id);
        Ok(())
    }

    /// 查询当前状态并转换为面板记录
    ///
    /// 云服务商不可用时返回最近一次的记录，状态强制为离线、指标清零，不向上抛错。
    pub async fn current_status(&self) -> ServerRecord {
        match self.api.get_raw_status(&self.server_id).await {
            Ok(raw) => {
                let status = ServerStatus::from_raw(&raw.status);
                let metrics = self.metrics.for_status(status, VPS_MEMORY_TOTAL_MB);

                let mut state = self.state.write().await;
                if let Some(ip) = raw.ip {
                    state.record.ip = ip;
                }
                state.record.status = status;
                state.record.cpu_load = metrics.cpu_load;
                state.record.memory_usage = metrics.memory;
                state.power = status.into();
                state.record.clone()
            }
            Err(e) => {
                warn!("获取 VPS {} 状态失败，返回离线记录: {}", self.server_id, e);
                self.state.read().await.record.offline()
            }
        }
    }

    /// 排队等待电源操作锁，取消时返回 `None`
    async fn lock_actions(&self, cancel: &CancellationToken) -> Option<MutexGuard<'_, ()>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("VPS {} 的电源操作在排队时被取消", self.server_id);
                None
            }
            guard = self.action_lock.lock() => Some(guard),
        }
    }

    /// 发送单个电源操作并等待确认，调用方负责持有 action_lock
    async fn switch_power(
        &self,
        switch: PowerSwitch,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        let action = switch.action();
        let target = switch.target();

        // 已取消的请求不再向云服务商发送操作
        if cancel.is_cancelled() {
            warn!("VPS {} 电源操作 {} 已取消，未发送", self.server_id, action);
            return Err(switch.cancelled(Instant::now()));
        }

        info!("⚡ 向 VPS {} ({}) 发送电源操作: {}", self.server_id, REAL_SERVER_ID, action);
        if let Err(e) = self.api.send_action(&self.server_id, action).await {
            error!("VPS {} 电源操作 {} 被拒绝: {}", self.server_id, action, e);
            return Err(LifecycleError::ActionRejected { action, source: e });
        }

        match self
            .poller
            .await_state(&self.server_id, switch.desired_raw(), self.timings.power_timeout, cancel)
            .await
        {
            Ok(outcome) => {
                let metrics = self.metrics.for_status(target, VPS_MEMORY_TOTAL_MB);
                let mut state = self.state.write().await;
                state.power = target.into();
                state.record.status = target;
                state.record.cpu_load = metrics.cpu_load;
                state.record.memory_usage = metrics.memory;
                info!(
                    "VPS {} 电源操作 {} 完成 (查询 {} 次)",
                    self.server_id, action, outcome.attempts
                );
                Ok(())
            }
            Err(e) => {
                // 记录状态保持原样，只把电源状态标记为未知
                self.state.write().await.power = PowerState::Unknown;
                error!("VPS {} 电源操作 {} 未确认: {}", self.server_id, action, e);
                Err(LifecycleError::PowerOperationFailed { action, source: e })
            }
        }
    }
}
