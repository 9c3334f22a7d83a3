/// 共享数据模型
/// 
/// 定义面板对外暴露的服务器视图与电源操作

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// 真实 VPS 在面板中的固定 ID
pub const REAL_SERVER_ID: &str = "local-pc";

/// 云服务商原始状态
pub mod raw_state {
    pub const RUNNING: &str = "running";
    pub const OFF: &str = "off";
}

/// 服务器状态（对外只有两种取值）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Online,
    Offline,
}

impl ServerStatus {
    /// 将云服务商原始状态映射为面板状态
    ///
    /// 只有 `running` 视为在线，其余任何字符串（包括空串、过渡态）都视为离线。
    pub fn from_raw(raw: &str) -> Self {
        if raw == raw_state::RUNNING {
            ServerStatus::Online
        } else {
            ServerStatus::Offline
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerStatus::Online => "online",
            ServerStatus::Offline => "offline",
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, ServerStatus::Online)
    }
}

impl FromStr for ServerStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(ServerStatus::Online),
            "offline" => Ok(ServerStatus::Offline),
            other => Err(Error::InvalidArgument(format!("无效的服务器状态: {}", other))),
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 服务器 ID
///
/// `local-pc` 指向真实 VPS，数字 ID 指向模拟服务器。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerId {
    Mock(u32),
    Real(String),
}

impl ServerId {
    pub fn real() -> Self {
        ServerId::Real(REAL_SERVER_ID.to_string())
    }
}

impl FromStr for ServerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == REAL_SERVER_ID {
            return Ok(ServerId::real());
        }
        s.parse::<u32>()
            .map(ServerId::Mock)
            .map_err(|_| Error::NotFound(format!("服务器 {} 不存在", s)))
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerId::Mock(id) => write!(f, "{}", id),
            ServerId::Real(id) => f.write_str(id),
        }
    }
}

/// 电源操作
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerAction {
    On,
    Off,
    Reboot,
}

impl PowerAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
            PowerAction::Reboot => "reboot",
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 内存使用情况（MB）
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryUsage {
    pub used: f64,
    pub total: f64,
}

impl MemoryUsage {
    pub fn new(used: f64, total: f64) -> Self {
        Self { used, total }
    }

    /// 保留容量，已用清零
    pub fn idle(total: f64) -> Self {
        Self { used: 0.0, total }
    }
}

/// 面板中的服务器记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerRecord {
    pub id: ServerId,
    pub name: String,
    pub ip: String,
    pub status: ServerStatus,
    pub services: Vec<String>,
    /// CPU 负载百分比
    pub cpu_load: f64,
    pub memory_usage: MemoryUsage,
}

impl ServerRecord {
    /// 以离线、指标清零的形式返回副本
    pub fn offline(&self) -> Self {
        Self {
            status: ServerStatus::Offline,
            cpu_load: 0.0,
            memory_usage: MemoryUsage::idle(self.memory_usage.total),
            ..self.clone()
        }
    }
}
