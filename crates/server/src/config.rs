/// 配置管理

use config::{Environment, Map};
use panel_provider::ProviderConfig;
use serde::Deserialize;
use std::time::Duration;

use crate::services::metrics::MetricsKind;
use crate::services::vps_service::LifecycleTimings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub log_level: String,

    // 云服务商
    pub provider_api_url: String,
    #[serde(default)]
    pub provider_api_token: Option<String>,
    #[serde(default)]
    pub provider_server_id: Option<String>,
    // 兼容旧的 Hetzner 变量名
    #[serde(default)]
    pub hetzner_api_key: Option<String>,
    #[serde(default)]
    pub hetzner_server_id: Option<String>,
    pub provider_http_timeout_secs: u64,

    // 生命周期控制
    pub poll_interval_secs: u64,
    pub power_timeout_secs: u64,
    pub reboot_grace_secs: u64,
    pub request_deadline_secs: u64,

    // 指标来源
    pub metrics_source: MetricsKind,
    #[serde(default)]
    pub metrics_seed: Option<u64>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 云服务商的令牌与服务器 ID 缺失时直接报错，进程不应带着无效配置启动。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_source(Environment::default())
    }

    /// 从指定的环境源加载配置（测试中传入固定的键值表）
    pub fn from_source(env: Environment) -> anyhow::Result<Self> {
        let cfg: Config = config::Config::builder()
            .set_default("server_port", 3001)?
            .set_default("database_url", "sqlite://panel.db?mode=rwc")?
            .set_default("jwt_secret", "change-me-in-production")?
            .set_default("jwt_ttl_hours", 2)?
            .set_default("bcrypt_cost", 10)?
            .set_default("log_level", "debug")?
            .set_default("provider_api_url", panel_provider::client::DEFAULT_API_URL)?
            .set_default("provider_http_timeout_secs", 10)?
            .set_default("poll_interval_secs", 2)?
            .set_default("power_timeout_secs", 15)?
            .set_default("reboot_grace_secs", 10)?
            .set_default("request_deadline_secs", 60)?
            .set_default("metrics_source", "synthetic")?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        cfg.provider_config()?;
        Ok(cfg)
    }

    /// 由键值表构造环境源
    pub fn env_from_map(vars: Map<String, String>) -> Environment {
        Environment::default().source(Some(vars))
    }

    /// 云服务商连接配置
    pub fn provider_config(&self) -> panel_common::Result<ProviderConfig> {
        let token = non_empty(&self.provider_api_token)
            .or_else(|| non_empty(&self.hetzner_api_key))
            .ok_or_else(|| panel_common::Error::Config("缺少 PROVIDER_API_TOKEN".to_string()))?;
        let server_id = non_empty(&self.provider_server_id)
            .or_else(|| non_empty(&self.hetzner_server_id))
            .ok_or_else(|| panel_common::Error::Config("缺少 PROVIDER_SERVER_ID".to_string()))?;

        Ok(ProviderConfig::new(token, server_id)
            .with_api_url(self.provider_api_url.clone())
            .with_http_timeout(Duration::from_secs(self.provider_http_timeout_secs)))
    }

    pub fn lifecycle_timings(&self) -> LifecycleTimings {
        LifecycleTimings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            power_timeout: Duration::from_secs(self.power_timeout_secs),
            reboot_grace: Duration::from_secs(self.reboot_grace_secs),
        }
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
