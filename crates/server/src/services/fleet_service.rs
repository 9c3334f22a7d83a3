/// 服务器列表聚合
/// 
/// 真实 VPS 永远排在第一位，其后是按声明顺序排列的模拟服务器。
/// 模拟服务器只存在于进程内存，重启后恢复为默认列表。

use panel_common::{PowerAction, ServerId, ServerRecord, ServerStatus};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::services::metrics::MetricsSource;
use crate::services::vps_service::{LifecycleError, PowerState, VpsController};

/// 模拟服务器默认内存容量（MB）
pub const MOCK_MEMORY_TOTAL_MB: f64 = 8192.0;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("服务器 {0} 不存在")]
    NotFound(ServerId),

    #[error("{0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// 模拟服务器
#[derive(Debug, Clone, PartialEq)]
pub struct MockServer {
    pub id: u32,
    pub name: String,
    pub ip: String,
    pub status: ServerStatus,
    pub services: Vec<String>,
    pub memory_total: f64,
}

impl MockServer {
    pub fn new(id: u32, name: &str, ip: &str, services: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            ip: ip.to_string(),
            status: ServerStatus::Offline,
            services: services.iter().map(|s| s.to_string()).collect(),
            memory_total: MOCK_MEMORY_TOTAL_MB,
        }
    }

    fn to_record(&self, metrics: &MetricsSource) -> ServerRecord {
        let sample = metrics.for_status(self.status, self.memory_total);
        ServerRecord {
            id: ServerId::Mock(self.id),
            name: self.name.clone(),
            ip: self.ip.clone(),
            status: self.status,
            services: self.services.clone(),
            cpu_load: sample.cpu_load,
            memory_usage: sample.memory,
        }
    }
}

/// 进程启动时的模拟服务器列表
pub fn default_mocks() -> Vec<MockServer> {
    let web = ["Hosting web", "Base de datos", "Docker"];
    vec![
        MockServer::new(1, "Servidor Principal", "10.10.10.1", &["Active Directory", "DNS", "DHCP"]),
        MockServer::new(
            2,
            "Servidor Secundario",
            "10.10.10.2",
            &["Servicios de impresión", "Servicios de archivos", "FTP"],
        ),
        MockServer::new(3, "VPS", "10.10.10.3", &web),
        MockServer::new(4, "VPS", "10.10.10.4", &web),
        MockServer::new(5, "GPU", "10.10.10.5", &web),
    ]
}

/// 服务器列表服务
#[derive(Clone)]
pub struct FleetService {
    vps: VpsController,
    /// 模拟服务器数量很少，用一把全局锁串行化修改
    mocks: Arc<RwLock<Vec<MockServer>>>,
    metrics: Arc<MetricsSource>,
}

impl FleetService {
    pub fn new(vps: VpsController, metrics: Arc<MetricsSource>) -> Self {
        Self::with_mocks(vps, metrics, default_mocks())
    }

    pub fn with_mocks(vps: VpsController, metrics: Arc<MetricsSource>, mocks: Vec<MockServer>) -> Self {
        Self {
            vps,
            mocks: Arc::new(RwLock::new(mocks)),
            metrics,
        }
    }

    /// 获取全部服务器：真实 VPS 在前，模拟服务器按声明顺序在后
    pub async fn list_servers(&self) -> Vec<ServerRecord> {
        let real = self.vps.current_status().await;

        let mocks = self.mocks.read().await;
        let mut servers = Vec::with_capacity(mocks.len() + 1);
        servers.push(real);
        servers.extend(mocks.iter().map(|m| m.to_record(&self.metrics)));
        servers
    }

    /// 获取单台服务器
    pub async fn get_server(&self, id: &ServerId) -> Result<ServerRecord, FleetError> {
        match id {
            ServerId::Real(_) => Ok(self.vps.current_status().await),
            ServerId::Mock(mock_id) => {
                let mocks = self.mocks.read().await;
                mocks
                    .iter()
                    .find(|m| m.id == *mock_id)
                    .map(|m| m.to_record(&self.metrics))
                    .ok_or_else(|| FleetError::NotFound(id.clone()))
            }
        }
    }

    /// 对服务器执行电源操作，返回操作后的电源状态
    ///
    /// 真实 VPS 交给生命周期控制器（可能持续数十秒）；模拟服务器立即切换状态。
    pub async fn power(
        &self,
        id: &ServerId,
        action: PowerAction,
        cancel: &CancellationToken,
    ) -> Result<PowerState, FleetError> {
        match id {
            ServerId::Real(_) => {
                match action {
                    PowerAction::On => self.vps.power_on(cancel).await?,
                    PowerAction::Off => self.vps.power_off(cancel).await?,
                    PowerAction::Reboot => self.vps.reboot(cancel).await?,
                }
                Ok(self.vps.power_state().await)
            }
            ServerId::Mock(_) => {
                let status = match action {
                    PowerAction::On | PowerAction::Reboot => ServerStatus::Online,
                    PowerAction::Off => ServerStatus::Offline,
                };
                self.set_mock_status(id, status).await?;
                Ok(status.into())
            }
        }
    }

    /// 确认 ID 指向一台存在的模拟服务器
    pub async fn ensure_mock(&self, id: &ServerId) -> Result<u32, FleetError> {
        match id {
            ServerId::Mock(mock_id) => {
                let mocks = self.mocks.read().await;
                if mocks.iter().any(|m| m.id == *mock_id) {
                    Ok(*mock_id)
                } else {
                    Err(FleetError::NotFound(id.clone()))
                }
            }
            ServerId::Real(_) => Err(FleetError::InvalidTarget(
                "真实 VPS 的状态由云服务商决定，请使用电源操作".to_string(),
            )),
        }
    }

    /// 直接设置模拟服务器状态
    pub async fn set_mock_status(
        &self,
        id: &ServerId,
        status: ServerStatus,
    ) -> Result<ServerRecord, FleetError> {
        let mock_id = self.ensure_mock(id).await?;

        let mut mocks = self.mocks.write().await;
        let mock = mocks
            .iter_mut()
            .find(|m| m.id == mock_id)
            .ok_or_else(|| FleetError::NotFound(id.clone()))?;

        mock.status = status;
        info!("模拟服务器 {} 状态已更新为 {}", mock_id, status);
        Ok(mock.to_record(&self.metrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::vps_service::LifecycleTimings;
    use crate::test_support::FakeCloud;

    fn fleet(cloud: Arc<FakeCloud>) -> FleetService {
        let metrics = Arc::new(MetricsSource::synthetic(11));
        let vps = VpsController::new(cloud, "42", LifecycleTimings::default(), metrics.clone());
        FleetService::new(vps, metrics)
    }

    fn ids(servers: &[ServerRecord]) -> Vec<ServerId> {
        servers.iter().map(|s| s.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_real_server_is_always_first() {
        let fleet = fleet(FakeCloud::stuck("running"));
        let cancel = CancellationToken::new();

        let expected = vec![
            ServerId::real(),
            ServerId::Mock(1),
            ServerId::Mock(2),
            ServerId::Mock(3),
            ServerId::Mock(4),
            ServerId::Mock(5),
        ];
        assert_eq!(ids(&fleet.list_servers().await), expected);

        // 状态变化不影响顺序
        fleet.power(&ServerId::Mock(4), PowerAction::On, &cancel).await.unwrap();
        fleet.power(&ServerId::Mock(1), PowerAction::On, &cancel).await.unwrap();
        assert_eq!(ids(&fleet.list_servers().await), expected);
    }

    #[tokio::test]
    async fn test_real_server_first_even_when_provider_fails() {
        let cloud = FakeCloud::stuck("running");
        cloud.fail_status_queries();
        let servers = fleet(cloud).list_servers().await;

        assert_eq!(servers[0].id, ServerId::real());
        assert_eq!(servers[0].status, ServerStatus::Offline);
        assert_eq!(servers.len(), 6);
    }

    #[tokio::test]
    async fn test_mock_metrics_follow_status() {
        let fleet = fleet(FakeCloud::stuck("off"));
        let cancel = CancellationToken::new();

        let before = fleet.get_server(&ServerId::Mock(2)).await.unwrap();
        assert_eq!(before.status, ServerStatus::Offline);
        assert_eq!(before.cpu_load, 0.0);
        assert_eq!(before.memory_usage.used, 0.0);

        let state = fleet.power(&ServerId::Mock(2), PowerAction::On, &cancel).await.unwrap();
        assert_eq!(state, PowerState::Online);

        let after = fleet.get_server(&ServerId::Mock(2)).await.unwrap();
        assert_eq!(after.status, ServerStatus::Online);
        assert!(after.cpu_load > 0.0);
        assert!(after.memory_usage.used > 0.0);
        assert_eq!(after.memory_usage.total, MOCK_MEMORY_TOTAL_MB);
    }

    #[tokio::test]
    async fn test_mock_power_actions() {
        let fleet = fleet(FakeCloud::stuck("off"));
        let cancel = CancellationToken::new();
        let id = ServerId::Mock(5);

        assert_eq!(fleet.power(&id, PowerAction::Reboot, &cancel).await.unwrap(), PowerState::Online);
        assert_eq!(fleet.power(&id, PowerAction::Off, &cancel).await.unwrap(), PowerState::Offline);
        assert_eq!(fleet.get_server(&id).await.unwrap().status, ServerStatus::Offline);
    }

    #[tokio::test]
    async fn test_unknown_mock_is_not_found() {
        let cloud = FakeCloud::stuck("off");
        let fleet = fleet(cloud.clone());
        let cancel = CancellationToken::new();

        let err = fleet.power(&ServerId::Mock(99), PowerAction::On, &cancel).await.unwrap_err();
        assert!(matches!(err, FleetError::NotFound(ServerId::Mock(99))));
        assert!(matches!(
            fleet.get_server(&ServerId::Mock(0)).await,
            Err(FleetError::NotFound(_))
        ));
        assert!(cloud.actions().is_empty());
    }

    #[tokio::test]
    async fn test_real_server_status_cannot_be_set_directly() {
        let fleet = fleet(FakeCloud::stuck("off"));
        let err = fleet
            .set_mock_status(&ServerId::real(), ServerStatus::Online)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::InvalidTarget(_)));
    }

    #[tokio::test]
    async fn test_real_power_goes_through_controller() {
        let cloud = FakeCloud::responsive("off");
        let fleet = fleet(cloud.clone());

        let state = fleet
            .power(&ServerId::real(), PowerAction::On, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state, PowerState::Online);
        assert_eq!(cloud.actions(), vec![PowerAction::On]);
        assert_eq!(fleet.list_servers().await[0].status, ServerStatus::Online);
    }
}
