/// 应用全局状态

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::services::fleet_service::FleetService;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// SeaORM 数据库连接 - 用户存储
    pub sea_db: DatabaseConnection,
    /// 启动时加载的配置
    pub config: Arc<Config>,
    /// 服务器列表（真实 VPS + 模拟服务器）
    pub fleet: FleetService,
    /// 进程级取消令牌，关闭时触发
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(sea_db: DatabaseConnection, config: Config, fleet: FleetService) -> Self {
        Self {
            sea_db,
            config: Arc::new(config),
            fleet,
            shutdown: CancellationToken::new(),
        }
    }

    /// 获取 SeaORM 数据库连接（克隆）
    pub fn sea_db(&self) -> DatabaseConnection {
        self.sea_db.clone()
    }

    /// 获取服务器列表服务
    pub fn fleet(&self) -> FleetService {
        self.fleet.clone()
    }

    /// 为一次请求派生取消令牌：进程关闭或超过请求截止时间都会触发
    ///
    /// 返回的 guard 被丢弃时令牌也会被取消，计时任务随之退出。
    pub fn request_token(&self) -> (CancellationToken, tokio_util::sync::DropGuard) {
        let token = self.shutdown.child_token();
        let deadline = self.config.request_deadline();

        let timer = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    tracing::warn!("请求超过截止时间 {:?}，取消等待", deadline);
                    timer.cancel();
                }
            }
        });

        (token.clone(), token.drop_guard())
    }
}
