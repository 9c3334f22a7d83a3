/// VPS Panel - Server
/// 
/// 后端服务器主程序，提供认证与服务器电源控制的 REST API

mod api;
mod app_state;
mod auth;
mod config;
mod db;
mod extractors;
mod middleware;
mod services;
#[cfg(test)]
mod test_support;

use panel_provider::HetznerClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use crate::{
    app_state::AppState,
    db::{establish_connection, init_schema},
    services::{fleet_service::FleetService, metrics::MetricsSource, vps_service::VpsController},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 初始化日志
    let fallback_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback_level))
        )
        .init();

    info!("🚀 启动 VPS Panel Server...");

    // 加载配置（缺少云服务商令牌或服务器 ID 时直接退出）
    let cfg = config::Config::from_env()?;
    info!("✅ 配置加载成功");

    // 建立数据库连接 (SeaORM) - 用户存储
    let sea_db = establish_connection(&cfg.database_url).await?;
    init_schema(&sea_db).await?;
    info!("✅ 数据库初始化成功");

    // 云服务商客户端
    let client = HetznerClient::new(cfg.provider_config()?)?;
    info!("✅ 云服务商客户端初始化成功 (服务器 {})", client.server_id());

    let metrics = Arc::new(MetricsSource::from_kind(cfg.metrics_source, cfg.metrics_seed));
    info!("📊 指标来源: {:?}", metrics.kind());
    let server_id = client.server_id().to_string();
    let vps = VpsController::new(
        Arc::new(client),
        server_id,
        cfg.lifecycle_timings(),
        metrics.clone(),
    );
    let fleet = FleetService::new(vps, metrics);

    let port = cfg.server_port;
    let app_state = AppState::new(sea_db, cfg, fleet);
    let app = api::build_router(app_state.clone());

    // 启动服务器
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = app_state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("🛑 收到退出信号，正在关闭...");
            }
            shutdown.cancel();
        })
        .await?;

    info!("👋 服务器已关闭");
    Ok(())
}
