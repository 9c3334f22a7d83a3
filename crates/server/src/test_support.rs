/// 测试辅助：可编排的云服务商与完整的应用状态

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use panel_common::PowerAction;
use panel_provider::{ActionAck, CloudApi, ProviderError, RawServerStatus};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use crate::app_state::AppState;
use crate::config::Config;
use crate::db;
use crate::services::fleet_service::FleetService;
use crate::services::metrics::MetricsSource;
use crate::services::vps_service::VpsController;

pub const FAKE_IP: &str = "203.0.113.7";

/// 假的云服务商
///
/// 先按脚本返回状态，脚本耗尽后返回 fallback。
/// `responsive` 模式下电源操作会立即改变 fallback，`stuck` 模式下不会。
pub struct FakeCloud {
    script: Mutex<VecDeque<String>>,
    fallback: Mutex<String>,
    follow_actions: bool,
    fail_status: AtomicBool,
    reject: AtomicBool,
    actions: Mutex<Vec<PowerAction>>,
    /// 每次发送电源操作时已发生的状态查询次数
    calls_at_actions: Mutex<Vec<u32>>,
    status_calls: AtomicU32,
}

impl FakeCloud {
    fn build(status: &str, follow_actions: bool) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(status.to_string()),
            follow_actions,
            fail_status: AtomicBool::new(false),
            reject: AtomicBool::new(false),
            actions: Mutex::new(Vec::new()),
            calls_at_actions: Mutex::new(Vec::new()),
            status_calls: AtomicU32::new(0),
        })
    }

    pub fn stuck(status: &str) -> Arc<Self> {
        Self::build(status, false)
    }

    pub fn responsive(status: &str) -> Arc<Self> {
        Self::build(status, true)
    }

    pub fn push_statuses(&self, statuses: &[&str]) {
        let mut script = self.script.lock().unwrap();
        script.extend(statuses.iter().map(|s| s.to_string()));
    }

    pub fn fail_status_queries(&self) {
        self.fail_status.store(true, Ordering::SeqCst);
    }

    pub fn reject_actions(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn actions(&self) -> Vec<PowerAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn status_calls_at_actions(&self) -> Vec<u32> {
        self.calls_at_actions.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn get_raw_status(&self, _server_id: &str) -> Result<RawServerStatus, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let next = self.script.lock().unwrap().pop_front();
        let status = next.unwrap_or_else(|| self.fallback.lock().unwrap().clone());
        Ok(RawServerStatus {
            status,
            ip: Some(FAKE_IP.to_string()),
        })
    }

    async fn send_action(
        &self,
        _server_id: &str,
        action: PowerAction,
    ) -> Result<ActionAck, ProviderError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ProviderError::Api {
                status: 423,
                body: "server is locked".to_string(),
            });
        }

        self.actions.lock().unwrap().push(action);
        self.calls_at_actions
            .lock()
            .unwrap()
            .push(self.status_calls.load(Ordering::SeqCst));
        if self.follow_actions {
            let next = match action {
                PowerAction::Off => "off",
                PowerAction::On | PowerAction::Reboot => "running",
            };
            *self.fallback.lock().unwrap() = next.to_string();
        }
        Ok(ActionAck::default())
    }
}

/// 测试用配置：轮询只查询一次，重启不等待
pub fn test_config() -> Config {
    let vars = [
        ("PROVIDER_API_TOKEN", "test-token"),
        ("PROVIDER_SERVER_ID", "42"),
        ("DATABASE_URL", "sqlite::memory:"),
        ("JWT_SECRET", "test-secret"),
        ("BCRYPT_COST", "4"),
        ("POLL_INTERVAL_SECS", "1"),
        ("POWER_TIMEOUT_SECS", "1"),
        ("REBOOT_GRACE_SECS", "0"),
        ("METRICS_SEED", "1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Config::from_source(Config::env_from_map(vars)).unwrap()
}

/// 内存数据库 + 假云服务商组成的应用状态
pub async fn test_state(cloud: Arc<FakeCloud>) -> AppState {
    let config = test_config();

    let sea_db = db::establish_connection(&config.database_url).await.unwrap();
    db::init_schema(&sea_db).await.unwrap();

    let metrics = Arc::new(MetricsSource::from_kind(config.metrics_source, config.metrics_seed));
    let vps = VpsController::new(cloud, "42", config.lifecycle_timings(), metrics.clone());
    let fleet = FleetService::new(vps, metrics);

    AppState::new(sea_db, config, fleet)
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// 发送一次请求，返回状态码与 JSON 响应体（非 JSON 响应体作为字符串返回）
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, value)
}

/// 注册并登录一个测试用户，返回 Authorization 头的值
pub async fn login_token(app: &Router) -> String {
    let credentials = serde_json::json!({ "email": "ops@example.com", "password": "hunter2" });

    let (status, _) = call(app, Method::POST, "/api/auth/register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(app, Method::POST, "/api/auth/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    bearer(body["token"].as_str().unwrap())
}
