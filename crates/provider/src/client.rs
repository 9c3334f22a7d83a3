/// 云服务商 HTTP 客户端
/// 
/// 对 Hetzner Cloud 风格的接口做一层薄封装：查询服务器状态、发送电源操作。

use async_trait::async_trait;
use panel_common::PowerAction;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::ProviderError;

pub const DEFAULT_API_URL: &str = "https://api.hetzner.cloud/v1";

/// 云服务商控制接口
///
/// 轮询器与生命周期控制器只依赖这个 trait，测试中可以替换为脚本化实现。
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// 查询服务器原始状态
    async fn get_raw_status(&self, server_id: &str) -> Result<RawServerStatus, ProviderError>;

    /// 发送电源操作
    async fn send_action(
        &self,
        server_id: &str,
        action: PowerAction,
    ) -> Result<ActionAck, ProviderError>;
}

/// 服务器原始状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawServerStatus {
    /// 云服务商原生状态，如 `running`、`off`、`starting`
    pub status: String,
    /// 公网 IPv4
    pub ip: Option<String>,
}

/// 电源操作回执
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionAck {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// 云服务商连接配置
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_token: String,
    pub server_id: String,
    pub http_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(api_token: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: api_token.into(),
            server_id: server_id.into(),
            http_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// 校验必填项，缺失时直接失败，不发出注定被拒绝的请求
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.api_token.trim().is_empty() {
            return Err(ProviderError::Configuration("PROVIDER_API_TOKEN 未设置".to_string()));
        }
        if self.server_id.trim().is_empty() {
            return Err(ProviderError::Configuration("PROVIDER_SERVER_ID 未设置".to_string()));
        }
        if self.api_url.trim().is_empty() {
            return Err(ProviderError::Configuration("PROVIDER_API_URL 为空".to_string()));
        }
        Ok(())
    }
}

/// Hetzner Cloud 客户端
pub struct HetznerClient {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    server_id: String,
}

impl HetznerClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token,
            server_id: config.server_id,
        })
    }

    /// 配置中的目标服务器 ID
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    fn action_path(action: PowerAction) -> &'static str {
        match action {
            PowerAction::On => "poweron",
            PowerAction::Off => "poweroff",
            PowerAction::Reboot => "reboot",
        }
    }

    /// 非 2xx 响应转换为 ProviderError::Api，保留上游响应体
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CloudApi for HetznerClient {
    async fn get_raw_status(&self, server_id: &str) -> Result<RawServerStatus, ProviderError> {
        let url = format!("{}/servers/{}", self.api_url, server_id);

        let result = async {
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.api_token)
                .send()
                .await?;
            let response = Self::check_status(response).await?;
            let envelope: ServerEnvelope = response.json().await?;
            Ok::<_, ProviderError>(envelope)
        }
        .await;

        match result {
            Ok(envelope) => {
                let ip = envelope
                    .server
                    .public_net
                    .and_then(|net| net.ipv4)
                    .map(|ipv4| ipv4.ip);
                debug!("服务器 {} 原始状态: {}", server_id, envelope.server.status);
                Ok(RawServerStatus {
                    status: envelope.server.status,
                    ip,
                })
            }
            Err(e) => {
                error!("查询服务器 {} 状态失败: {}", server_id, e);
                Err(e)
            }
        }
    }

    async fn send_action(
        &self,
        server_id: &str,
        action: PowerAction,
    ) -> Result<ActionAck, ProviderError> {
        let url = format!(
            "{}/servers/{}/actions/{}",
            self.api_url,
            server_id,
            Self::action_path(action)
        );

        let result = async {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_token)
                .json(&serde_json::json!({}))
                .send()
                .await?;
            let response = Self::check_status(response).await?;
            let envelope: ActionEnvelope = response.json().await?;
            Ok::<_, ProviderError>(envelope.action.unwrap_or_default())
        }
        .await;

        match result {
            Ok(ack) => {
                info!("📤 已向服务器 {} 发送电源操作 {}: {:?}", server_id, action, ack);
                Ok(ack)
            }
            Err(e) => {
                error!("向服务器 {} 发送电源操作 {} 失败: {}", server_id, action, e);
                Err(e)
            }
        }
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ServerEnvelope {
    server: ApiServer,
}

#[derive(Debug, Deserialize)]
struct ApiServer {
    status: String,
    #[serde(default)]
    public_net: Option<ApiPublicNet>,
}

#[derive(Debug, Deserialize)]
struct ApiPublicNet {
    #[serde(default)]
    ipv4: Option<ApiIpv4>,
}

#[derive(Debug, Deserialize)]
struct ApiIpv4 {
    ip: String,
}

#[derive(Debug, Default, Deserialize)]
struct ActionEnvelope {
    #[serde(default)]
    action: Option<ActionAck>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::{HeaderMap as AxumHeaders, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    const TOKEN: &str = "test-token";

    #[derive(Clone, Default)]
    struct StubState {
        requests: Arc<Mutex<Vec<String>>>,
    }

    fn authorized(headers: &AxumHeaders) -> bool {
        let auth_ok = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == format!("Bearer {}", TOKEN))
            .unwrap_or(false);
        let json_ok = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);
        auth_ok && json_ok
    }

    async fn get_server(
        State(state): State<StubState>,
        Path(id): Path<String>,
        headers: AxumHeaders,
    ) -> impl IntoResponse {
        state.requests.lock().unwrap().push(format!("GET {}", id));
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"code": "unauthorized"}})));
        }
        match id.as_str() {
            "42" => (
                StatusCode::OK,
                Json(json!({
                    "server": {
                        "id": 42,
                        "status": "running",
                        "public_net": { "ipv4": { "ip": "203.0.113.7" } }
                    }
                })),
            ),
            "43" => (
                StatusCode::OK,
                Json(json!({ "server": { "id": 43, "status": "off", "public_net": { "ipv4": null } } })),
            ),
            _ => (StatusCode::NOT_FOUND, Json(json!({"error": {"code": "not_found"}}))),
        }
    }

    async fn post_action(
        State(state): State<StubState>,
        Path((id, action)): Path<(String, String)>,
        headers: AxumHeaders,
    ) -> impl IntoResponse {
        state.requests.lock().unwrap().push(format!("POST {} {}", id, action));
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": {"code": "unauthorized"}})));
        }
        (
            StatusCode::CREATED,
            Json(json!({ "action": { "id": 7, "command": action, "status": "running" } })),
        )
    }

    async fn spawn_stub() -> (String, StubState) {
        let state = StubState::default();
        let app = Router::new()
            .route("/servers/:id", get(get_server))
            .route("/servers/:id/actions/:action", post(post_action))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), state)
    }

    fn client_for(url: &str, token: &str) -> HetznerClient {
        HetznerClient::new(ProviderConfig::new(token, "42").with_api_url(url)).unwrap()
    }

    #[tokio::test]
    async fn test_get_raw_status() {
        let (url, state) = spawn_stub().await;
        let client = client_for(&url, TOKEN);

        let raw = client.get_raw_status("42").await.unwrap();
        assert_eq!(raw.status, "running");
        assert_eq!(raw.ip.as_deref(), Some("203.0.113.7"));

        let raw = client.get_raw_status("43").await.unwrap();
        assert_eq!(raw.status, "off");
        assert_eq!(raw.ip, None);

        assert_eq!(state.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_send_action_paths() {
        let (url, state) = spawn_stub().await;
        let client = client_for(&url, TOKEN);

        let ack = client.send_action("42", PowerAction::On).await.unwrap();
        assert_eq!(ack.id, Some(7));
        assert_eq!(ack.command.as_deref(), Some("poweron"));

        client.send_action("42", PowerAction::Off).await.unwrap();
        client.send_action("42", PowerAction::Reboot).await.unwrap();

        let requests = state.requests.lock().unwrap().clone();
        assert_eq!(
            requests,
            vec!["POST 42 poweron", "POST 42 poweroff", "POST 42 reboot"]
        );
    }

    #[tokio::test]
    async fn test_non_success_keeps_upstream_body() {
        let (url, _state) = spawn_stub().await;

        let client = client_for(&url, "wrong-token");
        match client.get_raw_status("42").await {
            Err(ProviderError::Api { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("unauthorized"));
            }
            other => panic!("期望 Api 错误, 实际: {:?}", other),
        }

        let client = client_for(&url, TOKEN);
        let err = client.get_raw_status("999").await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(404));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        // 绑定后立即释放端口，保证连接被拒绝
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(&format!("http://{}", addr), TOKEN);
        let err = client.send_action("42", PowerAction::On).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }

    #[test]
    fn test_missing_configuration_fails_fast() {
        let err = HetznerClient::new(ProviderConfig::new("", "42")).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));

        let err = HetznerClient::new(ProviderConfig::new(TOKEN, "  ")).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
