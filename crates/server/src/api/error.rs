/// API 错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use panel_provider::PollError;
use serde::Serialize;
use serde_json::json;

use crate::services::fleet_service::FleetError;
use crate::services::vps_service::{LifecycleError, PowerState};

#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
    /// 电源操作失败，附带结构化细节
    Power {
        status: StatusCode,
        message: String,
        details: serde_json::Value,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
            ApiError::Power {
                status,
                message,
                details,
            } => (status, message, Some(details)),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<panel_common::Error> for ApiError {
    fn from(err: panel_common::Error) -> Self {
        use panel_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::AlreadyExists(msg) => ApiError::Conflict(msg),
            Error::InvalidArgument(msg) => ApiError::BadRequest(msg),
            Error::Authentication(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::NotFound(_) => ApiError::NotFound(err.to_string()),
            FleetError::InvalidTarget(msg) => ApiError::BadRequest(msg),
            FleetError::Lifecycle(e) => e.into(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let message = err.to_string();
        let mut details = json!({ "action": err.action() });

        if let LifecycleError::RebootFailed { stage, .. } = &err {
            details["stage"] = json!(stage);
        }

        let status = match err.root() {
            LifecycleError::ActionRejected { source, .. } => {
                details["upstream_status"] = json!(source.upstream_status());
                StatusCode::BAD_GATEWAY
            }
            LifecycleError::PowerOperationFailed { source, .. } => {
                // 操作可能已生效，只是没等到确认
                details["state"] = json!(PowerState::Unknown);
                details["desired"] = json!(source.desired());
                details["elapsed_ms"] = json!(source.elapsed().as_millis() as u64);
                if let PollError::Cancelled { .. } = source {
                    details["cancelled"] = json!(true);
                }
                StatusCode::GATEWAY_TIMEOUT
            }
            LifecycleError::RebootFailed { .. } => StatusCode::BAD_GATEWAY,
        };

        ApiError::Power {
            status,
            message,
            details,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}
