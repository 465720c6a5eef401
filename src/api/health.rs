//! 健康检查 API
//!
//! GET /health

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::config::env::constants::{SERVICE_NAME, VERSION};
use crate::domain::deploy::FailurePolicy;
use crate::domain::workspace::CleanupPolicy;
use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    timestamp: String,
    started_at: String,
    workspace_root: String,
    failure_policy: FailurePolicy,
    cleanup_policy: CleanupPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    step_timeout_secs: Option<u64>,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// 健康检查
///
/// GET /health
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let deployer = &state.deployer;

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: VERSION,
        timestamp: chrono::Utc::now().to_rfc3339(),
        started_at: state.started_at.to_rfc3339(),
        workspace_root: deployer.provisioner().root().display().to_string(),
        failure_policy: deployer.pipeline().failure_policy(),
        cleanup_policy: deployer.cleanup_policy(),
        step_timeout_secs: deployer.pipeline().step_timeout().map(|t| t.as_secs()),
    })
}
