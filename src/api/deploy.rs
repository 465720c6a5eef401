//! 部署 API
//!
//! POST /api/deployment/deploy

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use crate::config::env::constants::DEPLOY_SUCCESS_MESSAGE;
use crate::domain::deploy::DeploymentRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 创建部署路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/deployment/deploy", post(deploy))
}

/// 触发部署
///
/// POST /api/deployment/deploy
///
/// 同步等待整个流水线结束；步骤失败不影响 200 响应
async fn deploy(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeploymentRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    state.deployer.deploy(&request).await?;

    Ok((StatusCode::OK, DEPLOY_SUCCESS_MESSAGE))
}
