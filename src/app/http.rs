// ==========================================
// 产线排产系统 - HTTP 路由
// ==========================================
// 职责: JSON 请求 → PlanningApi → 统一响应信封
// 约定: SQLite 访问为阻塞操作, 一律放入 spawn_blocking
// ==========================================

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::api::{success_envelope, ApiError, ApiResult, PlanningApi};
use crate::app::state::AppState;

// ==========================================
// 响应
// ==========================================

/// 统一响应: 成功 200 + error_code 0; 失败按错误类型映射状态码
struct Envelope(ApiResult<Value>);

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        match self.0 {
            Ok(body) => (StatusCode::OK, Json(body)).into_response(),
            Err(err) => {
                let status = StatusCode::from_u16(err.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_client_error() {
                    tracing::info!(code = err.code(), error = %err, "请求被拒绝");
                }
                (status, Json(err.to_envelope())).into_response()
            }
        }
    }
}

/// 在阻塞线程池执行 API 调用
async fn run_blocking<T, F>(state: Arc<AppState>, f: F) -> Envelope
where
    T: Serialize + Send + 'static,
    F: FnOnce(&PlanningApi) -> ApiResult<T> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || f(&state.planning_api)).await;
    let result = match joined {
        Ok(result) => result.map(|payload| success_envelope(&payload)),
        Err(e) => Err(ApiError::InternalError(format!("后台任务失败: {}", e))),
    };
    Envelope(result)
}

/// 解析请求体; 空体视为 {}
fn parse_body(bytes: &Bytes) -> ApiResult<Value> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::field("body", format!("JSON 解析失败: {}", e)))
}

// ==========================================
// Router
// ==========================================

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/planning/data", post(query_grid))
        .route("/api/planning/save", post(save_cell))
        .route("/api/planning/summary", post(save_summary))
        .route("/api/planning/calculate-hours", post(calculate_hours))
        .route("/api/planning/daily-check", post(daily_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ==========================================
// Entry point
// ==========================================

pub async fn run_serve(state: Arc<AppState>, bind: &str) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = bind.parse()?;
    tracing::info!("line-planning-aps listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("line-planning-aps shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("无法监听 Ctrl+C 信号: {}", e);
        std::future::pending::<()>().await;
    }
}

// ==========================================
// Handlers
// ==========================================

async fn health() -> Envelope {
    Envelope(Ok(serde_json::json!({
        "error_code": 0,
        "version": crate::VERSION,
    })))
}

async fn query_grid(State(state): State<Arc<AppState>>, body: Bytes) -> Envelope {
    match parse_body(&body) {
        Ok(body) => run_blocking(state, move |api| api.query_grid(&body)).await,
        Err(e) => Envelope(Err(e)),
    }
}

async fn save_cell(State(state): State<Arc<AppState>>, body: Bytes) -> Envelope {
    match parse_body(&body) {
        Ok(body) => run_blocking(state, move |api| api.save_cell(&body)).await,
        Err(e) => Envelope(Err(e)),
    }
}

async fn save_summary(State(state): State<Arc<AppState>>, body: Bytes) -> Envelope {
    match parse_body(&body) {
        Ok(body) => run_blocking(state, move |api| api.save_summary(&body)).await,
        Err(e) => Envelope(Err(e)),
    }
}

async fn calculate_hours(State(state): State<Arc<AppState>>, body: Bytes) -> Envelope {
    match parse_body(&body) {
        Ok(body) => run_blocking(state, move |api| api.calculate_hours(&body)).await,
        Err(e) => Envelope(Err(e)),
    }
}

async fn daily_check(State(state): State<Arc<AppState>>) -> Envelope {
    run_blocking(state, |api| api.daily_check()).await
}
