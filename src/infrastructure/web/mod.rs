//! Web 服务器模块
//!
//! 对外提供通用的记录增删改查接口、关联记录、首页汇总和聊天接口，
//! 所有记录操作都转发给 `CrmClient`

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::core::catalog::ObjectCatalog;
use crate::core::chat::{self, ChatRequest};
use crate::core::crm::{CrmClient, ListQuery, DEFAULT_LIST_LIMIT};
use crate::core::record::{into_record, validate_identifier, validate_record_id};
use crate::core::related::{load_dashboard, load_related};
use crate::errors::CrmError;

// ==================== 状态 ====================

#[derive(Clone)]
pub struct AppState {
    pub crm: Arc<dyn CrmClient>,
    pub catalog: Arc<ObjectCatalog>,
    pub list_limit: usize,
}

impl AppState {
    pub fn new(crm: Arc<dyn CrmClient>) -> Self {
        Self {
            crm,
            catalog: Arc::new(ObjectCatalog::default()),
            list_limit: DEFAULT_LIST_LIMIT,
        }
    }

    pub fn with_catalog(mut self, catalog: ObjectCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit;
        self
    }
}

// ==================== 错误响应 ====================

impl IntoResponse for CrmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if !self.details().is_empty() {
            body["errors"] = json!(self.details());
        }

        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, CrmError>;

// ==================== 请求类型 ====================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(rename = "filterField")]
    pub filter_field: Option<String>,
    #[serde(rename = "filterValue")]
    pub filter_value: Option<String>,
}

/// 请求体解析失败时也返回统一的 JSON 错误
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, CrmError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| CrmError::ValidationError(rejection.body_text()))
}

fn check_target(object: &str, id: Option<&str>) -> Result<(), CrmError> {
    validate_identifier("object", object)?;
    if let Some(id) = id {
        validate_record_id(id)?;
    }
    Ok(())
}

// ==================== 处理器 ====================

/// 健康检查
async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "connected": state.crm.is_connected().await,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 聊天助手
async fn chat_reply(
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, CrmError> {
    let req = json_body(payload)?;
    if req.message.trim().is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": "Message is required",
            })),
        )
            .into_response());
    }

    let reply = chat::reply_to(&req.message);
    info!(
        "Chat message matched {} ({} history entries)",
        reply.rule.unwrap_or("fallback"),
        req.conversation_history.len()
    );

    Ok(Json(json!({
        "success": true,
        "reply": reply.text,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

/// 首页汇总
async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult {
    let summary = load_dashboard(state.crm.as_ref(), &state.catalog, state.list_limit).await;
    Ok(Json(json!({
        "success": true,
        "counts": summary.counts,
        "recentActivity": summary.recent_activity,
    })))
}

/// 最近创建的记录，可按字段等值过滤
async fn list_records(
    State(state): State<Arc<AppState>>,
    Path(object): Path<String>,
    Query(params): Query<ListParams>,
) -> ApiResult {
    check_target(&object, None)?;

    let mut query = ListQuery::new(object.as_str())
        .fields(state.catalog.list_fields(&object))
        .limit(state.list_limit);
    match (params.filter_field, params.filter_value) {
        (Some(field), Some(value)) => query = query.filter(field, value),
        (None, None) => {}
        _ => {
            return Err(CrmError::ValidationError(
                "filterField and filterValue must be provided together".to_string(),
            ))
        }
    }

    let records = state.crm.query(query).await?;
    Ok(Json(json!({
        "success": true,
        "records": records,
    })))
}

/// 创建记录
async fn create_record(
    State(state): State<Arc<AppState>>,
    Path(object): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, CrmError> {
    check_target(&object, None)?;
    let record = into_record(json_body(payload)?)?;

    let result = state.crm.create(&object, record).await?;
    if result.success {
        info!("Created {} {}", object, result.id.as_deref().unwrap_or("?"));
        return Ok(Json(json!({
            "success": true,
            "id": result.id,
        }))
        .into_response());
    }

    warn!("{} create rejected: {:?}", object, result.errors);
    let message = result
        .errors
        .first()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| format!("Failed to create {}", object));
    Ok((
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": message,
            "errors": result.errors,
        })),
    )
        .into_response())
}

/// 按 ID 读取记录
async fn get_record(
    State(state): State<Arc<AppState>>,
    Path((object, id)): Path<(String, String)>,
) -> ApiResult {
    check_target(&object, Some(&id))?;
    let record = state.crm.retrieve(&object, &id).await?;
    Ok(Json(json!({
        "success": true,
        "record": record,
    })))
}

/// 更新记录
async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((object, id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    check_target(&object, Some(&id))?;
    let record = into_record(json_body(payload)?)?;
    state.crm.update(&object, &id, record).await?;
    info!("Updated {} {}", object, id);
    Ok(Json(json!({
        "success": true,
        "id": id,
    })))
}

/// 删除记录
async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path((object, id)): Path<(String, String)>,
) -> ApiResult {
    check_target(&object, Some(&id))?;
    state.crm.destroy(&object, &id).await?;
    info!("Deleted {} {}", object, id);
    Ok(Json(json!({
        "success": true,
        "id": id,
    })))
}

/// 记录及其关联记录
async fn related_records(
    State(state): State<Arc<AppState>>,
    Path((object, id)): Path<(String, String)>,
) -> ApiResult {
    check_target(&object, Some(&id))?;
    let related = load_related(
        state.crm.as_ref(),
        &state.catalog,
        &object,
        &id,
        state.list_limit,
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "record": related.record,
        "related": related.related,
    })))
}

// ==================== 路由 ====================

pub fn create_router(state: Arc<AppState>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chat", post(chat_reply))
        .route("/api/dashboard", get(dashboard))
        .route("/api/{object}", get(list_records).post(create_record))
        .route(
            "/api/{object}/{id}",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .route("/api/{object}/{id}/related", get(related_records))
        .layer(middleware)
        .with_state(state)
}

// ==================== 服务器启动 ====================

pub async fn start_web_server(bind_addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("🚀 Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
