//! 测试通用工具
//!
//! 提供测试服务器启动和记录构造等辅助函数

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use crm_proxy::{create_router, AppState, CrmClient, Record};
use serde_json::Value;

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn setup() {
    INIT.call_once(|| {
        // 设置测试日志
        let _ = tracing_subscriber::fmt()
            .with_env_filter("crm_proxy=debug")
            .try_init();
    });
}

/// 在随机端口启动测试服务器，返回 `http://addr` 形式的基地址
pub async fn spawn_app(state: AppState) -> String {
    setup();
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// 用任意 CRM 实现启动测试服务器
pub async fn spawn_with(crm: Arc<dyn CrmClient>) -> String {
    spawn_app(AppState::new(crm)).await
}

/// 从 JSON 构造记录
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record fixture must be an object, got {}", other),
    }
}
