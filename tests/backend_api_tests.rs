//! 后端 API 集成测试
//!
//! 使用内存 CRM 启动真实的 HTTP 服务器，通过 reqwest 调用

mod common;

use std::sync::Arc;

use crm_proxy::{AppState, MemoryCrm};
use serde_json::{json, Value};

use common::{record, spawn_app, spawn_with};

const MISSING_ID: &str = "001000000000000AAA";

async fn seeded_crm() -> (Arc<MemoryCrm>, String) {
    let crm = Arc::new(MemoryCrm::new());
    let account_id = crm
        .seed(
            "Account",
            record(json!({"Name": "Acme", "Industry": "Energy", "CreatedDate": "2024-01-01T00:00:00.000+0000"})),
        )
        .await;
    crm.seed(
        "Contact",
        record(json!({"FirstName": "Ada", "LastName": "Lovelace", "AccountId": account_id})),
    )
    .await;
    crm.seed("Contact", record(json!({"LastName": "Orphan"})))
        .await;
    (crm, account_id)
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;

    let response = reqwest::get(format!("{}/api/health", base)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connected"], true);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_reports_disconnected_crm() {
    let base = spawn_with(Arc::new(MemoryCrm::new().disconnected())).await;

    let body: Value = reqwest::get(format!("{}/api/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connected"], false);

    // 未连接时记录接口返回 500
    let response = reqwest::get(format!("{}/api/Account", base)).await.unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Not connected"));
}

#[tokio::test]
async fn test_record_lifecycle() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;
    let client = reqwest::Client::new();

    // 创建
    let response = client
        .post(format!("{}/api/Account", base))
        .json(&json!({"Name": "Globex", "Phone": "555-0100", "Website": "globex.example"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let created: Value = response.json().await.unwrap();
    assert_eq!(created["success"], true);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 18);

    // 列表
    let listed: Value = client
        .get(format!("{}/api/Account", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["success"], true);
    let records = listed["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Name"], "Globex");
    // 列表只返回目录中配置的字段
    assert_eq!(records[0]["Industry"], Value::Null);
    assert!(records[0].get("Website").is_none());

    // 更新
    let response = client
        .patch(format!("{}/api/Account/{}", base, id))
        .json(&json!({"Id": id, "Name": "Globex Corp", "CreatedDate": "ignored"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["success"], true);
    assert_eq!(updated["id"], id.as_str());

    // 读取
    let fetched: Value = client
        .get(format!("{}/api/Account/{}", base, id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["success"], true);
    assert_eq!(fetched["record"]["Name"], "Globex Corp");
    assert_eq!(fetched["record"]["Phone"], "555-0100");
    assert_eq!(fetched["record"]["Website"], "globex.example");
    assert_ne!(fetched["record"]["CreatedDate"], "ignored");

    // 删除
    let response = client
        .delete(format!("{}/api/Account/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client
        .get(format!("{}/api/Account/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_create_rejected_by_crm() {
    let crm = MemoryCrm::new().with_required_fields("Lead", &["LastName", "Company"]);
    let base = spawn_with(Arc::new(crm)).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/Lead", base))
        .json(&json!({"LastName": "Doe"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["errorCode"], "REQUIRED_FIELD_MISSING");
    assert_eq!(body["errors"][0]["fields"], json!(["Company"]));
    assert!(body["error"].as_str().unwrap().contains("Company"));
}

#[tokio::test]
async fn test_list_with_filter() {
    let (crm, account_id) = seeded_crm().await;
    let base = spawn_with(crm).await;

    let body: Value = reqwest::get(format!(
        "{}/api/Contact?filterField=AccountId&filterValue={}",
        base, account_id
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();

    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["LastName"], "Lovelace");

    let all: Value = reqwest::get(format!("{}/api/Contact", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_requires_both_filter_params() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;

    let response = reqwest::get(format!("{}/api/Contact?filterField=AccountId", base))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_list_respects_configured_limit() {
    let crm = Arc::new(MemoryCrm::new());
    for i in 0..5 {
        crm.seed("Case", record(json!({"Subject": format!("case {}", i)})))
            .await;
    }
    let base = spawn_app(AppState::new(crm).with_list_limit(2)).await;

    let body: Value = reqwest::get(format!("{}/api/Case", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_identifiers_rejected() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/Bad-Object", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .get(format!("{}/api/Account/123", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .get(format!(
            "{}/api/Contact?filterField=Name%20OR%20Id&filterValue=x",
            base
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_non_object_body_rejected() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/Account", base))
        .json(&json!(["Name", "Acme"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("JSON object"));
}

#[tokio::test]
async fn test_update_and_delete_unknown_record() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;
    let client = reqwest::Client::new();

    let response = client
        .patch(format!("{}/api/Account/{}", base, MISSING_ID))
        .json(&json!({"Name": "x"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{}/api/Account/{}", base, MISSING_ID))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_unsupported_object_surfaces_crm_errors() {
    let base = spawn_with(Arc::new(MemoryCrm::new().without_object("Widget__c"))).await;

    let response = reqwest::get(format!("{}/api/Widget__c", base)).await.unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"][0]["errorCode"], "NOT_FOUND");
}

#[tokio::test]
async fn test_related_records_endpoint() {
    let (crm, account_id) = seeded_crm().await;
    let base = spawn_with(crm).await;

    let response = reqwest::get(format!("{}/api/Account/{}/related", base, account_id))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["record"]["Name"], "Acme");

    let related = body["related"].as_array().unwrap();
    let labels: Vec<&str> = related.iter().map(|g| g["label"].as_str().unwrap()).collect();
    assert_eq!(labels, vec!["Contacts", "Opportunities", "Cases", "Contracts"]);
    assert_eq!(related[0]["records"].as_array().unwrap().len(), 1);
    assert!(related[0].get("error").is_none());
}

#[tokio::test]
async fn test_related_records_unknown_parent() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;

    let response = reqwest::get(format!("{}/api/Account/{}/related", base, MISSING_ID))
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_dashboard_endpoint() {
    let (crm, _) = seeded_crm().await;
    let base = spawn_with(crm).await;

    let body: Value = reqwest::get(format!("{}/api/dashboard", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["counts"]["Account"], 1);
    assert_eq!(body["counts"]["Contact"], 2);
    assert_eq!(body["counts"]["Lead"], 0);

    let activity = body["recentActivity"].as_array().unwrap();
    assert_eq!(activity.len(), 3);
    // 种子账户的日期最早，排在最后
    assert_eq!(activity[2]["type"], "Account");
    assert_eq!(activity[2]["name"], "Acme");
}

#[tokio::test]
async fn test_chat_endpoint() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/chat", base))
        .json(&json!({
            "message": "Create a new lead",
            "conversationHistory": [{"id": 1, "text": "Hello!", "sender": "bot"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["reply"].as_str().unwrap().contains("Leads"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_chat_requires_message() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Message is required");
}

#[tokio::test]
async fn test_cors_is_permissive() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/health", base))
        .header("Origin", "http://localhost:5173")
        .send()
        .await
        .unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn test_malformed_json_body_gets_json_error() {
    let base = spawn_with(Arc::new(MemoryCrm::new())).await;
    let client = reqwest::Client::new();

    for path in ["/api/chat", "/api/Account"] {
        let response = client
            .post(format!("{}{}", base, path))
            .header("Content-Type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "{}", path);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("JSON"));
    }

    // 字段类型不对同样返回 JSON 错误
    let response = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"message": 42}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
}
