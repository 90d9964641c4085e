//! 内存 CRM 实现
//!
//! 数据仅在内存中，重启后丢失。用于测试和离线演示模式，
//! 过滤、排序、条数限制和字段投影的行为与远端接口保持一致

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{CrmClient, ListQuery, SaveResult, ORDER_FIELD};
use crate::core::record::{sanitize_for_write, validate_identifier, Record, ATTRIBUTES_FIELD};
use crate::errors::{ApiErrorDetail, CrmError, Result};

/// 内存 CRM
pub struct MemoryCrm {
    records: RwLock<HashMap<String, Vec<Record>>>,
    required: HashMap<String, Vec<String>>,
    unsupported: HashSet<String>,
    connected: AtomicBool,
}

impl MemoryCrm {
    /// 创建新的内存 CRM（已连接）
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            required: HashMap::new(),
            unsupported: HashSet::new(),
            connected: AtomicBool::new(true),
        }
    }

    /// 创建时要求对象必须带上这些字段
    pub fn with_required_fields(mut self, object: &str, fields: &[&str]) -> Self {
        self.required.insert(
            object.to_string(),
            fields.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    /// 把对象标记为不存在，对它的所有操作都会被拒绝
    pub fn without_object(mut self, object: &str) -> Self {
        self.unsupported.insert(object.to_string());
        self
    }

    /// 以未连接状态创建，`connect()` 之后才可用
    pub fn disconnected(self) -> Self {
        self.connected.store(false, Ordering::SeqCst);
        self
    }

    /// 直接写入一条记录（保留传入的 CreatedDate），返回 ID
    pub async fn seed(&self, object: &str, mut record: Record) -> String {
        let id = new_record_id(object);
        record.insert("Id".to_string(), Value::String(id.clone()));
        record
            .entry(ORDER_FIELD.to_string())
            .or_insert_with(|| Value::String(now_timestamp()));

        let mut records = self.records.write().await;
        records.entry(object.to_string()).or_default().push(record);
        id
    }

    /// 对象当前的记录数
    pub async fn count(&self, object: &str) -> usize {
        let records = self.records.read().await;
        records.get(object).map(Vec::len).unwrap_or(0)
    }

    fn check(&self, object: &str) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(CrmError::NotConnected);
        }
        validate_identifier("object", object)?;
        if self.unsupported.contains(object) {
            return Err(CrmError::ApiError {
                status: 400,
                errors: vec![ApiErrorDetail::new(
                    "NOT_FOUND",
                    format!("The requested resource does not exist: sObject type '{}' is not supported.", object),
                )],
            });
        }
        Ok(())
    }
}

impl Default for MemoryCrm {
    fn default() -> Self {
        Self::new()
    }
}

/// 远端同款的时间格式，例如 `2024-05-01T08:30:00.000+0000`
fn now_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}

/// 生成 18 位 ID：3 位对象前缀 + 15 位随机字符
fn new_record_id(object: &str) -> String {
    let prefix = match object {
        "Account" => "001",
        "Contact" => "003",
        "Opportunity" => "006",
        "Lead" => "00Q",
        "Case" => "500",
        "Contract" => "800",
        _ => "a00",
    };
    let random = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}{}", prefix, &random[..15])
}

fn not_found(object: &str, id: &str) -> CrmError {
    CrmError::NotFound(format!("{} {}", object, id))
}

fn field_equals(value: Option<&Value>, expected: &str) -> bool {
    match value {
        Some(Value::String(s)) => s == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

/// 15 位 ID 与 18 位 ID 的前 15 位指向同一条记录
fn id_matches(record: &Record, id: &str) -> bool {
    let Some(stored) = record.get("Id").and_then(Value::as_str) else {
        return false;
    };
    match id.len() {
        15 => stored.get(..15) == Some(id),
        _ => stored == id,
    }
}

fn created_date(record: &Record) -> &str {
    record
        .get(ORDER_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn with_attributes(object: &str, record: &Record) -> Record {
    let mut out = Record::new();
    out.insert(ATTRIBUTES_FIELD.to_string(), json!({ "type": object }));
    out.extend(record.iter().map(|(k, v)| (k.clone(), v.clone())));
    out
}

#[async_trait]
impl CrmClient for MemoryCrm {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn create(&self, object: &str, record: Record) -> Result<SaveResult> {
        self.check(object)?;
        let record = sanitize_for_write(record);

        if let Some(required) = self.required.get(object) {
            let missing: Vec<String> = required
                .iter()
                .filter(|f| matches!(record.get(f.as_str()), None | Some(Value::Null)))
                .cloned()
                .collect();
            if !missing.is_empty() {
                let mut detail = ApiErrorDetail::new(
                    "REQUIRED_FIELD_MISSING",
                    format!("Required fields are missing: [{}]", missing.join(", ")),
                );
                detail.fields = missing;
                return Ok(SaveResult::rejected(vec![detail]));
            }
        }

        let id = self.seed(object, record).await;
        Ok(SaveResult::created(id))
    }

    async fn retrieve(&self, object: &str, id: &str) -> Result<Record> {
        self.check(object)?;
        let records = self.records.read().await;
        records
            .get(object)
            .and_then(|list| list.iter().find(|r| id_matches(r, id)))
            .map(|r| with_attributes(object, r))
            .ok_or_else(|| not_found(object, id))
    }

    async fn update(&self, object: &str, id: &str, record: Record) -> Result<()> {
        self.check(object)?;
        let mut records = self.records.write().await;
        let existing = records
            .get_mut(object)
            .and_then(|list| list.iter_mut().find(|r| id_matches(r, id)))
            .ok_or_else(|| not_found(object, id))?;

        existing.extend(sanitize_for_write(record));
        existing.insert(
            "LastModifiedDate".to_string(),
            Value::String(now_timestamp()),
        );
        Ok(())
    }

    async fn destroy(&self, object: &str, id: &str) -> Result<()> {
        self.check(object)?;
        let mut records = self.records.write().await;
        let list = records.get_mut(object).ok_or_else(|| not_found(object, id))?;
        let before = list.len();
        list.retain(|r| !id_matches(r, id));
        if list.len() == before {
            return Err(not_found(object, id));
        }
        Ok(())
    }

    async fn query(&self, query: ListQuery) -> Result<Vec<Record>> {
        query.validate()?;
        self.check(&query.object)?;
        let records = self.records.read().await;
        let Some(list) = records.get(&query.object) else {
            return Ok(Vec::new());
        };

        // 先按插入倒序，再稳定排序，同一时间戳时新记录在前
        let mut selected: Vec<&Record> = list
            .iter()
            .rev()
            .filter(|r| match &query.filter {
                Some(f) => field_equals(r.get(&f.field), &f.value),
                None => true,
            })
            .collect();
        selected.sort_by(|a, b| created_date(b).cmp(created_date(a)));

        let projected = selected
            .into_iter()
            .take(query.limit)
            .map(|r| {
                if query.fields.is_empty() {
                    return with_attributes(&query.object, r);
                }
                let mut out = Record::new();
                out.insert(ATTRIBUTES_FIELD.to_string(), json!({ "type": query.object }));
                for field in &query.fields {
                    out.insert(field.clone(), r.get(field).cloned().unwrap_or(Value::Null));
                }
                out
            })
            .collect();

        Ok(projected)
    }
}
