//! 记录模型
//!
//! 记录的字段完全由 CRM 端的对象定义决定，这里只负责写入前的清理、
//! 展示名推导和标识符校验

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::errors::{CrmError, Result};

/// 一条 CRM 记录
pub type Record = Map<String, Value>;

/// CRM 不接受写入的系统字段
pub const READ_ONLY_FIELDS: &[&str] = &[
    "Id",
    "CreatedDate",
    "CreatedById",
    "LastModifiedDate",
    "LastModifiedById",
    "SystemModstamp",
    "IsDeleted",
];

/// 查询结果中附带的元数据块
pub const ATTRIBUTES_FIELD: &str = "attributes";

const MAX_IDENTIFIER_LEN: usize = 80;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

fn record_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9]{15}|[A-Za-z0-9]{18})$").expect("valid record id regex")
    })
}

/// 去掉只读字段和元数据，得到可以提交给 create/update 的记录
pub fn sanitize_for_write(record: Record) -> Record {
    record
        .into_iter()
        .filter(|(key, _)| key != ATTRIBUTES_FIELD && !READ_ONLY_FIELDS.contains(&key.as_str()))
        .collect()
}

/// 记录的展示名：Name，其次 FirstName LastName，再次 Subject，最后 Id
pub fn display_name(record: &Record) -> String {
    let text = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(name) = text("Name") {
        return name;
    }

    let full_name = [text("FirstName"), text("LastName")]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    if !full_name.is_empty() {
        return full_name;
    }

    text("Subject").or_else(|| text("Id")).unwrap_or_default()
}

/// 读取字符串字段
pub fn field_str<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// 校验对象名或字段名（允许 `Invoice__c` 这类自定义对象）
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.len() > MAX_IDENTIFIER_LEN || !identifier_re().is_match(name) {
        return Err(CrmError::ValidationError(format!(
            "Invalid {} name: {}",
            kind, name
        )));
    }
    Ok(())
}

/// 校验记录 ID（15 或 18 位字母数字）
pub fn validate_record_id(id: &str) -> Result<()> {
    if !record_id_re().is_match(id) {
        return Err(CrmError::ValidationError(format!("Invalid record id: {}", id)));
    }
    Ok(())
}

/// 把请求体转换为记录，非 JSON 对象时报错
pub fn into_record(body: Value) -> Result<Record> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(CrmError::ValidationError(format!(
            "Request body must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
