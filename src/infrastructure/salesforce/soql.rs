//! SOQL 拼装
//!
//! 对象名和字段名在进入这里之前都经过标识符校验，
//! 过滤值作为字符串字面量转义后拼入

use crate::core::catalog::FALLBACK_FIELDS;
use crate::core::crm::{ListQuery, ORDER_FIELD};
use crate::errors::Result;

/// 转义 SOQL 字符串字面量中的特殊字符
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

/// 把列表查询转换为 SOQL
pub fn list_query(query: &ListQuery) -> Result<String> {
    query.validate()?;

    let fields = if query.fields.is_empty() {
        FALLBACK_FIELDS.join(", ")
    } else {
        query.fields.join(", ")
    };

    let mut soql = format!("SELECT {} FROM {}", fields, query.object);
    if let Some(filter) = &query.filter {
        soql.push_str(&format!(
            " WHERE {} = '{}'",
            filter.field,
            escape_literal(&filter.value)
        ));
    }
    soql.push_str(&format!(" ORDER BY {} DESC LIMIT {}", ORDER_FIELD, query.limit));
    Ok(soql)
}
