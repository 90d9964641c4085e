//! CRM 接口定义
//!
//! Web 层只依赖这里的 `CrmClient` 抽象，远端 Salesforce 实现和
//! 内存实现都在其后

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::record::{validate_identifier, Record};
use crate::errors::{ApiErrorDetail, Result};

pub mod memory;

pub use memory::MemoryCrm;

/// 列表默认返回条数
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// 列表排序字段（始终倒序）
pub const ORDER_FIELD: &str = "CreatedDate";

/// 等值过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// 列表查询
///
/// 固定按 `CreatedDate` 倒序，只支持一个等值过滤
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub object: String,
    pub fields: Vec<String>,
    pub filter: Option<FieldFilter>,
    pub limit: usize,
}

impl ListQuery {
    /// 创建新的查询
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            fields: Vec::new(),
            filter: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }

    /// 设置查询字段
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// 设置等值过滤
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// 设置返回数量限制
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = n;
        self
    }

    /// 校验对象名和所有字段名
    pub fn validate(&self) -> Result<()> {
        validate_identifier("object", &self.object)?;
        for field in &self.fields {
            validate_identifier("field", field)?;
        }
        if let Some(filter) = &self.filter {
            validate_identifier("field", &filter.field)?;
        }
        Ok(())
    }
}

/// 创建记录的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResult {
    #[serde(default)]
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

impl SaveResult {
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            success: true,
            errors: Vec::new(),
        }
    }

    pub fn rejected(errors: Vec<ApiErrorDetail>) -> Self {
        Self {
            id: None,
            success: false,
            errors,
        }
    }
}

/// CRM 客户端接口
///
/// 每个操作都是一次请求-响应，没有共享的可变状态需要协调
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// 建立会话
    async fn connect(&self) -> Result<()>;

    /// 当前是否持有会话
    async fn is_connected(&self) -> bool;

    /// 创建记录
    ///
    /// 校验失败时返回 `success = false` 的结果，而不是错误
    async fn create(&self, object: &str, record: Record) -> Result<SaveResult>;

    /// 按 ID 读取记录
    async fn retrieve(&self, object: &str, id: &str) -> Result<Record>;

    /// 更新记录
    async fn update(&self, object: &str, id: &str, record: Record) -> Result<()>;

    /// 删除记录
    async fn destroy(&self, object: &str, id: &str) -> Result<()>;

    /// 列表查询
    async fn query(&self, query: ListQuery) -> Result<Vec<Record>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_builder() {
        let query = ListQuery::new("Contact")
            .fields(["Id", "LastName"])
            .filter("AccountId", "001000000000001AAA")
            .limit(5);

        assert_eq!(query.object, "Contact");
        assert_eq!(query.fields, vec!["Id".to_string(), "LastName".to_string()]);
        assert_eq!(
            query.filter,
            Some(FieldFilter {
                field: "AccountId".to_string(),
                value: "001000000000001AAA".to_string(),
            })
        );
        assert_eq!(query.limit, 5);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_list_query_defaults() {
        let query = ListQuery::new("Account");
        assert!(query.fields.is_empty());
        assert!(query.filter.is_none());
        assert_eq!(query.limit, DEFAULT_LIST_LIMIT);
    }

    #[test]
    fn test_list_query_rejects_injected_filter_field() {
        let query = ListQuery::new("Account").filter("Name = 'x' OR Id", "y");
        assert!(query.validate().is_err());
    }

    #[test]
    fn test_save_result_decoding() {
        let ok: SaveResult =
            serde_json::from_str(r#"{"id":"001000000000001AAA","success":true,"errors":[]}"#)
                .unwrap();
        assert_eq!(ok, SaveResult::created("001000000000001AAA"));
    }
}
