//! 对象目录
//!
//! 记录每个对象列表页默认查询的字段、对象之间的关联关系，
//! 以及首页汇总所统计的对象。可通过 YAML 文件整体或部分覆盖。

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::record::validate_identifier;
use crate::errors::Result;

/// 未在目录中登记的对象使用的字段
pub const FALLBACK_FIELDS: &[&str] = &["Id", "Name", "CreatedDate"];

/// 一条关联关系
///
/// `single = false`：`object` 是子对象，按 `object.field = 当前记录 Id` 过滤；
/// `single = true`：`object` 是父对象，其 Id 取自当前记录的 `field` 字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub object: String,
    pub field: String,
    pub label: String,
    #[serde(default)]
    pub single: bool,
}

impl Relationship {
    /// 子对象列表关系
    pub fn children(object: &str, field: &str, label: &str) -> Self {
        Self {
            object: object.to_string(),
            field: field.to_string(),
            label: label.to_string(),
            single: false,
        }
    }

    /// 父对象关系
    pub fn parent(object: &str, field: &str, label: &str) -> Self {
        Self {
            single: true,
            ..Self::children(object, field, label)
        }
    }
}

/// 对象目录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectCatalog {
    /// 对象名 -> 列表字段
    pub fields: HashMap<String, Vec<String>>,
    /// 对象名 -> 关联关系
    pub relationships: HashMap<String, Vec<Relationship>>,
    /// 首页汇总统计的对象
    pub dashboard: Vec<String>,
}

impl Default for ObjectCatalog {
    fn default() -> Self {
        let fields = [
            ("Account", "Id, Name, Industry, Phone, CreatedDate"),
            ("Contact", "Id, FirstName, LastName, Email, Phone, CreatedDate"),
            ("Lead", "Id, FirstName, LastName, Company, Email, Status, CreatedDate"),
            ("Case", "Id, Subject, Status, Priority, CreatedDate"),
            ("Opportunity", "Id, Name, StageName, Amount, CloseDate, CreatedDate"),
            (
                "Contract",
                "Id, AccountId, Status, StartDate, ContractTerm, OwnerExpirationNotice, CreatedDate",
            ),
        ]
        .into_iter()
        .map(|(object, list)| (object.to_string(), split_fields(list)))
        .collect();

        let mut relationships = HashMap::new();
        relationships.insert(
            "Account".to_string(),
            vec![
                Relationship::children("Contact", "AccountId", "Contacts"),
                Relationship::children("Opportunity", "AccountId", "Opportunities"),
                Relationship::children("Case", "AccountId", "Cases"),
                Relationship::children("Contract", "AccountId", "Contracts"),
            ],
        );
        relationships.insert(
            "Contact".to_string(),
            vec![
                Relationship::parent("Account", "AccountId", "Account"),
                Relationship::children("Case", "ContactId", "Cases"),
                Relationship::children("Opportunity", "ContactId", "Opportunities"),
            ],
        );

        Self {
            fields,
            relationships,
            dashboard: ["Account", "Contact", "Lead", "Case", "Opportunity", "Contract"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn split_fields(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ObjectCatalog {
    /// 从 YAML 文件加载，缺失的部分使用内置默认值
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// 从 YAML 字符串加载
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct Overrides {
            fields: Option<HashMap<String, Vec<String>>>,
            relationships: Option<HashMap<String, Vec<Relationship>>>,
            dashboard: Option<Vec<String>>,
        }

        let overrides: Overrides = serde_yaml::from_str(content)?;
        let mut catalog = Self::default();
        if let Some(fields) = overrides.fields {
            catalog.fields = fields;
        }
        if let Some(relationships) = overrides.relationships {
            catalog.relationships = relationships;
        }
        if let Some(dashboard) = overrides.dashboard {
            catalog.dashboard = dashboard;
        }

        catalog.validate()?;
        Ok(catalog)
    }

    /// 所有对象名和字段名都必须是合法标识符
    pub fn validate(&self) -> Result<()> {
        for (object, fields) in &self.fields {
            validate_identifier("object", object)?;
            for field in fields {
                validate_identifier("field", field)?;
            }
        }
        for (object, relations) in &self.relationships {
            validate_identifier("object", object)?;
            for rel in relations {
                validate_identifier("object", &rel.object)?;
                validate_identifier("field", &rel.field)?;
            }
        }
        for object in &self.dashboard {
            validate_identifier("object", object)?;
        }
        Ok(())
    }

    /// 对象列表页查询的字段
    pub fn list_fields(&self, object: &str) -> Vec<String> {
        match self.fields.get(object) {
            Some(fields) if !fields.is_empty() => fields.clone(),
            _ => FALLBACK_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 对象的关联关系（未配置时为空）
    pub fn relationships_of(&self, object: &str) -> &[Relationship] {
        self.relationships
            .get(object)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
