//! 关联记录与首页汇总
//!
//! 关联记录是一次“客户端 join”：每个关联关系单独发一次查询，
//! 互不依赖，也不做缓存和分页

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::catalog::{ObjectCatalog, Relationship};
use crate::core::crm::{CrmClient, ListQuery, ORDER_FIELD};
use crate::core::record::{display_name, field_str, Record};
use crate::errors::Result;

/// 首页最近动态条数
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

/// 每个对象取几条进入最近动态
pub const ACTIVITY_PER_OBJECT: usize = 3;

/// 单个关联关系的查询结果
#[derive(Debug, Clone, Serialize)]
pub struct RelatedGroup {
    pub object: String,
    pub field: String,
    pub label: String,
    pub single: bool,
    /// 子对象列表（`single = false`）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Record>>,
    /// 父对象（`single = true`），没有关联时为 null
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
    /// 该关联查询失败时的错误信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelatedGroup {
    fn empty(rel: &Relationship) -> Self {
        Self {
            object: rel.object.clone(),
            field: rel.field.clone(),
            label: rel.label.clone(),
            single: rel.single,
            records: None,
            record: None,
            error: None,
        }
    }
}

/// 某条记录及其所有关联记录
#[derive(Debug, Clone, Serialize)]
pub struct RelatedRecords {
    pub record: Record,
    pub related: Vec<RelatedGroup>,
}

/// 读取记录并逐个关联关系查询
///
/// 主记录读取失败时整体失败；单个关联失败只体现在该组的 `error` 上
pub async fn load_related(
    crm: &dyn CrmClient,
    catalog: &ObjectCatalog,
    object: &str,
    id: &str,
    limit: usize,
) -> Result<RelatedRecords> {
    let record = crm.retrieve(object, id).await?;

    let lookups = catalog
        .relationships_of(object)
        .iter()
        .map(|rel| fetch_group(crm, catalog, rel, &record, id, limit));
    let related = join_all(lookups).await;

    Ok(RelatedRecords { record, related })
}

async fn fetch_group(
    crm: &dyn CrmClient,
    catalog: &ObjectCatalog,
    rel: &Relationship,
    record: &Record,
    id: &str,
    limit: usize,
) -> RelatedGroup {
    let mut group = RelatedGroup::empty(rel);

    if rel.single {
        group.record = Some(Value::Null);
        let Some(parent_id) = field_str(record, &rel.field) else {
            return group;
        };
        debug!("Fetching parent {} {}", rel.object, parent_id);
        match crm.retrieve(&rel.object, parent_id).await {
            Ok(parent) => group.record = Some(Value::Object(parent)),
            Err(e) => {
                warn!("Failed to fetch related {} {}: {}", rel.object, parent_id, e);
                group.error = Some(e.to_string());
            }
        }
        return group;
    }

    debug!("Fetching related {} where {} = {}", rel.object, rel.field, id);
    let query = ListQuery::new(rel.object.as_str())
        .fields(catalog.list_fields(&rel.object))
        .filter(rel.field.as_str(), id)
        .limit(limit);
    match crm.query(query).await {
        Ok(records) => group.records = Some(records),
        Err(e) => {
            warn!("Failed to fetch related {} records: {}", rel.object, e);
            group.records = Some(Vec::new());
            group.error = Some(e.to_string());
        }
    }
    group
}

/// 最近动态条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    #[serde(rename = "type")]
    pub object: String,
    pub name: String,
    pub date: Option<String>,
    pub id: Option<String>,
}

/// 首页汇总
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// 对象名 -> 列表条数
    pub counts: BTreeMap<String, usize>,
    #[serde(rename = "recentActivity")]
    pub recent_activity: Vec<Activity>,
}

/// 并发拉取首页统计的所有对象列表
///
/// 加载失败的对象不计入统计
pub async fn load_dashboard(
    crm: &dyn CrmClient,
    catalog: &ObjectCatalog,
    limit: usize,
) -> DashboardSummary {
    let loads = catalog.dashboard.iter().map(|object| async move {
        let query = ListQuery::new(object.as_str())
            .fields(catalog.list_fields(object))
            .limit(limit);
        (object, crm.query(query).await)
    });

    let mut counts = BTreeMap::new();
    let mut activities = Vec::new();
    for (object, result) in join_all(loads).await {
        match result {
            Ok(records) => {
                counts.insert(object.clone(), records.len());
                activities.extend(records.iter().take(ACTIVITY_PER_OBJECT).map(|r| Activity {
                    object: object.clone(),
                    name: display_name(r),
                    date: field_str(r, ORDER_FIELD).map(str::to_string),
                    id: field_str(r, "Id").map(str::to_string),
                }));
            }
            Err(e) => warn!("Skipping {} on dashboard: {}", object, e),
        }
    }

    // 没有日期的排在最后
    activities.sort_by(|a, b| b.date.cmp(&a.date));
    activities.truncate(RECENT_ACTIVITY_LIMIT);

    DashboardSummary {
        counts,
        recent_activity: activities,
    }
}
