//! CRM 管理后台代理
//!
//! 提供管理后台所需的后端能力：
//! - 通用记录增删改查（转发给远端 CRM）
//! - 关联记录查询和首页汇总
//! - 基于关键词的聊天助手
//!
//! # 架构分层
//!
//! - `core`: 核心层，记录模型、对象目录和 CRM 抽象
//! - `infrastructure`: 基础设施层，Salesforce 客户端和 Web 服务

pub mod config;
pub mod core;
pub mod errors;
pub mod infrastructure;
pub mod logger;

pub use crate::config::{AppConfig, BackendKind};
pub use crate::core::catalog::{ObjectCatalog, Relationship};
pub use crate::core::crm::{CrmClient, ListQuery, MemoryCrm, SaveResult};
pub use crate::core::record::Record;
pub use crate::errors::{ApiErrorDetail, CrmError, Result};
pub use crate::infrastructure::salesforce::{SalesforceClient, SalesforceConfig, Session};
pub use crate::infrastructure::web::{create_router, start_web_server, AppState};

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
