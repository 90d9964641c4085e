//! 核心层：记录模型和通用能力
//!
//! 包含记录清理与校验、对象目录、CRM 抽象、关联查询和聊天助手

pub mod catalog;
pub mod chat;
pub mod crm;
pub mod record;
pub mod related;
