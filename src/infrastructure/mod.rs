//! 基础设施层：外部系统交互
//!
//! 提供远端 CRM 客户端和 HTTP 服务

pub mod salesforce;
pub mod web;
