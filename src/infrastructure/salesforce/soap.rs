//! SOAP 登录
//!
//! 用户名 + 密码（拼接安全令牌）换取会话 ID，
//! 实例地址取自返回的 serverUrl

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{CrmError, Result};

/// 登录凭据
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: String,
}

impl Credentials {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        security_token: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            security_token: security_token.into(),
        }
    }

    /// 远端要求的密码形式：密码后直接拼接安全令牌
    pub fn login_password(&self) -> String {
        format!("{}{}", self.password, self.security_token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("security_token", &"***")
            .finish()
    }
}

/// 登录返回的会话信息
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResult {
    pub session_id: String,
    pub server_url: String,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
}

/// SOAP 登录地址
pub fn login_endpoint(login_url: &str, api_version: &str) -> String {
    format!(
        "{}/services/Soap/u/{}",
        login_url.trim_end_matches('/'),
        api_version
    )
}

/// 构造登录请求体
pub fn login_envelope(credentials: &Credentials) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8" ?>"#,
            r#"<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" "#,
            r#"xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">"#,
            r#"<env:Body><n1:login xmlns:n1="urn:partner.soap.sforce.com">"#,
            "<n1:username>{}</n1:username><n1:password>{}</n1:password>",
            "</n1:login></env:Body></env:Envelope>"
        ),
        xml_escape(&credentials.username),
        xml_escape(&credentials.login_password()),
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(?:[A-Za-z0-9_]+:)?([A-Za-z]+)>([^<]*)</(?:[A-Za-z0-9_]+:)?[A-Za-z]+>")
            .expect("valid soap tag regex")
    })
}

fn first_tag(body: &str, name: &str) -> Option<String> {
    tag_re()
        .captures_iter(body)
        .find(|c| &c[1] == name)
        .map(|c| xml_unescape(c[2].trim()))
        .filter(|s| !s.is_empty())
}

/// 解析登录响应，SOAP fault 转为登录错误
pub fn parse_login_response(body: &str) -> Result<LoginResult> {
    if let Some(fault) = first_tag(body, "faultstring") {
        return Err(CrmError::LoginError(fault));
    }

    let session_id = first_tag(body, "sessionId")
        .ok_or_else(|| CrmError::LoginError("response has no sessionId".to_string()))?;
    let server_url = first_tag(body, "serverUrl")
        .ok_or_else(|| CrmError::LoginError("response has no serverUrl".to_string()))?;

    Ok(LoginResult {
        session_id,
        server_url,
        user_id: first_tag(body, "userId"),
        organization_id: first_tag(body, "organizationId"),
    })
}

/// 从 serverUrl 取出实例地址（scheme + host + port）
pub fn instance_url(server_url: &str) -> Result<String> {
    let url = url::Url::parse(server_url)
        .map_err(|e| CrmError::LoginError(format!("invalid serverUrl {}: {}", server_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| CrmError::LoginError(format!("serverUrl has no host: {}", server_url)))?;

    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
