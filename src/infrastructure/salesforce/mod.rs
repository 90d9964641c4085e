//! Salesforce 客户端
//!
//! 通过 SOAP 登录取得会话，之后所有记录操作都走 REST 接口。
//! 会话失效（401）时重新登录并重放一次请求，除此之外不做任何重试。

pub mod soap;
pub mod soql;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::core::crm::{CrmClient, ListQuery, SaveResult};
use crate::core::record::{sanitize_for_write, validate_identifier, validate_record_id, Record};
use crate::errors::{ApiErrorDetail, CrmError, Result};
use crate::logger::{Sanitizer, Timer};

pub use soap::Credentials;

/// 默认登录地址
pub const DEFAULT_LOGIN_URL: &str = "https://login.salesforce.com";

/// 默认 API 版本
pub const DEFAULT_API_VERSION: &str = "59.0";

/// 单次请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct SalesforceConfig {
    pub login_url: String,
    pub api_version: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
}

impl SalesforceConfig {
    pub fn new(login_url: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self {
            login_url: login_url.into(),
            api_version: api_version.into(),
            credentials: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_URL, DEFAULT_API_VERSION)
    }
}

/// 已建立的会话
#[derive(Clone, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub instance_url: String,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            user_id: None,
            organization_id: None,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &Sanitizer::token(&self.access_token))
            .field("instance_url", &self.instance_url)
            .field("user_id", &self.user_id)
            .field("organization_id", &self.organization_id)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    records: Vec<Record>,
}

/// Salesforce 客户端
pub struct SalesforceClient {
    config: SalesforceConfig,
    http: reqwest::Client,
    session: RwLock<Option<Session>>,
}

impl SalesforceClient {
    /// 创建客户端，首次使用时才登录
    pub fn new(config: SalesforceConfig) -> Self {
        Self {
            http: http_client(&config),
            config,
            session: RwLock::new(None),
        }
    }

    /// 使用现成的会话创建客户端
    pub fn with_session(config: SalesforceConfig, session: Session) -> Self {
        Self {
            http: http_client(&config),
            config,
            session: RwLock::new(Some(session)),
        }
    }

    /// 当前会话的副本
    pub async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    /// 登录并保存会话
    pub async fn login(&self) -> Result<Session> {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            CrmError::ConfigError("no CRM credentials configured".to_string())
        })?;
        let _timer = Timer::new("salesforce.login");

        let endpoint = soap::login_endpoint(&self.config.login_url, &self.config.api_version);
        debug!(
            "Logging in to {} as {}",
            endpoint,
            Sanitizer::username(&credentials.username)
        );

        let body = self
            .http
            .post(&endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(soap::login_envelope(credentials))
            .send()
            .await?
            .text()
            .await?;

        // 登录失败时返回 500 + SOAP fault，这里统一按响应体解析
        let result = soap::parse_login_response(&body)?;
        let session = Session {
            access_token: result.session_id,
            instance_url: soap::instance_url(&result.server_url)?,
            user_id: result.user_id,
            organization_id: result.organization_id,
        };

        info!(
            "Logged in to {} (org {}, token {})",
            session.instance_url,
            session.organization_id.as_deref().unwrap_or("unknown"),
            Sanitizer::token(&session.access_token)
        );
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    /// 取得会话，没有时尝试登录
    async fn ensure_session(&self) -> Result<Session> {
        if let Some(session) = self.session.read().await.clone() {
            return Ok(session);
        }
        if self.config.credentials.is_none() {
            return Err(CrmError::NotConnected);
        }
        self.login().await
    }

    fn data_url(&self, session: &Session, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            session.instance_url, self.config.api_version, path
        )
    }

    /// 发送请求；会话失效时重新登录并重放一次
    async fn send<F>(&self, op: &str, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client, &Session, String) -> RequestBuilder,
    {
        let _timer = Timer::new(format!("salesforce.{}", op));
        let session = self.ensure_session().await?;
        let token = format!("Bearer {}", session.access_token);
        let response = build(&self.http, &session, token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED || self.config.credentials.is_none() {
            return Ok(response);
        }

        warn!("Session rejected during {}, logging in again", op);
        *self.session.write().await = None;
        let session = self.login().await?;
        let token = format!("Bearer {}", session.access_token);
        Ok(build(&self.http, &session, token).send().await?)
    }

    fn sobject_path(object: &str, id: Option<&str>) -> Result<String> {
        validate_identifier("object", object)?;
        match id {
            Some(id) => {
                validate_record_id(id)?;
                Ok(format!("sobjects/{}/{}", object, id))
            }
            None => Ok(format!("sobjects/{}", object)),
        }
    }
}

fn http_client(config: &SalesforceConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .expect("Failed to create HTTP client")
}

/// 把失败响应转换为错误
async fn error_from_response(response: Response, what: &str) -> CrmError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let errors = decode_errors(&text);

    if status == StatusCode::NOT_FOUND {
        return CrmError::NotFound(
            errors
                .first()
                .map(|e| format!("{} ({})", what, e.message))
                .unwrap_or_else(|| what.to_string()),
        );
    }
    if status == StatusCode::UNAUTHORIZED {
        return CrmError::NotConnected;
    }
    CrmError::ApiError {
        status: status.as_u16(),
        errors,
    }
}

/// 远端错误体通常是数组，偶尔是单个对象或纯文本
fn decode_errors(text: &str) -> Vec<ApiErrorDetail> {
    if let Ok(list) = serde_json::from_str::<Vec<ApiErrorDetail>>(text) {
        return list;
    }
    if let Ok(single) = serde_json::from_str::<ApiErrorDetail>(text) {
        return vec![single];
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![ApiErrorDetail::new("UNKNOWN_ERROR", trimmed)]
    }
}

#[async_trait]
impl CrmClient for SalesforceClient {
    async fn connect(&self) -> Result<()> {
        self.login().await.map(|_| ())
    }

    async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn create(&self, object: &str, record: Record) -> Result<SaveResult> {
        let path = Self::sobject_path(object, None)?;
        let body = sanitize_for_write(record);
        let response = self
            .send("create", |http, session, token| {
                http.post(self.data_url(session, &path))
                    .header(AUTHORIZATION, token)
                    .json(&body)
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<SaveResult>().await?);
        }
        if status == StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            return Ok(SaveResult::rejected(decode_errors(&text)));
        }
        Err(error_from_response(response, object).await)
    }

    async fn retrieve(&self, object: &str, id: &str) -> Result<Record> {
        let path = Self::sobject_path(object, Some(id))?;
        let response = self
            .send("retrieve", |http, session, token| {
                http.get(self.data_url(session, &path))
                    .header(AUTHORIZATION, token)
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &format!("{} {}", object, id)).await);
        }
        Ok(response.json::<Record>().await?)
    }

    async fn update(&self, object: &str, id: &str, record: Record) -> Result<()> {
        let path = Self::sobject_path(object, Some(id))?;
        let body = sanitize_for_write(record);
        let response = self
            .send("update", |http, session, token| {
                http.patch(self.data_url(session, &path))
                    .header(AUTHORIZATION, token)
                    .json(&body)
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &format!("{} {}", object, id)).await);
        }
        Ok(())
    }

    async fn destroy(&self, object: &str, id: &str) -> Result<()> {
        let path = Self::sobject_path(object, Some(id))?;
        let response = self
            .send("destroy", |http, session, token| {
                http.delete(self.data_url(session, &path))
                    .header(AUTHORIZATION, token)
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &format!("{} {}", object, id)).await);
        }
        Ok(())
    }

    async fn query(&self, query: ListQuery) -> Result<Vec<Record>> {
        let soql = soql::list_query(&query)?;
        debug!("SOQL: {}", soql);
        let response = self
            .send("query", |http, session, token| {
                http.get(self.data_url(session, "query"))
                    .query(&[("q", soql.as_str())])
                    .header(AUTHORIZATION, token)
            })
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &query.object).await);
        }
        let body: QueryResponse = response.json().await?;
        Ok(body.records)
    }
}
