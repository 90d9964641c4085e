//! 配置管理
//!
//! 命令行参数优先，其次环境变量（启动时会先加载 `.env`）

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::core::catalog::ObjectCatalog;
use crate::infrastructure::salesforce::{
    Credentials, SalesforceConfig, DEFAULT_API_VERSION, DEFAULT_LOGIN_URL, DEFAULT_TIMEOUT_SECS,
};
use crate::logger::LogFormat;

/// CRM 后端类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackendKind {
    /// 远端 Salesforce
    Salesforce,
    /// 内存实现（离线演示）
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "salesforce" => Ok(BackendKind::Salesforce),
            "memory" => Ok(BackendKind::Memory),
            _ => Err(format!("Unknown CRM backend: {}", s)),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Salesforce => write!(f, "salesforce"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "REST proxy for the CRM admin console")]
pub struct AppConfig {
    /// 监听地址
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// 监听端口
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// CRM 后端: salesforce, memory
    #[arg(long, env = "CRM_BACKEND", default_value = "salesforce")]
    pub backend: BackendKind,

    // Salesforce 配置
    /// 登录地址（沙箱使用 https://test.salesforce.com）
    #[arg(long, env = "SF_INSTANCE_URL", default_value = DEFAULT_LOGIN_URL)]
    pub login_url: String,

    #[arg(long, env = "SF_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "SF_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    #[arg(long, env = "SF_SECURITY_TOKEN", default_value = "", hide_env_values = true)]
    pub security_token: String,

    #[arg(long, env = "SF_API_VERSION", default_value = DEFAULT_API_VERSION)]
    pub api_version: String,

    /// 单次 CRM 请求超时（秒）
    #[arg(long, env = "SF_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// 列表接口返回条数
    #[arg(long, env = "LIST_LIMIT", default_value_t = 10)]
    pub list_limit: usize,

    /// 对象目录 YAML 文件（覆盖内置的字段和关联配置）
    #[arg(long, env = "CATALOG_FILE")]
    pub catalog_file: Option<String>,

    /// 日志格式: pretty, compact, json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.list_limit == 0 {
            anyhow::bail!("LIST_LIMIT must be greater than zero");
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("SF_TIMEOUT_SECS must be greater than zero");
        }

        if self.backend == BackendKind::Salesforce {
            url::Url::parse(&self.login_url)
                .map_err(|e| anyhow::anyhow!("SF_INSTANCE_URL is not a valid URL: {}", e))?;
            if self.username.as_deref().unwrap_or_default().is_empty() {
                anyhow::bail!("SF_USERNAME is required for the salesforce backend");
            }
        }

        Ok(())
    }

    /// 监听的 socket 地址
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid bind address {}:{}: {}", self.host, self.port, e))
    }

    /// Salesforce 客户端配置
    pub fn salesforce_config(&self) -> SalesforceConfig {
        let config = SalesforceConfig::new(self.login_url.clone(), self.api_version.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        match self.username.as_ref().filter(|u| !u.is_empty()) {
            Some(username) => config.with_credentials(Credentials::new(
                username.clone(),
                self.password.clone(),
                self.security_token.clone(),
            )),
            None => config,
        }
    }

    /// 加载对象目录
    pub fn catalog(&self) -> anyhow::Result<ObjectCatalog> {
        match &self.catalog_file {
            Some(path) => ObjectCatalog::from_yaml_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load catalog {}: {}", path, e)),
            None => Ok(ObjectCatalog::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("salesforce".parse::<BackendKind>().unwrap(), BackendKind::Salesforce);
        assert_eq!("Memory".parse::<BackendKind>().unwrap(), BackendKind::Memory);
        assert!("sqlite".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::parse_from(["test"]);

        assert_eq!(config.port, 3001);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.backend, BackendKind::Salesforce);
        assert_eq!(config.login_url, "https://login.salesforce.com");
        assert_eq!(config.api_version, "59.0");
        assert_eq!(config.list_limit, 10);
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_config_custom_values() {
        let config = AppConfig::parse_from([
            "test",
            "--port",
            "8080",
            "--backend",
            "memory",
            "--list-limit",
            "25",
            "--log-format",
            "json",
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(config.backend, BackendKind::Memory);
        assert_eq!(config.list_limit, 25);
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_salesforce_requires_username() {
        let config = AppConfig::parse_from(["test", "--backend", "salesforce"]);
        assert!(config.validate().is_err());

        let config = AppConfig::parse_from([
            "test",
            "--username",
            "ops@acme.com",
            "--password",
            "pw",
            "--security-token",
            "TOKEN",
        ]);
        assert!(config.validate().is_ok());

        let sf = config.salesforce_config();
        assert_eq!(sf.timeout, Duration::from_secs(30));
        assert_eq!(sf.credentials.unwrap().login_password(), "pwTOKEN");
    }

    #[test]
    fn test_zero_list_limit_rejected() {
        let config = AppConfig::parse_from(["test", "--backend", "memory", "--list-limit", "0"]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_login_url_rejected() {
        let config = AppConfig::parse_from([
            "test",
            "--username",
            "ops@acme.com",
            "--login-url",
            "not a url",
        ]);
        assert!(config.validate().is_err());
    }
}
