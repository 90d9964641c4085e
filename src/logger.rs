//! 日志模块 - 提供结构化日志、耗时统计和敏感信息脱敏
//!
//! 特性：
//! - 支持人类可读、紧凑和 JSON 三种格式
//! - 对外部调用自动记录耗时
//! - 会话令牌、用户名在写入日志前脱敏

use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 未设置 `RUST_LOG` 时的默认过滤
pub const DEFAULT_FILTER: &str = "crm_proxy=info,tower_http=info,warn";

/// 日志格式类型
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// 人类可读格式（带颜色）
    Pretty,
    /// 紧凑单行格式
    Compact,
    /// JSON 结构化格式（适合日志收集系统）
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("unknown log format: {}", s)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志格式
    pub format: LogFormat,
    /// 是否启用颜色（仅 Pretty 格式有效）
    pub enable_color: bool,
    /// 是否显示目标模块
    pub show_target: bool,
    /// 是否显示文件名和行号
    pub show_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            enable_color: true,
            show_target: true,
            show_file: false,
        }
    }
}

impl LogConfig {
    pub fn with_format(format: LogFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }
}

/// 初始化日志系统
///
/// # 环境变量
/// - `RUST_LOG`: 日志级别过滤（如 `info`, `debug`, `crm_proxy=trace`）
pub fn init(config: LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_ansi(config.enable_color);
            subscriber.with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(config.show_target)
                .with_file(config.show_file)
                .with_line_number(config.show_file)
                .with_current_span(true)
                .with_span_list(true);
            subscriber.with(fmt_layer).init();
        }
    }
}

/// 性能计时器 - 离开作用域时记录执行时间
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    /// 创建新的计时器
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }

    /// 计时器名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            target: "metrics",
            operation = %self.name,
            elapsed_ms = %format!("{:.2}", elapsed_ms),
            "operation completed"
        );
    }
}

/// 敏感信息脱敏工具
pub struct Sanitizer;

impl Sanitizer {
    /// 脱敏会话令牌 - 只保留前 6 位和后 4 位
    pub fn token(token: &str) -> String {
        let chars: Vec<char> = token.chars().collect();
        if chars.len() <= 16 {
            return "***".to_string();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }

    /// 脱敏用户名 - 保留首字母和邮箱域名
    pub fn username(username: &str) -> String {
        match username.split_once('@') {
            Some((local, domain)) => match local.chars().next() {
                Some(first) => format!("{}***@{}", first, domain),
                None => format!("***@{}", domain),
            },
            None => match username.chars().next() {
                Some(first) => format!("{}***", first),
                None => "***".to_string(),
            },
        }
    }
}
