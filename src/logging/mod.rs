//! 应用日志门面。
//!
//! 处理器通过 [`Logger`] 记录日志，[`Logger`] 携带请求级绑定信息（服务、上下文、用户），
//! 并把 [`LogRecord`] 交给进程启动时选定的 [`LogSink`]。

mod forwarding;
mod tracing_sink;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::config::{Config, LogSinkKind};
use crate::models::Session;

pub use forwarding::ForwardingSink;
pub use tracing_sink::TracingSink;

pub type LogContext = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Fatal => "fatal",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLogLevel(s.to_string()))
    }
}

/// 覆盖日志绑定信息，未设置的字段使用工厂默认值
#[derive(Debug, Clone, Default)]
pub struct LoggerConfig {
    pub service: Option<String>,
    pub environment: Option<String>,
    pub context: Option<String>,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogBindings {
    pub service: String,
    pub environment: String,
    pub context: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    pub fields: LogContext,
    pub bindings: Arc<LogBindings>,
    pub timestamp: DateTime<Utc>,
}

/// 日志记录的输出目标，启动时确定
pub trait LogSink: Send + Sync {
    fn emit(&self, record: &LogRecord);
}

#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn LogSink>,
    bindings: Arc<LogBindings>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("bindings", &self.bindings).finish()
    }
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>, bindings: LogBindings) -> Self {
        Self {
            sink,
            bindings: Arc::new(bindings),
        }
    }

    pub fn bindings(&self) -> &LogBindings {
        &self.bindings
    }

    pub fn log(&self, level: LogLevel, message: &str, fields: LogContext) {
        self.sink.emit(&LogRecord {
            level,
            message: message.to_string(),
            fields,
            bindings: Arc::clone(&self.bindings),
            timestamp: Utc::now(),
        });
    }

    pub fn debug(&self, message: &str, fields: LogContext) {
        self.log(LogLevel::Debug, message, fields);
    }

    pub fn info(&self, message: &str, fields: LogContext) {
        self.log(LogLevel::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: LogContext) {
        self.log(LogLevel::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: LogContext) {
        self.log(LogLevel::Error, message, fields);
    }

    pub fn fatal(&self, message: &str, fields: LogContext) {
        self.log(LogLevel::Fatal, message, fields);
    }
}

/// 创建共用同一输出目标的日志器，由 `AppState` 持有
#[derive(Clone)]
pub struct LoggerFactory {
    sink: Arc<dyn LogSink>,
    service: String,
    environment: String,
}

impl LoggerFactory {
    pub fn new(sink: Arc<dyn LogSink>, service: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            sink,
            service: service.into(),
            environment: environment.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let sink: Arc<dyn LogSink> = match &config.log_sink {
            LogSinkKind::Server => Arc::new(TracingSink),
            LogSinkKind::Forwarding { url } => Arc::new(ForwardingSink::new(url.clone())),
        };
        Self::new(sink, config.service_name.clone(), config.environment.clone())
    }

    pub fn create_logger(&self, config: LoggerConfig) -> Logger {
        Logger::new(
            Arc::clone(&self.sink),
            LogBindings {
                service: config.service.unwrap_or_else(|| self.service.clone()),
                environment: config.environment.unwrap_or_else(|| self.environment.clone()),
                context: config.context.unwrap_or_else(|| "app".into()),
                user_id: config.user_id.unwrap_or_else(|| "anonymous".into()),
                user_email: config.user_email,
                request_id: None,
            },
        )
    }

    /// 单个请求的日志器，附带调用者身份
    pub fn get_logger(&self, context: &str, session: Option<&Session>) -> Logger {
        let mut logger = self.create_logger(LoggerConfig {
            context: Some(context.to_string()),
            user_id: session.map(|s| s.user_id.clone()),
            user_email: session.and_then(|s| s.email.clone()),
            ..LoggerConfig::default()
        });
        Arc::make_mut(&mut logger.bindings).request_id = Some(Uuid::new_v4().to_string());
        logger
    }
}

/// 把 `error` 字段改名为 `err`；已有 `err` 时保持不变
pub fn normalize_error_field(fields: &mut LogContext) {
    if fields.contains_key("err") {
        return;
    }
    if let Some(error) = fields.remove("error") {
        fields.insert("err".into(), error);
    }
}

/// 错误及其来源链的 JSON 表示
pub fn error_context(err: &(dyn std::error::Error + 'static)) -> Value {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    json!({
        "message": err.to_string(),
        "chain": chain,
    })
}

/// 把 `json!` 对象转为日志字段，其他值放在 `value` 下
pub fn fields(value: Value) -> LogContext {
    match value {
        Value::Object(map) => map,
        Value::Null => LogContext::new(),
        other => {
            let mut map = LogContext::new();
            map.insert("value".into(), other);
            map
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// 在内存中保存所有记录
    #[derive(Default)]
    pub struct MemorySink {
        pub records: Mutex<Vec<LogRecord>>,
    }

    impl LogSink for MemorySink {
        fn emit(&self, record: &LogRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySink;
    use super::*;
    use crate::models::Role;

    #[test]
    fn create_logger_applies_defaults() {
        let sink = Arc::new(MemorySink::default());
        let factory = LoggerFactory::new(sink.clone(), "svc", "test");
        let logger = factory.create_logger(LoggerConfig::default());

        logger.info("hello", fields(json!({"k": 1})));

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        let b = &records[0].bindings;
        assert_eq!(b.service, "svc");
        assert_eq!(b.context, "app");
        assert_eq!(b.user_id, "anonymous");
        assert_eq!(b.user_email, None);
        assert_eq!(records[0].fields["k"], json!(1));
    }

    #[test]
    fn get_logger_binds_session_identity() {
        let sink = Arc::new(MemorySink::default());
        let factory = LoggerFactory::new(sink.clone(), "svc", "test");
        let session = Session {
            user_id: "u-9".into(),
            role: Role::User,
            email: Some("u9@example.com".into()),
        };

        let a = factory.get_logger("api/users", Some(&session));
        let b = factory.get_logger("api/users", None);

        assert_eq!(a.bindings().context, "api/users");
        assert_eq!(a.bindings().user_id, "u-9");
        assert_eq!(a.bindings().user_email.as_deref(), Some("u9@example.com"));
        assert_eq!(b.bindings().user_id, "anonymous");
        assert!(a.bindings().request_id.is_some());
        assert_ne!(a.bindings().request_id, b.bindings().request_id);
    }

    #[test]
    fn error_field_moves_to_err() {
        let mut f = fields(json!({"error": "boom", "method": "GET"}));
        normalize_error_field(&mut f);
        assert_eq!(f.get("err"), Some(&json!("boom")));
        assert!(!f.contains_key("error"));

        let mut f = fields(json!({"error": "a", "err": "b"}));
        normalize_error_field(&mut f);
        assert_eq!(f.get("err"), Some(&json!("b")));
        assert_eq!(f.get("error"), Some(&json!("a")));
    }

    #[test]
    fn log_levels_parse() {
        assert_eq!("fatal".parse::<LogLevel>(), Ok(LogLevel::Fatal));
        assert!("trace".parse::<LogLevel>().is_err());
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn error_context_includes_sources() {
        let io = std::io::Error::other("disk gone");
        let value = error_context(&io);
        assert_eq!(value["message"], json!("disk gone"));
    }
}
