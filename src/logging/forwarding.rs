use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde_json::{Value, json};
use tokio::{sync::Semaphore, task::JoinHandle};

use super::{LogLevel, LogRecord, LogSink};

// 单次转发的超时时间
const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);
// 同时进行中的转发请求上限，超出的记录直接丢弃
const MAX_IN_FLIGHT: usize = 32;

/// 控制台输出，同时把 `error`/`fatal` 记录转发到日志采集接口。
/// 转发在后台任务中进行，失败一律忽略。
#[derive(Debug, Clone)]
pub struct ForwardingSink {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    in_flight: Arc<Semaphore>,
}

impl ForwardingSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_timeout(endpoint, FORWARD_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build log forwarding client: {}", e);
                reqwest::Client::new()
            });
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            in_flight: Arc::new(Semaphore::new(MAX_IN_FLIGHT)),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn console_line(record: &LogRecord) -> String {
        let timestamp = record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut line = format!("{timestamp} [{}] {}", record.bindings.context, record.message);
        if !record.fields.is_empty() {
            line.push(' ');
            line.push_str(&Value::Object(record.fields.clone()).to_string());
        }
        line
    }

    /// 与 `POST /api/logs/client` 接收的格式一致
    pub(crate) fn payload(record: &LogRecord) -> Value {
        json!({
            "level": record.level,
            "message": record.message,
            "context": record.fields,
            "timestamp": record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            "clientInfo": {
                "userAgent": concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
                "url": "",
                "referrer": "",
                "service": record.bindings.service,
                "logContext": record.bindings.context,
            }
        })
    }

    pub(crate) fn forward(&self, record: &LogRecord) -> Option<JoinHandle<()>> {
        // 没有运行时就不转发
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            tracing::trace!("Log forwarding saturated, dropping record");
            return None;
        };
        // 客户端构建失败时也要保证请求有超时
        let request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&Self::payload(record));
        Some(handle.spawn(async move {
            if let Err(e) = request.send().await {
                tracing::trace!("Dropped forwarded log: {}", e);
            }
            drop(permit);
        }))
    }
}

impl LogSink for ForwardingSink {
    fn emit(&self, record: &LogRecord) {
        let line = Self::console_line(record);
        // 与浏览器 console 一致：warn 及以上写 stderr
        let _ = if record.level >= LogLevel::Warn {
            writeln!(std::io::stderr().lock(), "{line}")
        } else {
            writeln!(std::io::stdout().lock(), "{line}")
        };

        if record.level >= LogLevel::Error {
            let _ = self.forward(record);
        }
    }
}
