use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// 日志输出目标，启动时决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSinkKind {
    /// 结构化服务端日志
    Server,
    /// 控制台输出，并把 error/fatal 转发到采集端点
    Forwarding { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub session_secret: String,
    pub session_cookie: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub upload_rate_limit_requests: u32,
    pub rate_limit_sweep_secs: u64,
    pub log_ingest_limit: u32,
    pub service_name: String,
    pub environment: String,
    pub log_sink: LogSinkKind,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".into(),
            server_port: 3000,
            session_secret: String::new(),
            session_cookie: "session-token".into(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            upload_rate_limit_requests: 10,
            rate_limit_sweep_secs: 60,
            log_ingest_limit: 50,
            service_name: "request-gate".into(),
            environment: "development".into(),
            log_sink: LogSinkKind::Server,
            log_format: LogFormat::Pretty,
        }
    }
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let session_secret =
            env::var("SESSION_SECRET").map_err(|_| ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "SESSION_SECRET",
                value: session_secret,
            });
        }

        let log_sink = match env::var("LOG_SINK")
            .unwrap_or_else(|_| "server".into())
            .to_lowercase()
            .as_str()
        {
            "server" => LogSinkKind::Server,
            "forwarding" => LogSinkKind::Forwarding {
                url: env::var("LOG_FORWARD_URL")
                    .map_err(|_| ConfigError::Missing("LOG_FORWARD_URL"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "LOG_SINK",
                    value: other.to_string(),
                });
            }
        };

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed_or("SERVER_PORT", defaults.server_port),
            session_secret,
            session_cookie: env::var("SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            rate_limit_window_secs: parsed_or("RATE_LIMIT_WINDOW", defaults.rate_limit_window_secs),
            rate_limit_requests: parsed_or("RATE_LIMIT_REQUESTS", defaults.rate_limit_requests),
            upload_rate_limit_requests: parsed_or(
                "UPLOAD_RATE_LIMIT_REQUESTS",
                defaults.upload_rate_limit_requests,
            ),
            rate_limit_sweep_secs: parsed_or(
                "RATE_LIMIT_SWEEP_INTERVAL",
                defaults.rate_limit_sweep_secs,
            ),
            log_ingest_limit: parsed_or("LOG_INGEST_LIMIT", defaults.log_ingest_limit),
            service_name: env::var("SERVICE_NAME").unwrap_or(defaults.service_name),
            environment: env::var("APP_ENV").unwrap_or(defaults.environment),
            log_sink,
            log_format,
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn rate_limit_sweep_interval(&self) -> Duration {
        // tokio interval 不接受零周期
        Duration::from_secs(self.rate_limit_sweep_secs.max(1))
    }
}
