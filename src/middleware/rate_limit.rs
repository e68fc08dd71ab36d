use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::{config::Config, models::Session, result::error_codes, utils::client_ip};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    General,
    Upload,
}

impl RateLimitScope {
    pub fn as_str(self) -> &'static str {
        match self {
            RateLimitScope::General => "general",
            RateLimitScope::Upload => "upload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RateLimitRecord {
    count: u32,
    reset_time: i64,
}

/// 单次限流检查的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// 窗口结束时间（毫秒时间戳）
    pub reset_at_ms: i64,
}

impl RateLimitDecision {
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.reset_at_ms).unwrap_or_default()
    }

    /// 距窗口重置的秒数，向上取整
    pub fn retry_after_secs(&self, now_ms: i64) -> i64 {
        let remaining_ms = (self.reset_at_ms - now_ms).max(0);
        (remaining_ms + 999) / 1000
    }
}

/// 可由后台任务定期清理过期记录的存储
pub trait Sweep: Send + Sync + 'static {
    fn sweep_expired(&self, now_ms: i64) -> usize;
}

fn lock_records(
    records: &Mutex<HashMap<String, RateLimitRecord>>,
) -> MutexGuard<'_, HashMap<String, RateLimitRecord>> {
    // 计数器在持锁期间不会处于不一致状态，中毒后直接继续使用
    records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn sweep_records(records: &Mutex<HashMap<String, RateLimitRecord>>, now_ms: i64) -> usize {
    let mut records = lock_records(records);
    let before = records.len();
    records.retain(|_, record| now_ms <= record.reset_time);
    before - records.len()
}

/// 进程内的固定窗口计数器，每个作用域独立计数。
///
/// 同一对齐窗口内的请求共用一个计数，跨窗口边界的突发流量最多可达限额的两倍。
/// 先自增再比较，被拒绝的请求同样计数。多进程部署时各进程分别限流。
#[derive(Debug)]
pub struct RateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    window_ms: i64,
    general_limit: u32,
    upload_limit: u32,
}

impl RateLimiter {
    pub fn new(window: Duration, general_limit: u32, upload_limit: u32) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            window_ms: (window.as_millis() as i64).max(1),
            general_limit,
            upload_limit,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_window(),
            config.rate_limit_requests,
            config.upload_rate_limit_requests,
        )
    }

    pub fn limit_for(&self, scope: RateLimitScope) -> u32 {
        match scope {
            RateLimitScope::General => self.general_limit,
            RateLimitScope::Upload => self.upload_limit,
        }
    }

    pub fn check(&self, identifier: &str, scope: RateLimitScope) -> RateLimitDecision {
        self.check_at(identifier, scope, Utc::now().timestamp_millis())
    }

    pub fn check_at(&self, identifier: &str, scope: RateLimitScope, now_ms: i64) -> RateLimitDecision {
        let limit = self.limit_for(scope);
        let window_start = now_ms.div_euclid(self.window_ms) * self.window_ms;
        let key = format!("{}:{}:{}", scope.as_str(), identifier, window_start);

        let mut records = lock_records(&self.records);
        let record = records.entry(key).or_insert(RateLimitRecord {
            count: 0,
            reset_time: window_start + self.window_ms,
        });
        record.count = record.count.saturating_add(1);

        RateLimitDecision {
            allowed: record.count <= limit,
            limit,
            remaining: limit.saturating_sub(record.count),
            reset_at_ms: record.reset_time,
        }
    }

    pub fn len(&self) -> usize {
        lock_records(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sweep for RateLimiter {
    fn sweep_expired(&self, now_ms: i64) -> usize {
        sweep_records(&self.records, now_ms)
    }
}

/// 滚动窗口限流：窗口从标识的第一次请求开始计算，先检查再自增
#[derive(Debug)]
pub struct RollingRateLimiter {
    records: Mutex<HashMap<String, RateLimitRecord>>,
    window_ms: i64,
    limit: u32,
}

impl RollingRateLimiter {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            window_ms: (window.as_millis() as i64).max(1),
            limit,
        }
    }

    pub fn check(&self, identifier: &str) -> bool {
        self.check_at(identifier, Utc::now().timestamp_millis())
    }

    pub fn check_at(&self, identifier: &str, now_ms: i64) -> bool {
        let mut records = lock_records(&self.records);
        match records.get_mut(identifier) {
            Some(record) if now_ms <= record.reset_time => {
                if record.count >= self.limit {
                    return false;
                }
                record.count += 1;
                true
            }
            _ => {
                records.insert(
                    identifier.to_string(),
                    RateLimitRecord {
                        count: 1,
                        reset_time: now_ms + self.window_ms,
                    },
                );
                true
            }
        }
    }
}

impl Sweep for RollingRateLimiter {
    fn sweep_expired(&self, now_ms: i64) -> usize {
        sweep_records(&self.records, now_ms)
    }
}

/// 按固定间隔调用 `sweep_expired`，直到任务被中止
pub fn spawn_sweeper<S: Sweep>(target: Arc<S>, interval: Duration, name: &'static str) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = target.sweep_expired(Utc::now().timestamp_millis());
            if removed > 0 {
                tracing::debug!(limiter = name, removed, "Swept expired rate limit records");
            }
        }
    })
}

/// 已登录用户为 `user:<id>`，否则为 `ip:<客户端IP>`
pub fn rate_limit_identifier(
    session: Option<&Session>,
    headers: &HeaderMap,
    peer: Option<&SocketAddr>,
) -> String {
    match session {
        Some(session) => format!("user:{}", session.user_id),
        None => format!("ip:{}", client_ip(headers, peer)),
    }
}

fn insert_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, value);
    }
}

pub fn rate_limited_response(decision: &RateLimitDecision, now_ms: i64) -> Response {
    let reset_time = decision
        .reset_at()
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "success": false,
            "error": "Rate limit exceeded",
            "code": error_codes::RATE_LIMIT_EXCEEDED,
            "data": {
                "limit": decision.limit,
                "remaining": decision.remaining,
                "resetTime": reset_time,
            }
        })),
    )
        .into_response();

    insert_header(&mut response, "X-RateLimit-Limit", decision.limit);
    insert_header(&mut response, "X-RateLimit-Remaining", decision.remaining);
    insert_header(&mut response, "X-RateLimit-Reset", decision.reset_at_ms);
    insert_header(&mut response, "Retry-After", decision.retry_after_secs(now_ms));
    response
}

/// 先检查限流再执行 `handler`，被拒绝时不会执行
pub async fn with_rate_limit<F>(
    limiter: &RateLimiter,
    scope: RateLimitScope,
    identifier: &str,
    handler: F,
) -> Response
where
    F: Future<Output = Response>,
{
    let now_ms = Utc::now().timestamp_millis();
    let decision = limiter.check_at(identifier, scope, now_ms);

    if !decision.allowed {
        tracing::warn!(
            identifier,
            scope = scope.as_str(),
            limit = decision.limit,
            "Rate limit exceeded"
        );
        return rate_limited_response(&decision, now_ms);
    }

    let mut response = handler.await;
    insert_header(&mut response, "X-RateLimit-Limit", decision.limit);
    insert_header(&mut response, "X-RateLimit-Remaining", decision.remaining);
    response
}

#[derive(Clone)]
pub struct ScopedRateLimiter {
    pub limiter: Arc<RateLimiter>,
    pub scope: RateLimitScope,
}

impl ScopedRateLimiter {
    pub fn new(limiter: Arc<RateLimiter>, scope: RateLimitScope) -> Self {
        Self { limiter, scope }
    }
}

pub async fn rate_limit(
    State(scoped): State<ScopedRateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let identifier =
        rate_limit_identifier(req.extensions().get::<Session>(), req.headers(), peer.as_ref());

    with_rate_limit(&scoped.limiter, scoped.scope, &identifier, next.run(req)).await
}
