use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use chrono::{DateTime, Utc};

use config::Config;
use logging::LoggerFactory;
use middleware::{
    RateLimitScope, RateLimiter, RollingRateLimiter, RoutePolicy, ScopedRateLimiter,
    auth_middleware, log_errors, rate_limit,
};

pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod models;
pub mod result;
pub mod utils;

pub mod routes;

// 客户端日志采集的限流窗口
const LOG_INGEST_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rate_limiter: Arc<RateLimiter>,
    pub log_ingest_limiter: Arc<RollingRateLimiter>,
    pub route_policy: Arc<RoutePolicy>,
    pub loggers: LoggerFactory,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let loggers = LoggerFactory::from_config(&config);
        Self::with_loggers(config, loggers)
    }

    pub fn with_loggers(config: Config, loggers: LoggerFactory) -> Self {
        Self {
            rate_limiter: Arc::new(RateLimiter::from_config(&config)),
            log_ingest_limiter: Arc::new(RollingRateLimiter::new(
                LOG_INGEST_WINDOW,
                config.log_ingest_limit,
            )),
            route_policy: Arc::new(RoutePolicy::default()),
            config: Arc::new(config),
            loggers,
            started_at: Utc::now(),
        }
    }

    pub fn scoped_limiter(&self, scope: RateLimitScope) -> ScopedRateLimiter {
        ScopedRateLimiter::new(Arc::clone(&self.rate_limiter), scope)
    }
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route("/auth/session", get(routes::session::current_session))
        .route_layer(from_fn_with_state(
            state.scoped_limiter(RateLimitScope::General),
            rate_limit,
        ));

    // 日志采集使用独立的按IP限流
    let ingest_routes =
        Router::new().route("/logs/client", post(routes::logs::ingest_client_log));

    Router::new()
        .nest("/api", api_routes.merge(ingest_routes))
        .fallback(routes::not_found)
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(from_fn(log_errors))
        .with_state(state)
}
