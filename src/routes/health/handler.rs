use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use crate::{
    AppState,
    logging::fields,
    result::OperationResult,
    utils::{CurrentSession, ok_response},
};

use super::model::{HealthReport, RateLimiterHealth};

fn format_uptime(secs: i64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    format!("{days}d {hours}h {minutes}m")
}

/// GET /api/health，仅管理员可访问
pub async fn health(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
) -> Response {
    let logger = state.loggers.get_logger("api/health", session.as_ref());

    if !session.as_ref().is_some_and(|s| s.is_admin()) {
        logger.warn("Health check denied", fields(json!({ "method": "GET" })));
        return (
            StatusCode::FORBIDDEN,
            Json(OperationResult::<()>::error(
                "Unauthorized - Admin access required",
                None,
                None,
            )),
        )
            .into_response();
    }

    let now = Utc::now();
    let uptime_secs = (now - state.started_at).num_seconds().max(0);
    let report = HealthReport {
        status: "healthy",
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: format_uptime(uptime_secs),
        uptime_seconds: uptime_secs,
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        rate_limiter: RateLimiterHealth {
            records: state.rate_limiter.len(),
            general_limit: state.config.rate_limit_requests,
            upload_limit: state.config.upload_rate_limit_requests,
            window_seconds: state.config.rate_limit_window_secs,
        },
    };

    logger.debug("Health check served", fields(json!({ "uptime": uptime_secs })));
    ok_response(report)
}

#[cfg(test)]
mod tests {
    use super::format_uptime;

    #[test]
    fn uptime_is_days_hours_minutes() {
        assert_eq!(format_uptime(0), "0d 0h 0m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }
}
