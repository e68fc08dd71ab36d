use axum::{
    body::{Bytes, to_bytes},
    extract::{Request, State},
    response::Response,
};
use serde_json::{Value, json};

use crate::{
    AppState,
    error::AppError,
    logging::{LogLevel, fields},
    utils::{ClientIp, CurrentSession, ok_response},
};

use super::model::{ClientLogRequest, ClientLogResponse};

// 客户端日志请求体上限
const MAX_CLIENT_LOG_BYTES: usize = 64 * 1024;

fn valid_levels() -> String {
    LogLevel::ALL
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

async fn read_body(request: Request) -> Result<Bytes, AppError> {
    to_bytes(request.into_body(), MAX_CLIENT_LOG_BYTES)
        .await
        .map_err(|e| AppError::BadRequest(format!("Unreadable request body: {e}")))
}

/// POST /api/logs/client
///
/// 以相同级别通过服务端日志器重新记录客户端日志
#[axum::debug_handler(state = AppState)]
pub async fn ingest_client_log(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    ClientIp(ip): ClientIp,
    request: Request,
) -> Result<Response, AppError> {
    let logger = state.loggers.get_logger("api/logs/client", session.as_ref());

    if !state.log_ingest_limiter.check(&ip) {
        logger.warn("Client logging rate limit exceeded", fields(json!({ "ip": ip })));
        return Err(AppError::TooManyRequests(
            "Too many log requests. Please try again later.".into(),
        ));
    }

    let body: ClientLogRequest = serde_json::from_slice(&read_body(request).await?)?;

    let (Some(level), Some(message)) = (
        body.level.filter(|l| !l.is_empty()),
        body.message.filter(|m| !m.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: level, message".into(),
        ));
    };

    let level: LogLevel = level.parse().map_err(|_| {
        AppError::BadRequest(format!(
            "Invalid log level. Must be one of: {}",
            valid_levels()
        ))
    })?;

    let client_fields = body.client_info.unwrap_or_default().into_fields();
    let log_context = client_fields
        .get("logContext")
        .and_then(Value::as_str)
        .unwrap_or("client")
        .to_string();

    let mut merged = body.context.unwrap_or_default();
    merged.extend(client_fields);
    merged.insert("ip".into(), Value::String(ip));
    if let Some(timestamp) = body.timestamp {
        merged.insert("clientTimestamp".into(), Value::String(timestamp));
    }

    let server_logger = state
        .loggers
        .get_logger(&format!("client/{log_context}"), session.as_ref());
    server_logger.log(level, &format!("[CLIENT] {message}"), merged);

    logger.debug(
        "Client log received and processed",
        fields(json!({ "level": level, "clientContext": log_context })),
    );

    Ok(ok_response(ClientLogResponse { received: true }))
}
