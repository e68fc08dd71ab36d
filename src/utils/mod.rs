use std::net::SocketAddr;

use axum::{
    Json,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::{
    extract::CookieJar,
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Role, Session};
use crate::result::{OperationResult, error_codes};

mod extract;

pub use extract::{ClientIp, CurrentSession};

const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub exp: i64, // 过期时间
    pub iat: i64, // 签发时间
}

pub fn generate_token(
    session: &Session,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: session.user_id.clone(),
        role: session.role,
        email: session.email.clone(),
        exp: now + ttl.num_seconds(),
        iat: now,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Session, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    let claims = token_data.claims;
    Ok(Session {
        user_id: claims.sub,
        role: claims.role,
        email: claims.email,
    })
}

/// 从 cookie 或 Bearer 头中解析会话，无效令牌视为未登录
pub fn session_from_headers(headers: &HeaderMap, cookie_name: &str, secret: &str) -> Option<Session> {
    let jar = CookieJar::from_headers(headers);
    let token = jar
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .or_else(|| {
            headers
                .typed_get::<Authorization<Bearer>>()
                .map(|auth| auth.token().to_string())
        })?;

    match verify_token(&token, secret) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::debug!("Ignoring invalid session token: {}", e);
            None
        }
    }
}

/// 客户端IP：X-Forwarded-For 第一项 > X-Real-IP > 连接地址 > 回环地址
pub fn client_ip(headers: &HeaderMap, peer: Option<&SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
        })
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| DEFAULT_CLIENT_IP.to_string())
}

pub fn success_response<T: Serialize>(data: T, message: Option<&str>, status: StatusCode) -> Response {
    (
        status,
        Json(OperationResult::success(data, message.map(str::to_string))),
    )
        .into_response()
}

pub fn ok_response<T: Serialize>(data: T) -> Response {
    success_response(data, None, StatusCode::OK)
}

pub fn error_response(
    message: &str,
    status: StatusCode,
    code: Option<&str>,
    details: Option<Map<String, Value>>,
) -> Response {
    (
        status,
        Json(OperationResult::<()>::error(message, code, details)),
    )
        .into_response()
}

pub fn bad_request_response(message: &str) -> Response {
    error_response(message, StatusCode::BAD_REQUEST, Some(error_codes::BAD_REQUEST), None)
}

pub fn unauthorized_response(message: &str) -> Response {
    error_response(message, StatusCode::UNAUTHORIZED, Some(error_codes::UNAUTHORIZED), None)
}

pub fn forbidden_response(message: &str) -> Response {
    error_response(message, StatusCode::FORBIDDEN, Some(error_codes::FORBIDDEN), None)
}

pub fn not_found_response(message: &str, code: Option<&str>) -> Response {
    error_response(
        message,
        StatusCode::NOT_FOUND,
        Some(code.unwrap_or(error_codes::NOT_FOUND)),
        None,
    )
}

pub fn conflict_response(message: &str, code: Option<&str>) -> Response {
    error_response(
        message,
        StatusCode::CONFLICT,
        Some(code.unwrap_or(error_codes::CONFLICT)),
        None,
    )
}

pub fn validation_error_response(message: &str, details: Option<Map<String, Value>>) -> Response {
    error_response(
        message,
        StatusCode::BAD_REQUEST,
        Some(error_codes::VALIDATION_ERROR),
        details,
    )
}

pub fn internal_server_error_response(message: &str) -> Response {
    error_response(
        message,
        StatusCode::INTERNAL_SERVER_ERROR,
        Some(error_codes::INTERNAL_SERVER_ERROR),
        None,
    )
}

pub fn too_many_requests_response(message: &str) -> Response {
    error_response(
        message,
        StatusCode::TOO_MANY_REQUESTS,
        Some(error_codes::TOO_MANY_REQUESTS),
        None,
    )
}
