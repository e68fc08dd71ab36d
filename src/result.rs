use axum::http::StatusCode;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// 业务错误码，与 HTTP 状态码解耦
pub mod error_codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const TOO_MANY_REQUESTS: &str = "TOO_MANY_REQUESTS";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// 错误码对应的 HTTP 状态码，未知错误码按客户端错误处理
pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        error_codes::BAD_REQUEST | error_codes::VALIDATION_ERROR => StatusCode::BAD_REQUEST,
        error_codes::UNAUTHORIZED => StatusCode::UNAUTHORIZED,
        error_codes::FORBIDDEN => StatusCode::FORBIDDEN,
        error_codes::NOT_FOUND => StatusCode::NOT_FOUND,
        error_codes::CONFLICT => StatusCode::CONFLICT,
        error_codes::RATE_LIMIT_EXCEEDED | error_codes::TOO_MANY_REQUESTS => {
            StatusCode::TOO_MANY_REQUESTS
        }
        error_codes::INTERNAL_SERVER_ERROR => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// 所有 API 处理器统一的响应结构
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult<T> {
    Success {
        data: T,
        message: Option<String>,
    },
    Error {
        error: String,
        code: Option<String>,
        details: Option<Map<String, Value>>,
    },
}

impl<T> OperationResult<T> {
    pub fn success(data: T, message: Option<String>) -> Self {
        OperationResult::Success { data, message }
    }

    pub fn error(
        error: impl Into<String>,
        code: Option<&str>,
        details: Option<Map<String, Value>>,
    ) -> Self {
        OperationResult::Error {
            error: error.into(),
            code: code.map(str::to_string),
            details,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            OperationResult::Error { code, .. } => code.as_deref(),
            OperationResult::Success { .. } => None,
        }
    }
}

impl<T: Serialize> Serialize for OperationResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            OperationResult::Success { data, message } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                // 空消息不输出
                if let Some(message) = message.as_deref().filter(|m| !m.is_empty()) {
                    map.serialize_entry("message", message)?;
                }
            }
            OperationResult::Error {
                error,
                code,
                details,
            } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
                if let Some(code) = code.as_deref().filter(|c| !c.is_empty()) {
                    map.serialize_entry("code", code)?;
                }
                if let Some(details) = details {
                    map.serialize_entry("details", details)?;
                }
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_and_error_predicates() {
        for value in [json!(1), json!("x"), json!(null), json!({"a": [1, 2]})] {
            assert!(OperationResult::success(value, None).is_success());
        }
        let err: OperationResult<()> = OperationResult::error("x", None, None);
        assert!(!err.is_success());
        assert!(err.is_error());
    }

    #[test]
    fn success_shape_omits_missing_message() {
        let body = serde_json::to_value(OperationResult::success(json!({"id": 7}), None)).unwrap();
        assert_eq!(body, json!({"success": true, "data": {"id": 7}}));

        let body = serde_json::to_value(OperationResult::success(3, Some("created".into())))
            .unwrap();
        assert_eq!(body, json!({"success": true, "data": 3, "message": "created"}));
    }

    #[test]
    fn error_shape_carries_code_and_details() {
        let mut details = Map::new();
        details.insert("field".into(), json!("email"));
        let result: OperationResult<()> =
            OperationResult::error("Invalid input", Some(error_codes::VALIDATION_ERROR), Some(details));

        assert_eq!(result.code(), Some("VALIDATION_ERROR"));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "success": false,
                "error": "Invalid input",
                "code": "VALIDATION_ERROR",
                "details": {"field": "email"}
            })
        );
    }

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(status_for_code(error_codes::BAD_REQUEST), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code(error_codes::UNAUTHORIZED), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for_code(error_codes::FORBIDDEN), StatusCode::FORBIDDEN);
        assert_eq!(status_for_code(error_codes::NOT_FOUND), StatusCode::NOT_FOUND);
        assert_eq!(status_for_code(error_codes::CONFLICT), StatusCode::CONFLICT);
        assert_eq!(status_for_code(error_codes::VALIDATION_ERROR), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for_code(error_codes::RATE_LIMIT_EXCEEDED),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for_code(error_codes::INTERNAL_SERVER_ERROR),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
