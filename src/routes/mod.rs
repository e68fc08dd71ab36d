pub mod health;
pub mod logs;
pub mod session;

use axum::response::Response;

use crate::utils::not_found_response;

/// 未匹配的路由同样返回 OperationResult
pub async fn not_found() -> Response {
    not_found_response("Resource not found", None)
}
