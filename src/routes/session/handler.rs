use axum::response::Response;

use crate::utils::{CurrentSession, ok_response, unauthorized_response};

use super::model::SessionResponse;

/// GET /api/auth/session
pub async fn current_session(CurrentSession(session): CurrentSession) -> Response {
    match session {
        Some(session) => ok_response(SessionResponse::from(session)),
        None => unauthorized_response("Unauthorized"),
    }
}
