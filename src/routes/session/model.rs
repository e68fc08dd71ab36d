use serde::Serialize;

use crate::models::{Role, Session};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub role: Role,
    pub role_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        SessionResponse {
            user_id: session.user_id,
            role: session.role,
            role_label: session.role.label(),
            email: session.email,
        }
    }
}
