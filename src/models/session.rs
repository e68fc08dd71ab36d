use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::User => 1,
            Role::Moderator => 2,
            Role::Admin => 3,
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }

    pub fn is_moderator_or_admin(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }

    /// 角色层级：ADMIN > MODERATOR > USER
    pub fn has_permission(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Moderator => "Moderator",
            Role::Admin => "Admin",
        }
    }
}

/// 会话信息，由身份提供方签发，网关只读
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
