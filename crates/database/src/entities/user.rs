//! Back-office user entity definitions

use serde::{Deserialize, Serialize};

text_enum! {
    /// What a back-office account may touch.
    UserRole {
        Admin => "admin",
        Agent => "agent",
        Editor => "editor",
    }
}

text_enum! {
    UserStatus {
        Active => "active",
        Disabled => "disabled",
    }
}

impl UserRole {
    /// Agents and admins work the lead pipeline; editors only manage content.
    pub fn can_manage_leads(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Agent)
    }

    pub fn can_manage_listings(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Agent)
    }

    pub fn can_manage_posts(&self) -> bool {
        true
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub status: UserStatus,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub role: UserRole,
    pub password_hash: String,
}
