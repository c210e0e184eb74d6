use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Agent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Agent => "agent",
        }
    }
}

/// Authenticated session identity. The channel is scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub org_id: String,
    pub user_id: String,
    pub role: Role,
    /// Display name used as message sender and in presence announcements
    #[serde(default)]
    pub name: String,
}

impl Identity {
    pub fn new(
        org_id: impl Into<String>,
        user_id: impl Into<String>,
        role: Role,
        name: impl Into<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
            role,
            name: name.into(),
        }
    }
}
