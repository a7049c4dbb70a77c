use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A project as seen by a request handler. `users` holds only the caller's
/// membership records (resolved by the authorization gate), so the first
/// entry is the one consulted for permission checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    /// The short-link namespace this project owns.
    pub domain: String,
    pub users: Vec<ProjectUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectUser {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Manager,
    Member,
    Viewer,
}

impl Role {
    /// Viewers can read a project's links but not create them.
    pub fn can_edit_links(self) -> bool {
        matches!(self, Role::Owner | Role::Manager | Role::Member)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "manager" => Ok(Role::Manager),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!("{} is not a known project role", other)),
        }
    }
}
