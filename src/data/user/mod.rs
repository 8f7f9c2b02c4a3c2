use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::util::normalize_email;

pub mod db;

/// Account-level role reported by the identity provider. Informational only,
/// classroom authority is always derived from membership.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Teacher,
    Student,
}

impl FromStr for AccountRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "teacher" => Ok(AccountRole::Teacher),
            "student" => Ok(AccountRole::Student),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

impl std::fmt::Display for AccountRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountRole::Teacher => write!(f, "teacher"),
            AccountRole::Student => write!(f, "student"),
        }
    }
}

/// Directory record used to resolve invitation emails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    #[schema(format = "email")]
    pub email: String,
    #[serde(default)]
    pub role: Option<AccountRole>,
}

impl User {
    pub fn new(id: Uuid, name: impl ToString, email: impl AsRef<str>) -> User {
        User {
            id,
            name: name.to_string(),
            email: normalize_email(email),
            role: None,
        }
    }

    pub fn with_role(mut self, role: AccountRole) -> User {
        self.role = Some(role);
        self
    }
}
