//! Authenticated actors.

use serde::{Deserialize, Serialize};

use crate::UserId;

/// Role carried by an authenticated principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated actor performing an operation.
///
/// Produced by the authentication layer and passed explicitly into every
/// core operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn customer(id: UserId) -> Self {
        Self {
            id,
            role: Role::Customer,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Self {
            id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns true if this principal owns the resource or is an admin.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin() || self.id == owner
    }
}
