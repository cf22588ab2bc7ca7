//! Request-scoped caller identity.
//!
//! Authentication itself is an external collaborator; the gateway forwards the
//! authenticated identity through narrow headers and the identity middleware
//! turns them into a `Caller`. Domain code never looks at headers.

use serde::{Deserialize, Serialize};

use super::entity_ids::UserId;
use super::errors::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Officer,
    Manager,
    Admin,
}

impl UserRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "officer" => Some(Self::Officer),
            "manager" => Some(Self::Manager),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// The authenticated caller for one request.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: UserId,
    /// Display name, surfaced to other users in lock-conflict payloads.
    pub name: String,
    roles: Vec<UserRole>,
}

impl Caller {
    pub fn new(user_id: UserId, name: impl Into<String>, roles: Vec<UserRole>) -> Self {
        Self {
            user_id,
            name: name.into(),
            roles,
        }
    }

    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn roles(&self) -> &[UserRole] {
        &self.roles
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }

    /// Require admin privileges (force-release and similar overrides).
    pub fn require_admin(&self) -> Result<(), WorkflowError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(WorkflowError::Forbidden(
                "admin access required".to_string(),
            ))
        }
    }
}
