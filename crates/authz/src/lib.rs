//! Caller identity and the guards that decide what it may do.
//!
//! An [`Identity`] is produced once per request from a validated token and
//! then passed explicitly to whatever needs to know who is calling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthzError {
    #[error("administrator privileges required")]
    AdminRequired,

    #[error("user {caller} may not access resources of user {owner}")]
    NotOwner { caller: i64, owner: i64 },
}

/// Allow only administrators.
pub fn require_admin(identity: &Identity) -> Result<(), AuthzError> {
    if identity.is_admin {
        return Ok(());
    }
    tracing::debug!(user_id = identity.id, "admin guard rejected caller");
    Err(AuthzError::AdminRequired)
}

/// Allow the owner of a resource, or any administrator.
pub fn require_self_or_admin(identity: &Identity, owner: i64) -> Result<(), AuthzError> {
    if identity.is_admin || identity.id == owner {
        return Ok(());
    }
    tracing::debug!(user_id = identity.id, owner, "ownership guard rejected caller");
    Err(AuthzError::NotOwner {
        caller: identity.id,
        owner,
    })
}
