//! Session-related types.
//!
//! Types stored in the session for authentication state. The session is
//! written by the login flow, which lives outside this service.

use serde::{Deserialize, Serialize};

use cartwise_core::UserId;

/// Authenticated caller identity.
///
/// Either inserted into request extensions by an upstream auth layer or read
/// from the session under [`keys::CURRENT_USER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
