use std::fmt;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::TokenPurpose;

/// A live bearer token held by a user.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenEntry {
    pub access: TokenPurpose,
    pub token: String,
}

impl fmt::Debug for TokenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEntry")
            .field("access", &self.access)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// User record as held by the store. Never serialized outward; see `PublicUser`.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub tokens: Vec<TokenEntry>, // oldest first
    pub created_at: OffsetDateTime,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("tokens", &self.tokens.len())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Insert payload; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
}

/// Partial overwrite of a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub password_hash: Option<String>,
}
