use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a token may be used for. Re-checked on every resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Auth,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Auth => "auth",
        }
    }
}

impl FromStr for TokenPurpose {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth" => Ok(TokenPurpose::Auth),
            other => anyhow::bail!("unknown token purpose {other:?}"),
        }
    }
}

/// JWT payload for bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,            // user ID
    pub access: TokenPurpose, // purpose tag
    pub iat: usize,           // issued at (unix timestamp)
    pub exp: usize,           // expires at (unix timestamp)
    pub iss: String,
    pub aud: String,
    pub jti: Uuid, // keeps tokens minted in the same second distinct
}
