use serde::{Deserialize, Serialize};

/// Token pair returned by the login and refresh endpoints.
///
/// Only the refresh token is ever persisted; the access token and token type
/// are ephemeral and live in memory for at most one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenPair {
    pub fn new(access_token: &str, refresh_token: &str) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: "bearer".to_string(),
        }
    }
}
