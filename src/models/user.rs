use serde::{Deserialize, Serialize};

/// Profile snapshot for the signed-in user.
///
/// Replaced wholesale on every successful authentication event, never
/// partially mutated. May be stale relative to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    pub profile_image_url: String,
    pub tier_id: Option<i64>,
}

/// Registration payload for the sign-up endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}
