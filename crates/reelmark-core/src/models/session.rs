use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens from a password sign-in, stamped with when they were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: SessionUser,
    #[serde(rename = "loggedInAt")]
    pub established_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the session is younger than `window` at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.established_at < window
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}
