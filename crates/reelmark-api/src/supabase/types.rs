use serde::Deserialize;

use crate::traits::{AuthGrant, SignUpOutcome};

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: TokenUser,
}

#[derive(Debug, Deserialize)]
pub struct TokenUser {
    pub id: String,
    pub email: Option<String>,
}

impl TokenResponse {
    pub fn into_grant(self) -> AuthGrant {
        AuthGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user_id: self.user.id,
            email: self.user.email,
        }
    }
}

/// Sign-up reply. A top-level `id` means the account is usable immediately.
#[derive(Debug, Deserialize)]
pub struct SignUpResponse {
    pub id: Option<String>,
}

impl SignUpResponse {
    pub fn outcome(&self) -> SignUpOutcome {
        if self.id.is_some() {
            SignUpOutcome::Created
        } else {
            SignUpOutcome::ConfirmationRequired
        }
    }
}

/// Error body of the auth endpoints; the field used varies by error.
#[derive(Debug, Default, Deserialize)]
pub struct AuthErrorBody {
    pub error_description: Option<String>,
    pub error: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
}

impl AuthErrorBody {
    pub fn message(self) -> Option<String> {
        self.error_description
            .or(self.error)
            .or(self.msg)
            .or(self.message)
    }
}
