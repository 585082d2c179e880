use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Minimum password length accepted at sign-up.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Why a sign-in or sign-up form was rejected before hitting the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Please fill in all fields")]
    MissingField,
    #[error("Please enter a valid email")]
    InvalidEmail,
    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
}

/// Email and password as entered by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Trims the email; the password is kept verbatim.
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }

    /// Checks applied before a sign-in request.
    pub fn validate_sign_in(&self) -> Result<(), CredentialError> {
        if self.email.is_empty() || self.password.is_empty() {
            return Err(CredentialError::MissingField);
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(CredentialError::InvalidEmail);
        }
        Ok(())
    }

    /// Sign-in checks plus the minimum password length.
    pub fn validate_sign_up(&self) -> Result<(), CredentialError> {
        self.validate_sign_in()?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CredentialError::PasswordTooShort);
        }
        Ok(())
    }
}
