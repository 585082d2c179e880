use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::error::SupabaseError;
use super::types::{AuthErrorBody, SignUpResponse, TokenResponse};

#[derive(Serialize)]
struct PasswordBody<'a> {
    email: &'a str,
    password: &'a str,
}

/// Sign in with email and password.
pub async fn sign_in(
    http: &Client,
    base: &Url,
    anon_key: &str,
    email: &str,
    password: &str,
) -> Result<TokenResponse, SupabaseError> {
    let url = base.join("auth/v1/token")?;
    let resp = http
        .post(url)
        .query(&[("grant_type", "password")])
        .header("apikey", anon_key)
        .json(&PasswordBody { email, password })
        .send()
        .await?;

    let resp = check_auth_response(resp, "Invalid email or password").await?;
    resp.json::<TokenResponse>()
        .await
        .map_err(|e| SupabaseError::Parse(e.to_string()))
}

/// Create an account.
pub async fn sign_up(
    http: &Client,
    base: &Url,
    anon_key: &str,
    email: &str,
    password: &str,
) -> Result<SignUpResponse, SupabaseError> {
    let url = base.join("auth/v1/signup")?;
    let resp = http
        .post(url)
        .header("apikey", anon_key)
        .json(&PasswordBody { email, password })
        .send()
        .await?;

    let resp = check_auth_response(resp, "Failed to create account").await?;
    resp.json::<SignUpResponse>()
        .await
        .map_err(|e| SupabaseError::Parse(e.to_string()))
}

/// Turn a failed auth response into a user-facing message.
async fn check_auth_response(
    resp: reqwest::Response,
    fallback: &str,
) -> Result<reqwest::Response, SupabaseError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status, "Auth request rejected");
    let message = serde_json::from_str::<AuthErrorBody>(&body)
        .ok()
        .and_then(AuthErrorBody::message)
        .unwrap_or_else(|| fallback.to_string());
    Err(SupabaseError::Auth(message))
}
