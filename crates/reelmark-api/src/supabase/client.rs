use reqwest::{Client, RequestBuilder};
use url::Url;

use super::auth;
use super::error::SupabaseError;
use crate::records::{NewRemoteRecord, RecordPatch, RemoteRecord};
use crate::traits::{AuthGrant, AuthService, RecordFilter, RecordStore, SignUpOutcome};

const RECORDS_PATH: &str = "rest/v1/watched_movies";

/// Client for the hosted auth + REST backend.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base: Url,
    anon_key: String,
    http: Client,
}

impl SupabaseClient {
    pub fn new(base_url: &str, anon_key: impl Into<String>) -> Result<Self, SupabaseError> {
        Ok(Self {
            base: crate::base_url(base_url)?,
            anon_key: anon_key.into(),
            http: Client::new(),
        })
    }

    fn records_url(&self) -> Result<Url, SupabaseError> {
        Ok(self.base.join(RECORDS_PATH)?)
    }

    /// Attach the API key and the user's bearer token.
    fn authorized(&self, req: RequestBuilder, token: &str) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {token}"))
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, SupabaseError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Record store error");
            Err(SupabaseError::Api {
                status,
                message: body,
            })
        }
    }
}

/// Query-string filters for a [`RecordFilter`].
pub fn filter_params(filter: &RecordFilter) -> Vec<(&'static str, String)> {
    match filter {
        RecordFilter::Id(id) => vec![("id", format!("eq.{id}"))],
        RecordFilter::Title { user_id, title } => vec![
            ("title", format!("eq.{title}")),
            ("user_id", format!("eq.{user_id}")),
        ],
        RecordFilter::User(user_id) => vec![("user_id", format!("eq.{user_id}"))],
    }
}

impl AuthService for SupabaseClient {
    type Error = SupabaseError;

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, SupabaseError> {
        let token = auth::sign_in(&self.http, &self.base, &self.anon_key, email, password).await?;
        Ok(token.into_grant())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, SupabaseError> {
        let resp = auth::sign_up(&self.http, &self.base, &self.anon_key, email, password).await?;
        Ok(resp.outcome())
    }
}

impl RecordStore for SupabaseClient {
    type Error = SupabaseError;

    async fn insert(
        &self,
        token: &str,
        record: &NewRemoteRecord,
    ) -> Result<RemoteRecord, SupabaseError> {
        let req = self
            .http
            .post(self.records_url()?)
            .header("Prefer", "return=representation")
            .json(record);
        let resp = self.authorized(req, token).send().await?;
        let resp = Self::check_response(resp).await?;
        let mut rows: Vec<RemoteRecord> = resp
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))?;
        if rows.is_empty() {
            return Err(SupabaseError::Parse("insert returned no rows".into()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(
        &self,
        token: &str,
        filter: &RecordFilter,
        patch: &RecordPatch,
    ) -> Result<(), SupabaseError> {
        let req = self
            .http
            .patch(self.records_url()?)
            .query(&filter_params(filter))
            .header("Prefer", "return=minimal")
            .json(patch);
        let resp = self.authorized(req, token).send().await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn delete(&self, token: &str, filter: &RecordFilter) -> Result<(), SupabaseError> {
        let req = self
            .http
            .delete(self.records_url()?)
            .query(&filter_params(filter));
        let resp = self.authorized(req, token).send().await?;
        Self::check_response(resp).await?;
        Ok(())
    }

    async fn select(
        &self,
        token: &str,
        filter: &RecordFilter,
    ) -> Result<Vec<RemoteRecord>, SupabaseError> {
        let mut params = filter_params(filter);
        params.push(("select", "*".to_string()));
        let req = self.http.get(self.records_url()?).query(&params);
        let resp = self.authorized(req, token).send().await?;
        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_filter_matches_title_and_user() {
        let params = filter_params(&RecordFilter::Title {
            user_id: "u1".into(),
            title: "Dark, Season 1".into(),
        });
        assert_eq!(
            params,
            vec![
                ("title", "eq.Dark, Season 1".to_string()),
                ("user_id", "eq.u1".to_string()),
            ]
        );
    }

    #[test]
    fn id_and_user_filters() {
        assert_eq!(
            filter_params(&RecordFilter::Id("9".into())),
            vec![("id", "eq.9".to_string())]
        );
        assert_eq!(
            filter_params(&RecordFilter::User("u1".into())),
            vec![("user_id", "eq.u1".to_string())]
        );
    }

    #[test]
    fn rejects_bad_base_url() {
        assert!(matches!(
            SupabaseClient::new("not a url", "key"),
            Err(SupabaseError::Url(_))
        ));
    }

    #[test]
    fn records_url_joins_rest_path() {
        let client = SupabaseClient::new("https://abc.supabase.co", "key").unwrap();
        assert_eq!(
            client.records_url().unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/watched_movies"
        );
    }
}
