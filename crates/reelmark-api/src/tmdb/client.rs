use reqwest::Client;
use url::Url;

use super::error::TmdbError;
use super::types::{ErrorBody, SearchResponse, SearchResult};
use crate::traits::{CatalogHit, CatalogKind, MetadataCatalog};

/// Default catalog API root.
pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Movie/TV metadata catalog client (v3 API key auth).
#[derive(Debug, Clone)]
pub struct TmdbClient {
    base: Url,
    api_key: String,
    http: Client,
}

impl TmdbClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, TmdbError> {
        Ok(Self {
            base: crate::base_url(base_url)?,
            api_key: api_key.into(),
            http: Client::new(),
        })
    }

    fn search_url(&self, kind: CatalogKind) -> Result<Url, TmdbError> {
        Ok(self.base.join(&format!("search/{}", kind.as_str()))?)
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, TmdbError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.status_message)
                .unwrap_or(body);
            tracing::warn!(status, "Catalog API error");
            Err(TmdbError::Api { status, message })
        }
    }
}

impl MetadataCatalog for TmdbClient {
    type Error = TmdbError;

    async fn search(&self, kind: CatalogKind, query: &str) -> Result<Vec<CatalogHit>, TmdbError> {
        let resp = self
            .http
            .get(self.search_url(kind)?)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("page", "1"),
            ])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let search: SearchResponse = resp
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))?;

        Ok(search
            .results
            .into_iter()
            .map(SearchResult::into_hit)
            .collect())
    }
}
