use serde::Deserialize;

use crate::traits::CatalogHit;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// One search result. Movies carry `title`/`release_date`, series carry
/// `name`/`first_air_date`.
#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub title: Option<String>,
    pub name: Option<String>,
    pub media_type: Option<String>,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
}

impl SearchResult {
    pub fn into_hit(self) -> CatalogHit {
        CatalogHit {
            title: self.title.or(self.name),
            media_type: self.media_type,
            poster_path: self.poster_path,
            release_date: self.release_date,
            first_air_date: self.first_air_date,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub status_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_search_results() {
        let json = r#"{
            "page": 1,
            "results": [
                {"media_type": "person", "name": "Someone", "known_for": []},
                {"media_type": "tv", "name": "Dark", "poster_path": "/apbrbWs8M9lyOpJYU5WXrpFbk1Z.jpg", "first_air_date": "2017-12-01"}
            ],
            "total_results": 2
        }"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        let hits: Vec<CatalogHit> = resp.results.into_iter().map(SearchResult::into_hit).collect();
        assert!(!hits[0].is_title());
        assert_eq!(hits[1].title.as_deref(), Some("Dark"));
        assert_eq!(hits[1].date(), Some("2017-12-01"));
    }

    #[test]
    fn missing_results_is_empty() {
        let resp: SearchResponse =
            serde_json::from_str(r#"{"status_code": 7, "status_message": "Invalid API key"}"#)
                .unwrap();
        assert!(resp.results.is_empty());
    }
}
