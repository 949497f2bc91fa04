//! Google Books connector.
//!
//! Searches the volumes API by subject. A sync first discovers the set of
//! categories reachable from a list of seed subjects, then pages through
//! each category with `startIndex`.
//!
//! # Configuration
//!
//! ```toml
//! [providers.google_books]
//! api_key_env = "GOOGLE_API_KEY"
//! total_books = 10000
//! skip_categories = ["Beard", "Children", "Literature"]
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

use crate::config::GoogleBooksConfig;
use crate::error::ProviderError;
use crate::http::{nullable, HttpClient};
use crate::models::BookRecord;
use crate::normalize::short_summary_opt;
use crate::paginate::{PageSource, PageWindow};

#[derive(Debug, Deserialize, Default)]
pub struct VolumesResponse {
    #[serde(default, deserialize_with = "nullable")]
    pub items: Vec<Volume>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Volume {
    pub id: Option<String>,
    #[serde(rename = "volumeInfo", default, deserialize_with = "nullable")]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub authors: Vec<String>,
    pub published_date: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub categories: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
    pub image_links: Option<ImageLinks>,
    pub language: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Clone)]
pub struct GoogleBooksClient {
    http: HttpClient,
    volumes_url: String,
    api_key: String,
}

impl GoogleBooksClient {
    pub fn new(http: HttpClient, config: &GoogleBooksConfig, api_key: &str) -> Self {
        Self {
            http,
            volumes_url: format!("{}/volumes", config.base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    /// `GET /volumes?q=subject:<subject>`
    pub async fn search_subject(
        &self,
        subject: &str,
        start_index: usize,
        max_results: usize,
    ) -> Result<Vec<Volume>, ProviderError> {
        let params = [
            ("q", format!("subject:{}", subject)),
            ("startIndex", start_index.to_string()),
            ("maxResults", max_results.to_string()),
            ("key", self.api_key.clone()),
        ];
        let response: VolumesResponse = self.http.get_json(&self.volumes_url, &params).await?;
        Ok(response.items)
    }

    /// Distinct categories found under the seed subjects, sorted, with the
    /// configured skip list removed. A failing seed is logged and skipped;
    /// when every seed fails the last error is returned.
    pub async fn discover_categories(&self, config: &GoogleBooksConfig) -> Result<Vec<String>, ProviderError> {
        let mut categories = BTreeSet::new();
        let mut answered = false;
        let mut last_error = None;
        for subject in &config.seed_subjects {
            match self.search_subject(subject, 0, config.page_size).await {
                Ok(volumes) => {
                    answered = true;
                    for volume in volumes {
                        categories.extend(volume.volume_info.categories);
                    }
                }
                Err(e) => {
                    warn!(subject = %subject, error = %e, "category discovery failed");
                    last_error = Some(e);
                }
            }
        }
        if let (false, Some(e)) = (answered, last_error) {
            return Err(e);
        }
        Ok(categories
            .into_iter()
            .filter(|c| !config.skip_categories.contains(c))
            .collect())
    }
}

/// One category, read page by page.
pub struct CategorySource<'a> {
    pub client: &'a GoogleBooksClient,
    pub category: String,
}

#[async_trait]
impl PageSource for CategorySource<'_> {
    type Item = Volume;

    async fn fetch(&mut self, window: PageWindow) -> Result<Vec<Volume>, ProviderError> {
        self.client
            .search_subject(&self.category, window.offset, window.size)
            .await
    }
}

/// The first `ISBN_13` industry identifier, verbatim.
pub fn isbn_13(identifiers: &[IndustryIdentifier]) -> Option<String> {
    identifiers
        .iter()
        .find(|i| i.kind == "ISBN_13")
        .map(|i| i.identifier.clone())
}

/// Project a volume into a catalog record. Volumes without an id or a
/// title cannot be stored and yield `None`.
pub fn volume_to_record(volume: Volume) -> Option<BookRecord> {
    let google_id = volume.id.filter(|id| !id.is_empty())?;
    let info = volume.volume_info;
    let title = info.title.filter(|t| !t.trim().is_empty())?;

    Some(BookRecord {
        google_id,
        title,
        isbn_13: isbn_13(&info.industry_identifiers),
        description: short_summary_opt(info.description.as_deref()),
        authors: info.authors,
        published_date: info.published_date,
        categories: info.categories,
        average_rating: info.average_rating,
        ratings_count: info.ratings_count,
        thumbnail: info.image_links.and_then(|l| l.thumbnail),
        language: info.language,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(json: serde_json::Value) -> Volume {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn isbn_13_is_copied_exactly() {
        let record = volume_to_record(volume(serde_json::json!({
            "id": "abc123",
            "volumeInfo": {
                "title": "A Book",
                "industryIdentifiers": [
                    {"type": "ISBN_10", "identifier": "0000000000"},
                    {"type": "ISBN_13", "identifier": "9780000000002"}
                ]
            }
        })))
        .unwrap();
        assert_eq!(record.isbn_13.as_deref(), Some("9780000000002"));
    }

    #[test]
    fn missing_isbn_13_is_none() {
        let record = volume_to_record(volume(serde_json::json!({
            "id": "abc123",
            "volumeInfo": {
                "title": "A Book",
                "industryIdentifiers": [{"type": "OTHER", "identifier": "UOM:39015"}]
            }
        })))
        .unwrap();
        assert_eq!(record.isbn_13, None);
    }

    #[test]
    fn full_volume_projection() {
        let record = volume_to_record(volume(serde_json::json!({
            "id": "zyTCAlFPjgYC",
            "volumeInfo": {
                "title": "The Google Story",
                "authors": ["David A. Vise", "Mark Malseed"],
                "publishedDate": "2005-11-15",
                "description": "One. Two. Three. Four.",
                "categories": ["Business & Economics"],
                "averageRating": 3.5,
                "ratingsCount": 136,
                "imageLinks": {"thumbnail": "http://books.google.com/t.jpg"},
                "language": "en"
            }
        })))
        .unwrap();
        assert_eq!(record.google_id, "zyTCAlFPjgYC");
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.description.as_deref(), Some("One. Two."));
        assert_eq!(record.published_date.as_deref(), Some("2005-11-15"));
        assert_eq!(record.thumbnail.as_deref(), Some("http://books.google.com/t.jpg"));
        assert_eq!(record.ratings_count, Some(136));
    }

    #[test]
    fn volumes_without_id_or_title_are_rejected() {
        assert!(volume_to_record(volume(serde_json::json!({"volumeInfo": {"title": "x"}}))).is_none());
        assert!(volume_to_record(volume(serde_json::json!({"id": "x", "volumeInfo": {}}))).is_none());
        assert!(volume_to_record(volume(serde_json::json!({"id": "x"}))).is_none());
    }

    #[test]
    fn response_without_items_is_empty() {
        let response: VolumesResponse =
            serde_json::from_str(r#"{"kind": "books#volumes", "totalItems": 0}"#).unwrap();
        assert!(response.items.is_empty());
    }
}
