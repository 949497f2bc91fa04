//! YouTube Data API search, used to find a trailer by title.

use serde::Deserialize;

use crate::config::YoutubeConfig;
use crate::error::ProviderError;
use crate::http::{nullable, HttpClient};

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default, deserialize_with = "nullable")]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
struct SearchId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerHit {
    pub video_id: String,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct YoutubeClient {
    http: HttpClient,
    search_url: String,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(http: HttpClient, config: &YoutubeConfig, api_key: &str) -> Self {
        Self {
            http,
            search_url: format!("{}/search", config.base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        }
    }

    /// Top embeddable video for `"{name} official trailer"`, if any.
    pub async fn search_trailer(&self, name: &str) -> Result<Option<TrailerHit>, ProviderError> {
        let params = [
            ("part", "snippet".to_string()),
            ("q", trailer_query(name)),
            ("key", self.api_key.clone()),
            ("maxResults", "1".to_string()),
            ("type", "video".to_string()),
            ("videoEmbeddable", "true".to_string()),
        ];
        let response: SearchResponse = self.http.get_json(&self.search_url, &params).await?;
        Ok(first_hit(response))
    }
}

pub fn trailer_query(name: &str) -> String {
    format!("{} official trailer", name)
}

fn first_hit(response: SearchResponse) -> Option<TrailerHit> {
    let item = response.items.into_iter().next()?;
    let video_id = item.id.video_id.filter(|id| !id.is_empty())?;
    Some(TrailerHit {
        video_id,
        title: item.snippet.and_then(|s| s.title).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_video() {
        let response: SearchResponse = serde_json::from_value(serde_json::json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "c0i88t0Kacs"}, "snippet": {"title": "The Witcher 3 Trailer"}},
                {"id": {"kind": "youtube#video", "videoId": "other"}, "snippet": {"title": "Other"}}
            ]
        }))
        .unwrap();
        assert_eq!(
            first_hit(response),
            Some(TrailerHit {
                video_id: "c0i88t0Kacs".into(),
                title: "The Witcher 3 Trailer".into()
            })
        );
    }

    #[test]
    fn empty_search_has_no_hit() {
        let response: SearchResponse = serde_json::from_value(serde_json::json!({"items": []})).unwrap();
        assert_eq!(first_hit(response), None);

        let channel_only: SearchResponse = serde_json::from_value(serde_json::json!({
            "items": [{"id": {"kind": "youtube#channel", "channelId": "UC"}}]
        }))
        .unwrap();
        assert_eq!(first_hit(channel_only), None);
    }

    #[test]
    fn query_suffix() {
        assert_eq!(trailer_query("Dune"), "Dune official trailer");
    }
}
