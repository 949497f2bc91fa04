//! IGDB connector.
//!
//! IGDB is queried with APIcalypse: a plain-text body POSTed to the endpoint,
//! authenticated by a `Client-ID` header and a bearer token. Games are read in
//! `limit`/`offset` windows; the developer name is a second lookup against
//! `involved_companies`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::config::IgdbConfig;
use crate::error::ProviderError;
use crate::http::{nullable, HttpClient};
use crate::models::GameRecord;
use crate::normalize::{
    clean_genre_label, epoch_to_local_date, scale_igdb_rating, short_summary_opt, upgrade_igdb_image,
};
use crate::paginate::{PageSource, PageWindow};

const GAME_FIELDS: &str = "name, id, total_rating, total_rating_count, cover.url, platforms.name, summary, videos, \
first_release_date, involved_companies, genres.name, game_modes.name, screenshots.url, \
similar_games, status, websites.url, multiplayer_modes.*";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Named {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Image {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IgdbGame {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub total_rating: Option<f64>,
    pub total_rating_count: Option<i64>,
    pub first_release_date: Option<i64>,
    pub cover: Option<Image>,
    #[serde(default, deserialize_with = "nullable")]
    pub platforms: Vec<Named>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<Named>,
    #[serde(default, deserialize_with = "nullable")]
    pub game_modes: Vec<Named>,
    #[serde(default, deserialize_with = "nullable")]
    pub screenshots: Vec<Image>,
    #[serde(default, deserialize_with = "nullable")]
    pub websites: Vec<Image>,
    #[serde(default, deserialize_with = "nullable")]
    pub involved_companies: Vec<i64>,
    pub videos: Option<Value>,
    pub similar_games: Option<Value>,
    pub status: Option<i64>,
    pub multiplayer_modes: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct InvolvedCompany {
    company: Option<Named>,
}

#[derive(Debug, Clone)]
pub struct IgdbClient {
    http: HttpClient,
    base_url: String,
    client_id: String,
    token: String,
}

impl IgdbClient {
    pub fn new(http: HttpClient, config: &IgdbConfig, client_id: &str, token: &str) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            token: token.to_string(),
        }
    }

    async fn query<T: serde::de::DeserializeOwned>(&self, endpoint: &str, body: &str) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let headers = [
            ("Client-ID", self.client_id.clone()),
            ("Authorization", format!("Bearer {}", self.token)),
        ];
        self.http.post_text_json(&url, &headers, body).await
    }

    pub async fn games(&self, limit: usize, offset: usize) -> Result<Vec<IgdbGame>, ProviderError> {
        self.query("games", &games_query(limit, offset)).await
    }

    /// Name of the first company matching any of `involved`, if any.
    pub async fn company_name(&self, involved: &[i64]) -> Result<Option<String>, ProviderError> {
        if involved.is_empty() {
            return Ok(None);
        }
        let companies: Vec<InvolvedCompany> = self.query("involved_companies", &company_query(involved)).await?;
        Ok(companies
            .into_iter()
            .next()
            .and_then(|c| c.company)
            .and_then(|c| c.name))
    }
}

pub fn games_query(limit: usize, offset: usize) -> String {
    format!("fields {};\nlimit {};\noffset {};\n", GAME_FIELDS, limit, offset)
}

pub fn company_query(involved: &[i64]) -> String {
    let ids: Vec<String> = involved.iter().map(|id| id.to_string()).collect();
    format!("fields company.name;\nwhere id = ({});\nlimit 1;\n", ids.join(", "))
}

pub struct GamesSource<'a> {
    pub client: &'a IgdbClient,
}

#[async_trait]
impl PageSource for GamesSource<'_> {
    type Item = IgdbGame;

    async fn fetch(&mut self, window: PageWindow) -> Result<Vec<IgdbGame>, ProviderError> {
        self.client.games(window.size, window.offset).await
    }
}

fn names(items: Vec<Named>) -> Vec<String> {
    items.into_iter().filter_map(|n| n.name).collect()
}

fn urls(items: Vec<Image>) -> Vec<String> {
    items.into_iter().filter_map(|i| i.url).collect()
}

/// Project an IGDB game into a catalog record. `company` comes from the
/// separate `involved_companies` lookup. Games without an id or a name
/// yield `None`.
pub fn game_to_record(game: IgdbGame, company: Option<String>) -> Option<GameRecord> {
    let igdb_id = game.id?;
    let name = game.name.filter(|n| !n.is_empty())?;

    Some(GameRecord {
        igdb_id,
        name,
        summary: short_summary_opt(game.summary.as_deref()),
        first_release_date: game.first_release_date,
        release_date: game.first_release_date.and_then(epoch_to_local_date),
        company,
        cover_url: game.cover.and_then(|c| c.url).map(|u| upgrade_igdb_image(&u)),
        videos: game.videos,
        genres: names(game.genres).iter().map(|g| clean_genre_label(g)).collect(),
        platforms: names(game.platforms),
        game_modes: names(game.game_modes),
        screenshots: urls(game.screenshots).iter().map(|u| upgrade_igdb_image(u)).collect(),
        similar_games: game.similar_games,
        status: game.status,
        websites: urls(game.websites),
        multiplayer_modes: game.multiplayer_modes.unwrap_or_else(|| Value::Array(Vec::new())),
        total_rating: game.total_rating.map(scale_igdb_rating),
        total_rating_count: game.total_rating_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(json: serde_json::Value) -> IgdbGame {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn query_bodies() {
        let body = games_query(500, 1000);
        assert!(body.starts_with("fields name, id, total_rating"));
        assert!(body.contains("multiplayer_modes.*;"));
        assert!(body.contains("limit 500;"));
        assert!(body.contains("offset 1000;"));

        assert_eq!(
            company_query(&[11, 12]),
            "fields company.name;\nwhere id = (11, 12);\nlimit 1;\n"
        );
    }

    #[test]
    fn projects_nested_fields() {
        let record = game_to_record(
            game(serde_json::json!({
                "id": 1942,
                "name": "The Witcher 3: Wild Hunt",
                "total_rating": 92.96,
                "total_rating_count": 3100,
                "cover": {"id": 1, "url": "//images.igdb.com/igdb/image/upload/t_thumb/co1wyy.jpg"},
                "platforms": [{"id": 6, "name": "PC (Microsoft Windows)"}, {"id": 48, "name": "PlayStation 4"}],
                "genres": [{"id": 12, "name": "Role-playing (RPG)"}, {"id": 31, "name": "Adventure"}],
                "game_modes": [{"id": 1, "name": "Single player"}],
                "screenshots": [{"id": 9, "url": "//images.igdb.com/igdb/image/upload/t_thumb/sc1.jpg"}],
                "websites": [{"id": 3, "url": "https://thewitcher.com"}],
                "summary": "Geralt hunts. Ciri runs. The Wild Hunt follows.",
                "similar_games": [1877, 472],
                "videos": [7]
            })),
            Some("CD Projekt RED".into()),
        )
        .unwrap();

        assert_eq!(record.total_rating, Some(9.3));
        assert_eq!(
            record.cover_url.as_deref(),
            Some("//images.igdb.com/igdb/image/upload/t_1080p/co1wyy.jpg")
        );
        assert_eq!(record.genres, vec!["RPG", "Adventure"]);
        assert_eq!(record.platforms, vec!["PC (Microsoft Windows)", "PlayStation 4"]);
        assert_eq!(record.screenshots, vec!["//images.igdb.com/igdb/image/upload/t_1080p/sc1.jpg"]);
        assert_eq!(record.websites, vec!["https://thewitcher.com"]);
        assert_eq!(record.summary.as_deref(), Some("Geralt hunts. Ciri runs."));
        assert_eq!(record.company.as_deref(), Some("CD Projekt RED"));
        assert_eq!(record.multiplayer_modes, serde_json::json!([]));
    }

    #[test]
    fn release_date_is_derived_from_epoch() {
        let record = game_to_record(
            game(serde_json::json!({"id": 1, "name": "G", "first_release_date": 1431993600})),
            None,
        )
        .unwrap();
        assert_eq!(record.first_release_date, Some(1431993600));
        assert!(record.release_date.is_some());
    }

    #[test]
    fn missing_id_or_name_is_rejected() {
        assert!(game_to_record(game(serde_json::json!({"name": "No id"})), None).is_none());
        assert!(game_to_record(game(serde_json::json!({"id": 5})), None).is_none());
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let g = game(serde_json::json!({"id": 2, "name": "G", "genres": null, "involved_companies": null}));
        assert!(g.genres.is_empty());
        assert!(g.involved_companies.is_empty());
    }
}
