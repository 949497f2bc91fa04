//! Catalog records produced by the connectors and written by the store.
//!
//! Each record is the flat, provider-independent shape of one catalog row.
//! Connectors build them from provider payloads; [`crate::store`] persists
//! them keyed by their external id.

use chrono::NaiveDate;
use serde_json::Value;

/// Discriminator between the two kinds of TMDb title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Movie,
    Tv,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Tv => "tv",
        }
    }
}

/// A game as normalized from IGDB.
#[derive(Debug, Clone, Default)]
pub struct GameRecord {
    pub igdb_id: i64,
    pub name: String,
    pub summary: Option<String>,
    /// Epoch seconds as given by IGDB.
    pub first_release_date: Option<i64>,
    pub release_date: Option<NaiveDate>,
    pub company: Option<String>,
    pub cover_url: Option<String>,
    pub videos: Option<Value>,
    pub genres: Vec<String>,
    pub platforms: Vec<String>,
    pub game_modes: Vec<String>,
    pub screenshots: Vec<String>,
    pub similar_games: Option<Value>,
    pub status: Option<i64>,
    pub websites: Vec<String>,
    pub multiplayer_modes: Value,
    /// 0-10 scale.
    pub total_rating: Option<f64>,
    pub total_rating_count: Option<i64>,
}

/// A movie or TV show as normalized from TMDb.
///
/// `country`, `runtime`, `number_of_seasons` and `number_of_episodes` come
/// from detail lookups; `None` leaves a stored value untouched.
#[derive(Debug, Clone)]
pub struct TitleRecord {
    pub tmdb_id: i64,
    pub content_type: ContentType,
    pub title: String,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub first_air_date: Option<NaiveDate>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: f64,
    pub vote_count: i64,
    pub popularity: f64,
    pub original_language: Option<String>,
    pub adult: bool,
    pub video: bool,
    pub country: Option<String>,
    pub runtime: Option<i64>,
    pub number_of_seasons: Option<i64>,
    pub number_of_episodes: Option<i64>,
}

impl TitleRecord {
    pub fn new(tmdb_id: i64, content_type: ContentType, title: String) -> Self {
        Self {
            tmdb_id,
            content_type,
            title,
            original_title: None,
            overview: None,
            release_date: None,
            first_air_date: None,
            poster_path: None,
            backdrop_path: None,
            vote_average: 0.0,
            vote_count: 0,
            popularity: 0.0,
            original_language: None,
            adult: false,
            video: false,
            country: None,
            runtime: None,
            number_of_seasons: None,
            number_of_episodes: None,
        }
    }
}

/// A book as normalized from a Google Books volume.
#[derive(Debug, Clone, Default)]
pub struct BookRecord {
    pub google_id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// Free text: Google returns `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
    pub published_date: Option<String>,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<i64>,
    pub thumbnail: Option<String>,
    pub language: Option<String>,
    pub isbn_13: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreRecord {
    pub tmdb_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorRecord {
    pub tmdb_id: i64,
    pub name: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewRecord {
    pub tmdb_id: i64,
    pub name: String,
    pub job: String,
}

/// Result of an upsert: the local row id and whether the row is new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: i64,
    pub created: bool,
}

/// What happened to one item handed to a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Created,
    Updated,
    Skipped,
}

impl From<Upserted> for ItemOutcome {
    fn from(u: Upserted) -> Self {
        if u.created {
            ItemOutcome::Created
        } else {
            ItemOutcome::Updated
        }
    }
}
