//! TMDb connector: genre lists, popular movie and TV pages, and the
//! per-title lookups (credits, details, similar) used to build links.
//!
//! Every request carries `api_key`; all but the credits lookup also carry
//! the configured `language`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;

use crate::config::TmdbConfig;
use crate::error::ProviderError;
use crate::http::{nullable, HttpClient};
use crate::models::{ActorRecord, ContentType, CrewRecord, GenreRecord, TitleRecord};
use crate::normalize::{
    is_allowed_job, parse_iso_date, select_trailer, tmdb_image, VideoCandidate, CREATOR_JOB,
    MOVIE_CREW_JOBS, TV_CREW_JOBS,
};
use crate::paginate::{PageSource, PageWindow};

const UNTITLED: &str = "Untitled";

// ═══════════════════════════════════════════════════════════════════════
// Payloads
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize, Clone)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct GenreList {
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<TmdbGenre>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(bound = "T: DeserializeOwned")]
pub struct Paged<T> {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default = "Vec::new", deserialize_with = "nullable")]
    pub results: Vec<T>,
}

/// Entry of `movie/popular` and `movie/{id}/similar`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MovieItem {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub original_language: Option<String>,
    pub adult: Option<bool>,
    pub video: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub genre_ids: Vec<i64>,
}

/// Entry of `tv/popular` and of the `similar` block of TV details.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TvItem {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub popularity: Option<f64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CastMember {
    pub id: i64,
    pub name: String,
    pub profile_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrewEntry {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub job: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Credits {
    #[serde(default, deserialize_with = "nullable")]
    pub cast: Vec<CastMember>,
    #[serde(default, deserialize_with = "nullable")]
    pub crew: Vec<CrewEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Country {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MovieDetails {
    #[serde(default, deserialize_with = "nullable")]
    pub production_countries: Vec<Country>,
    pub runtime: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Creator {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Video {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub official: bool,
    #[serde(default)]
    pub iso_639_1: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VideoList {
    #[serde(default, deserialize_with = "nullable")]
    pub results: Vec<Video>,
}

/// `tv/{id}` with `append_to_response=credits,similar,videos`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TvDetails {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub original_name: Option<String>,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub popularity: Option<f64>,
    pub original_language: Option<String>,
    pub adult: Option<bool>,
    pub number_of_seasons: Option<i64>,
    pub number_of_episodes: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub production_countries: Vec<Country>,
    #[serde(default, deserialize_with = "nullable")]
    pub episode_run_time: Vec<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub genres: Vec<TmdbGenre>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_by: Vec<Creator>,
    pub credits: Option<Credits>,
    pub similar: Option<Paged<TvItem>>,
    pub videos: Option<VideoList>,
}

// ═══════════════════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct TmdbClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    language: String,
}

impl TmdbClient {
    pub fn new(http: HttpClient, config: &TmdbConfig, api_key: &str) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            language: config.language.clone(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        localized: bool,
        extra: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut params = vec![("api_key", self.api_key.clone())];
        if localized {
            params.push(("language", self.language.clone()));
        }
        params.extend(extra.iter().cloned());
        self.http.get_json(&url, &params).await
    }

    pub async fn genres(&self, kind: ContentType) -> Result<Vec<TmdbGenre>, ProviderError> {
        let list: GenreList = self
            .get(&format!("genre/{}/list", kind.as_str()), true, &[])
            .await?;
        Ok(list.genres)
    }

    pub async fn popular_movies(&self, page: u32) -> Result<Paged<MovieItem>, ProviderError> {
        self.get("movie/popular", true, &[("page", page.to_string())]).await
    }

    pub async fn popular_tv(&self, page: u32) -> Result<Paged<TvItem>, ProviderError> {
        self.get("tv/popular", true, &[("page", page.to_string())]).await
    }

    pub async fn movie_credits(&self, tmdb_id: i64) -> Result<Credits, ProviderError> {
        self.get(&format!("movie/{}/credits", tmdb_id), false, &[]).await
    }

    pub async fn movie_details(&self, tmdb_id: i64) -> Result<MovieDetails, ProviderError> {
        self.get(&format!("movie/{}", tmdb_id), true, &[]).await
    }

    pub async fn similar_movies(&self, tmdb_id: i64) -> Result<Vec<MovieItem>, ProviderError> {
        let page: Paged<MovieItem> = self.get(&format!("movie/{}/similar", tmdb_id), true, &[]).await?;
        Ok(page.results)
    }

    pub async fn tv_details(&self, tmdb_id: i64) -> Result<TvDetails, ProviderError> {
        self.get(
            &format!("tv/{}", tmdb_id),
            true,
            &[("append_to_response", "credits,similar,videos".to_string())],
        )
        .await
    }
}

/// `movie/popular` page by page. Pages past `total_pages` read as empty.
pub struct PopularMovies<'a> {
    pub client: &'a TmdbClient,
}

#[async_trait]
impl PageSource for PopularMovies<'_> {
    type Item = MovieItem;

    async fn fetch(&mut self, window: PageWindow) -> Result<Vec<MovieItem>, ProviderError> {
        let page = self.client.popular_movies(window.page).await?;
        Ok(within_total(page))
    }
}

/// `tv/popular` page by page.
pub struct PopularTv<'a> {
    pub client: &'a TmdbClient,
}

#[async_trait]
impl PageSource for PopularTv<'_> {
    type Item = TvItem;

    async fn fetch(&mut self, window: PageWindow) -> Result<Vec<TvItem>, ProviderError> {
        let page = self.client.popular_tv(window.page).await?;
        Ok(within_total(page))
    }
}

fn within_total<T>(page: Paged<T>) -> Vec<T> {
    if page.total_pages > 0 && page.page > page.total_pages {
        Vec::new()
    } else {
        page.results
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Projections
// ═══════════════════════════════════════════════════════════════════════

pub fn genre_record(genre: &TmdbGenre) -> GenreRecord {
    GenreRecord {
        tmdb_id: genre.id,
        name: genre.name.clone(),
    }
}

/// A movie from a list endpoint. Movies without an id or a usable release
/// date are not catalogued.
pub fn movie_to_record(item: &MovieItem, image_base: &str) -> Option<TitleRecord> {
    let tmdb_id = item.id?;
    let release_date = parse_iso_date(item.release_date.as_deref())?;

    let title = item.title.clone().unwrap_or_else(|| UNTITLED.to_string());
    let mut record = TitleRecord::new(tmdb_id, ContentType::Movie, title);
    record.original_title = item.original_title.clone();
    record.overview = item.overview.clone();
    record.release_date = Some(release_date);
    record.poster_path = tmdb_image(image_base, item.poster_path.as_deref());
    record.backdrop_path = tmdb_image(image_base, item.backdrop_path.as_deref());
    record.vote_average = item.vote_average.unwrap_or(0.0);
    record.vote_count = item.vote_count.unwrap_or(0);
    record.popularity = item.popularity.unwrap_or(0.0);
    record.original_language = item.original_language.clone();
    record.adult = item.adult.unwrap_or(false);
    record.video = item.video.unwrap_or(false);
    Some(record)
}

/// A fully detailed TV show. `first_air_date` is passed in already parsed
/// so the caller decides how to report a malformed date.
pub fn tv_to_record(
    tmdb_id: i64,
    details: &TvDetails,
    first_air_date: Option<chrono::NaiveDate>,
    image_base: &str,
) -> TitleRecord {
    let title = details
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let mut record = TitleRecord::new(tmdb_id, ContentType::Tv, title);
    record.original_title = details.original_name.clone();
    record.overview = details.overview.clone();
    record.first_air_date = first_air_date;
    record.poster_path = tmdb_image(image_base, details.poster_path.as_deref());
    record.backdrop_path = tmdb_image(image_base, details.backdrop_path.as_deref());
    record.vote_average = details.vote_average.unwrap_or(0.0);
    record.vote_count = details.vote_count.unwrap_or(0);
    record.popularity = details.popularity.unwrap_or(0.0);
    record.original_language = details.original_language.clone();
    record.adult = details.adult.unwrap_or(false);
    record.number_of_seasons = details.number_of_seasons;
    record.number_of_episodes = details.number_of_episodes;
    record.country = Some(country_list(&details.production_countries));
    record.runtime = Some(details.episode_run_time.first().copied().unwrap_or(0));
    record
}

/// A "similar show" entry. Only the fields the list endpoint carries are
/// filled; a malformed air date is dropped.
pub fn tv_stub_to_record(item: &TvItem, image_base: &str) -> Option<TitleRecord> {
    let tmdb_id = item.id?;
    let title = item
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());
    let mut record = TitleRecord::new(tmdb_id, ContentType::Tv, title);
    record.original_title = item.original_name.clone();
    record.overview = item.overview.clone();
    record.first_air_date = parse_iso_date(item.first_air_date.as_deref());
    record.poster_path = tmdb_image(image_base, item.poster_path.as_deref());
    record.backdrop_path = tmdb_image(image_base, item.backdrop_path.as_deref());
    record.vote_average = item.vote_average.unwrap_or(0.0);
    record.popularity = item.popularity.unwrap_or(0.0);
    Some(record)
}

pub fn country_list(countries: &[Country]) -> String {
    countries
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The first `limit` cast members, billing order.
pub fn top_cast(credits: &Credits, limit: usize, image_base: &str) -> Vec<ActorRecord> {
    credits
        .cast
        .iter()
        .take(limit)
        .map(|c| ActorRecord {
            tmdb_id: c.id,
            name: c.name.clone(),
            profile_path: tmdb_image(image_base, c.profile_path.as_deref()),
        })
        .collect()
}

pub fn movie_crew(credits: &Credits) -> Vec<CrewRecord> {
    credits
        .crew
        .iter()
        .filter(|c| is_allowed_job(&c.job, MOVIE_CREW_JOBS))
        .map(|c| CrewRecord {
            tmdb_id: c.id,
            name: c.name.clone(),
            job: c.job.clone(),
        })
        .collect()
}

/// Creators first (job `Creator`), then allow-listed credits that are not
/// already present as a creator.
pub fn tv_crew(details: &TvDetails) -> Vec<CrewRecord> {
    let mut creators = HashSet::new();
    let mut crew = Vec::new();

    for creator in &details.created_by {
        if creators.insert(creator.id) {
            crew.push(CrewRecord {
                tmdb_id: creator.id,
                name: creator.name.clone(),
                job: CREATOR_JOB.to_string(),
            });
        }
    }

    if let Some(credits) = &details.credits {
        for entry in &credits.crew {
            if is_allowed_job(&entry.job, TV_CREW_JOBS) && !creators.contains(&entry.id) {
                crew.push(CrewRecord {
                    tmdb_id: entry.id,
                    name: entry.name.clone(),
                    job: entry.job.clone(),
                });
            }
        }
    }
    crew
}

/// `(key, name)` of the trailer to store for a show.
pub fn tv_trailer(details: &TvDetails) -> Option<(String, String)> {
    let videos = details.videos.as_ref()?;
    let candidates: Vec<VideoCandidate<'_>> = videos
        .results
        .iter()
        .map(|v| VideoCandidate {
            key: &v.key,
            name: &v.name,
            site: &v.site,
            kind: &v.kind,
            official: v.official,
            language: &v.iso_639_1,
        })
        .collect();
    select_trailer(&candidates).map(|(key, name)| (key.to_string(), name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://image.tmdb.org/t/p/original";

    fn details(json: serde_json::Value) -> TvDetails {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn movie_projection_prefixes_images() {
        let item: MovieItem = serde_json::from_value(serde_json::json!({
            "id": 550,
            "title": "Бойцовский клуб",
            "original_title": "Fight Club",
            "release_date": "1999-10-15",
            "poster_path": "/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg",
            "backdrop_path": null,
            "vote_average": 8.4,
            "vote_count": 26280,
            "genre_ids": [18]
        }))
        .unwrap();
        let record = movie_to_record(&item, BASE).unwrap();
        assert_eq!(record.tmdb_id, 550);
        assert_eq!(
            record.poster_path.as_deref(),
            Some("https://image.tmdb.org/t/p/original/pB8BM7pdSp6B6Ih7QZ4DrQ3PmJK.jpg")
        );
        assert_eq!(record.backdrop_path, None);
        assert_eq!(record.release_date.map(crate::normalize::format_date).as_deref(), Some("1999-10-15"));
    }

    #[test]
    fn movie_without_release_date_is_not_catalogued() {
        let mut item = MovieItem {
            id: Some(1),
            title: Some("No date".into()),
            ..Default::default()
        };
        assert!(movie_to_record(&item, BASE).is_none());
        item.release_date = Some(String::new());
        assert!(movie_to_record(&item, BASE).is_none());
        item.release_date = Some("2001-02-03".into());
        assert!(movie_to_record(&item, BASE).is_some());
    }

    #[test]
    fn movie_crew_keeps_allow_list_only() {
        let credits: Credits = serde_json::from_value(serde_json::json!({
            "cast": [],
            "crew": [
                {"id": 1, "name": "David Fincher", "job": "Director"},
                {"id": 2, "name": "Jim Uhls", "job": "Screenplay"},
                {"id": 3, "name": "Someone", "job": "Editor"},
                {"id": 4, "name": "Art Linson", "job": "Producer"},
                {"id": 5, "name": "Exec", "job": "Executive Producer"}
            ]
        }))
        .unwrap();
        let jobs: Vec<String> = movie_crew(&credits).into_iter().map(|c| c.job).collect();
        assert_eq!(jobs, vec!["Director", "Screenplay", "Producer"]);
    }

    #[test]
    fn tv_crew_does_not_duplicate_creators() {
        let d = details(serde_json::json!({
            "created_by": [{"id": 10, "name": "Vince Gilligan"}],
            "credits": {
                "cast": [],
                "crew": [
                    {"id": 10, "name": "Vince Gilligan", "job": "Executive Producer"},
                    {"id": 11, "name": "Mark Johnson", "job": "Executive Producer"},
                    {"id": 12, "name": "Grip", "job": "Key Grip"}
                ]
            }
        }));
        let crew = tv_crew(&d);
        assert_eq!(crew.len(), 2);
        assert_eq!((crew[0].tmdb_id, crew[0].job.as_str()), (10, "Creator"));
        assert_eq!((crew[1].tmdb_id, crew[1].job.as_str()), (11, "Executive Producer"));
    }

    #[test]
    fn tv_projection_uses_first_episode_runtime() {
        let d = details(serde_json::json!({
            "name": "Во все тяжкие",
            "episode_run_time": [47, 45],
            "production_countries": [{"name": "United States of America"}, {"name": "Canada"}],
            "number_of_seasons": 5
        }));
        let record = tv_to_record(1396, &d, None, BASE);
        assert_eq!(record.runtime, Some(47));
        assert_eq!(record.country.as_deref(), Some("United States of America, Canada"));
        assert_eq!(record.number_of_seasons, Some(5));

        let record = tv_to_record(1396, &details(serde_json::json!({})), None, BASE);
        assert_eq!(record.runtime, Some(0));
        assert_eq!(record.title, UNTITLED);
    }

    #[test]
    fn cast_is_capped_and_profiles_are_full_urls() {
        let cast: Vec<serde_json::Value> = (0..20)
            .map(|i| serde_json::json!({"id": i, "name": format!("Actor {}", i), "profile_path": "/p.jpg"}))
            .collect();
        let credits: Credits = serde_json::from_value(serde_json::json!({ "cast": cast })).unwrap();
        let cast = top_cast(&credits, 15, BASE);
        assert_eq!(cast.len(), 15);
        assert_eq!(cast[0].profile_path.as_deref(), Some("https://image.tmdb.org/t/p/original/p.jpg"));
    }

    #[test]
    fn trailer_from_videos_block() {
        let d = details(serde_json::json!({
            "videos": {"results": [
                {"key": "teaser", "name": "Teaser", "site": "YouTube", "type": "Teaser", "official": true, "iso_639_1": "en"},
                {"key": "fan", "name": "Fan trailer", "site": "YouTube", "type": "Trailer", "official": false, "iso_639_1": "en"},
                {"key": "off", "name": "Official Trailer", "site": "YouTube", "type": "Trailer", "official": true, "iso_639_1": "en"}
            ]}
        }));
        assert_eq!(tv_trailer(&d), Some(("off".to_string(), "Official Trailer".to_string())));
        assert_eq!(tv_trailer(&details(serde_json::json!({}))), None);
    }

    #[test]
    fn pages_past_total_are_empty() {
        let page: Paged<TvItem> = serde_json::from_value(serde_json::json!({
            "page": 3, "total_pages": 2, "results": [{"id": 1}]
        }))
        .unwrap();
        assert!(within_total(page).is_empty());
    }
}
