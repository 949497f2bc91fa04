//! Configuration parsing and validation.
//!
//! The catalog is configured through a TOML file. Only `[db]` is required;
//! every provider section falls back to the public API endpoints and the
//! batch sizes the ingestion commands have always used.
//!
//! ```toml
//! [db]
//! path = "./data/mgb.sqlite"
//!
//! [http]
//! timeout_secs = 30
//! max_retries = 2
//!
//! [providers.tmdb]
//! language = "en-US"
//! movie_pages = 20
//! ```
//!
//! API keys are never stored in the file. Each provider section names the
//! environment variable holding its secret, and [`Credentials::from_env`]
//! resolves them once so clients receive them explicitly at construction.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ProviderError;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra attempts for 429/5xx/transport failures. Zero fails on the first error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_user_agent() -> String {
    format!("mgb-catalog/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub google_books: GoogleBooksConfig,
    #[serde(default)]
    pub igdb: IgdbConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
    #[serde(default)]
    pub youtube: YoutubeConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleBooksConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub total_books: usize,
    /// Google caps `maxResults` at 40.
    pub page_size: usize,
    pub seed_subjects: Vec<String>,
    pub skip_categories: Vec<String>,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            total_books: 10_000,
            page_size: 40,
            seed_subjects: [
                "Art",
                "Biography",
                "Business",
                "Children",
                "Comics",
                "Cooking",
                "Health",
                "History",
                "Literature",
                "Mathematics",
                "Music",
                "Philosophy",
                "Poetry",
                "Religion",
                "Science",
                "Self-Help",
                "Sports",
                "Technology",
                "Travel",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skip_categories: vec![
                "Beard".to_string(),
                "Children".to_string(),
                "Literature".to_string(),
            ],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IgdbConfig {
    pub base_url: String,
    pub client_id_env: String,
    pub token_env: String,
    pub batch_size: usize,
    pub max_games: usize,
}

impl Default for IgdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.igdb.com/v4".to_string(),
            client_id_env: "CLIENT_ID".to_string(),
            token_env: "AUTHORIZATION_GAMES_TOKEN".to_string(),
            batch_size: 500,
            max_games: 10_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TmdbConfig {
    pub base_url: String,
    pub image_base_url: String,
    pub api_key_env: String,
    pub language: String,
    pub movie_pages: u32,
    pub max_movies: usize,
    pub page_delay_ms: u64,
    pub tv_pages: u32,
    pub tv_item_delay_ms: u64,
    pub cast_limit_movie: usize,
    pub cast_limit_tv: usize,
    pub similar_limit: usize,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/original".to_string(),
            api_key_env: "TMDB_API_KEY".to_string(),
            language: "ru-RU".to_string(),
            movie_pages: 500,
            max_movies: 10_000,
            page_delay_ms: 1000,
            tv_pages: 50,
            tv_item_delay_ms: 300,
            cast_limit_movie: 10,
            cast_limit_tv: 15,
            similar_limit: 5,
        }
    }
}

impl TmdbConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn tv_item_delay(&self) -> Duration {
        Duration::from_millis(self.tv_item_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct YoutubeConfig {
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
        }
    }
}

/// Provider secrets resolved from the environment.
///
/// A missing secret is only an error once a pipeline actually needs it, so
/// `mgb sources` can report partial configuration.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    google_books_key: Secret,
    igdb_client_id: Secret,
    igdb_token: Secret,
    tmdb_key: Secret,
    youtube_key: Secret,
}

#[derive(Debug, Clone, Default)]
struct Secret {
    env: String,
    value: Option<String>,
}

impl Secret {
    fn from_env(var: &str) -> Self {
        Self {
            env: var.to_string(),
            value: std::env::var(var).ok().filter(|v| !v.trim().is_empty()),
        }
    }

    fn given(value: &str) -> Self {
        Self {
            env: String::new(),
            value: Some(value.to_string()),
        }
    }

    fn get(&self) -> Result<&str, ProviderError> {
        self.value
            .as_deref()
            .ok_or_else(|| ProviderError::MissingCredential(self.env.clone()))
    }
}

impl Credentials {
    pub fn from_env(providers: &ProvidersConfig) -> Self {
        Self {
            google_books_key: Secret::from_env(&providers.google_books.api_key_env),
            igdb_client_id: Secret::from_env(&providers.igdb.client_id_env),
            igdb_token: Secret::from_env(&providers.igdb.token_env),
            tmdb_key: Secret::from_env(&providers.tmdb.api_key_env),
            youtube_key: Secret::from_env(&providers.youtube.api_key_env),
        }
    }

    /// Credentials with the same placeholder for every provider.
    pub fn uniform(value: &str) -> Self {
        Self {
            google_books_key: Secret::given(value),
            igdb_client_id: Secret::given(value),
            igdb_token: Secret::given(value),
            tmdb_key: Secret::given(value),
            youtube_key: Secret::given(value),
        }
    }

    pub fn google_books_key(&self) -> Result<&str, ProviderError> {
        self.google_books_key.get()
    }

    pub fn igdb(&self) -> Result<(&str, &str), ProviderError> {
        Ok((self.igdb_client_id.get()?, self.igdb_token.get()?))
    }

    pub fn tmdb_key(&self) -> Result<&str, ProviderError> {
        self.tmdb_key.get()
    }

    pub fn youtube_key(&self) -> Result<&str, ProviderError> {
        self.youtube_key.get()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.http.timeout_secs == 0 {
        anyhow::bail!("http.timeout_secs must be > 0");
    }

    let books = &config.providers.google_books;
    if books.page_size == 0 || books.page_size > 40 {
        anyhow::bail!("providers.google_books.page_size must be in [1, 40]");
    }

    let igdb = &config.providers.igdb;
    if igdb.batch_size == 0 || igdb.batch_size > 500 {
        anyhow::bail!("providers.igdb.batch_size must be in [1, 500]");
    }

    let tmdb = &config.providers.tmdb;
    if tmdb.movie_pages == 0 || tmdb.tv_pages == 0 {
        anyhow::bail!("providers.tmdb page counts must be > 0");
    }
    if tmdb.language.trim().is_empty() {
        anyhow::bail!("providers.tmdb.language must not be empty");
    }

    Ok(())
}
