//! Ingestion pipeline orchestration.
//!
//! Each source is a [`PageSource`] from its connector feeding an
//! [`ItemSink`] that normalizes, upserts and links. Runs are sequential: one
//! page, one item, one write at a time. Nothing is rolled back when a run
//! stops early; a rerun reconciles through the idempotent upserts.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::config::{Config, Credentials, TmdbConfig};
use crate::connector_books::{self, CategorySource, GoogleBooksClient, Volume};
use crate::connector_igdb::{self, GamesSource, IgdbClient, IgdbGame};
use crate::connector_tmdb::{self, MovieItem, PopularMovies, PopularTv, TmdbClient, TvItem};
use crate::connector_youtube::{TrailerHit, YoutubeClient};
use crate::db;
use crate::error::ProviderError;
use crate::http::HttpClient;
use crate::models::{ContentType, ItemOutcome};
use crate::normalize::parse_iso_date;
use crate::paginate::{self, ItemSink, PageReport, PageState, Pagination};
use crate::progress::{SyncProgressEvent, SyncProgressReporter};
use crate::store::{self, Link};

/// Sources accepted by `mgb sync`.
pub const SOURCES: &[&str] = &["books", "games", "movies", "tv", "trailers"];

/// TMDb list endpoints return a fixed 20 results per page.
const TMDB_PAGE_SIZE: usize = 20;

/// Command-line overrides for a sync run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Stop after this many stored items (or this many trailer lookups).
    pub limit: Option<usize>,
    pub pages: Option<u32>,
    pub start_page: Option<u32>,
}

/// Counters printed at the end of a run.
#[derive(Debug, Default)]
pub struct SyncSummary {
    pub source: String,
    pub pages: u32,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub links_skipped: usize,
    /// Book categories whose paging failed.
    pub categories_aborted: usize,
    /// The provider failure that ended the run, if any.
    pub aborted: Option<String>,
}

impl SyncSummary {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    pub fn stored(&self) -> usize {
        self.created + self.updated
    }

    /// Why the run counts as failed: an abort, or book categories that
    /// could not be read to the end.
    pub fn failure(&self) -> Option<String> {
        match (&self.aborted, self.categories_aborted) {
            (Some(error), _) => Some(error.clone()),
            (None, 0) => None,
            (None, n) => Some(format!("{} book categories aborted", n)),
        }
    }

    fn absorb(&mut self, report: &PageReport) {
        self.pages += report.pages_fetched;
        self.created += report.created;
        self.updated += report.updated;
        self.skipped += report.skipped;
    }

    pub fn print(&self) {
        println!("sync {}", self.source);
        println!("  fetched: {} items", self.stored() + self.skipped);
        println!("  pages: {}", self.pages);
        println!("  created: {}", self.created);
        println!("  updated: {}", self.updated);
        println!("  skipped: {}", self.skipped);
        if self.links_skipped > 0 {
            println!("  links skipped: {}", self.links_skipped);
        }
        if self.categories_aborted > 0 {
            println!("  categories aborted: {}", self.categories_aborted);
        }
        match self.failure() {
            Some(error) => println!("  aborted: {}", error),
            None => println!("ok"),
        }
    }
}

/// Counters of a trailer pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TrailerSummary {
    pub games_found: usize,
    pub games_missing: usize,
    pub titles_found: usize,
    pub titles_missing: usize,
}

impl TrailerSummary {
    pub fn print(&self) {
        println!("sync trailers");
        println!("  games updated: {}", self.games_found);
        println!("  games without trailer: {}", self.games_missing);
        println!("  titles updated: {}", self.titles_found);
        println!("  titles without trailer: {}", self.titles_missing);
        println!("ok");
    }
}

/// `mgb sync <source>`: connect, run one pipeline, print its summary.
///
/// A provider failure that ends a run early, or a book category that could
/// not be read to the end, is printed, then returned as an error so the
/// process exits non-zero. Items stored before it stay stored.
pub async fn run_sync(
    config: &Config,
    source: &str,
    options: SyncOptions,
    progress: &dyn SyncProgressReporter,
) -> Result<()> {
    if !SOURCES.contains(&source) {
        bail!(
            "Unknown source: '{}'. Available: {}",
            source,
            SOURCES.join(", ")
        );
    }

    let pool = db::connect(config).await?;
    let credentials = Credentials::from_env(&config.providers);
    let http = HttpClient::new(&config.http)?;
    let ingest = Ingest {
        pool: &pool,
        config,
        http,
        credentials: &credentials,
        progress,
    };

    let result = if source == "trailers" {
        ingest.trailers(options).await.map(|s| {
            s.print();
            None
        })
    } else {
        let summary = match source {
            "books" => ingest.books(options).await,
            "games" => ingest.games(options).await,
            "movies" => ingest.movies(options).await,
            _ => ingest.tv(options).await,
        };
        summary.map(|s| {
            s.print();
            s.failure()
        })
    };

    pool.close().await;
    if let Some(error) = result? {
        bail!("sync {} stopped early: {}", source, error);
    }
    Ok(())
}

/// Everything a pipeline needs, passed in explicitly.
pub struct Ingest<'a> {
    pub pool: &'a SqlitePool,
    pub config: &'a Config,
    pub http: HttpClient,
    pub credentials: &'a Credentials,
    pub progress: &'a dyn SyncProgressReporter,
}

impl Ingest<'_> {
    // ═══════════════════════════════════════════════════════════════════
    // Books
    // ═══════════════════════════════════════════════════════════════════

    pub async fn books(&self, options: SyncOptions) -> Result<SyncSummary> {
        if options.start_page.is_some() {
            bail!("--start-page does not apply to books; every category is read from its first page");
        }
        let books = &self.config.providers.google_books;
        let client = GoogleBooksClient::new(self.http.clone(), books, self.credentials.google_books_key()?);
        let total = options.limit.unwrap_or(books.total_books);
        let mut summary = SyncSummary::new("books");

        self.progress.report(SyncProgressEvent::Discovering {
            source: "books".into(),
        });
        let categories = match client.discover_categories(books).await {
            Ok(categories) => categories,
            Err(e) => {
                warn!(error = %e, "category discovery failed for every seed subject");
                summary.aborted = Some(format!("category discovery: {}", e));
                return Ok(summary);
            }
        };
        info!(count = categories.len(), "discovered book categories");

        let mut sink = BookSink {
            pool: self.pool,
            progress: self.progress,
            stored: 0,
            total: total as u64,
        };

        for category in categories {
            let remaining = total.saturating_sub(summary.stored());
            if remaining == 0 {
                break;
            }
            info!(category = %category, "syncing book category");

            let mut pagination = Pagination::new(books.page_size);
            pagination.item_cap = Some(remaining);
            pagination.max_pages = Some(options.pages.unwrap_or_else(|| pages_for(total, books.page_size)));
            let mut source = CategorySource {
                client: &client,
                category: category.clone(),
            };

            let report = paginate::drive(&pagination, &mut source, &mut sink).await?;
            summary.absorb(&report);
            if let PageState::Aborted { page, error } = &report.state {
                warn!(category = %category, page, error = %error, "book category aborted");
                summary.categories_aborted += 1;
            }
        }

        Ok(summary)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Games
    // ═══════════════════════════════════════════════════════════════════

    pub async fn games(&self, options: SyncOptions) -> Result<SyncSummary> {
        let igdb = &self.config.providers.igdb;
        let (client_id, token) = self.credentials.igdb()?;
        let client = IgdbClient::new(self.http.clone(), igdb, client_id, token);
        let cap = options.limit.unwrap_or(igdb.max_games);

        let mut pagination = Pagination::new(igdb.batch_size);
        pagination.start_page = options.start_page.unwrap_or(1);
        pagination.item_cap = Some(cap);
        pagination.max_pages = Some(options.pages.unwrap_or_else(|| pages_for(cap, igdb.batch_size)));

        let mut source = GamesSource { client: &client };
        let mut sink = GameSink {
            pool: self.pool,
            client: &client,
            progress: self.progress,
            stored: 0,
            total: cap as u64,
        };

        let report = paginate::drive(&pagination, &mut source, &mut sink).await?;
        Ok(finish("games", &report, 0))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Movies
    // ═══════════════════════════════════════════════════════════════════

    pub async fn movies(&self, options: SyncOptions) -> Result<SyncSummary> {
        let tmdb = &self.config.providers.tmdb;
        let client = TmdbClient::new(self.http.clone(), tmdb, self.credentials.tmdb_key()?);
        self.refresh_genres(&client, ContentType::Movie).await?;

        let cap = options.limit.unwrap_or(tmdb.max_movies);
        let mut pagination = Pagination::new(TMDB_PAGE_SIZE);
        pagination.start_page = options.start_page.unwrap_or(1);
        pagination.max_pages = Some(options.pages.unwrap_or(tmdb.movie_pages));
        pagination.item_cap = Some(cap);
        pagination.delay = tmdb.page_delay();

        let mut source = PopularMovies { client: &client };
        let mut sink = MovieSink {
            pool: self.pool,
            client: &client,
            config: tmdb,
            progress: self.progress,
            stored: 0,
            total: cap as u64,
            links_skipped: 0,
        };

        let report = paginate::drive(&pagination, &mut source, &mut sink).await?;
        Ok(finish("movies", &report, sink.links_skipped))
    }

    // ═══════════════════════════════════════════════════════════════════
    // TV
    // ═══════════════════════════════════════════════════════════════════

    pub async fn tv(&self, options: SyncOptions) -> Result<SyncSummary> {
        let tmdb = &self.config.providers.tmdb;
        let client = TmdbClient::new(self.http.clone(), tmdb, self.credentials.tmdb_key()?);
        self.refresh_genres(&client, ContentType::Tv).await?;

        let mut pagination = Pagination::new(TMDB_PAGE_SIZE);
        pagination.start_page = options.start_page.unwrap_or(1);
        pagination.max_pages = Some(options.pages.unwrap_or(tmdb.tv_pages));
        pagination.item_cap = options.limit;

        let mut source = PopularTv { client: &client };
        let mut sink = TvSink {
            pool: self.pool,
            client: &client,
            config: tmdb,
            progress: self.progress,
            stored: 0,
            total: options.limit.map(|l| l as u64),
            links_skipped: 0,
        };

        let report = paginate::drive(&pagination, &mut source, &mut sink).await?;
        Ok(finish("tv", &report, sink.links_skipped))
    }

    /// Upsert the provider's genre list. A failed lookup leaves the local
    /// table as it is; titles then skip links to unknown genres.
    async fn refresh_genres(&self, client: &TmdbClient, kind: ContentType) -> Result<()> {
        match client.genres(kind).await {
            Ok(genres) => {
                for genre in &genres {
                    store::upsert_genre(self.pool, &connector_tmdb::genre_record(genre)).await?;
                }
                info!(kind = kind.as_str(), count = genres.len(), "genres refreshed");
            }
            Err(e) => warn!(kind = kind.as_str(), error = %e, "could not refresh genres"),
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Trailers
    // ═══════════════════════════════════════════════════════════════════

    /// Search a trailer for every game, then every title, that has none.
    /// `limit` bounds each of the two lists.
    pub async fn trailers(&self, options: SyncOptions) -> Result<TrailerSummary> {
        let client = YoutubeClient::new(
            self.http.clone(),
            &self.config.providers.youtube,
            self.credentials.youtube_key()?,
        );
        let mut summary = TrailerSummary::default();

        let games = store::games_missing_trailer(self.pool, options.limit).await?;
        info!(count = games.len(), "games without trailer");
        for (id, name) in games {
            match search(&client, &name).await? {
                Some(hit) => {
                    store::set_game_trailer(self.pool, id, &hit.video_id).await?;
                    summary.games_found += 1;
                }
                None => {
                    warn!(game = %name, "no trailer found");
                    summary.games_missing += 1;
                }
            }
        }

        let titles = store::titles_missing_trailer(self.pool, options.limit).await?;
        info!(count = titles.len(), "titles without trailer");
        for (id, title) in titles {
            match search(&client, &title).await? {
                Some(hit) => {
                    store::set_title_trailer(self.pool, id, &hit.video_id, Some(&hit.title)).await?;
                    summary.titles_found += 1;
                }
                None => {
                    warn!(title = %title, "no trailer found");
                    summary.titles_missing += 1;
                }
            }
        }

        Ok(summary)
    }
}

async fn search(client: &YoutubeClient, name: &str) -> Result<Option<TrailerHit>> {
    client
        .search_trailer(name)
        .await
        .with_context(|| format!("trailer search failed for '{}'", name))
}

fn pages_for(items: usize, page_size: usize) -> u32 {
    items.div_ceil(page_size.max(1)) as u32
}

fn finish(source: &str, report: &PageReport, links_skipped: usize) -> SyncSummary {
    let mut summary = SyncSummary::new(source);
    summary.absorb(report);
    summary.links_skipped = links_skipped;
    if let PageState::Aborted { page, error } = &report.state {
        warn!(source, page, error = %error, "sync aborted");
        summary.aborted = Some(format!("page {}: {}", page, error));
    }
    summary
}

fn report_stored(
    progress: &dyn SyncProgressReporter,
    source: &str,
    outcome: ItemOutcome,
    stored: &mut u64,
    total: Option<u64>,
) {
    if outcome != ItemOutcome::Skipped {
        *stored += 1;
        progress.report(SyncProgressEvent::Ingesting {
            source: source.to_string(),
            n: *stored,
            total,
        });
    }
}

/// Log an enrichment lookup that failed; the item itself is kept.
fn enrichment<T>(result: Result<T, ProviderError>, what: &str, tmdb_id: i64) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(tmdb_id, error = %e, "{} lookup failed", what);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Sinks
// ═══════════════════════════════════════════════════════════════════════

struct BookSink<'a> {
    pool: &'a SqlitePool,
    progress: &'a dyn SyncProgressReporter,
    stored: u64,
    total: u64,
}

#[async_trait]
impl ItemSink<Volume> for BookSink<'_> {
    async fn accept(&mut self, volume: Volume) -> Result<ItemOutcome> {
        let id = volume.id.clone();
        let Some(record) = connector_books::volume_to_record(volume) else {
            warn!(google_id = ?id, "skipping volume without id or title");
            return Ok(ItemOutcome::Skipped);
        };
        let outcome: ItemOutcome = store::upsert_book(self.pool, &record).await?.into();
        report_stored(self.progress, "books", outcome, &mut self.stored, Some(self.total));
        Ok(outcome)
    }
}

struct GameSink<'a> {
    pool: &'a SqlitePool,
    client: &'a IgdbClient,
    progress: &'a dyn SyncProgressReporter,
    stored: u64,
    total: u64,
}

#[async_trait]
impl ItemSink<IgdbGame> for GameSink<'_> {
    async fn accept(&mut self, game: IgdbGame) -> Result<ItemOutcome> {
        if game.id.is_none() || game.name.is_none() {
            warn!(igdb_id = ?game.id, "skipping game without id or name");
            return Ok(ItemOutcome::Skipped);
        }
        let company = match self.client.company_name(&game.involved_companies).await {
            Ok(company) => company,
            Err(e) => {
                warn!(igdb_id = ?game.id, error = %e, "company lookup failed");
                None
            }
        };
        let Some(record) = connector_igdb::game_to_record(game, company) else {
            return Ok(ItemOutcome::Skipped);
        };
        let outcome: ItemOutcome = store::upsert_game(self.pool, &record).await?.into();
        debug!(igdb_id = record.igdb_id, ?outcome, "game stored");
        report_stored(self.progress, "games", outcome, &mut self.stored, Some(self.total));
        Ok(outcome)
    }
}

struct MovieSink<'a> {
    pool: &'a SqlitePool,
    client: &'a TmdbClient,
    config: &'a TmdbConfig,
    progress: &'a dyn SyncProgressReporter,
    stored: u64,
    total: u64,
    links_skipped: usize,
}

#[async_trait]
impl ItemSink<MovieItem> for MovieSink<'_> {
    async fn accept(&mut self, item: MovieItem) -> Result<ItemOutcome> {
        let image_base = &self.config.image_base_url;
        let Some(record) = connector_tmdb::movie_to_record(&item, image_base) else {
            warn!(tmdb_id = ?item.id, title = ?item.title, "skipping movie without id or release date");
            return Ok(ItemOutcome::Skipped);
        };
        let stored = store::upsert_title(self.pool, &record).await?;
        let tmdb_id = record.tmdb_id;

        for genre in &item.genre_ids {
            match store::genre_id(self.pool, *genre).await? {
                Some(genre_id) => store::add_link(self.pool, Link::Genres, stored.id, genre_id).await?,
                None => {
                    warn!(tmdb_id, genre, "genre not in local table, link skipped");
                    self.links_skipped += 1;
                }
            }
        }

        if let Some(credits) = enrichment(self.client.movie_credits(tmdb_id).await, "credits", tmdb_id) {
            for actor in connector_tmdb::top_cast(&credits, self.config.cast_limit_movie, image_base) {
                let actor_id = store::upsert_actor(self.pool, &actor).await?.id;
                store::add_link(self.pool, Link::Actors, stored.id, actor_id).await?;
            }
            for member in connector_tmdb::movie_crew(&credits) {
                let crew_id = store::upsert_crew(self.pool, &member).await?.id;
                store::add_link(self.pool, Link::Crew, stored.id, crew_id).await?;
            }
        }

        if let Some(details) = enrichment(self.client.movie_details(tmdb_id).await, "details", tmdb_id) {
            let country = connector_tmdb::country_list(&details.production_countries);
            store::set_title_details(self.pool, stored.id, &country, details.runtime.unwrap_or(0)).await?;
        }

        if let Some(similar) = enrichment(self.client.similar_movies(tmdb_id).await, "similar", tmdb_id) {
            for stub in similar
                .iter()
                .take(self.config.similar_limit)
                .filter_map(|s| connector_tmdb::movie_to_record(s, image_base))
            {
                let similar_id = store::insert_title_if_absent(self.pool, &stub).await?.id;
                store::add_link(self.pool, Link::Similar, stored.id, similar_id).await?;
            }
        }

        let outcome: ItemOutcome = stored.into();
        debug!(tmdb_id, ?outcome, "movie stored");
        report_stored(self.progress, "movies", outcome, &mut self.stored, Some(self.total));
        Ok(outcome)
    }
}

struct TvSink<'a> {
    pool: &'a SqlitePool,
    client: &'a TmdbClient,
    config: &'a TmdbConfig,
    progress: &'a dyn SyncProgressReporter,
    stored: u64,
    total: Option<u64>,
    links_skipped: usize,
}

impl TvSink<'_> {
    async fn pause(&self) {
        let delay = self.config.tv_item_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ItemSink<TvItem> for TvSink<'_> {
    async fn accept(&mut self, item: TvItem) -> Result<ItemOutcome> {
        let Some(tmdb_id) = item.id else {
            warn!(name = ?item.name, "skipping show without id");
            return Ok(ItemOutcome::Skipped);
        };

        let first_air_date = parse_iso_date(item.first_air_date.as_deref());
        if first_air_date.is_none() {
            if let Some(raw) = item.first_air_date.as_deref().filter(|d| !d.is_empty()) {
                warn!(tmdb_id, date = raw, "malformed first_air_date, stored as empty");
            }
        }

        let details = match self.client.tv_details(tmdb_id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(tmdb_id, name = ?item.name, error = %e, "skipping show, details lookup failed");
                self.pause().await;
                return Ok(ItemOutcome::Skipped);
            }
        };

        let image_base = &self.config.image_base_url;
        let record = connector_tmdb::tv_to_record(tmdb_id, &details, first_air_date, image_base);
        let stored = store::upsert_title(self.pool, &record).await?;

        let mut genre_ids = Vec::with_capacity(details.genres.len());
        for genre in &details.genres {
            match store::genre_id(self.pool, genre.id).await? {
                Some(id) => genre_ids.push(id),
                None => {
                    warn!(tmdb_id, genre = genre.id, name = %genre.name, "genre not in local table, link skipped");
                    self.links_skipped += 1;
                }
            }
        }
        store::replace_links(self.pool, Link::Genres, stored.id, &genre_ids).await?;

        if let Some(credits) = &details.credits {
            let mut actor_ids = Vec::new();
            for actor in connector_tmdb::top_cast(credits, self.config.cast_limit_tv, image_base) {
                actor_ids.push(store::upsert_actor(self.pool, &actor).await?.id);
            }
            store::replace_links(self.pool, Link::Actors, stored.id, &actor_ids).await?;
        }

        let mut crew_ids = Vec::new();
        for member in connector_tmdb::tv_crew(&details) {
            crew_ids.push(store::upsert_crew(self.pool, &member).await?.id);
        }
        store::replace_links(self.pool, Link::Crew, stored.id, &crew_ids).await?;

        if let Some(similar) = &details.similar {
            for stub in similar
                .results
                .iter()
                .take(self.config.similar_limit)
                .filter_map(|s| connector_tmdb::tv_stub_to_record(s, image_base))
            {
                let similar_id = store::insert_title_if_absent(self.pool, &stub).await?.id;
                store::add_link(self.pool, Link::Similar, stored.id, similar_id).await?;
            }
        }

        if let Some((key, name)) = connector_tmdb::tv_trailer(&details) {
            store::set_title_trailer(self.pool, stored.id, &key, Some(&name)).await?;
        }

        let outcome: ItemOutcome = stored.into();
        debug!(tmdb_id, ?outcome, "show stored");
        report_stored(self.progress, "tv", outcome, &mut self.stored, self.total);
        self.pause().await;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_budget_rounds_up() {
        assert_eq!(pages_for(10_000, 40), 250);
        assert_eq!(pages_for(10_000, 500), 20);
        assert_eq!(pages_for(45, 40), 2);
        assert_eq!(pages_for(0, 40), 0);
    }

    #[test]
    fn summary_counts_stored_items() {
        let summary = SyncSummary {
            created: 3,
            updated: 2,
            skipped: 1,
            ..SyncSummary::new("books")
        };
        assert_eq!(summary.stored(), 5);
    }

    #[test]
    fn aborted_categories_fail_the_run() {
        let mut summary = SyncSummary {
            created: 4,
            ..SyncSummary::new("books")
        };
        assert_eq!(summary.failure(), None);

        summary.categories_aborted = 2;
        assert_eq!(summary.failure().as_deref(), Some("2 book categories aborted"));

        summary.aborted = Some("category discovery: HTTP 403".into());
        assert_eq!(summary.failure().as_deref(), Some("category discovery: HTTP 403"));
    }
}
