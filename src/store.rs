//! Idempotent catalog writes.
//!
//! Every content upsert follows the same shape: look up the row by its
//! external id, then `INSERT ... ON CONFLICT DO UPDATE` so a re-ingested id
//! rewrites its fields instead of adding a row. The lookup only decides the
//! created/updated flag; the conflict clause is what keeps the write
//! idempotent.
//!
//! Link tables carry composite primary keys, so adding an existing link is a
//! no-op. [`replace_links`] clears and re-adds inside one transaction for the
//! attributes that track the latest sync; [`add_link`] appends.

use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{
    ActorRecord, BookRecord, ContentType, CrewRecord, GameRecord, GenreRecord, TitleRecord,
    Upserted,
};
use crate::normalize::{format_date, rating_color};

/// Many-to-many collections hanging off a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Genres,
    Actors,
    Crew,
    Similar,
}

impl Link {
    fn table(&self) -> &'static str {
        match self {
            Link::Genres => "title_genres",
            Link::Actors => "title_actors",
            Link::Crew => "title_crew",
            Link::Similar => "title_similar",
        }
    }

    fn target_column(&self) -> &'static str {
        match self {
            Link::Genres => "genre_id",
            Link::Actors => "actor_id",
            Link::Crew => "crew_id",
            Link::Similar => "similar_id",
        }
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

fn json_list(values: &[String]) -> Result<String> {
    Ok(serde_json::to_string(values)?)
}

// ═══════════════════════════════════════════════════════════════════════
// Games
// ═══════════════════════════════════════════════════════════════════════

pub async fn upsert_game(pool: &SqlitePool, game: &GameRecord) -> Result<Upserted> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM games WHERE igdb_id = ?")
        .bind(game.igdb_id)
        .fetch_optional(pool)
        .await?;

    let ts = now();
    let videos = game.videos.as_ref().map(|v| v.to_string());
    let similar = game.similar_games.as_ref().map(|v| v.to_string());

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO games (igdb_id, name, summary, first_release_date, release_date, company, cover_url,
                           videos, genres, platforms, game_modes, screenshots, similar_games, status,
                           websites, multiplayer_modes, rating_color, total_rating, total_rating_count,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(igdb_id) DO UPDATE SET
            name = excluded.name,
            summary = excluded.summary,
            first_release_date = excluded.first_release_date,
            release_date = excluded.release_date,
            company = excluded.company,
            cover_url = excluded.cover_url,
            videos = excluded.videos,
            genres = excluded.genres,
            platforms = excluded.platforms,
            game_modes = excluded.game_modes,
            screenshots = excluded.screenshots,
            similar_games = excluded.similar_games,
            status = excluded.status,
            websites = excluded.websites,
            multiplayer_modes = excluded.multiplayer_modes,
            rating_color = excluded.rating_color,
            total_rating = excluded.total_rating,
            total_rating_count = excluded.total_rating_count,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(game.igdb_id)
    .bind(&game.name)
    .bind(&game.summary)
    .bind(game.first_release_date)
    .bind(game.release_date.map(format_date))
    .bind(&game.company)
    .bind(&game.cover_url)
    .bind(videos)
    .bind(json_list(&game.genres)?)
    .bind(json_list(&game.platforms)?)
    .bind(json_list(&game.game_modes)?)
    .bind(json_list(&game.screenshots)?)
    .bind(similar)
    .bind(game.status)
    .bind(json_list(&game.websites)?)
    .bind(game.multiplayer_modes.to_string())
    .bind(rating_color(game.total_rating))
    .bind(game.total_rating)
    .bind(game.total_rating_count)
    .bind(ts)
    .bind(ts)
    .fetch_one(pool)
    .await?;

    Ok(Upserted {
        id,
        created: existing.is_none(),
    })
}

pub async fn set_game_trailer(pool: &SqlitePool, id: i64, video_id: &str) -> Result<()> {
    sqlx::query("UPDATE games SET youtube_trailer = ?, updated_at = ? WHERE id = ?")
        .bind(video_id)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// `(id, name)` of games with no trailer yet, oldest first.
pub async fn games_missing_trailer(pool: &SqlitePool, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, name FROM games WHERE youtube_trailer IS NULL ORDER BY id LIMIT ?")
            .bind(limit.map(|l| l as i64).unwrap_or(-1))
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

// ═══════════════════════════════════════════════════════════════════════
// Titles (movies and TV)
// ═══════════════════════════════════════════════════════════════════════

pub async fn title_id(pool: &SqlitePool, content_type: ContentType, tmdb_id: i64) -> Result<Option<i64>> {
    Ok(
        sqlx::query_scalar("SELECT id FROM titles WHERE content_type = ? AND tmdb_id = ?")
            .bind(content_type.as_str())
            .bind(tmdb_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Create or fully update a title. Detail-only fields that are `None` in
/// `title` keep their stored value.
pub async fn upsert_title(pool: &SqlitePool, title: &TitleRecord) -> Result<Upserted> {
    let existing = title_id(pool, title.content_type, title.tmdb_id).await?;
    let id = write_title(pool, title, false).await?;
    Ok(Upserted {
        id,
        created: existing.is_none(),
    })
}

/// Create a title only if it is not stored yet; an existing row is left
/// exactly as it is. Used for "similar item" stubs, which carry less data
/// than a full sync of the same id.
pub async fn insert_title_if_absent(pool: &SqlitePool, title: &TitleRecord) -> Result<Upserted> {
    if let Some(id) = title_id(pool, title.content_type, title.tmdb_id).await? {
        return Ok(Upserted { id, created: false });
    }
    let id = write_title(pool, title, true).await?;
    Ok(Upserted { id, created: true })
}

async fn write_title(pool: &SqlitePool, title: &TitleRecord, keep_existing: bool) -> Result<i64> {
    let ts = now();
    let conflict = if keep_existing {
        // Touch nothing but still return the id.
        "ON CONFLICT(content_type, tmdb_id) DO UPDATE SET tmdb_id = titles.tmdb_id"
    } else {
        r#"ON CONFLICT(content_type, tmdb_id) DO UPDATE SET
            title = excluded.title,
            original_title = excluded.original_title,
            overview = excluded.overview,
            release_date = excluded.release_date,
            first_air_date = excluded.first_air_date,
            poster_path = excluded.poster_path,
            backdrop_path = excluded.backdrop_path,
            rating_color = excluded.rating_color,
            vote_average = excluded.vote_average,
            vote_count = excluded.vote_count,
            popularity = excluded.popularity,
            original_language = excluded.original_language,
            adult = excluded.adult,
            video = excluded.video,
            country = COALESCE(excluded.country, titles.country),
            runtime = CASE WHEN ? THEN excluded.runtime ELSE titles.runtime END,
            number_of_seasons = COALESCE(excluded.number_of_seasons, titles.number_of_seasons),
            number_of_episodes = COALESCE(excluded.number_of_episodes, titles.number_of_episodes),
            updated_at = excluded.updated_at"#
    };

    let sql = format!(
        r#"
        INSERT INTO titles (tmdb_id, content_type, title, original_title, overview, release_date,
                            first_air_date, poster_path, backdrop_path, rating_color, vote_average,
                            vote_count, popularity, original_language, adult, video, country, runtime,
                            number_of_seasons, number_of_episodes, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        {}
        RETURNING id
        "#,
        conflict
    );

    let mut query = sqlx::query_scalar::<_, i64>(&sql)
        .bind(title.tmdb_id)
        .bind(title.content_type.as_str())
        .bind(&title.title)
        .bind(&title.original_title)
        .bind(&title.overview)
        .bind(title.release_date.map(format_date))
        .bind(title.first_air_date.map(format_date))
        .bind(&title.poster_path)
        .bind(&title.backdrop_path)
        .bind(rating_color(Some(title.vote_average)))
        .bind(title.vote_average)
        .bind(title.vote_count)
        .bind(title.popularity)
        .bind(&title.original_language)
        .bind(title.adult)
        .bind(title.video)
        .bind(&title.country)
        .bind(title.runtime.unwrap_or(0))
        .bind(title.number_of_seasons)
        .bind(title.number_of_episodes)
        .bind(ts)
        .bind(ts);
    if !keep_existing {
        query = query.bind(title.runtime.is_some());
    }

    Ok(query.fetch_one(pool).await?)
}

/// Write back the fields only a movie detail lookup provides.
pub async fn set_title_details(pool: &SqlitePool, id: i64, country: &str, runtime: i64) -> Result<()> {
    sqlx::query("UPDATE titles SET country = ?, runtime = ?, updated_at = ? WHERE id = ?")
        .bind(country)
        .bind(runtime)
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_title_trailer(
    pool: &SqlitePool,
    id: i64,
    video_id: &str,
    video_name: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE titles SET youtube_trailer = ?, youtube_trailer_name = ?, updated_at = ? WHERE id = ?",
    )
    .bind(video_id)
    .bind(video_name)
    .bind(now())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn titles_missing_trailer(pool: &SqlitePool, limit: Option<usize>) -> Result<Vec<(i64, String)>> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT id, title FROM titles WHERE youtube_trailer IS NULL ORDER BY id LIMIT ?")
            .bind(limit.map(|l| l as i64).unwrap_or(-1))
            .fetch_all(pool)
            .await?;
    Ok(rows)
}

// ═══════════════════════════════════════════════════════════════════════
// Books
// ═══════════════════════════════════════════════════════════════════════

pub async fn upsert_book(pool: &SqlitePool, book: &BookRecord) -> Result<Upserted> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM books WHERE google_id = ?")
        .bind(&book.google_id)
        .fetch_optional(pool)
        .await?;

    let ts = now();
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO books (google_id, title, authors, language, published_date, description, categories,
                           thumbnail, isbn_13, rating_color, average_rating, ratings_count,
                           created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(google_id) DO UPDATE SET
            title = excluded.title,
            authors = excluded.authors,
            language = excluded.language,
            published_date = excluded.published_date,
            description = excluded.description,
            categories = excluded.categories,
            thumbnail = excluded.thumbnail,
            isbn_13 = excluded.isbn_13,
            rating_color = excluded.rating_color,
            average_rating = excluded.average_rating,
            ratings_count = excluded.ratings_count,
            updated_at = excluded.updated_at
        RETURNING id
        "#,
    )
    .bind(&book.google_id)
    .bind(&book.title)
    .bind(json_list(&book.authors)?)
    .bind(&book.language)
    .bind(&book.published_date)
    .bind(&book.description)
    .bind(json_list(&book.categories)?)
    .bind(&book.thumbnail)
    .bind(&book.isbn_13)
    .bind(rating_color(book.average_rating))
    .bind(book.average_rating)
    .bind(book.ratings_count)
    .bind(ts)
    .bind(ts)
    .fetch_one(pool)
    .await?;

    Ok(Upserted {
        id,
        created: existing.is_none(),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Reference entities
// ═══════════════════════════════════════════════════════════════════════

pub async fn upsert_genre(pool: &SqlitePool, genre: &GenreRecord) -> Result<Upserted> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM genres WHERE tmdb_id = ?")
        .bind(genre.tmdb_id)
        .fetch_optional(pool)
        .await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO genres (tmdb_id, name) VALUES (?, ?)
         ON CONFLICT(tmdb_id) DO UPDATE SET name = excluded.name
         RETURNING id",
    )
    .bind(genre.tmdb_id)
    .bind(&genre.name)
    .fetch_one(pool)
    .await?;

    Ok(Upserted {
        id,
        created: existing.is_none(),
    })
}

/// Local id of a genre already present in the reference table.
pub async fn genre_id(pool: &SqlitePool, tmdb_id: i64) -> Result<Option<i64>> {
    Ok(sqlx::query_scalar("SELECT id FROM genres WHERE tmdb_id = ?")
        .bind(tmdb_id)
        .fetch_optional(pool)
        .await?)
}

pub async fn upsert_actor(pool: &SqlitePool, actor: &ActorRecord) -> Result<Upserted> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM actors WHERE tmdb_id = ?")
        .bind(actor.tmdb_id)
        .fetch_optional(pool)
        .await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO actors (tmdb_id, name, profile_path) VALUES (?, ?, ?)
         ON CONFLICT(tmdb_id) DO UPDATE SET
             name = excluded.name,
             profile_path = COALESCE(excluded.profile_path, actors.profile_path)
         RETURNING id",
    )
    .bind(actor.tmdb_id)
    .bind(&actor.name)
    .bind(&actor.profile_path)
    .fetch_one(pool)
    .await?;

    Ok(Upserted {
        id,
        created: existing.is_none(),
    })
}

pub async fn upsert_crew(pool: &SqlitePool, crew: &CrewRecord) -> Result<Upserted> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM crew_members WHERE tmdb_id = ?")
        .bind(crew.tmdb_id)
        .fetch_optional(pool)
        .await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO crew_members (tmdb_id, name, job) VALUES (?, ?, ?)
         ON CONFLICT(tmdb_id) DO UPDATE SET name = excluded.name, job = excluded.job
         RETURNING id",
    )
    .bind(crew.tmdb_id)
    .bind(&crew.name)
    .bind(&crew.job)
    .fetch_one(pool)
    .await?;

    Ok(Upserted {
        id,
        created: existing.is_none(),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// Links
// ═══════════════════════════════════════════════════════════════════════

/// Append one link; adding an existing link changes nothing.
pub async fn add_link(pool: &SqlitePool, link: Link, title_id: i64, target_id: i64) -> Result<()> {
    let sql = format!(
        "INSERT OR IGNORE INTO {} (title_id, {}) VALUES (?, ?)",
        link.table(),
        link.target_column()
    );
    sqlx::query(&sql)
        .bind(title_id)
        .bind(target_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Make `targets` the complete link set of `title_id`, dropping stale links.
pub async fn replace_links(pool: &SqlitePool, link: Link, title_id: i64, targets: &[i64]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(&format!("DELETE FROM {} WHERE title_id = ?", link.table()))
        .bind(title_id)
        .execute(&mut *tx)
        .await?;

    let insert = format!(
        "INSERT OR IGNORE INTO {} (title_id, {}) VALUES (?, ?)",
        link.table(),
        link.target_column()
    );
    for target in targets {
        sqlx::query(&insert)
            .bind(title_id)
            .bind(target)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Local ids linked to `title_id`, ascending.
pub async fn linked_ids(pool: &SqlitePool, link: Link, title_id: i64) -> Result<Vec<i64>> {
    let sql = format!(
        "SELECT {col} FROM {table} WHERE title_id = ? ORDER BY {col}",
        col = link.target_column(),
        table = link.table()
    );
    Ok(sqlx::query_scalar(&sql).bind(title_id).fetch_all(pool).await?)
}

/// Row count of a catalog table.
pub async fn count(pool: &SqlitePool, table: &str) -> Result<i64> {
    Ok(sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::ContentType;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();
        pool
    }

    fn movie(tmdb_id: i64, title: &str) -> TitleRecord {
        let mut record = TitleRecord::new(tmdb_id, ContentType::Movie, title.to_string());
        record.vote_average = 7.1;
        record
    }

    #[tokio::test]
    async fn game_upsert_is_idempotent() {
        let pool = memory_pool().await;
        let mut game = GameRecord {
            igdb_id: 1942,
            name: "The Witcher 3".into(),
            total_rating: Some(9.3),
            multiplayer_modes: serde_json::json!([]),
            ..Default::default()
        };

        let first = upsert_game(&pool, &game).await.unwrap();
        assert!(first.created);

        game.name = "The Witcher 3: Wild Hunt".into();
        let second = upsert_game(&pool, &game).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_eq!(count(&pool, "games").await.unwrap(), 1);

        let (name, color): (String, String) =
            sqlx::query_as("SELECT name, rating_color FROM games WHERE id = ?")
                .bind(first.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(name, "The Witcher 3: Wild Hunt");
        assert_eq!(color, "#15B000");
    }

    #[tokio::test]
    async fn same_tmdb_id_may_exist_once_per_content_type() {
        let pool = memory_pool().await;
        let m = upsert_title(&pool, &movie(100, "A movie")).await.unwrap();
        let tv = upsert_title(&pool, &TitleRecord::new(100, ContentType::Tv, "A show".into()))
            .await
            .unwrap();
        assert!(m.created && tv.created);
        assert_ne!(m.id, tv.id);
        assert_eq!(count(&pool, "titles").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn stub_insert_never_overwrites() {
        let pool = memory_pool().await;
        let mut full = movie(7, "Full title");
        full.overview = Some("A full overview".into());
        let stored = upsert_title(&pool, &full).await.unwrap();

        let stub = movie(7, "Stub title");
        let again = insert_title_if_absent(&pool, &stub).await.unwrap();
        assert_eq!(again, Upserted { id: stored.id, created: false });

        let (title, overview): (String, Option<String>) =
            sqlx::query_as("SELECT title, overview FROM titles WHERE id = ?")
                .bind(stored.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(title, "Full title");
        assert_eq!(overview.as_deref(), Some("A full overview"));
    }

    #[tokio::test]
    async fn upsert_keeps_details_absent_from_record() {
        let pool = memory_pool().await;
        let stored = upsert_title(&pool, &movie(8, "Movie")).await.unwrap();
        set_title_details(&pool, stored.id, "France, Italy", 121).await.unwrap();

        upsert_title(&pool, &movie(8, "Movie (re-sync)")).await.unwrap();
        let (country, runtime): (Option<String>, i64) =
            sqlx::query_as("SELECT country, runtime FROM titles WHERE id = ?")
                .bind(stored.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(country.as_deref(), Some("France, Italy"));
        assert_eq!(runtime, 121);
    }

    #[tokio::test]
    async fn replace_links_drops_stale_and_add_link_appends() {
        let pool = memory_pool().await;
        let show = upsert_title(&pool, &TitleRecord::new(1, ContentType::Tv, "Show".into()))
            .await
            .unwrap();
        let mut genre_ids = Vec::new();
        for (tmdb_id, name) in [(18, "Drama"), (35, "Comedy"), (80, "Crime")] {
            let g = upsert_genre(&pool, &GenreRecord { tmdb_id, name: name.into() }).await.unwrap();
            genre_ids.push(g.id);
        }

        replace_links(&pool, Link::Genres, show.id, &genre_ids[..2]).await.unwrap();
        replace_links(&pool, Link::Genres, show.id, &genre_ids[1..]).await.unwrap();
        assert_eq!(linked_ids(&pool, Link::Genres, show.id).await.unwrap(), genre_ids[1..].to_vec());

        add_link(&pool, Link::Genres, show.id, genre_ids[0]).await.unwrap();
        add_link(&pool, Link::Genres, show.id, genre_ids[0]).await.unwrap();
        assert_eq!(linked_ids(&pool, Link::Genres, show.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn book_upsert_updates_in_place() {
        let pool = memory_pool().await;
        let mut book = BookRecord {
            google_id: "zyTCAlFPjgYC".into(),
            title: "The Google Story".into(),
            isbn_13: Some("9780553804577".into()),
            ..Default::default()
        };
        let first = upsert_book(&pool, &book).await.unwrap();
        book.average_rating = Some(3.5);
        let second = upsert_book(&pool, &book).await.unwrap();
        assert!(first.created && !second.created);
        assert_eq!(count(&pool, "books").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn genre_lookup_misses_unknown_ids() {
        let pool = memory_pool().await;
        upsert_genre(&pool, &GenreRecord { tmdb_id: 16, name: "Animation".into() }).await.unwrap();
        assert!(genre_id(&pool, 16).await.unwrap().is_some());
        assert!(genre_id(&pool, 10765).await.unwrap().is_none());
    }
}
