use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every catalog table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Games, keyed by IGDB id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            igdb_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            summary TEXT,
            first_release_date INTEGER,
            release_date TEXT,
            company TEXT,
            cover_url TEXT,
            videos TEXT,
            genres TEXT NOT NULL DEFAULT '[]',
            platforms TEXT NOT NULL DEFAULT '[]',
            game_modes TEXT NOT NULL DEFAULT '[]',
            screenshots TEXT NOT NULL DEFAULT '[]',
            similar_games TEXT,
            status INTEGER,
            websites TEXT NOT NULL DEFAULT '[]',
            multiplayer_modes TEXT NOT NULL DEFAULT '[]',
            custom_photo TEXT,
            custom_header_photo TEXT,
            youtube_trailer TEXT,
            is_main_game INTEGER NOT NULL DEFAULT 0,
            is_recently_trending_small INTEGER NOT NULL DEFAULT 0,
            is_recently_trending_big INTEGER NOT NULL DEFAULT 0,
            is_new_game INTEGER NOT NULL DEFAULT 0,
            is_age_limit INTEGER NOT NULL DEFAULT 0,
            rating_color TEXT NOT NULL DEFAULT 'white',
            total_rating REAL,
            total_rating_count INTEGER,
            mgb_average_rating REAL,
            mgb_rating_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Movies and TV shows share one table, split by content_type
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS titles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_id INTEGER NOT NULL,
            content_type TEXT NOT NULL CHECK (content_type IN ('movie', 'tv')),
            title TEXT NOT NULL,
            original_title TEXT,
            overview TEXT,
            country TEXT,
            runtime INTEGER NOT NULL DEFAULT 0,
            number_of_seasons INTEGER,
            number_of_episodes INTEGER,
            first_air_date TEXT,
            release_date TEXT,
            popularity REAL NOT NULL DEFAULT 0,
            original_language TEXT,
            adult INTEGER NOT NULL DEFAULT 0,
            video INTEGER NOT NULL DEFAULT 0,
            poster_path TEXT,
            backdrop_path TEXT,
            custom_photo TEXT,
            custom_header_photo TEXT,
            youtube_trailer TEXT,
            youtube_trailer_name TEXT,
            is_main_movie INTEGER NOT NULL DEFAULT 0,
            is_recently_trending_small INTEGER NOT NULL DEFAULT 0,
            is_recently_trending_big INTEGER NOT NULL DEFAULT 0,
            rating_color TEXT NOT NULL DEFAULT 'white',
            vote_average REAL NOT NULL DEFAULT 0,
            vote_count INTEGER NOT NULL DEFAULT 0,
            mgb_average_rating REAL,
            mgb_rating_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(content_type, tmdb_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Books, keyed by Google volume id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            google_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            authors TEXT NOT NULL DEFAULT '[]',
            language TEXT,
            published_date TEXT,
            description TEXT,
            categories TEXT NOT NULL DEFAULT '[]',
            thumbnail TEXT,
            isbn_13 TEXT,
            custom_photo TEXT,
            custom_header_photo TEXT,
            is_main_book INTEGER NOT NULL DEFAULT 0,
            is_recently_trending_small INTEGER NOT NULL DEFAULT 0,
            rating_color TEXT NOT NULL DEFAULT 'white',
            average_rating REAL,
            ratings_count INTEGER,
            mgb_average_rating REAL,
            mgb_rating_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Reference entities shared by movies and TV
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genres (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS actors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            profile_path TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crew_members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            tmdb_id INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            job TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Link tables
    for (table, target_column, target_table) in [
        ("title_genres", "genre_id", "genres"),
        ("title_actors", "actor_id", "actors"),
        ("title_crew", "crew_id", "crew_members"),
        ("title_similar", "similar_id", "titles"),
    ] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                title_id INTEGER NOT NULL REFERENCES titles(id),
                {target_column} INTEGER NOT NULL REFERENCES {target_table}(id),
                PRIMARY KEY (title_id, {target_column})
            )
            "#
        ))
        .execute(pool)
        .await?;
    }

    // User-side tables
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
            user_id INTEGER NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            added_at INTEGER NOT NULL,
            UNIQUE(user_id, kind, item_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statuses (
            user_id INTEGER NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            status TEXT NOT NULL,
            added_at INTEGER NOT NULL,
            UNIQUE(user_id, kind, item_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            user_id INTEGER NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            item_id INTEGER NOT NULL,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 10),
            updated_at INTEGER NOT NULL,
            UNIQUE(user_id, kind, item_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_titles_content_type ON titles(content_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_release_date ON games(release_date)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ratings_item ON ratings(kind, item_id)")
        .execute(pool)
        .await?;

    Ok(())
}
