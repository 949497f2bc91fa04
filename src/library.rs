//! User-side catalog state: favorites, status tracking and ratings.
//!
//! Catalog items form a closed set of kinds ([`ContentItem`]). What a user
//! can do with an item is expressed as capabilities: [`Favoritable`] and
//! [`Ratable`]. Status values are per kind: games are played, titles are
//! watched, books are read.
//!
//! A user holds at most one favorite flag, one status and one rating per
//! item. Every rating change recomputes the item's `mgb_average_rating`
//! (mean of 1..=10 ratings, one decimal) and `mgb_rating_count`.

use anyhow::{bail, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::normalize::round1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Game,
    Title,
    Book,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Game => "game",
            ContentKind::Title => "title",
            ContentKind::Book => "book",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            ContentKind::Game => "games",
            ContentKind::Title => "titles",
            ContentKind::Book => "books",
        }
    }

    /// Status values a user may set on items of this kind.
    pub fn statuses(&self) -> &'static [&'static str] {
        match self {
            ContentKind::Game => &["played", "playing", "dropped"],
            ContentKind::Title => &["watched", "watching", "dropped"],
            ContentKind::Book => &["read", "reading", "dropped"],
        }
    }
}

/// A catalog item by local id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentItem {
    Game(i64),
    Title(i64),
    Book(i64),
}

impl ContentItem {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Game(_) => ContentKind::Game,
            ContentItem::Title(_) => ContentKind::Title,
            ContentItem::Book(_) => ContentKind::Book,
        }
    }

    pub fn id(&self) -> i64 {
        match *self {
            ContentItem::Game(id) | ContentItem::Title(id) | ContentItem::Book(id) => id,
        }
    }
}

/// Items a user can mark as favorite.
pub trait Favoritable {
    fn favorite_key(&self) -> (ContentKind, i64);
}

/// Items a user can rate; ratings feed the item's MGB average.
pub trait Ratable {
    fn rating_key(&self) -> (ContentKind, i64);
}

impl Favoritable for ContentItem {
    fn favorite_key(&self) -> (ContentKind, i64) {
        (self.kind(), self.id())
    }
}

impl Ratable for ContentItem {
    fn rating_key(&self) -> (ContentKind, i64) {
        (self.kind(), self.id())
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

async fn ensure_exists(pool: &SqlitePool, kind: ContentKind, id: i64) -> Result<()> {
    let found: Option<i64> = sqlx::query_scalar(&format!("SELECT id FROM {} WHERE id = ?", kind.table()))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    if found.is_none() {
        bail!("No {} with id {}", kind.as_str(), id);
    }
    Ok(())
}

/// Create a user, or return the existing one with that name.
pub async fn add_user(pool: &SqlitePool, username: &str) -> Result<i64> {
    if username.trim().is_empty() {
        bail!("username must not be empty");
    }
    Ok(sqlx::query_scalar(
        "INSERT INTO users (username, created_at) VALUES (?, ?)
         ON CONFLICT(username) DO UPDATE SET username = users.username
         RETURNING id",
    )
    .bind(username)
    .bind(now())
    .fetch_one(pool)
    .await?)
}

// ═══════════════════════════════════════════════════════════════════════
// Favorites
// ═══════════════════════════════════════════════════════════════════════

/// Flip the favorite flag; returns whether the item is now a favorite.
pub async fn toggle_favorite(pool: &SqlitePool, user_id: i64, item: &impl Favoritable) -> Result<bool> {
    let (kind, id) = item.favorite_key();
    ensure_exists(pool, kind, id).await?;

    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = ? AND kind = ? AND item_id = ?")
        .bind(user_id)
        .bind(kind.as_str())
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();
    if removed > 0 {
        return Ok(false);
    }

    sqlx::query("INSERT INTO favorites (user_id, kind, item_id, added_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(kind.as_str())
        .bind(id)
        .bind(now())
        .execute(pool)
        .await?;
    Ok(true)
}

pub async fn is_favorite(pool: &SqlitePool, user_id: i64, item: &impl Favoritable) -> Result<bool> {
    let (kind, id) = item.favorite_key();
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM favorites WHERE user_id = ? AND kind = ? AND item_id = ?")
            .bind(user_id)
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

// ═══════════════════════════════════════════════════════════════════════
// Status
// ═══════════════════════════════════════════════════════════════════════

/// Set the user's status for an item, replacing any previous one. The
/// status must be one of the item kind's [`ContentKind::statuses`].
pub async fn set_status(pool: &SqlitePool, user_id: i64, item: ContentItem, status: &str) -> Result<()> {
    let kind = item.kind();
    if !kind.statuses().contains(&status) {
        bail!(
            "Status '{}' does not apply to a {}. Available: {}",
            status,
            kind.as_str(),
            kind.statuses().join(", ")
        );
    }
    ensure_exists(pool, kind, item.id()).await?;

    sqlx::query(
        "INSERT INTO statuses (user_id, kind, item_id, status, added_at) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(user_id, kind, item_id) DO UPDATE SET status = excluded.status, added_at = excluded.added_at",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(item.id())
    .bind(status)
    .bind(now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_status(pool: &SqlitePool, user_id: i64, item: ContentItem) -> Result<()> {
    sqlx::query("DELETE FROM statuses WHERE user_id = ? AND kind = ? AND item_id = ?")
        .bind(user_id)
        .bind(item.kind().as_str())
        .bind(item.id())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn status_of(pool: &SqlitePool, user_id: i64, item: ContentItem) -> Result<Option<String>> {
    Ok(
        sqlx::query_scalar("SELECT status FROM statuses WHERE user_id = ? AND kind = ? AND item_id = ?")
            .bind(user_id)
            .bind(item.kind().as_str())
            .bind(item.id())
            .fetch_optional(pool)
            .await?,
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Ratings
// ═══════════════════════════════════════════════════════════════════════

/// Rate an item 1..=10 (replacing the user's earlier rating) and refresh
/// its MGB aggregate.
pub async fn rate(pool: &SqlitePool, user_id: i64, item: &impl Ratable, rating: u8) -> Result<()> {
    if !(1..=10).contains(&rating) {
        bail!("rating must be between 1 and 10, got {}", rating);
    }
    let (kind, id) = item.rating_key();
    ensure_exists(pool, kind, id).await?;

    sqlx::query(
        "INSERT INTO ratings (user_id, kind, item_id, rating, updated_at) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(user_id, kind, item_id) DO UPDATE SET rating = excluded.rating, updated_at = excluded.updated_at",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(id)
    .bind(rating as i64)
    .bind(now())
    .execute(pool)
    .await?;

    refresh_mgb_rating(pool, kind, id).await
}

pub async fn remove_rating(pool: &SqlitePool, user_id: i64, item: &impl Ratable) -> Result<()> {
    let (kind, id) = item.rating_key();
    sqlx::query("DELETE FROM ratings WHERE user_id = ? AND kind = ? AND item_id = ?")
        .bind(user_id)
        .bind(kind.as_str())
        .bind(id)
        .execute(pool)
        .await?;
    refresh_mgb_rating(pool, kind, id).await
}

async fn refresh_mgb_rating(pool: &SqlitePool, kind: ContentKind, id: i64) -> Result<()> {
    let (average, count): (Option<f64>, i64) =
        sqlx::query_as("SELECT AVG(rating), COUNT(*) FROM ratings WHERE kind = ? AND item_id = ?")
            .bind(kind.as_str())
            .bind(id)
            .fetch_one(pool)
            .await?;

    sqlx::query(&format!(
        "UPDATE {} SET mgb_average_rating = ?, mgb_rating_count = ? WHERE id = ?",
        kind.table()
    ))
    .bind(average.map(round1))
    .bind(count)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}
