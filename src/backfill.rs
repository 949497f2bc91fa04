//! `mgb backfill release-dates`: recompute every game's calendar release
//! date from its IGDB epoch timestamp.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::normalize::{epoch_to_local_date, format_date};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub scanned: usize,
    pub updated: usize,
    /// Games with no timestamp whose stale date was removed.
    pub cleared: usize,
    /// Timestamps outside the representable range; the date is removed.
    pub invalid: usize,
}

pub async fn run_backfill_release_dates(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let summary = backfill_release_dates(&pool).await?;
    pool.close().await;

    println!("backfill release-dates");
    println!("  games scanned: {}", summary.scanned);
    println!("  updated: {}", summary.updated);
    println!("  cleared: {}", summary.cleared);
    println!("  invalid timestamps: {}", summary.invalid);
    println!("ok");
    Ok(())
}

/// Only rows whose derived date actually changes are written, all in one
/// transaction.
pub async fn backfill_release_dates(pool: &SqlitePool) -> Result<BackfillSummary> {
    let rows: Vec<(i64, String, Option<i64>, Option<String>)> =
        sqlx::query_as("SELECT id, name, first_release_date, release_date FROM games ORDER BY id")
            .fetch_all(pool)
            .await?;

    let mut summary = BackfillSummary {
        scanned: rows.len(),
        ..Default::default()
    };
    let mut tx = pool.begin().await?;

    for (id, name, first_release_date, stored) in rows {
        let derived = match first_release_date {
            Some(ts) => match epoch_to_local_date(ts) {
                Some(date) => Some(format_date(date)),
                None => {
                    warn!(game = %name, id, ts, "release timestamp out of range");
                    summary.invalid += 1;
                    None
                }
            },
            None => None,
        };

        if derived == stored {
            continue;
        }
        match (&derived, first_release_date) {
            (Some(_), _) => summary.updated += 1,
            (None, None) => summary.cleared += 1,
            // Invalid timestamps are already counted.
            (None, Some(_)) => {}
        }

        sqlx::query("UPDATE games SET release_date = ? WHERE id = ?")
            .bind(&derived)
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn insert_game(pool: &SqlitePool, igdb_id: i64, ts: Option<i64>, release_date: Option<&str>) {
        sqlx::query(
            "INSERT INTO games (igdb_id, name, first_release_date, release_date, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, 0)",
        )
        .bind(igdb_id)
        .bind(format!("Game {}", igdb_id))
        .bind(ts)
        .bind(release_date)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn recomputes_and_clears() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply(&pool).await.unwrap();

        let ts = 1_431_993_600;
        let expected = format_date(epoch_to_local_date(ts).unwrap());
        insert_game(&pool, 1, Some(ts), None).await;
        insert_game(&pool, 2, Some(ts), Some(&expected)).await;
        insert_game(&pool, 3, None, Some("2001-01-01")).await;
        insert_game(&pool, 4, Some(i64::MAX), Some("2001-01-01")).await;

        let summary = backfill_release_dates(&pool).await.unwrap();
        assert_eq!(
            summary,
            BackfillSummary {
                scanned: 4,
                updated: 1,
                cleared: 1,
                invalid: 1,
            }
        );

        let dates: Vec<Option<String>> = sqlx::query_scalar("SELECT release_date FROM games ORDER BY igdb_id")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(dates, vec![Some(expected.clone()), Some(expected), None, None]);

        // A second pass finds nothing to change.
        let again = backfill_release_dates(&pool).await.unwrap();
        assert_eq!((again.updated, again.cleared), (0, 0));
    }
}
