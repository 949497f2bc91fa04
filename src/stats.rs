//! Catalog statistics.
//!
//! A quick summary of what has been ingested: item counts per catalog,
//! trailer coverage, reference entities and when each catalog was last
//! written. Used by `mgb stats` to confirm that syncs are landing.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// One catalog table's counters.
struct CatalogStats {
    name: &'static str,
    items: i64,
    with_trailer: Option<i64>,
    last_sync_ts: Option<i64>,
}

async fn catalog_stats(
    pool: &SqlitePool,
    name: &'static str,
    table: &str,
    filter: &str,
    has_trailer: bool,
) -> Result<CatalogStats> {
    let trailer_expr = if has_trailer {
        "SUM(CASE WHEN youtube_trailer IS NOT NULL THEN 1 ELSE 0 END)"
    } else {
        "NULL"
    };
    let row = sqlx::query(&format!(
        "SELECT COUNT(*) AS items, {} AS with_trailer, MAX(updated_at) AS last_sync FROM {} {}",
        trailer_expr, table, filter
    ))
    .fetch_one(pool)
    .await?;

    Ok(CatalogStats {
        name,
        items: row.get("items"),
        with_trailer: if has_trailer {
            Some(row.get::<Option<i64>, _>("with_trailer").unwrap_or(0))
        } else {
            None
        },
        last_sync_ts: row.get("last_sync"),
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let catalogs = vec![
        catalog_stats(&pool, "games", "games", "", true).await?,
        catalog_stats(&pool, "movies", "titles", "WHERE content_type = 'movie'", true).await?,
        catalog_stats(&pool, "tv", "titles", "WHERE content_type = 'tv'", true).await?,
        catalog_stats(&pool, "books", "books", "", false).await?,
    ];

    let mut reference = Vec::new();
    for table in ["genres", "actors", "crew_members", "users"] {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&pool)
            .await?;
        reference.push((table, n));
    }

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("MGB Catalog - Database Stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!(
        "  {:<10} {:>8} {:>10}   {}",
        "CATALOG", "ITEMS", "TRAILERS", "LAST SYNC"
    );
    println!("  {}", "-".repeat(48));
    for c in &catalogs {
        let trailers = match c.with_trailer {
            Some(n) => n.to_string(),
            None => "-".to_string(),
        };
        let sync_display = match c.last_sync_ts {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        };
        println!(
            "  {:<10} {:>8} {:>10}   {}",
            c.name, c.items, trailers, sync_display
        );
    }

    println!();
    for (table, n) in &reference {
        println!("  {:<13} {}", format!("{}:", table), n);
    }
    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        format_ts_iso(ts)
    } else if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn recent_timestamps_are_relative() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 7200), "2 hours ago");
        assert_eq!(format_ts_relative(now - 86400), "1 day ago");
    }
}
