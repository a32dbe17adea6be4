//! Persisted record of every item ever seen.
//!
//! Mutating primitives take a connection so the caller decides the
//! transaction boundary; a cycle uses exactly one transaction per phase.

use crate::types::{Item, Result};
use crate::utils::time::{datetime_to_ms, ms_to_datetime};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqliteConnection};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    /// Opens (creating if needed) the database at `database_url` and applies
    /// pending migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        ensure_sqlite_dir(database_url)?;

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // One writer; the cycle never needs more.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        MIGRATOR.run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn lookup_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(|r| item_from_row(&r)).transpose()
    }

    pub async fn insert(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO items (id, title, authors, summary, link, published_at, source, sent, created_at, inserted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.authors)
        .bind(&item.summary)
        .bind(&item.link)
        .bind(item.published_at.map(datetime_to_ms))
        .bind(&item.source)
        .bind(item.sent)
        .bind(datetime_to_ms(item.created_at))
        .bind(datetime_to_ms(item.inserted_at))
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Flips `sent` for the given ids. Rows that are already sent are left
    /// alone and not counted.
    pub async fn mark_sent(conn: &mut SqliteConnection, ids: &[String]) -> Result<u64> {
        let mut marked = 0;
        for id in ids {
            let result = sqlx::query("UPDATE items SET sent = 1 WHERE id = ? AND sent = 0")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            marked += result.rows_affected();
        }

        debug!("Marked {} of {} items as sent", marked, ids.len());
        Ok(marked)
    }

    /// Unsent items inserted at or after `cutoff`, newest publication first
    /// (undated last), then most recently ingested first.
    pub async fn select_unsent_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM items
            WHERE sent = 0 AND inserted_at >= ?
            ORDER BY published_at IS NULL, published_at DESC, inserted_at DESC, rowid DESC
            "#,
        )
        .bind(datetime_to_ms(cutoff))
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(item_from_row).collect::<Result<Vec<_>>>()?;
        info!("Selected {} unsent items since {}", items.len(), cutoff);
        Ok(items)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        Self::lookup_by_id(&mut conn, id).await
    }

    pub async fn count_items(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn item_from_row(row: &SqliteRow) -> Result<Item> {
    Ok(Item {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        authors: row.try_get("authors")?,
        summary: row.try_get("summary")?,
        link: row.try_get("link")?,
        published_at: row.try_get::<Option<i64>, _>("published_at")?.map(ms_to_datetime),
        source: row.try_get("source")?,
        sent: row.try_get("sent")?,
        created_at: ms_to_datetime(row.try_get("created_at")?),
        inserted_at: ms_to_datetime(row.try_get("inserted_at")?),
    })
}

fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = path.split('?').next().unwrap_or(path);

    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
