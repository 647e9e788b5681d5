use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::{from_str, to_string};

use crate::db::{
    connection::Database,
    helpers::{datetime_from_millis, parse_category, parse_datetime},
    models::CacheEntry,
};

impl Database {
    /// Insert or overwrite the entry for `entry.message_hash`.
    pub async fn upsert_cache_entry(&self, entry: &CacheEntry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| {
            let embedding_json =
                to_string(&record.embedding).context("failed to serialize embedding")?;
            let context_json =
                to_string(&record.context).context("failed to serialize analysis context")?;

            conn.execute(
                "INSERT OR REPLACE INTO sentiment_cache (
                    message_hash,
                    embedding_json,
                    sentiment,
                    category,
                    confidence,
                    context_json,
                    user_id,
                    room_id,
                    sender_name,
                    created_at,
                    expires_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.message_hash,
                    embedding_json,
                    record.sentiment,
                    record.category.as_str(),
                    record.confidence,
                    context_json,
                    record.user_id,
                    record.room_id,
                    record.sender_name,
                    record.created_at.to_rfc3339(),
                    record.expires_at.timestamp_millis(),
                ],
            )
            .with_context(|| "failed to insert cache entry")?;
            Ok(())
        })
        .await
    }

    /// Look up a live entry. Expired rows are deleted on the way out.
    pub async fn get_cache_entry(
        &self,
        message_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        let message_hash = message_hash.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    message_hash,
                    embedding_json,
                    sentiment,
                    category,
                    confidence,
                    context_json,
                    user_id,
                    room_id,
                    sender_name,
                    created_at,
                    expires_at_ms
                FROM sentiment_cache
                WHERE message_hash = ?1",
            )?;

            let mut rows = stmt.query(params![message_hash])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };

            let expires_at_ms: i64 = row.get(10)?;
            if expires_at_ms <= now.timestamp_millis() {
                drop(rows);
                drop(stmt);
                conn.execute(
                    "DELETE FROM sentiment_cache WHERE message_hash = ?1",
                    params![message_hash],
                )
                .with_context(|| "failed to evict expired cache entry")?;
                return Ok(None);
            }

            let embedding_json: String = row.get(1)?;
            let context_json: String = row.get(5)?;

            let entry = CacheEntry {
                message_hash: row.get(0)?,
                embedding: from_str(&embedding_json).context("failed to decode embedding")?,
                sentiment: row.get(2)?,
                category: parse_category(&row.get::<_, String>(3)?)?,
                confidence: row.get(4)?,
                context: from_str(&context_json).context("failed to decode analysis context")?,
                user_id: row.get(6)?,
                room_id: row.get(7)?,
                sender_name: row.get(8)?,
                created_at: parse_datetime(&row.get::<_, String>(9)?, "created_at")?,
                expires_at: datetime_from_millis(expires_at_ms, "expires_at_ms")?,
            };

            Ok(Some(entry))
        })
        .await
    }

    /// Bulk delete every entry whose expiry is at or before `now`.
    pub async fn delete_expired_cache_entries(&self, now: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            let removed = conn
                .execute(
                    "DELETE FROM sentiment_cache WHERE expires_at_ms <= ?1",
                    params![now.timestamp_millis()],
                )
                .with_context(|| "failed to purge expired cache entries")?;
            Ok(removed)
        })
        .await
    }

    pub async fn count_cache_entries(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM sentiment_cache", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
