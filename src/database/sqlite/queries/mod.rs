
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

const SELECT_COLUMNS: &str = r#"
    SELECT id,
           user_id,
           source,
           kind,
           file_name,
           video_id,
           size_bytes,
           chunk_count,
           has_transcript,
           transcript_source,
           ingested_date
    FROM ingested_sources
"#;

pub struct SourceQueries;

impl SourceQueries {
    /// Record an ingestion. Re-ingesting the same source accumulates its
    /// chunk count and refreshes the rest of the row.
    #[inline]
    pub async fn record(pool: &SqlitePool, new_source: NewIngestedSource) -> Result<IngestedSource> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            r#"
            INSERT INTO ingested_sources
                (user_id, source, kind, file_name, video_id, size_bytes, chunk_count, has_transcript, transcript_source, ingested_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, source) DO UPDATE SET
                kind = excluded.kind,
                file_name = excluded.file_name,
                video_id = excluded.video_id,
                size_bytes = excluded.size_bytes,
                chunk_count = ingested_sources.chunk_count + excluded.chunk_count,
                has_transcript = excluded.has_transcript,
                transcript_source = excluded.transcript_source,
                ingested_date = excluded.ingested_date
            "#,
        )
        .bind(&new_source.user_id)
        .bind(&new_source.source)
        .bind(new_source.kind)
        .bind(&new_source.file_name)
        .bind(&new_source.video_id)
        .bind(new_source.size_bytes)
        .bind(new_source.chunk_count)
        .bind(new_source.has_transcript)
        .bind(new_source.transcript_source)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to record ingested source")?;

        debug!(
            "Recorded {} source '{}' for user {}",
            new_source.kind, new_source.source, new_source.user_id
        );

        Self::get_by_source(pool, &new_source.user_id, &new_source.source)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve recorded source"))
    }

    #[inline]
    pub async fn get_by_source(
        pool: &SqlitePool,
        user_id: &str,
        source: &str,
    ) -> Result<Option<IngestedSource>> {
        let query = format!("{SELECT_COLUMNS} WHERE user_id = ? AND source = ?");
        sqlx::query_as::<_, IngestedSource>(&query)
            .bind(user_id)
            .bind(source)
            .fetch_optional(pool)
            .await
            .context("Failed to get ingested source")
    }

    /// All sources of a user, most recent first
    #[inline]
    pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<IngestedSource>> {
        let query = format!("{SELECT_COLUMNS} WHERE user_id = ? ORDER BY ingested_date DESC, id DESC");
        sqlx::query_as::<_, IngestedSource>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
            .context("Failed to list ingested sources")
    }

    #[inline]
    pub async fn delete_for_user(pool: &SqlitePool, user_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM ingested_sources WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await
            .context("Failed to delete ingested sources")?;

        debug!(
            "Deleted {} ledger rows for user {}",
            result.rows_affected(),
            user_id
        );
        Ok(result.rows_affected())
    }
}
