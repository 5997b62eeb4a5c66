//! SQLite prompt record repository implementation.
//!
//! Implements `PromptRecordRepository` from `promptwright-core` using sqlx with
//! split read/write pools. The pending list is a JSON column on
//! `prompt_records`; history and prompt versions are append-only tables.
//! Every write runs in a transaction on the single-connection writer pool,
//! so read-modify-write sequences for one user cannot interleave.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};

use promptwright_core::repository::prompt::PromptRecordRepository;
use promptwright_types::error::RepositoryError;
use promptwright_types::training::{
    Modification, PromptChangeReason, PromptRecord, PromptVersion, RecordedModification, UserId,
};

use super::pool::DatabasePool;

/// SQLite-backed implementation of `PromptRecordRepository`.
pub struct SqlitePromptRecordRepository {
    pool: DatabasePool,
}

impl SqlitePromptRecordRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn query_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn encode_pending(pending: &[Modification]) -> Result<String, RepositoryError> {
    serde_json::to_string(pending)
        .map_err(|e| RepositoryError::Query(format!("failed to encode pending modifications: {e}")))
}

fn decode_pending(json: &str) -> Result<Vec<Modification>, RepositoryError> {
    serde_json::from_str(json)
        .map_err(|e| RepositoryError::Query(format!("invalid pending modifications: {e}")))
}

fn row_to_version(row: &sqlx::sqlite::SqliteRow) -> Result<PromptVersion, RepositoryError> {
    let reason: String = row.try_get("reason").map_err(query_err)?;
    let modifications_applied: i64 = row.try_get("modifications_applied").map_err(query_err)?;
    let created_at: String = row.try_get("created_at").map_err(query_err)?;

    Ok(PromptVersion {
        version: row.try_get("version").map_err(query_err)?,
        prompt: row.try_get("prompt").map_err(query_err)?,
        reason: reason.parse::<PromptChangeReason>().map_err(RepositoryError::Query)?,
        modifications_applied: u32::try_from(modifications_applied).unwrap_or(0),
        created_at: parse_datetime(&created_at)?,
    })
}

/// Insert the default empty record for `user_id` if it does not exist yet.
async fn ensure_record(conn: &mut SqliteConnection, user_id: &UserId) -> Result<(), RepositoryError> {
    let now = format_datetime(&Utc::now());
    sqlx::query(
        "INSERT INTO prompt_records (user_id, prompt, pending_modifications, flush_failures, created_at, updated_at)
         VALUES (?, '', '[]', 0, ?, ?)
         ON CONFLICT(user_id) DO NOTHING",
    )
    .bind(user_id.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .map_err(query_err)?;
    Ok(())
}

/// Load the full record (with history) for `user_id`.
async fn load_record(
    conn: &mut SqliteConnection,
    user_id: &UserId,
) -> Result<Option<PromptRecord>, RepositoryError> {
    let row = sqlx::query(
        "SELECT prompt, pending_modifications, flush_failures, created_at, updated_at
         FROM prompt_records WHERE user_id = ?",
    )
    .bind(user_id.as_str())
    .fetch_optional(&mut *conn)
    .await
    .map_err(query_err)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let pending_json: String = row.try_get("pending_modifications").map_err(query_err)?;
    let flush_failures: i64 = row.try_get("flush_failures").map_err(query_err)?;
    let created_at: String = row.try_get("created_at").map_err(query_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(query_err)?;

    let history_rows = sqlx::query(
        "SELECT modification_type, description, recorded_at
         FROM prompt_modification_history WHERE user_id = ? ORDER BY id ASC",
    )
    .bind(user_id.as_str())
    .fetch_all(&mut *conn)
    .await
    .map_err(query_err)?;

    let mut history = Vec::with_capacity(history_rows.len());
    for h in &history_rows {
        let recorded_at: String = h.try_get("recorded_at").map_err(query_err)?;
        history.push(RecordedModification {
            modification: Modification::new(
                h.try_get::<String, _>("modification_type").map_err(query_err)?,
                h.try_get::<String, _>("description").map_err(query_err)?,
            ),
            recorded_at: parse_datetime(&recorded_at)?,
        });
    }

    Ok(Some(PromptRecord {
        user_id: user_id.clone(),
        prompt: row.try_get("prompt").map_err(query_err)?,
        pending_modifications: decode_pending(&pending_json)?,
        history,
        flush_failures: u32::try_from(flush_failures).unwrap_or(0),
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    }))
}

/// Write the next numbered version and make it the current prompt.
async fn write_version(
    conn: &mut SqliteConnection,
    user_id: &UserId,
    prompt: &str,
    reason: PromptChangeReason,
    modifications_applied: u32,
) -> Result<PromptVersion, RepositoryError> {
    let now = Utc::now();
    let (next,): (i32,) = sqlx::query_as(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM prompt_versions WHERE user_id = ?",
    )
    .bind(user_id.as_str())
    .fetch_one(&mut *conn)
    .await
    .map_err(query_err)?;

    sqlx::query(
        "INSERT INTO prompt_versions (user_id, version, prompt, reason, modifications_applied, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id.as_str())
    .bind(next)
    .bind(prompt)
    .bind(reason.to_string())
    .bind(i64::from(modifications_applied))
    .bind(format_datetime(&now))
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.message().contains("UNIQUE") {
                return RepositoryError::Conflict(format!(
                    "prompt version {next} already exists for user {user_id}"
                ));
            }
        }
        query_err(e)
    })?;

    sqlx::query("UPDATE prompt_records SET prompt = ?, updated_at = ? WHERE user_id = ?")
        .bind(prompt)
        .bind(format_datetime(&now))
        .bind(user_id.as_str())
        .execute(&mut *conn)
        .await
        .map_err(query_err)?;

    Ok(PromptVersion {
        version: next,
        prompt: prompt.to_string(),
        reason,
        modifications_applied,
        created_at: now,
    })
}

/// Keep the `len - consumed` most recent pending entries.
fn drop_oldest(mut pending: Vec<Modification>, consumed: usize) -> Vec<Modification> {
    let keep = pending.len().saturating_sub(consumed);
    pending.truncate(keep);
    pending
}

impl PromptRecordRepository for SqlitePromptRecordRepository {
    async fn get_or_create(&self, user_id: &UserId) -> Result<PromptRecord, RepositoryError> {
        {
            let mut conn = self.pool.reader.acquire().await.map_err(query_err)?;
            if let Some(record) = load_record(&mut conn, user_id).await? {
                return Ok(record);
            }
        }

        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_record(&mut tx, user_id).await?;
        let record = load_record(&mut tx, user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await.map_err(query_err)?;

        tracing::debug!(user_id = %user_id, "Created empty prompt record");
        Ok(record)
    }

    async fn get_prompt(&self, user_id: &UserId) -> Result<String, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT prompt FROM prompt_records WHERE user_id = ?")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(query_err)?;
        match row {
            Some((prompt,)) => Ok(prompt),
            None => Ok(self.get_or_create(user_id).await?.prompt),
        }
    }

    async fn update_prompt(
        &self,
        user_id: &UserId,
        prompt: &str,
        reason: PromptChangeReason,
        modifications_applied: u32,
    ) -> Result<PromptVersion, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_record(&mut tx, user_id).await?;
        let version = write_version(&mut tx, user_id, prompt, reason, modifications_applied).await?;
        tx.commit().await.map_err(query_err)?;
        Ok(version)
    }

    async fn store_regenerated(
        &self,
        user_id: &UserId,
        prompt: &str,
        consumed: usize,
    ) -> Result<PromptVersion, RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_record(&mut tx, user_id).await?;

        let (pending_json,): (String,) =
            sqlx::query_as("SELECT pending_modifications FROM prompt_records WHERE user_id = ?")
                .bind(user_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(query_err)?;
        let remaining = drop_oldest(decode_pending(&pending_json)?, consumed);

        let applied = u32::try_from(consumed).unwrap_or(u32::MAX);
        let version =
            write_version(&mut tx, user_id, prompt, PromptChangeReason::Regenerated, applied).await?;

        sqlx::query(
            "UPDATE prompt_records SET pending_modifications = ?, flush_failures = 0 WHERE user_id = ?",
        )
        .bind(encode_pending(&remaining)?)
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        tx.commit().await.map_err(query_err)?;
        tracing::debug!(
            user_id = %user_id,
            version = version.version,
            consumed,
            remaining = remaining.len(),
            "Stored regenerated prompt"
        );
        Ok(version)
    }

    async fn append_modification(
        &self,
        user_id: &UserId,
        modification: &Modification,
    ) -> Result<PromptRecord, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_record(&mut tx, user_id).await?;

        let (pending_json,): (String,) =
            sqlx::query_as("SELECT pending_modifications FROM prompt_records WHERE user_id = ?")
                .bind(user_id.as_str())
                .fetch_one(&mut *tx)
                .await
                .map_err(query_err)?;

        let mut pending = decode_pending(&pending_json)?;
        pending.insert(0, modification.clone());

        sqlx::query(
            "UPDATE prompt_records SET pending_modifications = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(encode_pending(&pending)?)
        .bind(&now)
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        sqlx::query(
            "INSERT INTO prompt_modification_history (user_id, modification_type, description, recorded_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.as_str())
        .bind(&modification.modification_type)
        .bind(&modification.description)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(query_err)?;

        let record = load_record(&mut tx, user_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await.map_err(query_err)?;
        Ok(record)
    }

    async fn set_flush_failures(
        &self,
        user_id: &UserId,
        failures: u32,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.writer.begin().await.map_err(query_err)?;
        ensure_record(&mut tx, user_id).await?;
        sqlx::query("UPDATE prompt_records SET flush_failures = ?, updated_at = ? WHERE user_id = ?")
            .bind(i64::from(failures))
            .bind(format_datetime(&Utc::now()))
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(query_err)?;
        tx.commit().await.map_err(query_err)?;
        Ok(())
    }

    async fn list_versions(&self, user_id: &UserId) -> Result<Vec<PromptVersion>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT version, prompt, reason, modifications_applied, created_at
             FROM prompt_versions WHERE user_id = ? ORDER BY version ASC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_err)?;

        let mut versions = Vec::with_capacity(rows.len());
        for row in &rows {
            versions.push(row_to_version(row)?);
        }
        Ok(versions)
    }
}
