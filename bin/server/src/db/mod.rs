//! Postgres persistence.
//!
//! [`PgStore`] implements the relay's storage traits over three tables:
//! - `users`: one conversation document per user
//! - `history_turns`: recorded turns, read in `seq` order
//! - `overflow_units`: pending "continue reading" units, read oldest first

mod rows;

use async_trait::async_trait;
use larn_relay_conversation::{
    Classification, ConversationState, HistoryStore, Speaker, StateStore, Turn,
};
use larn_relay_core::{OverflowEntryId, PersistenceError, UserId};
use larn_relay_reply::{MessageUnit, OverflowEntry, OverflowStore};
use rows::{OverflowRow, TurnRow, unit_columns};
use sqlx::PgPool;

fn read_failed(e: sqlx::Error) -> PersistenceError {
    PersistenceError::ReadFailed {
        reason: e.to_string(),
    }
}

fn write_failed(e: sqlx::Error) -> PersistenceError {
    PersistenceError::WriteFailed {
        reason: e.to_string(),
    }
}

fn delete_failed(e: sqlx::Error) -> PersistenceError {
    PersistenceError::DeleteFailed {
        reason: e.to_string(),
    }
}

/// Store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStore {
    async fn load_state(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ConversationState>, PersistenceError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT current_classification FROM users WHERE id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(read_failed)?;

        Ok(row.map(|(classification,)| ConversationState {
            current_classification: classification.map(Classification::new),
        }))
    }

    async fn save_classification(
        &self,
        user_id: &UserId,
        classification: &Classification,
    ) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, current_classification)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET current_classification = EXCLUDED.current_classification,
                updated_at = NOW()
            "#,
        )
        .bind(user_id.as_str())
        .bind(classification.as_str())
        .execute(&self.pool)
        .await
        .map_err(write_failed)?;
        Ok(())
    }

    async fn ensure_user(&self, user_id: &UserId) -> Result<bool, PersistenceError> {
        let result = sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(write_failed)?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(delete_failed)?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn append_turn(
        &self,
        user_id: &UserId,
        speaker: Speaker,
        text: &str,
    ) -> Result<Turn, PersistenceError> {
        let mut turn = Turn::new(speaker, text, 0);
        let (seq,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO history_turns (id, user_id, speaker, text, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING seq
            "#,
        )
        .bind(turn.id.to_string())
        .bind(user_id.as_str())
        .bind(speaker.as_str())
        .bind(&turn.text)
        .bind(turn.recorded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(write_failed)?;

        turn.sequence = seq;
        Ok(turn)
    }

    async fn history(&self, user_id: &UserId) -> Result<Vec<Turn>, PersistenceError> {
        let rows: Vec<TurnRow> = sqlx::query_as(
            r#"
            SELECT seq, id, speaker, text, recorded_at
            FROM history_turns
            WHERE user_id = $1
            ORDER BY seq
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.into_iter().map(TurnRow::try_into_turn).collect()
    }

    async fn clear_history(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM history_turns WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(delete_failed)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OverflowStore for PgStore {
    async fn append_overflow(
        &self,
        user_id: &UserId,
        units: &[MessageUnit],
    ) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await.map_err(write_failed)?;
        for unit in units {
            let (kind, value) = unit_columns(unit);
            sqlx::query(
                "INSERT INTO overflow_units (id, user_id, kind, value) VALUES ($1, $2, $3, $4)",
            )
            .bind(OverflowEntryId::new().to_string())
            .bind(user_id.as_str())
            .bind(kind)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(write_failed)?;
        }
        tx.commit().await.map_err(write_failed)
    }

    async fn oldest_overflow(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<OverflowEntry>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<OverflowRow> = sqlx::query_as(
            r#"
            SELECT seq, id, kind, value
            FROM overflow_units
            WHERE user_id = $1
            ORDER BY seq
            LIMIT $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.into_iter().map(OverflowRow::try_into_entry).collect()
    }

    async fn delete_overflow_entry(
        &self,
        user_id: &UserId,
        id: OverflowEntryId,
    ) -> Result<(), PersistenceError> {
        sqlx::query("DELETE FROM overflow_units WHERE id = $1 AND user_id = $2")
            .bind(id.to_string())
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(delete_failed)?;
        Ok(())
    }

    async fn clear_overflow(&self, user_id: &UserId) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM overflow_units WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(delete_failed)?;
        Ok(result.rows_affected())
    }
}
