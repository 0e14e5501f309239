//! Suggestion repository.
//!
//! Each user holds only the most recent set: [`SuggestionStore::store`]
//! deletes and inserts inside one transaction so readers never observe a
//! half-replaced set. Concurrent replacements for one user are serialized on
//! a transaction-scoped advisory lock, otherwise two transactions that both
//! delete before either commits would leave both sets behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use cartwise_core::{SuggestionId, UserId};

use super::{RepositoryError, SuggestionStore};
use crate::models::{Suggestion, SuggestionDraft, decode_items, encode_items};

/// Advisory lock class for per-user suggestion replacement.
const SUGGESTION_LOCK_CLASS: i32 = 0x5347;

/// `PostgreSQL`-backed [`SuggestionStore`].
#[derive(Clone)]
pub struct PgSuggestionRepository {
    pool: PgPool,
}

impl PgSuggestionRepository {
    /// Create a new suggestion repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SuggestionStore for PgSuggestionRepository {
    #[instrument(skip(self, drafts), fields(count = drafts.len()))]
    async fn store(
        &self,
        user_id: UserId,
        drafts: &[SuggestionDraft],
    ) -> Result<Vec<Suggestion>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(SUGGESTION_LOCK_CLASS)
            .bind(user_id.as_i32())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM storefront.suggestion WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = sqlx::query_as::<_, SuggestionRow>(
                r"
                INSERT INTO storefront.suggestion (user_id, title, items, reason, created_at)
                VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
                RETURNING id, user_id, title, items, reason, created_at
                ",
            )
            .bind(user_id.as_i32())
            .bind(&draft.title)
            .bind(encode_items(&draft.items))
            .bind(&draft.reason)
            .bind(draft.timestamp)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(Suggestion::from(row));
        }

        tx.commit().await?;
        Ok(stored)
    }

    #[instrument(skip(self))]
    async fn get(&self, user_id: UserId) -> Result<Vec<Suggestion>, RepositoryError> {
        let rows = sqlx::query_as::<_, SuggestionRow>(
            r"
            SELECT id, user_id, title, items, reason, created_at
            FROM storefront.suggestion
            WHERE user_id = $1
            ORDER BY id
            ",
        )
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Suggestion::from).collect())
    }

    #[instrument(skip(self))]
    async fn exists(&self, user_id: UserId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM storefront.suggestion WHERE user_id = $1)",
        )
        .bind(user_id.as_i32())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.suggestion WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct SuggestionRow {
    id: i32,
    user_id: i32,
    title: String,
    items: String,
    reason: String,
    created_at: DateTime<Utc>,
}

impl From<SuggestionRow> for Suggestion {
    fn from(row: SuggestionRow) -> Self {
        Self {
            id: SuggestionId::new(row.id),
            user_id: UserId::new(row.user_id),
            title: row.title,
            items: decode_items(&row.items),
            reason: row.reason,
            timestamp: row.created_at,
        }
    }
}
