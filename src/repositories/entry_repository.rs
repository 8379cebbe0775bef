use crate::error::{AppError, Result};
use crate::models::{CreateEntryParams, Entry, ListEntriesParams};
use async_trait::async_trait;
use sqlx::PgConnection;
use std::ops::DerefMut;

use super::Queries;

/// Append-only access to the `entries` table. Entries are never updated.
#[async_trait]
pub trait EntryRepository: Send {
    async fn create_entry(&mut self, params: &CreateEntryParams) -> Result<Entry>;

    async fn get_entry(&mut self, id: i64) -> Result<Entry>;

    async fn list_entries(&mut self, params: &ListEntriesParams) -> Result<Vec<Entry>>;

    async fn delete_entry(&mut self, id: i64) -> Result<()>;
}

#[async_trait]
impl<C> EntryRepository for Queries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn create_entry(&mut self, params: &CreateEntryParams) -> Result<Entry> {
        let row = sqlx::query_as::<_, Entry>(
            r#"
            INSERT INTO entries (account_id, amount)
            VALUES ($1, $2)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(self.connection())
        .await?;

        Ok(row)
    }

    async fn get_entry(&mut self, id: i64) -> Result<Entry> {
        sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.connection())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry '{}' not found", id)))
    }

    async fn list_entries(&mut self, params: &ListEntriesParams) -> Result<Vec<Entry>> {
        let rows = sqlx::query_as::<_, Entry>(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE ($1::bigint IS NULL OR account_id = $1)
            ORDER BY id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(params.account_id)
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(self.connection())
        .await?;

        Ok(rows)
    }

    async fn delete_entry(&mut self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1")
            .bind(id)
            .execute(self.connection())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Entry '{}' not found", id)));
        }

        Ok(())
    }
}
