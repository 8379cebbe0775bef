use crate::error::{AppError, Result};
use crate::models::{CreateTransferParams, ListTransfersParams, Transfer};
use async_trait::async_trait;
use sqlx::PgConnection;
use std::ops::DerefMut;

use super::Queries;

/// Append-only access to the `transfers` table.
#[async_trait]
pub trait TransferRepository: Send {
    async fn create_transfer(&mut self, params: &CreateTransferParams) -> Result<Transfer>;

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer>;

    /// Lists transfers, optionally only those where the account is either side.
    async fn list_transfers(&mut self, params: &ListTransfersParams) -> Result<Vec<Transfer>>;

    async fn delete_transfer(&mut self, id: i64) -> Result<()>;
}

#[async_trait]
impl<C> TransferRepository for Queries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn create_transfer(&mut self, params: &CreateTransferParams) -> Result<Transfer> {
        let row = sqlx::query_as::<_, Transfer>(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(self.connection())
        .await?;

        Ok(row)
    }

    async fn get_transfer(&mut self, id: i64) -> Result<Transfer> {
        sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.connection())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transfer '{}' not found", id)))
    }

    async fn list_transfers(&mut self, params: &ListTransfersParams) -> Result<Vec<Transfer>> {
        let rows = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE ($1::bigint IS NULL OR from_account_id = $1 OR to_account_id = $1)
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

    async fn delete_transfer(&mut self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM transfers WHERE id = $1")
            .bind(id)
            .execute(self.connection())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Transfer '{}' not found", id)));
        }

        Ok(())
    }
}
