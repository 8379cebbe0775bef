use crate::error::{AppError, Result};
use crate::models::{
    Account, AddAccountBalanceParams, CreateAccountParams, ListParams, UpdateAccountParams,
};
use async_trait::async_trait;
use sqlx::PgConnection;
use std::ops::DerefMut;

use super::Queries;

/// CRUD over the `accounts` table.
#[async_trait]
pub trait AccountRepository: Send {
    async fn create_account(&mut self, params: &CreateAccountParams) -> Result<Account>;

    async fn get_account(&mut self, id: i64) -> Result<Account>;

    async fn list_accounts(&mut self, params: &ListParams) -> Result<Vec<Account>>;

    async fn update_account(&mut self, params: &UpdateAccountParams) -> Result<Account>;

    /// Adds `params.amount` to the balance in one statement and returns the updated row.
    /// The statement takes the row lock, so concurrent callers on the same account queue up.
    async fn add_account_balance(&mut self, params: &AddAccountBalanceParams) -> Result<Account>;

    async fn delete_account(&mut self, id: i64) -> Result<()>;
}

#[async_trait]
impl<C> AccountRepository for Queries<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn create_account(&mut self, params: &CreateAccountParams) -> Result<Account> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (owner, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&params.owner)
        .bind(params.balance)
        .bind(&params.currency)
        .fetch_one(self.connection())
        .await?;

        Ok(row)
    }

    async fn get_account(&mut self, id: i64) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.connection())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", id)))
    }

    async fn list_accounts(&mut self, params: &ListParams) -> Result<Vec<Account>> {
        let rows = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(params.limit)
        .bind(params.offset)
        .fetch_all(self.connection())
        .await?;

        Ok(rows)
    }

    async fn update_account(&mut self, params: &UpdateAccountParams) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.balance)
        .fetch_optional(self.connection())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", params.id)))
    }

    async fn add_account_balance(&mut self, params: &AddAccountBalanceParams) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET balance = balance + $2
            WHERE id = $1
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(params.id)
        .bind(params.amount)
        .fetch_optional(self.connection())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", params.id)))
    }

    async fn delete_account(&mut self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(self.connection())
            .await
            .map_err(|err| match AppError::from(err) {
                // Still referenced by entries or transfers.
                AppError::NotFound(message) => AppError::ConstraintViolation(message),
                other => other,
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Account '{}' not found", id)));
        }

        Ok(())
    }
}
