use crate::config::IsolationLevel;
use crate::error::Result;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

use super::{Queries, Repository};

/// A repository whose operations all run inside one open transaction.
///
/// Consuming `commit`/`rollback` end the scope. Dropping a scope without
/// calling either rolls it back.
#[async_trait]
pub trait TransactionScope: Repository {
    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}

/// Source of transaction scopes.
#[async_trait]
pub trait Store: Send + Sync {
    type Scope: TransactionScope;

    /// Opens a new transaction and returns a repository bound to it.
    async fn begin(&self) -> Result<Self::Scope>;
}

pub type PgScope = Queries<Transaction<'static, Postgres>>;
pub type PgQueries = Queries<PoolConnection<Postgres>>;

#[async_trait]
impl TransactionScope for PgScope {
    async fn commit(self) -> Result<()> {
        self.into_inner().commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.into_inner().rollback().await?;
        Ok(())
    }
}

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    isolation_level: IsolationLevel,
    lock_timeout: Option<Duration>,
}

/// `SET LOCAL` statement bounding how long one statement of a scope waits for a row lock.
pub fn lock_timeout_statement(timeout: Duration) -> String {
    // Zero would disable the limit on the server.
    let millis = timeout.as_millis().max(1);
    format!("SET LOCAL lock_timeout = '{millis}ms'")
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            isolation_level: IsolationLevel::default(),
            lock_timeout: None,
        }
    }

    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    /// Makes a scope's statements give up on a contended row lock after `timeout`.
    ///
    /// The server then reports `lock_not_available`, which surfaces as a
    /// retryable [`AppError::TransientStore`](crate::error::AppError).
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Checks out a pooled connection for plain, autocommitted CRUD.
    pub async fn queries(&self) -> Result<PgQueries> {
        let conn = self.pool.acquire().await?;
        Ok(Queries::new(conn))
    }
}

#[async_trait]
impl Store for PgStore {
    type Scope = PgScope;

    async fn begin(&self) -> Result<PgScope> {
        let mut tx = self.pool.begin().await?;

        let statement = format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            self.isolation_level.as_sql()
        );
        sqlx::query(&statement).execute(&mut *tx).await?;

        if let Some(timeout) = self.lock_timeout {
            sqlx::query(&lock_timeout_statement(timeout))
                .execute(&mut *tx)
                .await?;
        }

        debug!("Transaction opened at {}", self.isolation_level.as_sql());
        Ok(Queries::new(tx))
    }
}
