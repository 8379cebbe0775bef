use crate::config::TransferSettings;
use crate::error::{AppError, Result};
use crate::models::{negate, CreateEntryParams, TransferParams, TransferResult};
use crate::observability::{get_metrics, LatencyTimer, TransferOutcome};
use crate::repositories::{Repository, Store, TransactionScope};
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::balance_updater::{BalanceFloor, BalanceUpdater};

/// Which side of a transfer has its balance row updated, and so locked, first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOrder {
    FromFirst,
    ToFirst,
}

/// Picks the update order for a pair of accounts: lowest id first.
///
/// Every transfer touching the same two accounts locks them in the same order
/// whatever its direction, so no two transfers can wait on each other's row locks.
pub fn canonical_order(from_account_id: i64, to_account_id: i64) -> LockOrder {
    if from_account_id < to_account_id {
        LockOrder::FromFirst
    } else {
        LockOrder::ToFirst
    }
}

/// Checks applied to a transfer request before any store round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    pub require_positive_amount: bool,
    pub allow_self_transfer: bool,
    pub balance_floor: BalanceFloor,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            require_positive_amount: true,
            allow_self_transfer: false,
            balance_floor: BalanceFloor::AllowNegative,
        }
    }
}

impl TransferPolicy {
    /// Accepts anything, including zero, negative and self transfers.
    pub fn permissive() -> Self {
        Self {
            require_positive_amount: false,
            allow_self_transfer: true,
            balance_floor: BalanceFloor::AllowNegative,
        }
    }

    pub fn validate(&self, params: &TransferParams) -> Result<()> {
        // Checked under every policy: the debit leg must be representable.
        negate(params.amount)?;

        if self.require_positive_amount && params.amount <= 0 {
            return Err(AppError::Validation(format!(
                "Transfer amount must be positive, got {}",
                params.amount
            )));
        }

        if !self.allow_self_transfer && params.from_account_id == params.to_account_id {
            return Err(AppError::Validation(format!(
                "Cannot transfer from account '{}' to itself",
                params.from_account_id
            )));
        }

        Ok(())
    }
}

impl From<&TransferSettings> for TransferPolicy {
    fn from(settings: &TransferSettings) -> Self {
        Self {
            require_positive_amount: settings.require_positive_amount,
            allow_self_transfer: settings.allow_self_transfer,
            balance_floor: if settings.allow_negative_balance {
                BalanceFloor::AllowNegative
            } else {
                BalanceFloor::NonNegative
            },
        }
    }
}

/// Writes one transfer through `repo`: the transfer row, both entries, then
/// both balances in canonical lock order.
///
/// `repo` must be bound to an open transaction; committing or rolling back is
/// the caller's job.
pub async fn apply_transfer<R>(
    repo: &mut R,
    params: &TransferParams,
    updater: BalanceUpdater,
) -> Result<TransferResult>
where
    R: Repository + ?Sized,
{
    let debit = negate(params.amount)?;
    let transfer = repo.create_transfer(params).await?;

    let from_entry = repo
        .create_entry(&CreateEntryParams::debit(params.from_account_id, params.amount)?)
        .await?;

    let to_entry = repo
        .create_entry(&CreateEntryParams::credit(params.to_account_id, params.amount))
        .await?;

    let (from_account, to_account) =
        match canonical_order(params.from_account_id, params.to_account_id) {
            LockOrder::FromFirst => {
                let from = updater
                    .apply_delta(&mut *repo, params.from_account_id, debit)
                    .await?;
                let to = updater
                    .apply_delta(&mut *repo, params.to_account_id, params.amount)
                    .await?;
                (from, to)
            }
            LockOrder::ToFirst => {
                let to = updater
                    .apply_delta(&mut *repo, params.to_account_id, params.amount)
                    .await?;
                let from = updater
                    .apply_delta(&mut *repo, params.from_account_id, debit)
                    .await?;
                (from, to)
            }
        };

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

/// Executes transfers atomically against a [`Store`].
///
/// The engine holds no locks of its own; concurrent transfers are serialized
/// by the store's row locks. Nothing is retried here.
pub struct TransferEngine<S> {
    store: S,
    policy: TransferPolicy,
    timeout: Option<Duration>,
}

impl<S: Store> TransferEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: TransferPolicy::default(),
            timeout: None,
        }
    }

    pub fn from_settings(store: S, settings: &TransferSettings) -> Self {
        Self::new(store)
            .with_policy(TransferPolicy::from(settings))
            .with_timeout(settings.timeout())
    }

    pub fn with_policy(mut self, policy: TransferPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Bounds every call to [`transfer`](Self::transfer).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Moves `params.amount` from one account to the other in a single transaction.
    ///
    /// On success all five writes are committed. On any failure the transaction
    /// is rolled back and the first error is returned.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult> {
        match self.timeout {
            Some(timeout) => self.transfer_with_timeout(params, timeout).await,
            None => self.execute(params).await,
        }
    }

    /// Like [`transfer`](Self::transfer) but gives up after `timeout`.
    ///
    /// On expiry the in-flight transaction is dropped, which rolls it back,
    /// and `AppError::Cancelled` is returned. A statement already sent keeps
    /// waiting on the server until its own lock timeout, see
    /// [`PgStore::with_lock_timeout`](crate::repositories::PgStore::with_lock_timeout).
    ///
    /// If the deadline passes while the commit is in flight, the commit may
    /// still have landed; `Cancelled` then means the outcome is unknown and
    /// the caller should read the transfer back before retrying.
    pub async fn transfer_with_timeout(
        &self,
        params: TransferParams,
        timeout: Duration,
    ) -> Result<TransferResult> {
        let timer = LatencyTimer::new();

        match tokio::time::timeout(timeout, self.execute(params)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    from_account_id = params.from_account_id,
                    to_account_id = params.to_account_id,
                    "Transfer timed out after {:?}, rolled back",
                    timeout
                );
                get_metrics().record_transfer(TransferOutcome::Cancelled, timer.elapsed_ms());
                Err(AppError::Cancelled(format!(
                    "transfer did not complete within {:?}",
                    timeout
                )))
            }
        }
    }

    async fn execute(&self, params: TransferParams) -> Result<TransferResult> {
        let timer = LatencyTimer::new();
        let span = info_span!(
            "transfer",
            transfer_ref = %Uuid::new_v4(),
            from_account_id = params.from_account_id,
            to_account_id = params.to_account_id,
            amount = params.amount,
        );

        let result = self.run(params).instrument(span).await;

        let outcome = match &result {
            Ok(_) => TransferOutcome::Committed,
            Err(err) => TransferOutcome::from(err),
        };
        get_metrics().record_transfer(outcome, timer.elapsed_ms());

        result
    }

    async fn run(&self, params: TransferParams) -> Result<TransferResult> {
        self.policy.validate(&params)?;

        let mut scope = self.store.begin().await?;
        let updater = BalanceUpdater::new(self.policy.balance_floor);

        match apply_transfer(&mut scope, &params, updater).await {
            Ok(result) => {
                scope.commit().await?;
                info!(transfer_id = result.transfer.id, "Transfer committed");
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, "Transfer failed, rolling back");
                match scope.rollback().await {
                    Ok(()) => {
                        get_metrics().record_rollback(true);
                        Err(err)
                    }
                    Err(rollback) => {
                        error!(error = %err, rollback_error = %rollback, "Rollback failed");
                        get_metrics().record_rollback(false);
                        Err(AppError::RollbackFailure {
                            source: Box::new(err),
                            rollback: Box::new(rollback),
                        })
                    }
                }
            }
        }
    }
}
