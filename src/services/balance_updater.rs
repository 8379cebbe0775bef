use crate::error::{AppError, Result};
use crate::models::{Account, AddAccountBalanceParams};
use crate::repositories::AccountRepository;
use tracing::debug;

/// Whether a debit may leave an account below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalanceFloor {
    /// Overdrafts are allowed; balances are never clamped.
    #[default]
    AllowNegative,
    /// A debit that would leave the balance below zero aborts the transfer.
    NonNegative,
}

/// Applies signed deltas to account balances.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceUpdater {
    floor: BalanceFloor,
}

impl BalanceUpdater {
    pub fn new(floor: BalanceFloor) -> Self {
        Self { floor }
    }

    /// Adds `delta` to the account balance and returns the updated row.
    ///
    /// The read, the addition and the write happen in a single statement, which
    /// also takes the row lock held until the surrounding transaction ends. The
    /// floor check runs on the returned row, so it sees the locked value.
    pub async fn apply_delta<R>(&self, repo: &mut R, account_id: i64, delta: i64) -> Result<Account>
    where
        R: AccountRepository + ?Sized,
    {
        let account = repo
            .add_account_balance(&AddAccountBalanceParams {
                id: account_id,
                amount: delta,
            })
            .await?;

        debug!(
            account_id,
            delta,
            balance = account.balance,
            "Applied balance delta"
        );

        if self.floor == BalanceFloor::NonNegative && delta < 0 && account.balance < 0 {
            return Err(AppError::InsufficientFunds {
                account_id,
                balance: account.balance,
            });
        }

        Ok(account)
    }
}
