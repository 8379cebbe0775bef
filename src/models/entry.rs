use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// An immutable ledger line. Negative amounts are debits, positive amounts credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

impl CreateEntryParams {
    /// Entry taking `amount` out of the account. Fails for `i64::MIN`, which has no negation.
    pub fn debit(account_id: i64, amount: i64) -> Result<Self> {
        Ok(Self {
            account_id,
            amount: negate(amount)?,
        })
    }

    pub fn credit(account_id: i64, amount: i64) -> Self {
        Self { account_id, amount }
    }
}

/// The debit side of `amount`.
pub fn negate(amount: i64) -> Result<i64> {
    amount
        .checked_neg()
        .ok_or_else(|| AppError::Validation(format!("Amount {amount} cannot be negated")))
}

/// Page of entries, optionally restricted to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntriesParams {
    pub account_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListEntriesParams {
    fn default() -> Self {
        Self {
            account_id: None,
            limit: super::DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}
