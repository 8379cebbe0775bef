use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{Account, Entry};

/// Immutable record of funds moved between two accounts. `amount` is the magnitude moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl CreateTransferParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }
}

/// Input of a full transfer: the same three fields as the transfer row itself.
pub type TransferParams = CreateTransferParams;

/// Page of transfers, optionally restricted to those touching one account on either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTransfersParams {
    pub account_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListTransfersParams {
    fn default() -> Self {
        Self {
            account_id: None,
            limit: super::DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

/// Everything a committed transfer produced.
///
/// `from_account`/`to_account` follow the logical direction of the transfer,
/// not the order in which the rows were locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
