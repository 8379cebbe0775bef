pub mod account;
pub mod entry;
pub mod list;
pub mod transfer;

pub use account::{Account, AddAccountBalanceParams, CreateAccountParams, UpdateAccountParams};
pub use entry::{negate, CreateEntryParams, Entry, ListEntriesParams};
pub use list::ListParams;
pub use transfer::{
    CreateTransferParams, ListTransfersParams, Transfer, TransferParams, TransferResult,
};

/// Page size used when a caller does not pick one.
pub const DEFAULT_PAGE_SIZE: i64 = 5;
