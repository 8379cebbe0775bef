pub mod account_repository;
pub mod entry_repository;
pub mod queries;
pub mod store;
pub mod transfer_repository;

pub use account_repository::AccountRepository;
pub use entry_repository::EntryRepository;
pub use queries::Queries;
pub use store::{
    lock_timeout_statement, PgQueries, PgScope, PgStore, Store, TransactionScope,
};
pub use transfer_repository::TransferRepository;

/// Every row-level operation the ledger needs, over one connection handle.
pub trait Repository: AccountRepository + EntryRepository + TransferRepository + Send {}

impl<T> Repository for T where T: AccountRepository + EntryRepository + TransferRepository + Send {}
