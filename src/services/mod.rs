pub mod balance_updater;
pub mod retry;
pub mod transfer_engine;

pub use balance_updater::{BalanceFloor, BalanceUpdater};
pub use retry::retry_transient;
pub use transfer_engine::{
    apply_transfer, canonical_order, LockOrder, TransferEngine, TransferPolicy,
};
