//! Shared value types and key constants.

pub mod keys;
mod types;

pub use types::{
    AccountState, Action, ConnectParams, ExecutionOutcome, ExecutionStatus, HardwareConnectParams,
    ResolvedTransaction, SignAndSendTransactionParams, SignAndSendTransactionsParams, SignedTransaction,
    Transaction,
};
