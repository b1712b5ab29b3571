use async_trait::async_trait;

use crate::core::{ExecutionOutcome, SignedTransaction};
use crate::error::ProviderError;

/// RPC handle used to broadcast signed transactions.
///
/// Retry and backoff belong to the implementation; wallets call `submit`
/// once per transaction and hand any error back to the caller unchanged.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn submit(&self, transaction: &SignedTransaction) -> Result<ExecutionOutcome, ProviderError>;
}
