//! Nullable provider - record submissions without broadcasting them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::{ExecutionOutcome, ExecutionStatus, SignedTransaction};
use crate::error::ProviderError;
use crate::nullables::lock;
use crate::services::Provider;

/// A test provider that answers every submission with a successful outcome
/// unless a failure was scripted for that position.
pub struct NullProvider {
    submitted: Mutex<Vec<SignedTransaction>>,
    /// Zero-based submission index -> error returned instead of an outcome.
    failures: Mutex<HashMap<usize, ProviderError>>,
    attempts: Mutex<usize>,
}

impl NullProvider {
    pub fn new() -> Self {
        Self { submitted: Mutex::new(Vec::new()), failures: Mutex::new(HashMap::new()), attempts: Mutex::new(0) }
    }

    /// Make the `index`-th submission (counting from zero) fail.
    pub fn fail_at(&self, index: usize, error: ProviderError) {
        lock(&self.failures).insert(index, error);
    }

    /// Every submission attempt, in order, failed ones included.
    pub fn submitted(&self) -> Vec<SignedTransaction> { lock(&self.submitted).clone() }

    pub fn receivers(&self) -> Vec<String> {
        lock(&self.submitted).iter().map(|t| t.transaction.receiver_id.clone()).collect()
    }

    pub fn attempts(&self) -> usize { *lock(&self.attempts) }
}

impl Default for NullProvider {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Provider for NullProvider {
    async fn submit(&self, transaction: &SignedTransaction) -> Result<ExecutionOutcome, ProviderError> {
        let index = {
            let mut attempts = lock(&self.attempts);
            *attempts += 1;
            *attempts - 1
        };
        lock(&self.submitted).push(transaction.clone());
        if let Some(error) = lock(&self.failures).remove(&index) {
            return Err(error);
        }
        let tx = &transaction.transaction;
        Ok(ExecutionOutcome {
            transaction_hash: tx.hash(),
            signer_id: tx.signer_id.clone(),
            receiver_id: tx.receiver_id.clone(),
            status: ExecutionStatus::Success { value: None },
        })
    }
}
