//! Nullable extension - scripted sign-in answers and pushed events.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::core::{AccountState, ConnectParams, ResolvedTransaction, SignedTransaction};
use crate::error::BackendError;
use crate::nullables::{fake_signature, lock};
use crate::wallets::{Extension, ExtensionEvent};

pub struct NullExtension {
    installed: bool,
    /// Accounts the site is already authorised for.
    authorised: Mutex<Vec<AccountState>>,
    /// Accounts handed out on sign-in; `None` means the user declines.
    grant: Option<Vec<AccountState>>,
    decline_signing: bool,
    declined_receiver: Option<String>,
    sign_in_requests: Mutex<Vec<ConnectParams>>,
    signed: Mutex<Vec<ResolvedTransaction>>,
    sign_outs: Mutex<usize>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<ExtensionEvent>>>,
}

impl NullExtension {
    pub fn new() -> Self {
        Self {
            installed: true,
            authorised: Mutex::new(Vec::new()),
            grant: Some(Vec::new()),
            decline_signing: false,
            declined_receiver: None,
            sign_in_requests: Mutex::new(Vec::new()),
            signed: Mutex::new(Vec::new()),
            sign_outs: Mutex::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn uninstalled(mut self) -> Self { self.installed = false; self }

    pub fn granting(mut self, accounts: Vec<AccountState>) -> Self { self.grant = Some(accounts); self }

    pub fn declining_sign_in(mut self) -> Self { self.grant = None; self }

    pub fn declining_signatures(mut self) -> Self { self.decline_signing = true; self }

    /// Decline only transactions addressed to `receiver_id`.
    pub fn declining_receiver(mut self, receiver_id: &str) -> Self {
        self.declined_receiver = Some(receiver_id.to_string());
        self
    }

    pub fn authorised(self, accounts: Vec<AccountState>) -> Self {
        *lock(&self.authorised) = accounts.clone();
        self.granting(accounts)
    }

    /// Deliver an event to every open stream.
    pub fn push(&self, event: ExtensionEvent) {
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn sign_in_requests(&self) -> Vec<ConnectParams> { lock(&self.sign_in_requests).clone() }
    pub fn signed_count(&self) -> usize { lock(&self.signed).len() }
    pub fn sign_out_count(&self) -> usize { *lock(&self.sign_outs) }
}

impl Default for NullExtension {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Extension for NullExtension {
    fn is_installed(&self) -> bool { self.installed }

    async fn authorised_accounts(&self) -> Result<Vec<AccountState>, BackendError> {
        Ok(lock(&self.authorised).clone())
    }

    async fn request_sign_in(&self, params: &ConnectParams) -> Result<Vec<AccountState>, BackendError> {
        lock(&self.sign_in_requests).push(params.clone());
        let accounts = self.grant.clone().ok_or_else(|| BackendError::Rejected("user declined sign-in".into()))?;
        *lock(&self.authorised) = accounts.clone();
        Ok(accounts)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        *lock(&self.sign_outs) += 1;
        lock(&self.authorised).clear();
        Ok(())
    }

    async fn sign_transaction(&self, transaction: &ResolvedTransaction) -> Result<SignedTransaction, BackendError> {
        if self.decline_signing || self.declined_receiver.as_deref() == Some(transaction.receiver_id.as_str()) {
            return Err(BackendError::Rejected("user declined transaction".into()));
        }
        lock(&self.signed).push(transaction.clone());
        let public_key = lock(&self.authorised)
            .iter()
            .find(|a| a.account_id == transaction.signer_id)
            .and_then(|a| a.public_key.clone());
        Ok(SignedTransaction {
            transaction: transaction.clone(),
            public_key,
            signature: hex::encode(fake_signature(&transaction.signer_id, &transaction.signing_payload())),
        })
    }

    fn events(&self) -> mpsc::UnboundedReceiver<ExtensionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).push(tx);
        rx
    }
}
