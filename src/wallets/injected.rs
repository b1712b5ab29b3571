//! Injected wallet - a browser extension that signs in-process
//!
//! The extension pushes account and network changes at any time; a
//! forwarding task turns them into session transitions until the session ends.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::{
    AccountState, ConnectParams, ExecutionOutcome, ResolvedTransaction, SignAndSendTransactionParams,
    SignAndSendTransactionsParams, SignedTransaction,
};
use crate::error::{BackendError, WalletError, WalletResult};
use crate::options::WalletOptions;
use crate::services::Provider;
use crate::wallet::{InjectedWalletBehaviour, LifecycleState, Session, WalletBehaviour};
use crate::wallets::in_order;

/// Pushed by the extension outside of any call.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionEvent {
    AccountsChanged(Vec<AccountState>),
    NetworkChanged { network_id: String },
    SignedOut,
    Uninstalled,
}

#[async_trait]
pub trait Extension: Send + Sync {
    fn is_installed(&self) -> bool;

    /// Accounts this site is already authorised for.
    async fn authorised_accounts(&self) -> Result<Vec<AccountState>, BackendError>;

    async fn request_sign_in(&self, params: &ConnectParams) -> Result<Vec<AccountState>, BackendError>;
    async fn sign_out(&self) -> Result<(), BackendError>;
    async fn sign_transaction(&self, transaction: &ResolvedTransaction) -> Result<SignedTransaction, BackendError>;

    /// A fresh event stream; dropping the receiver unsubscribes.
    fn events(&self) -> mpsc::UnboundedReceiver<ExtensionEvent>;
}

pub struct ExtensionWallet {
    session: Arc<Session>,
    extension: Arc<dyn Extension>,
    provider: Arc<dyn Provider>,
    contract_id: Option<String>,
    download_url: String,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl ExtensionWallet {
    pub fn new(download_url: impl Into<String>, extension: Arc<dyn Extension>, options: WalletOptions) -> Self {
        Self {
            session: Arc::new(Session::new(&options)),
            extension,
            provider: options.provider.clone(),
            contract_id: options.options.contract_id.clone(),
            download_url: download_url.into(),
            forwarder: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session { &self.session }

    fn watch(&self) {
        let mut events = self.extension.events();
        let session = self.session.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !apply(&session, event) {
                    break;
                }
            }
        });
        let previous = self.forwarder.lock().unwrap_or_else(|p| p.into_inner()).replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn stop_watching(&self) {
        if let Some(handle) = self.forwarder.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
    }

    async fn sign_and_submit(&self, transaction: ResolvedTransaction) -> WalletResult<ExecutionOutcome> {
        let signed = self
            .extension
            .sign_transaction(&transaction)
            .await
            .map_err(BackendError::into_signing_error)?;
        Ok(self.provider.submit(&signed).await?)
    }

    fn ensure_installed(&self) -> WalletResult<()> {
        if !self.extension.is_installed() {
            return Err(WalletError::Unavailable(format!("extension not installed, get it at {}", self.download_url)));
        }
        Ok(())
    }
}

/// Returns false once the session is over and forwarding should stop.
fn apply(session: &Session, event: ExtensionEvent) -> bool {
    match event {
        ExtensionEvent::AccountsChanged(accounts) => {
            session.set_accounts(accounts);
            session.state() == LifecycleState::Connected
        }
        ExtensionEvent::NetworkChanged { network_id } => {
            session.logger().debug(&format!("extension switched to {}", network_id));
            session.network_changed();
            true
        }
        ExtensionEvent::SignedOut => {
            session.mark_disconnected();
            false
        }
        ExtensionEvent::Uninstalled => {
            session.mark_uninstalled();
            false
        }
    }
}

impl Drop for ExtensionWallet {
    fn drop(&mut self) { self.stop_watching(); }
}

#[async_trait]
impl WalletBehaviour for ExtensionWallet {
    type Outcome = ExecutionOutcome;
    type ConnectParams = ConnectParams;

    async fn init(&self) -> WalletResult<()> {
        if self.session.is_initialized() {
            return Ok(());
        }
        let _guard = self.session.begin()?;
        if !self.extension.is_installed() {
            return Err(WalletError::Initialization("extension not installed".into()));
        }
        let accounts = self.extension.authorised_accounts().await.map_err(BackendError::into_init_error)?;
        let restored = !accounts.is_empty();
        if self.session.mark_initialized(accounts) && restored {
            self.watch();
        }
        Ok(())
    }

    fn is_available(&self) -> bool { self.extension.is_installed() }

    async fn connect(&self, params: ConnectParams) -> WalletResult<()> {
        self.session.ensure_initialized()?;
        let _guard = self.session.begin()?;
        self.ensure_installed()?;
        let params = ConnectParams { contract_id: params.contract_id.or_else(|| self.contract_id.clone()), ..params };
        let accounts = self.extension.request_sign_in(&params).await.map_err(BackendError::into_connect_error)?;
        self.session.mark_connected(accounts)?;
        self.watch();
        Ok(())
    }

    async fn disconnect(&self) {
        self.stop_watching();
        if self.session.state() == LifecycleState::Connected {
            if let Err(e) = self.extension.sign_out().await {
                self.session.logger().warn(&format!("extension sign-out failed: {}", e));
            }
        }
        self.session.mark_disconnected();
    }

    async fn sign_and_send_transaction(&self, params: SignAndSendTransactionParams) -> WalletResult<ExecutionOutcome> {
        let _guard = self.session.begin()?;
        let (_, tx) = self.session.resolve(params, self.contract_id.as_deref())?;
        self.sign_and_submit(tx).await
    }

    async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> WalletResult<Vec<ExecutionOutcome>> {
        let _guard = self.session.begin()?;
        let resolved = params
            .transactions
            .into_iter()
            .map(|tx| self.session.resolve(tx, self.contract_id.as_deref()).map(|(_, tx)| tx))
            .collect::<WalletResult<Vec<_>>>()?;
        in_order(resolved, |tx| self.sign_and_submit(tx)).await
    }

    fn accounts(&self) -> Vec<AccountState> { self.session.accounts() }
    fn state(&self) -> LifecycleState { self.session.state() }
}

impl InjectedWalletBehaviour for ExtensionWallet {
    fn get_download_url(&self) -> String { self.download_url.clone() }
}
