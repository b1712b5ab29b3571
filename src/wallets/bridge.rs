//! Bridge wallet - a companion app reached through a relay
//!
//! Pairing may finish elsewhere (the user scans a URI with their phone), so
//! `connect` can return with the session still pending; approval arrives
//! later as a relay event. Signing requests for a batch go out in a single
//! relay round, then the signed transactions are submitted in order.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::keys::wallet as keys;
use crate::core::{
    AccountState, ConnectParams, ExecutionOutcome, ResolvedTransaction, SignAndSendTransactionParams,
    SignAndSendTransactionsParams, SignedTransaction,
};
use crate::error::{BackendError, WalletError, WalletResult};
use crate::options::WalletOptions;
use crate::services::{PersistentStorage, Provider};
use crate::wallet::{BridgeWalletBehaviour, LifecycleState, Session, WalletBehaviour};
use crate::wallets::in_order;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySession {
    pub topic: String,
    pub accounts: Vec<AccountState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    Approved(RelaySession),
    /// Waiting for the companion app; `uri` is what the user scans.
    Pending { topic: String, uri: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    SessionApproved(RelaySession),
    SessionUpdated { accounts: Vec<AccountState> },
    ChainChanged { chain_id: String },
    SessionDeleted,
}

#[async_trait]
pub trait Relay: Send + Sync {
    fn is_reachable(&self) -> bool;

    /// `None` when the relay no longer knows the topic.
    async fn restore(&self, topic: &str) -> Result<Option<RelaySession>, BackendError>;

    async fn pair(&self, params: &ConnectParams) -> Result<Pairing, BackendError>;

    async fn request_signatures(
        &self,
        topic: &str,
        transactions: &[ResolvedTransaction],
    ) -> Result<Vec<SignedTransaction>, BackendError>;

    async fn end_session(&self, topic: &str) -> Result<(), BackendError>;

    fn events(&self) -> mpsc::UnboundedReceiver<RelayEvent>;
}

/// State shared with the event forwarding task.
struct Shared {
    session: Session,
    storage: Arc<dyn PersistentStorage>,
    topic: Mutex<Option<String>>,
}

impl Shared {
    fn topic_key(&self) -> String { keys::scoped(self.session.wallet_id(), keys::SESSION) }

    fn topic(&self) -> Option<String> { self.topic.lock().unwrap_or_else(|p| p.into_inner()).clone() }

    fn remember(&self, topic: &str) {
        *self.topic.lock().unwrap_or_else(|p| p.into_inner()) = Some(topic.to_string());
        if let Err(e) = self.storage.set_item(&self.topic_key(), topic) {
            self.session.logger().warn(&format!("could not persist relay topic: {}", e));
        }
    }

    fn forget(&self) -> Option<String> {
        let topic = self.topic.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Err(e) = self.storage.remove_item(&self.topic_key()) {
            self.session.logger().warn(&format!("could not clear relay topic: {}", e));
        }
        topic
    }

    /// Returns false once the session is over.
    fn apply(&self, event: RelayEvent) -> bool {
        match event {
            RelayEvent::SessionApproved(approved) if approved.accounts.is_empty() => {
                self.session.logger().warn("companion approved a session without accounts");
                self.forget();
                self.session.mark_disconnected();
                false
            }
            RelayEvent::SessionApproved(approved) => {
                self.remember(&approved.topic);
                if let Err(e) = self.session.mark_connected(approved.accounts) {
                    self.session.logger().warn(&format!("approved session unusable: {}", e));
                    self.forget();
                    return false;
                }
                true
            }
            RelayEvent::SessionUpdated { accounts } => {
                self.session.set_accounts(accounts);
                self.session.state() == LifecycleState::Connected || self.session.is_pending()
            }
            RelayEvent::ChainChanged { chain_id } => {
                self.session.logger().debug(&format!("companion switched to {}", chain_id));
                self.session.network_changed();
                true
            }
            RelayEvent::SessionDeleted => {
                self.forget();
                self.session.mark_disconnected();
                false
            }
        }
    }
}

pub struct RelayWallet {
    shared: Arc<Shared>,
    relay: Arc<dyn Relay>,
    provider: Arc<dyn Provider>,
    contract_id: Option<String>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl RelayWallet {
    pub fn new(relay: Arc<dyn Relay>, options: WalletOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                session: Session::new(&options),
                storage: options.storage.clone(),
                topic: Mutex::new(None),
            }),
            relay,
            provider: options.provider.clone(),
            contract_id: options.options.contract_id.clone(),
            forwarder: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session { &self.shared.session }

    fn watch(&self) {
        let mut events = self.relay.events();
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !shared.apply(event) {
                    break;
                }
            }
        });
        if let Some(previous) = self.forwarder.lock().unwrap_or_else(|p| p.into_inner()).replace(handle) {
            previous.abort();
        }
    }

    fn stop_watching(&self) {
        if let Some(handle) = self.forwarder.lock().unwrap_or_else(|p| p.into_inner()).take() {
            handle.abort();
        }
    }

    async fn end_session(&self, topic: &str) {
        if let Err(e) = self.relay.end_session(topic).await {
            self.shared.session.logger().warn(&format!("relay did not end session {}: {}", topic, e));
        }
    }

    async fn request_signatures(&self, transactions: &[ResolvedTransaction]) -> WalletResult<Vec<SignedTransaction>> {
        let topic = self.shared.topic().ok_or(WalletError::NotConnected)?;
        let signed = self
            .relay
            .request_signatures(&topic, transactions)
            .await
            .map_err(BackendError::into_signing_error)?;
        if signed.len() != transactions.len() {
            return Err(WalletError::SigningRejected(format!(
                "companion returned {} signature(s) for {} transaction(s)",
                signed.len(),
                transactions.len()
            )));
        }
        Ok(signed)
    }
}

impl Drop for RelayWallet {
    fn drop(&mut self) { self.stop_watching(); }
}

#[async_trait]
impl WalletBehaviour for RelayWallet {
    type Outcome = ExecutionOutcome;
    type ConnectParams = ConnectParams;

    async fn init(&self) -> WalletResult<()> {
        let session = &self.shared.session;
        if session.is_initialized() {
            return Ok(());
        }
        let _guard = session.begin()?;
        let stored = self
            .shared
            .storage
            .get_item(&self.shared.topic_key())
            .map_err(|e| WalletError::Initialization(e.to_string()))?;

        let restored = match stored {
            Some(topic) => match self.relay.restore(&topic).await.map_err(BackendError::into_init_error)? {
                Some(restored) => Some(restored),
                None => {
                    session.logger().info("stored relay session expired");
                    self.shared.forget();
                    None
                }
            },
            None => None,
        };

        let accounts = match restored {
            Some(restored) if !restored.accounts.is_empty() => {
                *self.shared.topic.lock().unwrap_or_else(|p| p.into_inner()) = Some(restored.topic);
                restored.accounts
            }
            _ => Vec::new(),
        };
        let resumed = !accounts.is_empty();
        if session.mark_initialized(accounts) && resumed {
            self.watch();
        }
        Ok(())
    }

    fn is_available(&self) -> bool { self.relay.is_reachable() }

    async fn connect(&self, params: ConnectParams) -> WalletResult<()> {
        let session = &self.shared.session;
        session.ensure_initialized()?;
        let _guard = session.begin()?;
        if !self.relay.is_reachable() {
            return Err(WalletError::Unavailable("relay unreachable".into()));
        }
        let params = ConnectParams { contract_id: params.contract_id.or_else(|| self.contract_id.clone()), ..params };
        let pairing = self.relay.pair(&params).await.map_err(BackendError::into_connect_error)?;
        let previous = self.shared.topic();
        let topic = match pairing {
            Pairing::Approved(approved) => {
                session.mark_connected(approved.accounts)?;
                self.shared.remember(&approved.topic);
                approved.topic
            }
            Pairing::Pending { topic, uri } => {
                session.logger().info(&format!("scan to pair: {}", uri));
                *self.shared.topic.lock().unwrap_or_else(|p| p.into_inner()) = Some(topic.clone());
                session.mark_pending();
                topic
            }
        };
        if let Some(previous) = previous.filter(|p| *p != topic) {
            self.end_session(&previous).await;
        }
        self.watch();
        Ok(())
    }

    async fn disconnect(&self) {
        self.stop_watching();
        if let Some(topic) = self.shared.forget() {
            self.end_session(&topic).await;
        }
        self.shared.session.mark_disconnected();
    }

    async fn sign_and_send_transaction(&self, params: SignAndSendTransactionParams) -> WalletResult<ExecutionOutcome> {
        let session = &self.shared.session;
        let _guard = session.begin()?;
        let (_, tx) = session.resolve(params, self.contract_id.as_deref())?;
        let signed = self.request_signatures(&[tx]).await?.into_iter()
            .next()
            .ok_or_else(|| WalletError::SigningRejected("companion returned no signature".into()))?;
        Ok(self.provider.submit(&signed).await?)
    }

    /// A rejected signing round fails before anything is submitted.
    async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> WalletResult<Vec<ExecutionOutcome>> {
        let session = &self.shared.session;
        let _guard = session.begin()?;
        let resolved = params
            .transactions
            .into_iter()
            .map(|tx| session.resolve(tx, self.contract_id.as_deref()).map(|(_, tx)| tx))
            .collect::<WalletResult<Vec<_>>>()?;
        if resolved.is_empty() {
            return Ok(Vec::new());
        }
        let signed = self.request_signatures(&resolved).await?;
        in_order(signed, |tx| async move { Ok(self.provider.submit(&tx).await?) }).await
    }

    fn accounts(&self) -> Vec<AccountState> { self.shared.session.accounts() }
    fn state(&self) -> LifecycleState { self.shared.session.state() }
}

impl BridgeWalletBehaviour for RelayWallet {}
