//! Session - the lifecycle state machine shared by every wallet implementation
//!
//! ```text
//! Uninitialized ──init──► Initialized ──connect──► Connected ◄──► Disconnected
//!        │                     │                      │               │
//!        └─────────────────────┴──── uninstalled ─────┴───────────────┘ (terminal)
//! ```
//!
//! A restored session skips `Initialized` and lands in `Connected`. A pending
//! connect emits `connected{pending: true}` but leaves the state alone until
//! approval arrives, so the account set is never empty while connected.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

use crate::core::{AccountState, ResolvedTransaction, Transaction};
use crate::error::{WalletError, WalletResult};
use crate::events::{EmitterScope, WalletEvent};
use crate::options::WalletOptions;
use crate::services::Logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState { Uninitialized, Initialized, Connected, Disconnected, Uninstalled }

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initialized => "initialized",
            LifecycleState::Connected => "connected",
            LifecycleState::Disconnected => "disconnected",
            LifecycleState::Uninstalled => "uninstalled",
        }
    }
}

#[derive(Debug)]
struct SessionState {
    state: LifecycleState,
    accounts: Vec<AccountState>,
    pending: bool,
}

/// Held for the duration of one user-facing operation.
pub struct OperationGuard<'a> {
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

pub struct Session {
    wallet_id: String,
    events: EmitterScope,
    logger: Logger,
    inner: Mutex<SessionState>,
    operation: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(options: &WalletOptions) -> Self {
        Self {
            wallet_id: options.wallet_id.clone(),
            events: options.emitter.scope(),
            logger: options.logger.for_wallet(&options.wallet_id),
            inner: Mutex::new(SessionState { state: LifecycleState::Uninitialized, accounts: Vec::new(), pending: false }),
            operation: tokio::sync::Mutex::new(()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn wallet_id(&self) -> &str { &self.wallet_id }
    pub fn logger(&self) -> &Logger { &self.logger }
    pub fn events(&self) -> &EmitterScope { &self.events }

    pub fn state(&self) -> LifecycleState { self.inner().state }
    pub fn accounts(&self) -> Vec<AccountState> { self.inner().accounts.clone() }
    pub fn is_pending(&self) -> bool { self.inner().pending }
    pub fn is_initialized(&self) -> bool { self.state() != LifecycleState::Uninitialized }

    /// Serialize operations: a second one while the first is in flight is `Busy`.
    pub fn begin(&self) -> WalletResult<OperationGuard<'_>> {
        if self.state() == LifecycleState::Uninstalled {
            return Err(WalletError::Uninstalled);
        }
        let guard = self.operation.try_lock().map_err(|_| WalletError::Busy)?;
        Ok(OperationGuard { _guard: guard })
    }

    pub fn ensure_initialized(&self) -> WalletResult<()> {
        match self.state() {
            LifecycleState::Uninitialized => Err(WalletError::NotInitialized),
            LifecycleState::Uninstalled => Err(WalletError::Uninstalled),
            _ => Ok(()),
        }
    }

    /// Returns false when already initialized; nothing is emitted then.
    pub fn mark_initialized(&self, accounts: Vec<AccountState>) -> bool {
        {
            let mut inner = self.inner();
            if inner.state != LifecycleState::Uninitialized {
                return false;
            }
            inner.state = if accounts.is_empty() { LifecycleState::Initialized } else { LifecycleState::Connected };
            inner.accounts = accounts.clone();
        }
        self.logger.debug(&format!("initialized with {} restored account(s)", accounts.len()));
        self.events.emit(WalletEvent::Init { accounts });
        true
    }

    /// Authorisation continues outside this process.
    pub fn mark_pending(&self) {
        self.inner().pending = true;
        self.logger.info("connection pending external approval");
        self.events.emit(WalletEvent::Connected { pending: Some(true), accounts: None });
    }

    pub fn mark_connected(&self, accounts: Vec<AccountState>) -> WalletResult<()> {
        if accounts.is_empty() {
            self.inner().pending = false;
            return Err(WalletError::ConnectionRejected("no accounts were authorised".into()));
        }
        {
            let mut inner = self.inner();
            if inner.state == LifecycleState::Uninstalled {
                return Err(WalletError::Uninstalled);
            }
            inner.state = LifecycleState::Connected;
            inner.accounts = accounts.clone();
            inner.pending = false;
        }
        self.logger.info(&format!("connected: {}", accounts.iter().map(|a| a.account_id.as_str()).collect::<Vec<_>>().join(", ")));
        self.events.emit(WalletEvent::Connected { pending: None, accounts: Some(accounts) });
        Ok(())
    }

    /// External account switch. An empty set counts as revocation.
    pub fn set_accounts(&self, accounts: Vec<AccountState>) -> bool {
        if accounts.is_empty() {
            return self.mark_disconnected();
        }
        {
            let mut inner = self.inner();
            if inner.state != LifecycleState::Connected || inner.accounts == accounts {
                return false;
            }
            inner.accounts = accounts.clone();
        }
        self.events.emit(WalletEvent::AccountsChanged { accounts });
        true
    }

    pub fn network_changed(&self) {
        if self.state() == LifecycleState::Uninstalled {
            return;
        }
        self.logger.info("network changed");
        self.events.emit(WalletEvent::NetworkChanged);
    }

    /// Ends the session. Emits `disconnected` only when a session (or a
    /// pending one) existed; returns whether it did.
    pub fn mark_disconnected(&self) -> bool {
        let had_session = {
            let mut inner = self.inner();
            let had_session = inner.state == LifecycleState::Connected || inner.pending;
            if matches!(inner.state, LifecycleState::Connected | LifecycleState::Initialized) {
                inner.state = LifecycleState::Disconnected;
            }
            inner.accounts.clear();
            inner.pending = false;
            had_session
        };
        let released = self.events.clear();
        if released > 0 {
            self.logger.debug(&format!("released {} listener(s)", released));
        }
        if had_session {
            self.logger.info("disconnected");
            self.events.emit(WalletEvent::Disconnected);
        }
        had_session
    }

    /// Terminal. Returns false if it already happened.
    pub fn mark_uninstalled(&self) -> bool {
        {
            let mut inner = self.inner();
            if inner.state == LifecycleState::Uninstalled {
                return false;
            }
            inner.state = LifecycleState::Uninstalled;
            inner.accounts.clear();
            inner.pending = false;
        }
        self.events.clear();
        self.logger.warn("wallet uninstalled");
        self.events.emit(WalletEvent::Uninstalled);
        true
    }

    pub fn require_connected(&self) -> WalletResult<Vec<AccountState>> {
        let inner = self.inner();
        match inner.state {
            LifecycleState::Connected => Ok(inner.accounts.clone()),
            LifecycleState::Uninstalled => Err(WalletError::Uninstalled),
            _ => Err(WalletError::NotConnected),
        }
    }

    /// Missing signer means the active (first) account.
    pub fn resolve_signer(&self, requested: Option<&str>) -> WalletResult<AccountState> {
        let accounts = self.require_connected()?;
        match requested {
            None => accounts.into_iter().next().ok_or(WalletError::NotConnected),
            Some(id) => accounts
                .into_iter()
                .find(|a| a.account_id == id)
                .ok_or_else(|| WalletError::UnknownSigner(id.to_string())),
        }
    }

    /// Fill in signer and receiver; a missing receiver falls back to `default_receiver`.
    pub fn resolve(&self, tx: Transaction, default_receiver: Option<&str>) -> WalletResult<(AccountState, ResolvedTransaction)> {
        let signer = self.resolve_signer(tx.signer_id.as_deref())?;
        let receiver_id = tx
            .receiver_id
            .or_else(|| default_receiver.map(String::from))
            .ok_or(WalletError::MissingReceiver)?;
        let resolved = ResolvedTransaction { signer_id: signer.account_id.clone(), receiver_id, actions: tx.actions };
        Ok((signer, resolved))
    }
}
