//! Hardware wallet - keys live on a device reached over a transport
//!
//! Device I/O happens only inside `connect` and the signing calls. `init`
//! restores the persisted session (account, derivation path, public key)
//! without touching the device; the first signing call after a restart
//! opens it lazily.
//!
//! Every opened device is held by a [`DeviceLease`], and every path that
//! gives the device up (failure, disconnect, replacement) goes through
//! [`DeviceLease::release`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::core::keys::wallet as keys;
use crate::core::{
    AccountState, ExecutionOutcome, HardwareConnectParams, ResolvedTransaction, SignAndSendTransactionParams,
    SignAndSendTransactionsParams, SignedTransaction,
};
use crate::error::{BackendError, WalletError, WalletResult};
use crate::options::WalletOptions;
use crate::services::{JsonStorageExt, PersistentStorage, Provider};
use crate::wallet::{HardwareWalletBehaviour, LifecycleState, Session, WalletBehaviour};
use crate::wallets::in_order;

static PATH_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(m/)?\d+'?(/\d+'?)*$").unwrap());

const HARDENED: u32 = 0x8000_0000;

/// A BIP32-style path such as `44'/397'/0'/0'/1'`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DerivationPath {
    raw: String,
    components: Vec<u32>,
}

impl DerivationPath {
    pub fn parse(value: &str) -> WalletResult<Self> {
        let raw = value.trim();
        if !PATH_PATTERN.is_match(raw) {
            return Err(WalletError::InvalidDerivationPath(value.to_string()));
        }
        let components = raw
            .trim_start_matches("m/")
            .split('/')
            .map(|part| {
                let (digits, hardened) = match part.strip_suffix('\'') {
                    Some(digits) => (digits, true),
                    None => (part, false),
                };
                let index: u32 = digits.parse().map_err(|_| WalletError::InvalidDerivationPath(value.to_string()))?;
                if index >= HARDENED {
                    return Err(WalletError::InvalidDerivationPath(value.to_string()));
                }
                Ok(if hardened { index | HARDENED } else { index })
            })
            .collect::<WalletResult<Vec<_>>>()?;
        Ok(Self { raw: raw.trim_start_matches("m/").to_string(), components })
    }

    /// Indices with the hardened bit applied.
    pub fn components(&self) -> &[u32] { &self.components }

    pub fn as_str(&self) -> &str { &self.raw }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.raw) }
}

/// How the host reaches a device (USB, BLE, ...).
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// The environment can talk to devices at all.
    fn is_supported(&self) -> bool;

    async fn open(&self) -> Result<Box<dyn DeviceHandle>, BackendError>;
}

/// An open device. The user confirms on the device itself.
#[async_trait]
pub trait DeviceHandle: Send + Sync {
    async fn get_public_key(&mut self, path: &DerivationPath) -> Result<String, BackendError>;
    async fn sign(&mut self, path: &DerivationPath, payload: &[u8]) -> Result<Vec<u8>, BackendError>;
    async fn close(&mut self);
}

/// Exclusive use of an open device.
pub struct DeviceLease {
    handle: Box<dyn DeviceHandle>,
    open: bool,
}

impl DeviceLease {
    pub fn new(handle: Box<dyn DeviceHandle>) -> Self { Self { handle, open: true } }

    pub fn handle(&mut self) -> &mut dyn DeviceHandle { self.handle.as_mut() }

    pub async fn release(mut self) {
        self.handle.close().await;
        self.open = false;
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        if self.open {
            tracing::warn!("device lease dropped without release");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceSession {
    account_id: String,
    derivation_path: String,
    public_key: String,
    connected_at: DateTime<Utc>,
}

impl DeviceSession {
    fn account(&self) -> AccountState {
        AccountState::new(&self.account_id).with_public_key(&self.public_key)
    }
}

pub struct LedgerWallet {
    session: Session,
    transport: Arc<dyn DeviceTransport>,
    provider: Arc<dyn Provider>,
    storage: Arc<dyn PersistentStorage>,
    contract_id: Option<String>,
    authorised: Mutex<Option<(DeviceSession, DerivationPath)>>,
    device: tokio::sync::Mutex<Option<DeviceLease>>,
}

impl LedgerWallet {
    pub fn new(transport: Arc<dyn DeviceTransport>, options: WalletOptions) -> Self {
        Self {
            session: Session::new(&options),
            transport,
            provider: options.provider.clone(),
            storage: options.storage.clone(),
            contract_id: options.options.contract_id.clone(),
            authorised: Mutex::new(None),
            device: tokio::sync::Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session { &self.session }

    fn session_key(&self) -> String { keys::scoped(self.session.wallet_id(), keys::SESSION) }

    fn authorised(&self) -> std::sync::MutexGuard<'_, Option<(DeviceSession, DerivationPath)>> {
        self.authorised.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn open_device(&self) -> Result<DeviceLease, BackendError> {
        self.session.logger().debug("opening device");
        Ok(DeviceLease::new(self.transport.open().await?))
    }

    async fn release_device(&self) {
        if let Some(lease) = self.device.lock().await.take() {
            self.session.logger().debug("releasing device");
            lease.release().await;
        }
    }

    async fn sign_and_submit(&self, transaction: ResolvedTransaction) -> WalletResult<ExecutionOutcome> {
        let (stored, path) = self.authorised().clone().ok_or(WalletError::NotConnected)?;
        if stored.account_id != transaction.signer_id {
            return Err(WalletError::UnknownSigner(transaction.signer_id));
        }

        let mut slot = self.device.lock().await;
        let mut lease = match slot.take() {
            Some(lease) => lease,
            None => self.open_device().await.map_err(BackendError::into_signing_error)?,
        };
        match lease.handle().sign(&path, &transaction.signing_payload()).await {
            Ok(signature) => {
                *slot = Some(lease);
                drop(slot);
                let signed = SignedTransaction {
                    transaction,
                    public_key: Some(stored.public_key),
                    signature: hex::encode(signature),
                };
                Ok(self.provider.submit(&signed).await?)
            }
            Err(BackendError::Rejected(reason)) => {
                *slot = Some(lease);
                Err(WalletError::SigningRejected(reason))
            }
            Err(e) => {
                lease.release().await;
                Err(e.into_signing_error())
            }
        }
    }
}

/// A wallet dropped while holding the device closes it on the runtime it
/// was used from.
impl Drop for LedgerWallet {
    fn drop(&mut self) {
        let Some(lease) = self.device.get_mut().take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                self.session.logger().debug("closing device of dropped wallet");
                runtime.spawn(lease.release());
            }
            Err(_) => self.session.logger().warn("wallet dropped outside a runtime, device left open"),
        }
    }
}

#[async_trait]
impl WalletBehaviour for LedgerWallet {
    type Outcome = ExecutionOutcome;
    type ConnectParams = HardwareConnectParams;

    async fn init(&self) -> WalletResult<()> {
        if self.session.is_initialized() {
            return Ok(());
        }
        let _guard = self.session.begin()?;
        let stored: Option<DeviceSession> =
            self.storage.get_json(&self.session_key()).map_err(|e| WalletError::Initialization(e.to_string()))?;
        let restored = match stored {
            Some(stored) => match DerivationPath::parse(&stored.derivation_path) {
                Ok(path) => Some((stored, path)),
                Err(_) => {
                    self.session.logger().warn("discarding stored session with invalid derivation path");
                    None
                }
            },
            None => None,
        };
        let accounts = restored.iter().map(|(s, _)| s.account()).collect();
        *self.authorised() = restored;
        self.session.mark_initialized(accounts);
        Ok(())
    }

    fn is_available(&self) -> bool { self.transport.is_supported() }

    async fn connect(&self, params: HardwareConnectParams) -> WalletResult<()> {
        self.session.ensure_initialized()?;
        let _guard = self.session.begin()?;
        let path = DerivationPath::parse(&params.derivation_path)?;
        if params.account_id.trim().is_empty() {
            return Err(WalletError::ConnectionRejected("account id is required".into()));
        }
        if !self.transport.is_supported() {
            return Err(WalletError::Unavailable("device transport not supported".into()));
        }

        self.release_device().await;
        let mut lease = self.open_device().await.map_err(BackendError::into_connect_error)?;
        let public_key = match lease.handle().get_public_key(&path).await {
            Ok(key) => key,
            Err(e) => {
                lease.release().await;
                return Err(e.into_connect_error());
            }
        };
        *self.device.lock().await = Some(lease);

        let stored = DeviceSession {
            account_id: params.account_id,
            derivation_path: path.to_string(),
            public_key,
            connected_at: Utc::now(),
        };
        if let Err(e) = self.storage.set_json(&self.session_key(), &stored) {
            self.session.logger().warn(&format!("could not persist session: {}", e));
        }
        let account = stored.account();
        *self.authorised() = Some((stored, path));
        self.session.mark_connected(vec![account])
    }

    async fn disconnect(&self) {
        self.release_device().await;
        *self.authorised() = None;
        if let Err(e) = self.storage.remove_item(&self.session_key()) {
            self.session.logger().warn(&format!("could not clear session: {}", e));
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

impl HardwareWalletBehaviour for LedgerWallet {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Transaction};
    use crate::error::ErrorKind;
    use crate::nullables::{NullDevice, NullProvider};
    use crate::options::Options;
    use crate::services::MemoryStorage;

    const PATH: &str = "44'/397'/0'/0'/1'";

    fn wallet(device: Arc<NullDevice>, storage: Arc<MemoryStorage>) -> (LedgerWallet, Arc<NullProvider>) {
        let provider = Arc::new(NullProvider::new());
        let options = WalletOptions::new(Options::default().with_contract("app.near"), provider.clone(), storage)
            .for_wallet("ledger");
        (LedgerWallet::new(device, options), provider)
    }

    #[test]
    fn derivation_paths() {
        let path = DerivationPath::parse(PATH).unwrap();
        assert_eq!(path.components(), &[44 | HARDENED, 397 | HARDENED, HARDENED, HARDENED, 1 | HARDENED]);
        assert_eq!(DerivationPath::parse("m/44'/397'/0'").unwrap().as_str(), "44'/397'/0'");
        assert_eq!(DerivationPath::parse("0/1").unwrap().components(), &[0, 1]);
        for bad in ["", "44''/1", "a/b", "44'/", "/44'", "2147483648'"] {
            assert!(matches!(DerivationPath::parse(bad), Err(WalletError::InvalidDerivationPath(_))), "{}", bad);
        }
    }

    #[tokio::test]
    async fn init_never_touches_device() {
        let device = Arc::new(NullDevice::new("ed25519:dev"));
        let (w, _) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        assert_eq!(device.interactions(), 0);
        assert_eq!(w.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn invalid_path_fails_before_device_io() {
        let device = Arc::new(NullDevice::new("ed25519:dev"));
        let (w, _) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        let err = w.connect(HardwareConnectParams::new("alice.near", "not-a-path")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionRejected);
        assert_eq!(device.interactions(), 0);
    }

    #[tokio::test]
    async fn rejected_key_request_releases_device() {
        let device = Arc::new(NullDevice::new("ed25519:dev").rejecting_public_key());
        let (w, _) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        let err = w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionRejected);
        assert_eq!(device.opens(), 1);
        assert_eq!(device.closes(), 1);
        assert_eq!(w.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn restored_session_opens_device_lazily() {
        let storage = Arc::new(MemoryStorage::new());
        let device = Arc::new(NullDevice::new("ed25519:dev"));
        {
            let (w, _) = wallet(device.clone(), storage.clone());
            w.init().await.unwrap();
            w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap();
            w.release_device().await;
        }
        let opens = device.opens();

        let (w, provider) = wallet(device.clone(), storage);
        w.init().await.unwrap();
        assert_eq!(w.state(), LifecycleState::Connected);
        assert_eq!(w.accounts(), vec![AccountState::new("alice.near").with_public_key("ed25519:dev")]);
        assert_eq!(device.opens(), opens);

        let outcome = w.sign_and_send_transaction(Transaction::new(vec![Action::transfer(1)])).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(device.opens(), opens + 1);
        assert_eq!(device.signed_paths(), vec![PATH.to_string()]);
        assert_eq!(provider.submitted()[0].public_key.as_deref(), Some("ed25519:dev"));
    }

    #[tokio::test]
    async fn unplugged_device_is_released_and_reopened() {
        let device = Arc::new(NullDevice::new("ed25519:dev"));
        let (w, _) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap();

        device.unplug_once();
        let err = w.sign_and_send_transaction(Transaction::new(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(device.closes(), 1);

        w.sign_and_send_transaction(Transaction::new(vec![])).await.unwrap();
        assert_eq!(device.opens(), 2);
    }

    #[tokio::test]
    async fn disconnect_closes_device_and_forgets_session() {
        let storage = Arc::new(MemoryStorage::new());
        let device = Arc::new(NullDevice::new("ed25519:dev"));
        let (w, _) = wallet(device.clone(), storage.clone());
        w.init().await.unwrap();
        w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap();
        w.disconnect().await;
        assert_eq!(device.closes(), 1);
        assert!(storage.get_item("ledger:session").unwrap().is_none());
        let err = w.sign_and_send_transaction(Transaction::new(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn unsupported_transport_is_unavailable() {
        let device = Arc::new(NullDevice::new("ed25519:dev").unsupported());
        let (w, _) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        assert!(!w.is_available());
        w.init().await.unwrap();
        let err = w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(device.interactions(), 0);
        assert_eq!(w.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn rejected_signature_keeps_device() {
        let device = Arc::new(NullDevice::new("ed25519:dev").rejecting_signatures());
        let (w, provider) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap();

        for _ in 0..2 {
            let err = w.sign_and_send_transaction(Transaction::new(vec![])).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SigningRejected);
        }
        assert_eq!(device.opens(), 1);
        assert_eq!(device.closes(), 0);
        assert_eq!(provider.attempts(), 0);
        assert_eq!(w.state(), LifecycleState::Connected);
    }

    #[tokio::test]
    async fn batch_stops_at_rejected_signature() {
        let device = Arc::new(NullDevice::new("ed25519:dev").rejecting_signature(1));
        let (w, provider) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap();

        let txs = ["t1.near", "t2.near", "t3.near"]
            .into_iter()
            .map(|r| Transaction::new(vec![Action::transfer(1)]).with_receiver(r))
            .collect();
        let err = w.sign_and_send_transactions(SignAndSendTransactionsParams::new(txs)).await.unwrap_err();
        let WalletError::BatchFailed { index, completed, source } = err else { panic!("expected batch failure") };
        assert_eq!(index, 1);
        assert_eq!(completed.len(), 1);
        assert_eq!(source.kind(), ErrorKind::SigningRejected);
        assert_eq!(device.sign_requests(), 2, "t3 never reaches the device");
        assert_eq!(provider.attempts(), 1);
        assert_eq!(provider.receivers(), vec!["t1.near"]);
    }

    #[tokio::test]
    async fn dropping_connected_wallet_closes_device() {
        let device = Arc::new(NullDevice::new("ed25519:dev"));
        let (w, _) = wallet(device.clone(), Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        w.connect(HardwareConnectParams::new("alice.near", PATH)).await.unwrap();
        drop(w);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(device.closes(), 1);
    }
}
