//! Wallet modules (factories) and the tagged union of live wallet instances.

use std::ops::Deref;
use std::sync::Arc;

use crate::core::{
    AccountState, ConnectParams, ExecutionOutcome, HardwareConnectParams, SignAndSendTransactionParams,
    SignAndSendTransactionsParams,
};
use crate::error::{WalletError, WalletResult};
use crate::options::WalletOptions;
use crate::wallet::{
    BridgeWalletBehaviour, BrowserWalletBehaviour, HardwareWalletBehaviour, InjectedWalletBehaviour, LifecycleState,
    WalletMetadata, WalletType,
};

/// A behaviour together with the metadata of the module that built it.
pub struct Instance<B: ?Sized> {
    metadata: WalletMetadata,
    behaviour: Box<B>,
}

impl<B: ?Sized> Instance<B> {
    pub fn metadata(&self) -> &WalletMetadata { &self.metadata }
    pub fn behaviour(&self) -> &B { &self.behaviour }
}

impl<B: ?Sized> Deref for Instance<B> {
    type Target = B;
    fn deref(&self) -> &B { &self.behaviour }
}

/// A live wallet. The variant fixes which extra capabilities exist.
pub enum Wallet {
    Browser(Instance<dyn BrowserWalletBehaviour>),
    Injected(Instance<dyn InjectedWalletBehaviour>),
    Hardware(Instance<dyn HardwareWalletBehaviour>),
    Bridge(Instance<dyn BridgeWalletBehaviour>),
}

/// Connect parameters for a wallet whose variant is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectRequest {
    Standard(ConnectParams),
    Hardware(HardwareConnectParams),
}

impl From<ConnectParams> for ConnectRequest {
    fn from(params: ConnectParams) -> Self { ConnectRequest::Standard(params) }
}

impl From<HardwareConnectParams> for ConnectRequest {
    fn from(params: HardwareConnectParams) -> Self { ConnectRequest::Hardware(params) }
}

impl Wallet {
    pub fn metadata(&self) -> &WalletMetadata {
        match self {
            Wallet::Browser(w) => w.metadata(),
            Wallet::Injected(w) => w.metadata(),
            Wallet::Hardware(w) => w.metadata(),
            Wallet::Bridge(w) => w.metadata(),
        }
    }

    pub fn id(&self) -> &str { &self.metadata().id }
    pub fn wallet_type(&self) -> WalletType { self.metadata().wallet_type }

    pub fn is_available(&self) -> bool {
        match self {
            Wallet::Browser(w) => w.is_available(),
            Wallet::Injected(w) => w.is_available(),
            Wallet::Hardware(w) => w.is_available(),
            Wallet::Bridge(w) => w.is_available(),
        }
    }

    pub fn accounts(&self) -> Vec<AccountState> {
        match self {
            Wallet::Browser(w) => w.accounts(),
            Wallet::Injected(w) => w.accounts(),
            Wallet::Hardware(w) => w.accounts(),
            Wallet::Bridge(w) => w.accounts(),
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self {
            Wallet::Browser(w) => w.state(),
            Wallet::Injected(w) => w.state(),
            Wallet::Hardware(w) => w.state(),
            Wallet::Bridge(w) => w.state(),
        }
    }

    /// Only injected wallets have an install page.
    pub fn download_url(&self) -> Option<String> {
        match self {
            Wallet::Injected(w) => Some(w.get_download_url()),
            _ => None,
        }
    }

    pub async fn init(&self) -> WalletResult<()> {
        match self {
            Wallet::Browser(w) => w.init().await,
            Wallet::Injected(w) => w.init().await,
            Wallet::Hardware(w) => w.init().await,
            Wallet::Bridge(w) => w.init().await,
        }
    }

    pub async fn connect(&self, request: impl Into<ConnectRequest>) -> WalletResult<()> {
        match (self, request.into()) {
            (Wallet::Hardware(w), ConnectRequest::Hardware(params)) => w.connect(params).await,
            (Wallet::Hardware(_), ConnectRequest::Standard(_)) => Err(WalletError::ConnectionRejected(
                "hardware wallets need an account id and derivation path".into(),
            )),
            (_, ConnectRequest::Hardware(_)) => Err(WalletError::ConnectionRejected(format!(
                "{} is not a hardware wallet",
                self.id()
            ))),
            (Wallet::Browser(w), ConnectRequest::Standard(params)) => w.connect(params).await,
            (Wallet::Injected(w), ConnectRequest::Standard(params)) => w.connect(params).await,
            (Wallet::Bridge(w), ConnectRequest::Standard(params)) => w.connect(params).await,
        }
    }

    pub async fn disconnect(&self) {
        match self {
            Wallet::Browser(w) => w.disconnect().await,
            Wallet::Injected(w) => w.disconnect().await,
            Wallet::Hardware(w) => w.disconnect().await,
            Wallet::Bridge(w) => w.disconnect().await,
        }
    }

    /// `None` when a browser wallet handed control to its own page.
    pub async fn sign_and_send_transaction(
        &self,
        params: SignAndSendTransactionParams,
    ) -> WalletResult<Option<ExecutionOutcome>> {
        match self {
            Wallet::Browser(w) => w.sign_and_send_transaction(params).await.map(|()| None),
            Wallet::Injected(w) => w.sign_and_send_transaction(params).await.map(Some),
            Wallet::Hardware(w) => w.sign_and_send_transaction(params).await.map(Some),
            Wallet::Bridge(w) => w.sign_and_send_transaction(params).await.map(Some),
        }
    }

    pub async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> WalletResult<Option<Vec<ExecutionOutcome>>> {
        match self {
            Wallet::Browser(w) => w.sign_and_send_transactions(params).await.map(|()| None),
            Wallet::Injected(w) => w.sign_and_send_transactions(params).await.map(Some),
            Wallet::Hardware(w) => w.sign_and_send_transactions(params).await.map(Some),
            Wallet::Bridge(w) => w.sign_and_send_transactions(params).await.map(Some),
        }
    }
}

type Factory<B> = Arc<dyn Fn(WalletOptions) -> Box<B> + Send + Sync>;

#[derive(Clone)]
enum ModuleFactory {
    Browser(Factory<dyn BrowserWalletBehaviour>),
    Injected(Factory<dyn InjectedWalletBehaviour>),
    Hardware(Factory<dyn HardwareWalletBehaviour>),
    Bridge(Factory<dyn BridgeWalletBehaviour>),
}

/// Metadata plus a pure constructor. No I/O happens until `init`.
#[derive(Clone)]
pub struct WalletModule {
    metadata: WalletMetadata,
    factory: ModuleFactory,
}

impl std::fmt::Debug for WalletModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletModule").field("metadata", &self.metadata).finish()
    }
}

fn check_type(metadata: &WalletMetadata, expected: WalletType) -> WalletResult<()> {
    if metadata.wallet_type != expected {
        return Err(WalletError::VariantMismatch { expected, found: metadata.wallet_type });
    }
    Ok(())
}

impl WalletModule {
    pub fn browser<F>(metadata: WalletMetadata, factory: F) -> WalletResult<Self>
    where
        F: Fn(WalletOptions) -> Box<dyn BrowserWalletBehaviour> + Send + Sync + 'static,
    {
        check_type(&metadata, WalletType::Browser)?;
        Ok(Self { metadata, factory: ModuleFactory::Browser(Arc::new(factory)) })
    }

    pub fn injected<F>(metadata: WalletMetadata, factory: F) -> WalletResult<Self>
    where
        F: Fn(WalletOptions) -> Box<dyn InjectedWalletBehaviour> + Send + Sync + 'static,
    {
        check_type(&metadata, WalletType::Injected)?;
        Ok(Self { metadata, factory: ModuleFactory::Injected(Arc::new(factory)) })
    }

    pub fn hardware<F>(metadata: WalletMetadata, factory: F) -> WalletResult<Self>
    where
        F: Fn(WalletOptions) -> Box<dyn HardwareWalletBehaviour> + Send + Sync + 'static,
    {
        check_type(&metadata, WalletType::Hardware)?;
        Ok(Self { metadata, factory: ModuleFactory::Hardware(Arc::new(factory)) })
    }

    pub fn bridge<F>(metadata: WalletMetadata, factory: F) -> WalletResult<Self>
    where
        F: Fn(WalletOptions) -> Box<dyn BridgeWalletBehaviour> + Send + Sync + 'static,
    {
        check_type(&metadata, WalletType::Bridge)?;
        Ok(Self { metadata, factory: ModuleFactory::Bridge(Arc::new(factory)) })
    }

    pub fn metadata(&self) -> &WalletMetadata { &self.metadata }
    pub fn id(&self) -> &str { &self.metadata.id }

    /// Build an instance. Pure construction; deferred setup lives in `init`.
    /// The instance is scoped to this module's id whatever `options` says.
    pub fn wallet(&self, options: WalletOptions) -> Wallet {
        let metadata = self.metadata.clone();
        let options = options.for_wallet(&metadata.id);
        match &self.factory {
            ModuleFactory::Browser(f) => Wallet::Browser(Instance { metadata, behaviour: f(options) }),
            ModuleFactory::Injected(f) => Wallet::Injected(Instance { metadata, behaviour: f(options) }),
            ModuleFactory::Hardware(f) => Wallet::Hardware(Instance { metadata, behaviour: f(options) }),
            ModuleFactory::Bridge(f) => Wallet::Bridge(Instance { metadata, behaviour: f(options) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nullables::{NullDevice, NullProvider};
    use crate::options::Options;
    use crate::services::{MemoryStorage, PersistentStorage};
    use crate::wallets::LedgerWallet;

    #[tokio::test]
    async fn instances_are_scoped_to_the_module_id() {
        let storage = Arc::new(MemoryStorage::new());
        let module = WalletModule::hardware(
            WalletMetadata::new("ledger-usb", "Ledger", "https://example.com/ledger.svg", WalletType::Hardware),
            |options| Box::new(LedgerWallet::new(Arc::new(NullDevice::new("ed25519:k")), options)),
        )
        .unwrap();
        let options = WalletOptions::new(Options::default(), Arc::new(NullProvider::new()), storage.clone())
            .for_wallet("something-else");

        let wallet = module.wallet(options);
        assert_eq!(wallet.id(), "ledger-usb");
        wallet.init().await.unwrap();
        wallet.connect(HardwareConnectParams::new("alice.near", "44'/397'/0'/0'/1'")).await.unwrap();
        assert!(storage.get_item("ledger-usb:session").unwrap().is_some());
        assert!(storage.get_item("something-else:session").unwrap().is_none());
    }
}
