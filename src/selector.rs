//! Wallet selector - the host-facing entry point
//!
//! Owns the registry, builds one instance per module on demand (initialised
//! exactly once), and tracks which wallet the user signed in with. The
//! selected id survives restarts under `wallet-selector:selectedWalletId`.
//!
//! Each instance gets its own emitter so events can be attributed; the
//! selector observes them to keep the selection current and re-publishes
//! them tagged with the wallet id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::core::keys::selector as keys;
use crate::error::{WalletError, WalletResult};
use crate::events::{EventEmitter, WalletEvent};
use crate::options::{Options, WalletOptions};
use crate::registry::WalletRegistry;
use crate::services::{Logger, PersistentStorage, Provider};
use crate::wallet::{LifecycleState, Wallet, WalletMetadata, WalletModule};

/// A wallet event tagged with the wallet that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorEvent {
    pub wallet_id: String,
    pub event: WalletEvent,
}

struct Selection {
    storage: Arc<dyn PersistentStorage>,
    logger: Logger,
    selected: Mutex<Option<String>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SelectorEvent>>>,
}

impl Selection {
    fn selected(&self) -> MutexGuard<'_, Option<String>> {
        self.selected.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set(&self, wallet_id: Option<&str>) {
        *self.selected() = wallet_id.map(String::from);
        let result = match wallet_id {
            Some(id) => self.storage.set_item(keys::SELECTED_WALLET_ID, id),
            None => self.storage.remove_item(keys::SELECTED_WALLET_ID),
        };
        if let Err(e) = result {
            self.logger.warn(&format!("could not persist selected wallet: {}", e));
        }
    }

    fn observe(&self, wallet_id: &str, event: &WalletEvent) {
        match event {
            WalletEvent::Connected { accounts: Some(_), .. } => self.set(Some(wallet_id)),
            WalletEvent::Disconnected | WalletEvent::Uninstalled => {
                if self.selected().as_deref() == Some(wallet_id) {
                    self.set(None);
                }
            }
            _ => {}
        }
        let tagged = SelectorEvent { wallet_id: wallet_id.to_string(), event: event.clone() };
        self.subscribers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .retain(|tx| tx.send(tagged.clone()).is_ok());
    }
}

/// A built instance. `init` of one wallet runs under its own lock so a slow
/// restore never blocks the others.
struct Entry {
    wallet: Arc<Wallet>,
    init: tokio::sync::Mutex<()>,
}

pub struct WalletSelector {
    registry: WalletRegistry,
    options: Options,
    provider: Arc<dyn Provider>,
    storage: Arc<dyn PersistentStorage>,
    selection: Arc<Selection>,
    instances: tokio::sync::Mutex<HashMap<String, Arc<Entry>>>,
}

impl WalletSelector {
    /// Reads the persisted selection; an id no longer registered is dropped.
    pub fn new(
        registry: WalletRegistry,
        options: Options,
        provider: Arc<dyn Provider>,
        storage: Arc<dyn PersistentStorage>,
    ) -> WalletResult<Self> {
        let logger = Logger::new(options.debug);
        let mut selected = storage.get_item(keys::SELECTED_WALLET_ID)?;
        if let Some(id) = selected.as_deref() {
            if !registry.contains(id) {
                logger.warn(&format!("forgetting selection of unregistered wallet {}", id));
                storage.remove_item(keys::SELECTED_WALLET_ID)?;
                selected = None;
            }
        }
        tracing::info!(
            network = %options.network.network_id,
            wallets = registry.len(),
            selected = selected.as_deref().unwrap_or("-"),
            "wallet selector ready"
        );
        Ok(Self {
            registry,
            provider,
            storage: storage.clone(),
            selection: Arc::new(Selection {
                storage,
                logger,
                selected: Mutex::new(selected),
                subscribers: Mutex::new(Vec::new()),
            }),
            options,
            instances: tokio::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn registry(&self) -> &WalletRegistry { &self.registry }
    pub fn options(&self) -> &Options { &self.options }

    pub fn selected_wallet_id(&self) -> Option<String> { self.selection.selected().clone() }

    /// Events of every instance this selector built, tagged with the wallet id.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SelectorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.selection.subscribers.lock().unwrap_or_else(|p| p.into_inner()).push(tx);
        rx
    }

    fn instantiate(&self, module: &WalletModule) -> Wallet {
        let emitter = EventEmitter::new();
        let selection = self.selection.clone();
        let wallet_id = module.id().to_string();
        emitter.on_any(move |event| selection.observe(&wallet_id, event));

        let logger = Logger::new(self.options.debug);
        let options = WalletOptions::new(self.options.clone(), self.provider.clone(), self.storage.clone())
            .with_emitter(emitter)
            .with_logger(logger);
        module.wallet(options)
    }

    fn instance(&self, instances: &mut HashMap<String, Arc<Entry>>, id: &str) -> WalletResult<Arc<Entry>> {
        if let Some(entry) = instances.get(id) {
            return Ok(entry.clone());
        }
        let module = self.registry.get(id)?;
        let entry = Arc::new(Entry { wallet: Arc::new(self.instantiate(module)), init: tokio::sync::Mutex::new(()) });
        instances.insert(id.to_string(), entry.clone());
        Ok(entry)
    }

    /// Metadata of the wallets that can be offered right now. Builds
    /// instances but does not initialise them.
    pub async fn available(&self) -> Vec<WalletMetadata> {
        let mut instances = self.instances.lock().await;
        let mut available = Vec::new();
        for module in self.registry.modules() {
            match self.instance(&mut instances, module.id()) {
                Ok(entry) if entry.wallet.is_available() => available.push(module.metadata().clone()),
                Ok(_) => {}
                Err(e) => tracing::warn!(wallet = module.id(), error = %e, "could not build wallet"),
            }
        }
        available
    }

    /// The initialised instance for `id`, built on first use.
    pub async fn wallet(&self, id: &str) -> WalletResult<Arc<Wallet>> {
        let entry = {
            let mut instances = self.instances.lock().await;
            self.instance(&mut instances, id)?
        };
        let _init = entry.init.lock().await;
        entry.wallet.init().await?;
        Ok(entry.wallet.clone())
    }

    /// The selected wallet, if its session is still alive.
    pub async fn selected(&self) -> WalletResult<Option<Arc<Wallet>>> {
        let Some(id) = self.selected_wallet_id() else { return Ok(None) };
        let wallet = self.wallet(&id).await?;
        if wallet.state() != LifecycleState::Connected {
            self.selection.logger.info(&format!("selected wallet {} has no session", id));
            self.selection.set(None);
            return Ok(None);
        }
        Ok(Some(wallet))
    }

    pub fn is_signed_in(&self) -> bool { self.selected_wallet_id().is_some() }

    /// Disconnect the selected wallet, if any.
    pub async fn sign_out(&self) -> WalletResult<()> {
        let Some(id) = self.selected_wallet_id() else { return Ok(()) };
        match self.wallet(&id).await {
            Ok(wallet) => wallet.disconnect().await,
            Err(e @ WalletError::UnknownWallet(_)) => return Err(e),
            Err(e) => self.selection.logger.warn(&format!("signing out of {} without init: {}", id, e)),
        }
        self.selection.set(None);
        Ok(())
    }
}
