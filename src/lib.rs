//! wallet-selector: one capability contract for every kind of wallet.
//!
//! # Architecture
//!
//! ```text
//! WalletSelector (host entry point)
//!   │
//!   ├── WalletRegistry ── WalletModule (metadata + pure factory)
//!   │                          │ wallet(WalletOptions)
//!   │                          ▼
//!   │                     Wallet ─┬─ Browser   RedirectWallet  ── Navigator
//!   │                             ├─ Injected  ExtensionWallet ── Extension
//!   │                             ├─ Hardware  LedgerWallet    ── DeviceTransport
//!   │                             └─ Bridge    RelayWallet     ── Relay
//!   │                                   │
//!   │                                   └── Session (lifecycle, accounts, busy guard)
//!   │
//!   └── WalletOptions: Options + Provider + EventEmitter + Logger + PersistentStorage
//! ```
//!
//! # Lifecycle
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `init` | restore a session, emit `init{accounts}` |
//! | `connect` | authorise, emit `connected` (maybe `pending`) |
//! | `sign_and_send_transaction(s)` | sign, submit via the provider |
//! | `disconnect` | release everything, emit `disconnected` once |
//!
//! # Features
//!
//! - `native` (default) - `FileStorage` under the platform data dir and
//!   `logging::init_logging` (tracing-subscriber)
//!
//! # Usage
//!
//! ```ignore
//! use wallet_selector::{Options, WalletRegistry, WalletSelector, HardwareConnectParams};
//!
//! let selector = WalletSelector::new(registry, Options::from_env()?, provider, storage)?;
//! let ledger = selector.wallet("ledger").await?;
//! ledger.connect(HardwareConnectParams::new("alice.near", "44'/397'/0'/0'/1'")).await?;
//! let outcome = ledger.sign_and_send_transaction(Transaction::new(vec![Action::transfer(1)])).await?;
//! ```

pub mod core;
pub mod error;
pub mod events;
pub mod nullables;
pub mod options;
pub mod registry;
pub mod selector;
pub mod services;
pub mod wallet;
pub mod wallets;

#[cfg(feature = "native")]
pub mod logging;

pub use crate::core::{
    AccountState, Action, ConnectParams, ExecutionOutcome, ExecutionStatus, HardwareConnectParams,
    ResolvedTransaction, SignAndSendTransactionParams, SignAndSendTransactionsParams, SignedTransaction,
    Transaction,
};
pub use error::{BackendError, ErrorKind, ProviderError, StorageError, WalletError, WalletResult};
pub use events::{EmitterScope, EventEmitter, EventKind, ListenerId, WalletEvent};
pub use options::{Network, Options, WalletOptions};
pub use registry::WalletRegistry;
pub use selector::{SelectorEvent, WalletSelector};
pub use services::{JsonStorageExt, Logger, MemoryStorage, PersistentStorage, Provider};
pub use wallet::{
    BridgeWalletBehaviour, BrowserWalletBehaviour, ConnectRequest, HardwareWalletBehaviour, InjectedWalletBehaviour,
    LifecycleState, Wallet, WalletBehaviour, WalletMetadata, WalletModule, WalletType,
};

#[cfg(feature = "native")]
pub use services::FileStorage;
