//! Wallet module - the capability contract every integration honours
//!
//! # Architecture
//!
//! ```text
//! WalletModule (metadata + factory)
//!     │  wallet(WalletOptions)          pure, no I/O
//!     ▼
//! Wallet ─┬─ Browser  (Outcome = ())                 redirect page signs
//!         ├─ Injected (Outcome = ExecutionOutcome)   + get_download_url()
//!         ├─ Hardware (Outcome = ExecutionOutcome)   connect(account_id, derivation_path)
//!         └─ Bridge   (Outcome = ExecutionOutcome)   companion app signs
//!                │
//!                ▼
//!             Session (state, accounts, busy guard, events)
//! ```
//!
//! # Operations
//!
//! | Operation | Async | Emits | Failure kinds |
//! |-----------|-------|-------|---------------|
//! | `init` | yes | `init{accounts}` | Initialization |
//! | `is_available` | no | - | never fails |
//! | `connect` | yes | `connected{pending?, accounts?}` | ConnectionRejected, Unavailable, Busy |
//! | `disconnect` | yes | `disconnected` (once) | never fails |
//! | `sign_and_send_transaction` | yes | - | SigningRejected, NotConnected, Busy, Transport |
//! | `sign_and_send_transactions` | yes | - | as above, stops at first failure |

mod behaviour;
mod metadata;
mod module;
mod session;

pub use behaviour::{
    BridgeWalletBehaviour, BrowserWalletBehaviour, HardwareWalletBehaviour, InjectedWalletBehaviour, SignOutcome,
    WalletBehaviour,
};
pub use metadata::{WalletMetadata, WalletType};
pub use module::{ConnectRequest, Instance, Wallet, WalletModule};
pub use session::{LifecycleState, OperationGuard, Session};
