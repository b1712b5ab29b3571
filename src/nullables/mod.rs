//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of a wallet (RPC provider, page navigation,
//! browser extension, hardware device, relay) sits behind a trait. The
//! implementations here record what they were asked to do, answer from
//! scripted state, and never touch the network or a device.
//!
//! Usage: hand them to a wallet in place of the real backend, then assert on
//! what they recorded.

mod device;
mod extension;
mod navigator;
mod provider;
mod relay;

pub use device::NullDevice;
pub use extension::NullExtension;
pub use navigator::NullNavigator;
pub use provider::NullProvider;
pub use relay::NullRelay;

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// Deterministic fake signature over a payload.
pub(crate) fn fake_signature(signer: &str, payload: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(signer.as_bytes());
    hasher.update(payload);
    hasher.finalize().to_vec()
}
