//! Reference wallets - one per variant
//!
//! Each wallet drives a [`Session`](crate::wallet::Session) and talks to its
//! signer through a narrow backend trait. The wire protocol of a real
//! extension, device or relay lives behind that trait, outside this crate.
//!
//! | Wallet | Variant | Backend trait |
//! |--------|---------|---------------|
//! | [`RedirectWallet`] | browser | [`Navigator`] |
//! | [`ExtensionWallet`] | injected | [`Extension`] |
//! | [`LedgerWallet`] | hardware | [`DeviceTransport`] / [`DeviceHandle`] |
//! | [`RelayWallet`] | bridge | [`Relay`] |
//!
//! # Batches
//!
//! All `ExecutionOutcome` wallets submit batches one transaction at a time,
//! in input order, and stop at the first failure. The error is
//! `WalletError::BatchFailed { index, completed, source }`: `completed`
//! holds the outcomes already on chain, nothing after `index` was sent.

mod bridge;
mod browser;
mod hardware;
mod injected;

pub use bridge::{Pairing, Relay, RelayEvent, RelaySession, RelayWallet};
pub use browser::{Navigator, RedirectConfig, RedirectWallet};
pub use hardware::{DerivationPath, DeviceHandle, DeviceLease, DeviceTransport, LedgerWallet};
pub use injected::{Extension, ExtensionEvent, ExtensionWallet};

use std::future::Future;

use crate::core::ExecutionOutcome;
use crate::error::{WalletError, WalletResult};

/// Run `step` over `items` in order, stopping at the first error.
pub(crate) async fn in_order<T, F, Fut>(items: Vec<T>, mut step: F) -> WalletResult<Vec<ExecutionOutcome>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = WalletResult<ExecutionOutcome>>,
{
    let mut completed = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match step(item).await {
            Ok(outcome) => completed.push(outcome),
            Err(source) => {
                tracing::warn!(index, completed = completed.len(), error = %source, "batch stopped");
                return Err(WalletError::BatchFailed { index, completed, source: Box::new(source) });
            }
        }
    }
    Ok(completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExecutionStatus;
    use crate::error::ErrorKind;

    fn outcome(n: usize) -> ExecutionOutcome {
        ExecutionOutcome {
            transaction_hash: format!("h{}", n),
            signer_id: "a.near".into(),
            receiver_id: "b.near".into(),
            status: ExecutionStatus::Success { value: None },
        }
    }

    #[tokio::test]
    async fn stops_at_first_failure() {
        let mut visited = Vec::new();
        let result = in_order(vec![0, 1, 2], |n| {
            visited.push(n);
            async move {
                if n == 1 { Err(WalletError::SigningRejected("no".into())) } else { Ok(outcome(n)) }
            }
        })
        .await;
        assert_eq!(visited, vec![0, 1]);
        match result {
            Err(WalletError::BatchFailed { index, completed, source }) => {
                assert_eq!(index, 1);
                assert_eq!(completed, vec![outcome(0)]);
                assert_eq!(source.kind(), ErrorKind::SigningRejected);
            }
            other => panic!("unexpected: {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn keeps_input_order() {
        let outcomes = in_order(vec![2, 0, 1], |n| async move { Ok(outcome(n)) }).await.unwrap();
        let hashes: Vec<_> = outcomes.iter().map(|o| o.transaction_hash.as_str()).collect();
        assert_eq!(hashes, vec!["h2", "h0", "h1"]);
    }
}
