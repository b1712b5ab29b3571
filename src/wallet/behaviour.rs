//! The contract every wallet implements, plus one marker trait per variant.

use async_trait::async_trait;

use crate::core::{
    AccountState, ConnectParams, ExecutionOutcome, HardwareConnectParams, SignAndSendTransactionParams,
    SignAndSendTransactionsParams,
};
use crate::error::WalletResult;
use crate::wallet::LifecycleState;

/// What a single signing call yields, and what a batch of them yields.
/// Redirecting wallets produce nothing either way.
pub trait SignOutcome: Send + Sized + 'static {
    type Batch: Send + 'static;
    fn collect(outcomes: Vec<Self>) -> Self::Batch;
}

impl SignOutcome for () {
    type Batch = ();
    fn collect(_: Vec<()>) {}
}

impl SignOutcome for ExecutionOutcome {
    type Batch = Vec<ExecutionOutcome>;
    fn collect(outcomes: Vec<ExecutionOutcome>) -> Vec<ExecutionOutcome> { outcomes }
}

#[async_trait]
pub trait WalletBehaviour: Send + Sync {
    type Outcome: SignOutcome;
    type ConnectParams: Send + 'static;

    /// One-time setup: load an SDK or restore a persisted session. Never
    /// touches a device. Calling it again is a no-op.
    async fn init(&self) -> WalletResult<()>;

    /// Whether the wallet can be offered in this environment. Pure.
    fn is_available(&self) -> bool;

    /// Ask for authorisation. Emits `connected`, possibly with
    /// `pending: true` when approval happens elsewhere.
    async fn connect(&self, params: Self::ConnectParams) -> WalletResult<()>;

    /// Tear down the session. Local cleanup always happens; calling it while
    /// disconnected does nothing.
    async fn disconnect(&self);

    async fn sign_and_send_transaction(&self, params: SignAndSendTransactionParams) -> WalletResult<Self::Outcome>;

    /// Applies the transactions in order and stops at the first failure.
    async fn sign_and_send_transactions(
        &self,
        params: SignAndSendTransactionsParams,
    ) -> WalletResult<<Self::Outcome as SignOutcome>::Batch>;

    /// Accounts of the current session, active account first.
    fn accounts(&self) -> Vec<AccountState>;

    fn state(&self) -> LifecycleState;
}

/// Control may leave the current execution context while signing.
pub trait BrowserWalletBehaviour: WalletBehaviour<Outcome = (), ConnectParams = ConnectParams> {}

pub trait InjectedWalletBehaviour: WalletBehaviour<Outcome = ExecutionOutcome, ConnectParams = ConnectParams> {
    /// Install page, returned whether or not the extension is present.
    fn get_download_url(&self) -> String;
}

pub trait HardwareWalletBehaviour:
    WalletBehaviour<Outcome = ExecutionOutcome, ConnectParams = HardwareConnectParams>
{
}

pub trait BridgeWalletBehaviour: WalletBehaviour<Outcome = ExecutionOutcome, ConnectParams = ConnectParams> {}
