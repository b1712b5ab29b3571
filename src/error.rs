//! Error types. Every wallet failure maps onto one [`ErrorKind`].

use thiserror::Error;

use crate::core::ExecutionOutcome;
use crate::wallet::WalletType;

/// The closed set of failure classes a host has to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Initialization,
    Unavailable,
    ConnectionRejected,
    NotConnected,
    SigningRejected,
    Busy,
    /// Passed through from the [`Provider`](crate::services::Provider).
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Initialization => "initialization",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::ConnectionRejected => "connection_rejected",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::SigningRejected => "signing_rejected",
            ErrorKind::Busy => "busy",
            ErrorKind::Transport => "transport",
        }
    }
}

/// RPC failures raised by a provider. Surfaced to callers untouched.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction {0} timed out")]
    Timeout(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Failures reported by a wallet backend (extension, device, relay, redirect page).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BackendError {
    pub(crate) fn into_init_error(self) -> WalletError {
        WalletError::Initialization(self.to_string())
    }

    pub(crate) fn into_connect_error(self) -> WalletError {
        match self {
            BackendError::Rejected(reason) => WalletError::ConnectionRejected(reason),
            BackendError::Unavailable(reason) => WalletError::Unavailable(reason),
            BackendError::Other(e) => WalletError::Unavailable(e.to_string()),
        }
    }

    pub(crate) fn into_signing_error(self) -> WalletError {
        match self {
            BackendError::Rejected(reason) => WalletError::SigningRejected(reason),
            BackendError::Unavailable(reason) => WalletError::Unavailable(reason),
            BackendError::Other(e) => WalletError::Unavailable(e.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("wallet not initialized")]
    NotInitialized,

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("wallet unavailable: {0}")]
    Unavailable(String),

    #[error("wallet uninstalled")]
    Uninstalled,

    #[error("connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("invalid derivation path '{0}'")]
    InvalidDerivationPath(String),

    #[error("not connected")]
    NotConnected,

    #[error("account {0} is not part of the current session")]
    UnknownSigner(String),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("no receiver: pass receiver_id or configure a contract id")]
    MissingReceiver,

    #[error("another operation is in flight")]
    Busy,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Transaction `index` of a batch failed; `completed` holds the outcomes
    /// of every transaction submitted before it. Later ones were not sent.
    #[error("transaction {index} failed after {} completed: {source}", .completed.len())]
    BatchFailed {
        index: usize,
        completed: Vec<ExecutionOutcome>,
        #[source]
        source: Box<WalletError>,
    },

    #[error("wallet {0} is registered twice")]
    DuplicateWalletId(String),

    #[error("unknown wallet {0}")]
    UnknownWallet(String),

    #[error("metadata type {found} does not match {expected} module")]
    VariantMismatch { expected: WalletType, found: WalletType },
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::Initialization(_)
            | WalletError::NotInitialized
            | WalletError::Storage(_)
            | WalletError::DuplicateWalletId(_)
            | WalletError::VariantMismatch { .. } => ErrorKind::Initialization,
            WalletError::Unavailable(_) | WalletError::Uninstalled | WalletError::UnknownWallet(_) => {
                ErrorKind::Unavailable
            }
            WalletError::ConnectionRejected(_) | WalletError::InvalidDerivationPath(_) => {
                ErrorKind::ConnectionRejected
            }
            WalletError::NotConnected | WalletError::UnknownSigner(_) => ErrorKind::NotConnected,
            WalletError::SigningRejected(_) | WalletError::MissingReceiver => ErrorKind::SigningRejected,
            WalletError::Busy => ErrorKind::Busy,
            WalletError::Provider(_) => ErrorKind::Transport,
            WalletError::BatchFailed { source, .. } => source.kind(),
        }
    }
}

pub type WalletResult<T> = Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_map_by_operation() {
        let rejected = BackendError::Rejected("user closed popup".into());
        assert_eq!(rejected.into_connect_error().kind(), ErrorKind::ConnectionRejected);

        let rejected = BackendError::Rejected("user declined".into());
        assert_eq!(rejected.into_signing_error().kind(), ErrorKind::SigningRejected);

        let gone = BackendError::Other(anyhow::anyhow!("port closed"));
        assert_eq!(gone.into_signing_error().kind(), ErrorKind::Unavailable);

        let gone = BackendError::Unavailable("no sdk".into());
        assert_eq!(gone.into_init_error().kind(), ErrorKind::Initialization);
    }

    #[test]
    fn provider_errors_pass_through_unwrapped() {
        let err = WalletError::from(ProviderError::Rpc { code: -32000, message: "InvalidNonce".into() });
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.to_string(), "rpc error -32000: InvalidNonce");
    }

    #[test]
    fn batch_failure_takes_kind_of_source() {
        let err = WalletError::BatchFailed {
            index: 1,
            completed: Vec::new(),
            source: Box::new(WalletError::SigningRejected("declined".into())),
        };
        assert_eq!(err.kind(), ErrorKind::SigningRejected);
        assert!(err.to_string().starts_with("transaction 1 failed after 0 completed"));
    }
}
