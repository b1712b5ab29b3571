//! Storage keys and event names
//!
//! Centralized registry so hosts and wallets agree on persisted layout.

/// Selector-level keys
pub mod selector {
    pub const PREFIX: &str = "wallet-selector";
    pub const SELECTED_WALLET_ID: &str = "wallet-selector:selectedWalletId";
}

/// Per-wallet keys, namespaced as `{wallet_id}:{suffix}`
pub mod wallet {
    pub const SESSION: &str = "session";
    pub const PENDING: &str = "pending";

    pub fn scoped(wallet_id: &str, suffix: &str) -> String {
        format!("{}:{}", wallet_id, suffix)
    }
}

/// Event names as they appear on the wire
pub mod events {
    pub const INIT: &str = "init";
    pub const CONNECTED: &str = "connected";
    pub const DISCONNECTED: &str = "disconnected";
    pub const ACCOUNTS_CHANGED: &str = "accountsChanged";
    pub const NETWORK_CHANGED: &str = "networkChanged";
    pub const UNINSTALLED: &str = "uninstalled";

    pub const ALL: &[&str] = &[INIT, CONNECTED, DISCONNECTED, ACCOUNTS_CHANGED, NETWORK_CHANGED, UNINSTALLED];
}

/// Environment variables read by configuration and logging
pub mod env {
    pub const ROOT: &str = "WALLET_SELECTOR_ROOT";
    pub const NETWORK: &str = "WALLET_SELECTOR_NETWORK";
    pub const NODE_URL: &str = "WALLET_SELECTOR_NODE_URL";
    pub const CONTRACT_ID: &str = "WALLET_SELECTOR_CONTRACT_ID";
    pub const METHOD_NAMES: &str = "WALLET_SELECTOR_METHOD_NAMES";
    pub const DEBUG: &str = "WALLET_SELECTOR_DEBUG";
    pub const LOG: &str = "WALLET_SELECTOR_LOG";
    pub const LOG_JSON: &str = "WALLET_SELECTOR_LOG_JSON";
}
