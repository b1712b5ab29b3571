//! Configuration - network/app options and the bundle handed to every wallet.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::core::keys::env;
use crate::error::WalletError;
use crate::events::EventEmitter;
use crate::services::{Logger, PersistentStorage, Provider};

/// RPC endpoints of one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub network_id: String,
    pub node_url: String,
    pub helper_url: String,
    pub explorer_url: String,
}

impl Default for Network {
    fn default() -> Self { Self::testnet() }
}

impl Network {
    pub fn mainnet() -> Self {
        Self {
            network_id: "mainnet".into(),
            node_url: "https://rpc.mainnet.near.org".into(),
            helper_url: "https://helper.mainnet.near.org".into(),
            explorer_url: "https://explorer.near.org".into(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network_id: "testnet".into(),
            node_url: "https://rpc.testnet.near.org".into(),
            helper_url: "https://helper.testnet.near.org".into(),
            explorer_url: "https://explorer.testnet.near.org".into(),
        }
    }

    pub fn custom(network_id: impl Into<String>, node_url: impl Into<String>) -> Self {
        Self { network_id: network_id.into(), node_url: node_url.into(), helper_url: String::new(), explorer_url: String::new() }
    }

    pub fn from_id(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Some(Self::mainnet()),
            "testnet" | "test" => Some(Self::testnet()),
            _ => None,
        }
    }

    pub fn with_node_url(mut self, url: impl Into<String>) -> Self { self.node_url = url.into(); self }
}

/// App-level options shared by every wallet.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub network: Network,
    /// Default receiver when a transaction leaves `receiver_id` empty.
    pub contract_id: Option<String>,
    pub method_names: Vec<String>,
    pub debug: bool,
}

impl Options {
    pub fn new(network: Network) -> Self { Self { network, ..Default::default() } }
    pub fn with_contract(mut self, id: impl Into<String>) -> Self { self.contract_id = Some(id.into()); self }
    pub fn with_method_names(mut self, names: Vec<String>) -> Self { self.method_names = names; self }
    pub fn with_debug(mut self, debug: bool) -> Self { self.debug = debug; self }

    /// Build from `WALLET_SELECTOR_*` process variables.
    pub fn from_env() -> Result<Self, WalletError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Options::from_env`], with a dotenv file filling in what the
    /// process does not set. The process environment is not modified.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, WalletError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Initialization(format!("cannot read {}: {}", path.display(), e)))?;
        let file = parse_dotenv(&contents);
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, WalletError> {
        let mut network = match var(env::NETWORK) {
            Some(id) => Network::from_id(&id)
                .ok_or_else(|| WalletError::Initialization(format!("unknown network: {}", id)))?,
            None => Network::default(),
        };
        if let Some(url) = var(env::NODE_URL) {
            network = network.with_node_url(url);
        }
        let mut options = Options::new(network);
        options.contract_id = var(env::CONTRACT_ID).map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
        if let Some(names) = var(env::METHOD_NAMES) {
            options.method_names = names.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
        }
        options.debug = var(env::DEBUG).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        Ok(options)
    }
}

/// `KEY=value` lines; `#` comments, an `export ` prefix and matching quotes are allowed.
fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.strip_prefix("export ").unwrap_or(line).split_once('=')?;
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
                .unwrap_or(value);
            Some((key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Everything a wallet gets at construction. Read-only afterwards.
#[derive(Clone)]
pub struct WalletOptions {
    /// Scopes storage keys and log lines. `WalletModule::wallet` sets it to
    /// the module's metadata id.
    pub wallet_id: String,
    pub options: Options,
    pub provider: Arc<dyn Provider>,
    pub emitter: EventEmitter,
    pub logger: Logger,
    pub storage: Arc<dyn PersistentStorage>,
}

impl WalletOptions {
    pub fn new(options: Options, provider: Arc<dyn Provider>, storage: Arc<dyn PersistentStorage>) -> Self {
        let logger = Logger::new(options.debug);
        Self { wallet_id: "wallet".into(), options, provider, emitter: EventEmitter::new(), logger, storage }
    }

    pub fn for_wallet(mut self, wallet_id: impl Into<String>) -> Self { self.wallet_id = wallet_id.into(); self }

    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self { self.emitter = emitter; self }
    pub fn with_logger(mut self, logger: Logger) -> Self { self.logger = logger; self }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn clear_env() {
        for key in [env::NETWORK, env::NODE_URL, env::CONTRACT_ID, env::METHOD_NAMES, env::DEBUG] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn from_env_reads_variables() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        std::env::set_var(env::NETWORK, "mainnet");
        std::env::set_var(env::CONTRACT_ID, "guest-book.near");
        std::env::set_var(env::METHOD_NAMES, "addMessage, ,getMessages");
        std::env::set_var(env::DEBUG, "1");
        let options = Options::from_env().unwrap();
        assert_eq!(options.network, Network::mainnet());
        assert_eq!(options.contract_id.as_deref(), Some("guest-book.near"));
        assert_eq!(options.method_names, vec!["addMessage", "getMessages"]);
        assert!(options.debug);
        clear_env();
    }

    #[test]
    fn from_env_rejects_unknown_network() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        std::env::set_var(env::NETWORK, "betanet");
        let err = Options::from_env().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Initialization);
        clear_env();
    }

    #[test]
    fn env_file_fills_gaps_without_touching_process_env() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        clear_env();
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "# app settings\nexport WALLET_SELECTOR_NETWORK=mainnet\nWALLET_SELECTOR_CONTRACT_ID=\"from-file.near\"\nWALLET_SELECTOR_DEBUG='1'\n",
        )
        .unwrap();
        std::env::set_var(env::CONTRACT_ID, "from-env.near");

        let options = Options::from_env_file(&path).unwrap();
        assert_eq!(options.network, Network::mainnet());
        assert_eq!(options.contract_id.as_deref(), Some("from-env.near"));
        assert!(options.debug);
        assert!(std::env::var(env::NETWORK).is_err(), "file values stay out of the process env");

        let plain = Options::from_env().unwrap();
        assert_eq!(plain.network, Network::testnet());
        clear_env();
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = Options::from_env_file(dir.path().join("absent.env")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Initialization);
    }

    #[test]
    fn dotenv_parsing() {
        let vars = parse_dotenv("A=1\n# B=2\n  export C = \"x y\" \nD='q'\nnot a pair\nE=\"half\n");
        assert_eq!(vars.get("A").map(String::as_str), Some("1"));
        assert!(!vars.contains_key("B"));
        assert_eq!(vars.get("C").map(String::as_str), Some("x y"));
        assert_eq!(vars.get("D").map(String::as_str), Some("q"));
        assert_eq!(vars.get("E").map(String::as_str), Some("\"half"));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn network_presets() {
        assert_eq!(Network::from_id(" Main "), Some(Network::mainnet()));
        assert_eq!(Network::from_id("localnet"), None);
        let local = Network::custom("localnet", "http://127.0.0.1:3030");
        assert_eq!(local.node_url, "http://127.0.0.1:3030");
    }
}
