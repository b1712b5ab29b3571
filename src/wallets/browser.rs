//! Browser wallet - signing happens on the wallet's own web page
//!
//! `connect` and the signing calls navigate away; the result comes back as
//! query parameters on the callback URL, which `init` picks up on the next
//! start:
//!
//! ```text
//! connect ──redirect──► {wallet_url}/login/?contract_id=..&success_url=..
//!                            │ user approves
//! init ◄──callback── {current_url}?account_id=alice.near&public_key=ed25519:..
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use url::Url;

use crate::core::keys::wallet as keys;
use crate::core::{
    AccountState, ConnectParams, ResolvedTransaction, SignAndSendTransactionParams, SignAndSendTransactionsParams,
};
use crate::error::{BackendError, WalletError, WalletResult};
use crate::options::WalletOptions;
use crate::services::{JsonStorageExt, PersistentStorage};
use crate::wallet::{BrowserWalletBehaviour, LifecycleState, Session, WalletBehaviour};

/// Access to the host page's location.
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Full URL of the current page, including any callback query.
    fn current_url(&self) -> String;

    /// Leave the current page. On a real page this does not return.
    async fn redirect(&self, url: String) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    pub wallet_url: String,
    /// Where the wallet sends the user back to. Defaults to the current page.
    pub success_url: Option<String>,
    pub failure_url: Option<String>,
}

impl RedirectConfig {
    pub fn new(wallet_url: impl Into<String>) -> Self {
        Self { wallet_url: wallet_url.into(), success_url: None, failure_url: None }
    }

    pub fn with_callbacks(mut self, success_url: impl Into<String>, failure_url: impl Into<String>) -> Self {
        self.success_url = Some(success_url.into());
        self.failure_url = Some(failure_url.into());
        self
    }
}

pub struct RedirectWallet {
    session: Session,
    config: RedirectConfig,
    contract_id: Option<String>,
    storage: Arc<dyn PersistentStorage>,
    navigator: Arc<dyn Navigator>,
}

/// Query parameters the wallet page appends to the callback URL.
#[derive(Debug, Default)]
struct Callback {
    account_id: Option<String>,
    public_key: Option<String>,
    error_code: Option<String>,
}

impl Callback {
    /// Empty values count as absent; a page URL that does not parse carries no callback.
    fn from_url(url: &str) -> Self {
        let Ok(url) = Url::parse(url) else { return Self::default() };
        let mut callback = Self::default();
        for (key, value) in url.query_pairs() {
            if value.is_empty() {
                continue;
            }
            match &*key {
                "account_id" => callback.account_id = Some(value.into_owned()),
                "public_key" => callback.public_key = Some(value.into_owned()),
                "errorCode" => callback.error_code = Some(value.into_owned()),
                _ => {}
            }
        }
        callback
    }

    fn accounts(&self) -> Option<Vec<AccountState>> {
        let account_id = self.account_id.as_ref()?;
        let mut account = AccountState::new(account_id);
        if let Some(public_key) = &self.public_key {
            account = account.with_public_key(public_key);
        }
        Some(vec![account])
    }
}

impl RedirectWallet {
    pub fn new(config: RedirectConfig, navigator: Arc<dyn Navigator>, options: WalletOptions) -> Self {
        Self {
            session: Session::new(&options),
            config,
            contract_id: options.options.contract_id.clone(),
            storage: options.storage.clone(),
            navigator,
        }
    }

    pub fn session(&self) -> &Session { &self.session }

    fn key(&self, suffix: &str) -> String { keys::scoped(self.session.wallet_id(), suffix) }

    /// `{wallet_url}/{page}` with the wallet url's own path kept.
    fn page(&self, page: &str) -> WalletResult<Url> {
        let base = self.config.wallet_url.trim_end_matches('/');
        Url::parse(&format!("{}/{}", base, page))
            .map_err(|e| WalletError::Unavailable(format!("bad wallet url {}: {}", self.config.wallet_url, e)))
    }

    pub fn login_url(&self, params: &ConnectParams) -> WalletResult<String> {
        let current = self.navigator.current_url();
        let success = self.config.success_url.clone().unwrap_or_else(|| current.clone());
        let failure = self.config.failure_url.clone().unwrap_or(current);

        let mut url = self.page("login/")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(contract_id) = params.contract_id.as_ref().or(self.contract_id.as_ref()) {
                query.append_pair("contract_id", contract_id);
            }
            for method in &params.method_names {
                query.append_pair("methodNames", method);
            }
            query.append_pair("success_url", &success).append_pair("failure_url", &failure);
        }
        Ok(url.into())
    }

    /// Transactions travel as base64 JSON; the wallet page decodes and signs them.
    pub fn sign_url(&self, transactions: &[ResolvedTransaction]) -> WalletResult<String> {
        let encoded = serde_json::to_vec(transactions)
            .map_err(|e| WalletError::SigningRejected(format!("cannot encode transactions: {}", e)))?;
        let callback = self.config.success_url.clone().unwrap_or_else(|| self.navigator.current_url());
        let mut url = self.page("sign")?;
        url.query_pairs_mut()
            .append_pair("transactions", &BASE64.encode(encoded))
            .append_pair("callbackUrl", &callback);
        Ok(url.into())
    }

    fn restore(&self) -> WalletResult<Vec<AccountState>> {
        let callback = Callback::from_url(&self.navigator.current_url());
        let awaiting = self.storage.get_item(&self.key(keys::PENDING))?.is_some();

        if let Some(accounts) = callback.accounts() {
            self.storage.set_json(&self.key(keys::SESSION), &accounts)?;
            self.storage.remove_item(&self.key(keys::PENDING))?;
            return Ok(accounts);
        }

        if awaiting {
            if let Some(code) = &callback.error_code {
                self.session.logger().warn(&format!("sign-in declined on wallet page: {}", code));
                self.storage.remove_item(&self.key(keys::PENDING))?;
            }
        }

        Ok(self.storage.get_json::<Vec<AccountState>>(&self.key(keys::SESSION))?.unwrap_or_default())
    }

    /// Finish a sign-in whose callback arrived after `init`, e.g. when the
    /// host routes the callback URL itself.
    pub async fn complete_sign_in(&self, callback_url: &str) -> WalletResult<()> {
        self.session.ensure_initialized()?;
        let _guard = self.session.begin()?;
        let callback = Callback::from_url(callback_url);
        let Some(accounts) = callback.accounts() else {
            let reason = callback.error_code.unwrap_or_else(|| "no account in callback".into());
            if let Err(e) = self.storage.remove_item(&self.key(keys::PENDING)) {
                self.session.logger().warn(&format!("could not clear pending sign-in: {}", e));
            }
            if self.session.is_pending() {
                self.session.mark_disconnected();
            }
            return Err(WalletError::ConnectionRejected(reason));
        };
        if let Err(e) = self.storage.set_json(&self.key(keys::SESSION), &accounts) {
            self.session.logger().warn(&format!("could not persist session: {}", e));
        }
        if let Err(e) = self.storage.remove_item(&self.key(keys::PENDING)) {
            self.session.logger().warn(&format!("could not clear pending sign-in: {}", e));
        }
        self.session.mark_connected(accounts)
    }

    async fn navigate(&self, url: String) -> Result<(), BackendError> {
        self.session.logger().debug(&format!("redirecting to {}", url));
        self.navigator.redirect(url).await
    }
}

#[async_trait]
impl WalletBehaviour for RedirectWallet {
    type Outcome = ();
    type ConnectParams = ConnectParams;

    async fn init(&self) -> WalletResult<()> {
        if self.session.is_initialized() {
            return Ok(());
        }
        let _guard = self.session.begin()?;
        let accounts = self.restore().map_err(|e| WalletError::Initialization(e.to_string()))?;
        self.session.mark_initialized(accounts);
        Ok(())
    }

    fn is_available(&self) -> bool { Url::parse(&self.config.wallet_url).is_ok() }

    async fn connect(&self, params: ConnectParams) -> WalletResult<()> {
        self.session.ensure_initialized()?;
        let _guard = self.session.begin()?;
        let url = self.login_url(&params)?;
        if let Err(e) = self.storage.set_item(&self.key(keys::PENDING), "1") {
            self.session.logger().warn(&format!("could not persist pending sign-in: {}", e));
        }
        if let Err(e) = self.navigate(url).await {
            if let Err(e) = self.storage.remove_item(&self.key(keys::PENDING)) {
                self.session.logger().warn(&format!("could not clear pending sign-in: {}", e));
            }
            return Err(e.into_connect_error());
        }
        self.session.mark_pending();
        Ok(())
    }

    async fn disconnect(&self) {
        for suffix in [keys::SESSION, keys::PENDING] {
            if let Err(e) = self.storage.remove_item(&self.key(suffix)) {
                self.session.logger().warn(&format!("could not clear {}: {}", suffix, e));
            }
        }
        self.session.mark_disconnected();
    }

    async fn sign_and_send_transaction(&self, params: SignAndSendTransactionParams) -> WalletResult<()> {
        let _guard = self.session.begin()?;
        let (_, tx) = self.session.resolve(params, self.contract_id.as_deref())?;
        let url = self.sign_url(&[tx])?;
        self.navigate(url).await.map_err(BackendError::into_signing_error)
    }

    /// All transactions go to the wallet page in one redirect.
    async fn sign_and_send_transactions(&self, params: SignAndSendTransactionsParams) -> WalletResult<()> {
        let _guard = self.session.begin()?;
        let resolved = params
            .transactions
            .into_iter()
            .map(|tx| self.session.resolve(tx, self.contract_id.as_deref()).map(|(_, tx)| tx))
            .collect::<WalletResult<Vec<_>>>()?;
        if resolved.is_empty() {
            return Ok(());
        }
        let url = self.sign_url(&resolved)?;
        self.navigate(url).await.map_err(BackendError::into_signing_error)
    }

    fn accounts(&self) -> Vec<AccountState> { self.session.accounts() }
    fn state(&self) -> LifecycleState { self.session.state() }
}

impl BrowserWalletBehaviour for RedirectWallet {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Transaction};
    use crate::error::ErrorKind;
    use crate::nullables::{NullNavigator, NullProvider};
    use crate::options::Options;
    use crate::services::MemoryStorage;

    fn wallet(url: &str, storage: Arc<MemoryStorage>) -> (RedirectWallet, Arc<NullNavigator>) {
        let navigator = Arc::new(NullNavigator::new(url));
        let options = WalletOptions::new(
            Options::default().with_contract("guest-book.testnet"),
            Arc::new(NullProvider::new()),
            storage,
        );
        let options = options.for_wallet("my-near-wallet");
        let w = RedirectWallet::new(RedirectConfig::new("https://wallet.example/"), navigator.clone(), options);
        (w, navigator)
    }

    fn query(url: &str, key: &str) -> Option<String> {
        Url::parse(url).unwrap().query_pairs().find(|(k, _)| k == key).map(|(_, v)| v.into_owned())
    }

    #[test]
    fn callback_parsing() {
        let callback = Callback::from_url("https://app.example/?account_id=alice.near&public_key=ed25519%3Axyz#top");
        assert_eq!(
            callback.accounts(),
            Some(vec![AccountState::new("alice.near").with_public_key("ed25519:xyz")])
        );

        let declined = Callback::from_url("https://app.example/?account_id=&errorCode=userRejected");
        assert!(declined.accounts().is_none());
        assert_eq!(declined.error_code.as_deref(), Some("userRejected"));

        assert!(Callback::from_url("https://app.example/").accounts().is_none());
        assert!(Callback::from_url("not a url").accounts().is_none());
    }

    #[test]
    fn login_url_keeps_wallet_path_and_encodes_callbacks() {
        let navigator = Arc::new(NullNavigator::new("https://app.example/page?x=1 2"));
        let options = WalletOptions::new(Options::default(), Arc::new(NullProvider::new()), Arc::new(MemoryStorage::new()));
        let w = RedirectWallet::new(RedirectConfig::new("https://wallet.example/app"), navigator, options);
        let params = ConnectParams { contract_id: Some("guest-book.testnet".into()), method_names: vec![] };
        let url = w.login_url(&params).unwrap();
        assert!(url.starts_with("https://wallet.example/app/login/?"));
        assert_eq!(query(&url, "contract_id").as_deref(), Some("guest-book.testnet"));
        assert_eq!(query(&url, "success_url").as_deref(), Some("https://app.example/page?x=1 2"));
    }

    #[tokio::test]
    async fn bad_wallet_url_is_unavailable() {
        let navigator = Arc::new(NullNavigator::new("https://app.example/"));
        let options = WalletOptions::new(Options::default(), Arc::new(NullProvider::new()), Arc::new(MemoryStorage::new()));
        let w = RedirectWallet::new(RedirectConfig::new("wallet without scheme"), navigator.clone(), options);
        assert!(!w.is_available());
        w.init().await.unwrap();
        let err = w.connect(ConnectParams::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(navigator.redirects().is_empty());
    }

    #[tokio::test]
    async fn blocked_redirect_is_unavailable() {
        let storage = Arc::new(MemoryStorage::new());
        let (w, nav) = wallet("https://app.example/", storage.clone());
        w.init().await.unwrap();
        nav.block();
        let err = w.connect(ConnectParams::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(!w.session().is_pending());
        assert_eq!(w.state(), LifecycleState::Initialized);
        assert!(storage.get_item("my-near-wallet:pending").unwrap().is_none());
    }

    #[tokio::test]
    async fn returning_on_callback_page_restores_after_restart() {
        let storage = Arc::new(MemoryStorage::new());
        let (w, nav) = wallet("https://app.example/", storage.clone());
        w.init().await.unwrap();
        w.connect(ConnectParams::default()).await.unwrap();

        // The wallet page sends the user back; the app starts again on the callback URL.
        nav.land_on("https://app.example/?account_id=alice.near");
        let options = WalletOptions::new(
            Options::default().with_contract("guest-book.testnet"),
            Arc::new(NullProvider::new()),
            storage.clone(),
        )
        .for_wallet("my-near-wallet");
        let restarted = RedirectWallet::new(RedirectConfig::new("https://wallet.example/"), nav, options);
        restarted.init().await.unwrap();
        assert_eq!(restarted.state(), LifecycleState::Connected);
        assert_eq!(restarted.accounts()[0].account_id, "alice.near");
        assert!(storage.get_item("my-near-wallet:pending").unwrap().is_none());
    }

    #[tokio::test]
    async fn connect_redirects_to_login_page() {
        let (w, nav) = wallet("https://app.example/", Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        w.connect(ConnectParams { contract_id: None, method_names: vec!["addMessage".into()] }).await.unwrap();

        let redirects = nav.redirects();
        assert_eq!(redirects.len(), 1);
        assert!(redirects[0].starts_with("https://wallet.example/login/?contract_id=guest-book.testnet"));
        assert!(redirects[0].contains("methodNames=addMessage"));
        assert_eq!(query(&redirects[0], "success_url").as_deref(), Some("https://app.example/"));
        assert!(w.session().is_pending());
        assert_eq!(w.state(), LifecycleState::Initialized);
    }

    #[tokio::test]
    async fn callback_completes_sign_in() {
        let storage = Arc::new(MemoryStorage::new());
        let (w, _) = wallet("https://app.example/?account_id=alice.near&public_key=ed25519%3Aabc", storage.clone());
        w.init().await.unwrap();
        assert_eq!(w.state(), LifecycleState::Connected);
        assert_eq!(w.accounts(), vec![AccountState::new("alice.near").with_public_key("ed25519:abc")]);

        // A later start without the callback restores from storage.
        let (again, _) = wallet("https://app.example/", storage);
        again.init().await.unwrap();
        assert_eq!(again.accounts()[0].account_id, "alice.near");
    }

    #[tokio::test]
    async fn late_callback_completes_pending_connect() {
        let storage = Arc::new(MemoryStorage::new());
        let (w, _) = wallet("https://app.example/", storage.clone());
        w.init().await.unwrap();
        w.connect(ConnectParams::default()).await.unwrap();
        w.complete_sign_in("https://app.example/?account_id=alice.near").await.unwrap();
        assert_eq!(w.state(), LifecycleState::Connected);
        assert!(!w.session().is_pending());
        assert!(storage.get_item("my-near-wallet:pending").unwrap().is_none());

        let err = w.complete_sign_in("https://app.example/?errorCode=userRejected").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionRejected);
    }

    #[tokio::test]
    async fn declined_sign_in_clears_pending_marker() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("my-near-wallet:pending", "1").unwrap();
        let (w, _) = wallet("https://app.example/?errorCode=userRejected", storage.clone());
        w.init().await.unwrap();
        assert_eq!(w.state(), LifecycleState::Initialized);
        assert!(storage.get_item("my-near-wallet:pending").unwrap().is_none());
    }

    #[tokio::test]
    async fn signing_redirects_once_per_batch() {
        let (w, nav) = wallet("https://app.example/?account_id=alice.near", Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        let txs = vec![
            Transaction::new(vec![Action::transfer(1)]),
            Transaction::new(vec![Action::transfer(2)]).with_receiver("bob.near"),
        ];
        w.sign_and_send_transactions(SignAndSendTransactionsParams::new(txs)).await.unwrap();
        let redirects = nav.redirects();
        assert_eq!(redirects.len(), 1);

        let raw = BASE64.decode(query(&redirects[0], "transactions").unwrap()).unwrap();
        let decoded: Vec<ResolvedTransaction> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(decoded[0].receiver_id, "guest-book.testnet");
        assert_eq!(decoded[1].receiver_id, "bob.near");
        assert!(decoded.iter().all(|t| t.signer_id == "alice.near"));
    }

    #[tokio::test]
    async fn signing_requires_session() {
        let (w, nav) = wallet("https://app.example/", Arc::new(MemoryStorage::new()));
        w.init().await.unwrap();
        let err = w.sign_and_send_transaction(Transaction::new(vec![])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
        assert!(nav.redirects().is_empty());
    }

    #[tokio::test]
    async fn disconnect_forgets_session() {
        let storage = Arc::new(MemoryStorage::new());
        let (w, _) = wallet("https://app.example/?account_id=alice.near", storage.clone());
        w.init().await.unwrap();
        w.disconnect().await;
        assert_eq!(w.state(), LifecycleState::Disconnected);
        assert!(storage.get_item("my-near-wallet:session").unwrap().is_none());
    }
}
