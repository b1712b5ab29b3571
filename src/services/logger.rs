//! Logger - side channel over `tracing`, tagged with the owning wallet.
//!
//! Never affects control flow: every method returns `()`.

#[derive(Debug, Clone)]
pub struct Logger {
    scope: String,
    debug: bool,
}

impl Default for Logger {
    fn default() -> Self { Self::new(false) }
}

impl Logger {
    pub fn new(debug: bool) -> Self { Self { scope: "wallet-selector".into(), debug } }

    /// Same sink, tagged with a wallet id.
    pub fn for_wallet(&self, wallet_id: &str) -> Self {
        Self { scope: wallet_id.to_string(), debug: self.debug }
    }

    pub fn scope(&self) -> &str { &self.scope }
    pub fn is_debug(&self) -> bool { self.debug }

    /// Only emitted when `Options::debug` is set.
    pub fn debug(&self, message: &str) {
        if self.debug {
            tracing::debug!(wallet = %self.scope, "{}", message);
        }
    }

    pub fn info(&self, message: &str) { tracing::info!(wallet = %self.scope, "{}", message); }
    pub fn warn(&self, message: &str) { tracing::warn!(wallet = %self.scope, "{}", message); }
    pub fn error(&self, message: &str) { tracing::error!(wallet = %self.scope, "{}", message); }
}
