//! Nullable navigator - record redirects instead of leaving the page.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::BackendError;
use crate::nullables::lock;
use crate::wallets::Navigator;

pub struct NullNavigator {
    current_url: Mutex<String>,
    redirects: Mutex<Vec<String>>,
    blocked: Mutex<bool>,
}

impl NullNavigator {
    pub fn new(current_url: &str) -> Self {
        Self { current_url: Mutex::new(current_url.to_string()), redirects: Mutex::new(Vec::new()), blocked: Mutex::new(false) }
    }

    /// Simulate returning to the app on a different URL.
    pub fn land_on(&self, url: &str) { *lock(&self.current_url) = url.to_string(); }

    /// Make redirects fail, as a popup blocker would.
    pub fn block(&self) { *lock(&self.blocked) = true; }

    pub fn redirects(&self) -> Vec<String> { lock(&self.redirects).clone() }
}

#[async_trait]
impl Navigator for NullNavigator {
    fn current_url(&self) -> String { lock(&self.current_url).clone() }

    async fn redirect(&self, url: String) -> Result<(), BackendError> {
        if *lock(&self.blocked) {
            return Err(BackendError::Unavailable("navigation blocked".into()));
        }
        lock(&self.redirects).push(url);
        Ok(())
    }
}
