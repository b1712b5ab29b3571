//! Wallet registry - the set of modules a host offers, unique by id.

use crate::error::{WalletError, WalletResult};
use crate::wallet::{WalletMetadata, WalletModule, WalletType};

/// Modules in registration order.
#[derive(Debug, Clone, Default)]
pub struct WalletRegistry {
    modules: Vec<WalletModule>,
}

impl WalletRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn from_modules(modules: impl IntoIterator<Item = WalletModule>) -> WalletResult<Self> {
        let mut registry = Self::new();
        for module in modules {
            registry.register(module)?;
        }
        Ok(registry)
    }

    /// Fails with `DuplicateWalletId` if the id is taken; the registry is unchanged then.
    pub fn register(&mut self, module: WalletModule) -> WalletResult<()> {
        if self.contains(module.id()) {
            return Err(WalletError::DuplicateWalletId(module.id().to_string()));
        }
        tracing::debug!(wallet = module.id(), kind = %module.metadata().wallet_type, "registered wallet module");
        self.modules.push(module);
        Ok(())
    }

    pub fn with(mut self, module: WalletModule) -> WalletResult<Self> {
        self.register(module)?;
        Ok(self)
    }

    pub fn get(&self, id: &str) -> WalletResult<&WalletModule> {
        self.modules.iter().find(|m| m.id() == id).ok_or_else(|| WalletError::UnknownWallet(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool { self.modules.iter().any(|m| m.id() == id) }

    pub fn modules(&self) -> &[WalletModule] { &self.modules }

    pub fn metadata(&self) -> Vec<WalletMetadata> { self.modules.iter().map(|m| m.metadata().clone()).collect() }

    pub fn of_type(&self, wallet_type: WalletType) -> impl Iterator<Item = &WalletModule> {
        self.modules.iter().filter(move |m| m.metadata().wallet_type == wallet_type)
    }

    pub fn len(&self) -> usize { self.modules.len() }
    pub fn is_empty(&self) -> bool { self.modules.is_empty() }
}
