use serde::{Deserialize, Serialize};

/// Closed set of wallet integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType { Browser, Injected, Hardware, Bridge }

impl WalletType {
    pub const ALL: [WalletType; 4] = [WalletType::Browser, WalletType::Injected, WalletType::Hardware, WalletType::Bridge];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Browser => "browser",
            WalletType::Injected => "injected",
            WalletType::Hardware => "hardware",
            WalletType::Bridge => "bridge",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "browser" => Some(WalletType::Browser),
            "injected" => Some(WalletType::Injected),
            "hardware" => Some(WalletType::Hardware),
            "bridge" => Some(WalletType::Bridge),
            _ => None,
        }
    }
}

impl std::fmt::Display for WalletType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Static description of a wallet kind, shown by the host when listing wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletMetadata {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon_url: String,
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
}

impl WalletMetadata {
    pub fn new(id: impl Into<String>, name: impl Into<String>, icon_url: impl Into<String>, wallet_type: WalletType) -> Self {
        Self { id: id.into(), name: name.into(), description: None, icon_url: icon_url.into(), wallet_type }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
