//! Opt-in stderr logging for hosts without a subscriber of their own.
//!
//! The filter comes from `WALLET_SELECTOR_LOG`, then `RUST_LOG`, then the
//! caller's default. `WALLET_SELECTOR_LOG_JSON=1` writes one JSON object per
//! event with the `wallet` field at the top level.

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::keys::env;

fn filter(default_filter: &str) -> EnvFilter {
    std::env::var(env::LOG)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_filter))
}

fn json_enabled() -> bool {
    std::env::var(env::LOG_JSON).map(|value| value == "1").unwrap_or(false)
}

pub fn init_logging() -> bool { init_logging_with("info") }

/// Install the subscriber. Returns false when the process already had one,
/// which is left in place.
pub fn init_logging_with(default_filter: &str) -> bool {
    let builder = fmt::Subscriber::builder().with_env_filter(filter(default_filter)).with_writer(std::io::stderr);
    let installed = if json_enabled() {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.compact().with_target(false).try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    #[test]
    fn crate_variable_wins_over_default() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        std::env::set_var(env::LOG, "wallet_selector=debug");
        assert_eq!(filter("warn").to_string(), "wallet_selector=debug");
        std::env::remove_var(env::LOG);
    }

    #[test]
    fn second_install_keeps_first() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        init_logging();
        assert!(!init_logging_with("debug"));
        tracing::info!(wallet = "test", "logging ready");
    }
}
