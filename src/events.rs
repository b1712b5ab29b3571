//! Events - typed publish/subscribe between wallets and the host
//!
//! ```text
//! Wallet ──emit──► EventEmitter ──► listener 1 (registration order)
//!    │                  │        ──► listener 2
//!    └── EmitterScope ──┘        ──► channel subscriber (tokio mpsc)
//!        (listeners the wallet registered itself; cleared on disconnect)
//! ```
//!
//! Listeners run synchronously inside `emit`, in the order they were
//! registered, so the order a host observes is the order events happened.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::core::keys::events as names;
use crate::core::AccountState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum WalletEvent {
    Init { accounts: Vec<AccountState> },
    Connected {
        #[serde(skip_serializing_if = "Option::is_none")]
        pending: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        accounts: Option<Vec<AccountState>>,
    },
    Disconnected,
    AccountsChanged { accounts: Vec<AccountState> },
    NetworkChanged,
    Uninstalled,
}

impl WalletEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WalletEvent::Init { .. } => EventKind::Init,
            WalletEvent::Connected { .. } => EventKind::Connected,
            WalletEvent::Disconnected => EventKind::Disconnected,
            WalletEvent::AccountsChanged { .. } => EventKind::AccountsChanged,
            WalletEvent::NetworkChanged => EventKind::NetworkChanged,
            WalletEvent::Uninstalled => EventKind::Uninstalled,
        }
    }

    pub fn name(&self) -> &'static str { self.kind().as_str() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind { Init, Connected, Disconnected, AccountsChanged, NetworkChanged, Uninstalled }

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => names::INIT,
            EventKind::Connected => names::CONNECTED,
            EventKind::Disconnected => names::DISCONNECTED,
            EventKind::AccountsChanged => names::ACCOUNTS_CHANGED,
            EventKind::NetworkChanged => names::NETWORK_CHANGED,
            EventKind::Uninstalled => names::UNINSTALLED,
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            names::INIT => Some(EventKind::Init),
            names::CONNECTED => Some(EventKind::Connected),
            names::DISCONNECTED => Some(EventKind::Disconnected),
            names::ACCOUNTS_CHANGED => Some(EventKind::AccountsChanged),
            names::NETWORK_CHANGED => Some(EventKind::NetworkChanged),
            names::UNINSTALLED => Some(EventKind::Uninstalled),
            _ => None,
        }
    }
}

type Listener = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    kind: Option<EventKind>,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Shared, append-only subscription registry. Clones share the same registry.
#[derive(Clone, Default)]
pub struct EventEmitter {
    inner: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").field("listeners", &self.listener_count()).finish()
    }
}

impl EventEmitter {
    pub fn new() -> Self { Self::default() }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn register(&self, kind: Option<EventKind>, listener: Listener) -> ListenerId {
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.entries.push(Entry { id, kind, listener });
        id
    }

    /// Listen for one kind of event.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(listener))
    }

    /// Listen for every event.
    pub fn on_any<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(listener))
    }

    /// Async consumers: every event is forwarded into an unbounded channel.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<WalletEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.on_any(move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry();
        let before = registry.entries.len();
        registry.entries.retain(|e| e.id != id);
        registry.entries.len() != before
    }

    /// Deliver to every matching listener in registration order. The registry
    /// lock is released before listeners run so they may (un)subscribe.
    pub fn emit(&self, event: WalletEvent) {
        let kind = event.kind();
        let listeners: Vec<Listener> = self
            .registry()
            .entries
            .iter()
            .filter(|e| e.kind.map_or(true, |k| k == kind))
            .map(|e| e.listener.clone())
            .collect();
        tracing::trace!(event = kind.as_str(), listeners = listeners.len(), "emit");
        for listener in listeners {
            listener(&event);
        }
    }

    pub fn listener_count(&self) -> usize { self.registry().entries.len() }

    /// A scope whose listeners can be dropped together.
    pub fn scope(&self) -> EmitterScope { EmitterScope::new(self.clone()) }
}

/// The listeners one wallet instance registered. Cleared on disconnect and
/// on drop so callbacks never leak across sessions.
pub struct EmitterScope {
    emitter: EventEmitter,
    owned: Mutex<Vec<ListenerId>>,
}

impl EmitterScope {
    pub fn new(emitter: EventEmitter) -> Self { Self { emitter, owned: Mutex::new(Vec::new()) } }

    fn owned(&self) -> MutexGuard<'_, Vec<ListenerId>> {
        self.owned.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&WalletEvent) + Send + Sync + 'static,
    {
        let id = self.emitter.on(kind, listener);
        self.owned().push(id);
        id
    }

    pub fn emit(&self, event: WalletEvent) { self.emitter.emit(event) }

    /// Remove every listener registered through this scope.
    pub fn clear(&self) -> usize {
        let ids: Vec<ListenerId> = self.owned().drain(..).collect();
        ids.into_iter().filter(|id| self.emitter.off(*id)).count()
    }

    pub fn owned_count(&self) -> usize { self.owned().len() }

    pub fn emitter(&self) -> &EventEmitter { &self.emitter }
}

impl Drop for EmitterScope {
    fn drop(&mut self) { self.clear(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(emitter: &EventEmitter) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        emitter.on_any(move |e| sink.lock().unwrap().push(e.name().to_string()));
        seen
    }

    #[test]
    fn emission_follows_occurrence_order() {
        let emitter = EventEmitter::new();
        let seen = recorder(&emitter);
        emitter.emit(WalletEvent::Init { accounts: vec![] });
        emitter.emit(WalletEvent::Connected { pending: None, accounts: Some(vec![AccountState::new("a.near")]) });
        emitter.emit(WalletEvent::NetworkChanged);
        emitter.emit(WalletEvent::Disconnected);
        assert_eq!(*seen.lock().unwrap(), vec!["init", "connected", "networkChanged", "disconnected"]);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let emitter = EventEmitter::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            emitter.on(EventKind::Disconnected, move |_| order.lock().unwrap().push(i));
        }
        emitter.emit(WalletEvent::Disconnected);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn kind_filter_and_off() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let id = emitter.on(EventKind::NetworkChanged, move |_| *counter.lock().unwrap() += 1);
        emitter.emit(WalletEvent::Disconnected);
        emitter.emit(WalletEvent::NetworkChanged);
        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit(WalletEvent::NetworkChanged);
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn scope_clear_leaves_host_listeners() {
        let emitter = EventEmitter::new();
        let _host = recorder(&emitter);
        let scope = emitter.scope();
        scope.on(EventKind::AccountsChanged, |_| {});
        scope.on(EventKind::Uninstalled, |_| {});
        assert_eq!(emitter.listener_count(), 3);
        assert_eq!(scope.clear(), 2);
        assert_eq!(emitter.listener_count(), 1);
        assert_eq!(scope.owned_count(), 0);
    }

    #[test]
    fn dropping_scope_unsubscribes() {
        let emitter = EventEmitter::new();
        {
            let scope = emitter.scope();
            scope.on(EventKind::Init, |_| {});
            assert_eq!(emitter.listener_count(), 1);
        }
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let emitter = EventEmitter::new();
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let inner = emitter.clone();
        let slot_in = slot.clone();
        let id = emitter.on_any(move |_| {
            if let Some(id) = slot_in.lock().unwrap().take() {
                inner.off(id);
            }
        });
        *slot.lock().unwrap() = Some(id);
        emitter.emit(WalletEvent::NetworkChanged);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[tokio::test]
    async fn channel_subscription_receives_events() {
        let emitter = EventEmitter::new();
        let (_id, mut rx) = emitter.subscribe();
        emitter.emit(WalletEvent::Uninstalled);
        assert_eq!(rx.recv().await, Some(WalletEvent::Uninstalled));
    }

    #[test]
    fn event_wire_format() {
        let value = serde_json::to_value(WalletEvent::Connected { pending: Some(true), accounts: None }).unwrap();
        assert_eq!(value, serde_json::json!({"event": "connected", "payload": {"pending": true}}));
        let value = serde_json::to_value(WalletEvent::Disconnected).unwrap();
        assert_eq!(value, serde_json::json!({"event": "disconnected"}));
        assert_eq!(EventKind::from_str("accountsChanged"), Some(EventKind::AccountsChanged));
    }
}
