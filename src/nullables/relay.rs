//! Nullable relay - a companion app that answers from a script.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

use crate::core::{AccountState, ConnectParams, ResolvedTransaction, SignedTransaction};
use crate::error::BackendError;
use crate::nullables::{fake_signature, lock};
use crate::wallets::{Pairing, Relay, RelayEvent, RelaySession};

pub struct NullRelay {
    reachable: bool,
    pairing: Option<Pairing>,
    decline_signatures: bool,
    fail_end: bool,
    restore_gate: Option<Arc<Notify>>,
    /// Sessions the relay still knows, by topic.
    sessions: Mutex<HashMap<String, Vec<AccountState>>>,
    rounds: Mutex<Vec<usize>>,
    ended: Mutex<Vec<String>>,
    listeners: Mutex<Vec<mpsc::UnboundedSender<RelayEvent>>>,
}

impl NullRelay {
    /// Reachable, but pairing is rejected until scripted otherwise.
    pub fn new() -> Self {
        Self {
            reachable: true,
            pairing: None,
            decline_signatures: false,
            fail_end: false,
            restore_gate: None,
            sessions: Mutex::new(HashMap::new()),
            rounds: Mutex::new(Vec::new()),
            ended: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable(mut self) -> Self { self.reachable = false; self }

    /// Pairing is approved immediately.
    pub fn approving(mut self, topic: &str, accounts: Vec<AccountState>) -> Self {
        self.pairing = Some(Pairing::Approved(RelaySession { topic: topic.to_string(), accounts }));
        self
    }

    /// Pairing waits for a `SessionApproved` event.
    pub fn pending(mut self, topic: &str) -> Self {
        self.pairing = Some(Pairing::Pending { topic: topic.to_string(), uri: format!("wc:{}@2?relay-protocol=irn", topic) });
        self
    }

    pub fn with_session(self, topic: &str, accounts: Vec<AccountState>) -> Self {
        lock(&self.sessions).insert(topic.to_string(), accounts);
        self
    }

    pub fn declining_signatures(mut self) -> Self { self.decline_signatures = true; self }
    pub fn failing_end(mut self) -> Self { self.fail_end = true; self }

    /// `restore` waits until `gate` is notified, like a slow relay.
    pub fn holding_restore(mut self, gate: Arc<Notify>) -> Self { self.restore_gate = Some(gate); self }

    pub fn push(&self, event: RelayEvent) {
        if let RelayEvent::SessionApproved(session) = &event {
            lock(&self.sessions).insert(session.topic.clone(), session.accounts.clone());
        }
        lock(&self.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of transactions in each signing request.
    pub fn signature_rounds(&self) -> Vec<usize> { lock(&self.rounds).clone() }
    pub fn ended_topics(&self) -> Vec<String> { lock(&self.ended).clone() }
}

impl Default for NullRelay {
    fn default() -> Self { Self::new() }
}

#[async_trait]
impl Relay for NullRelay {
    fn is_reachable(&self) -> bool { self.reachable }

    async fn restore(&self, topic: &str) -> Result<Option<RelaySession>, BackendError> {
        if let Some(gate) = &self.restore_gate {
            gate.notified().await;
        }
        Ok(lock(&self.sessions)
            .get(topic)
            .map(|accounts| RelaySession { topic: topic.to_string(), accounts: accounts.clone() }))
    }

    async fn pair(&self, _params: &ConnectParams) -> Result<Pairing, BackendError> {
        let pairing = self.pairing.clone().ok_or_else(|| BackendError::Rejected("pairing rejected".into()))?;
        if let Pairing::Approved(session) = &pairing {
            lock(&self.sessions).insert(session.topic.clone(), session.accounts.clone());
        }
        Ok(pairing)
    }

    async fn request_signatures(
        &self,
        topic: &str,
        transactions: &[ResolvedTransaction],
    ) -> Result<Vec<SignedTransaction>, BackendError> {
        lock(&self.rounds).push(transactions.len());
        if !lock(&self.sessions).contains_key(topic) {
            return Err(BackendError::Unavailable(format!("unknown topic {}", topic)));
        }
        if self.decline_signatures {
            return Err(BackendError::Rejected("companion declined".into()));
        }
        Ok(transactions
            .iter()
            .map(|tx| SignedTransaction {
                transaction: tx.clone(),
                public_key: None,
                signature: hex::encode(fake_signature(&tx.signer_id, &tx.signing_payload())),
            })
            .collect())
    }

    async fn end_session(&self, topic: &str) -> Result<(), BackendError> {
        lock(&self.ended).push(topic.to_string());
        lock(&self.sessions).remove(topic);
        if self.fail_end {
            return Err(BackendError::Unavailable("relay offline".into()));
        }
        Ok(())
    }

    fn events(&self) -> mpsc::UnboundedReceiver<RelayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.listeners).push(tx);
        rx
    }
}
