//! Ledger-facing value types. Actions stay opaque: the wallet layer moves them
//! around verbatim and never looks inside.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// An account a wallet is authorised for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub account_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl AccountState {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self { account_id: account_id.into(), public_key: None }
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }
}

/// Ledger-defined unit of intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Value);

impl Action {
    pub fn new(value: Value) -> Self { Self(value) }

    /// Plain token transfer. Amounts are strings so u128 survives JSON.
    pub fn transfer(deposit: u128) -> Self {
        Self(json!({"type": "Transfer", "params": {"deposit": deposit.to_string()}}))
    }

    pub fn function_call(method_name: &str, args: Value, gas: u64, deposit: u128) -> Self {
        Self(json!({
            "type": "FunctionCall",
            "params": {
                "methodName": method_name,
                "args": args,
                "gas": gas.to_string(),
                "deposit": deposit.to_string()
            }
        }))
    }

    pub fn as_value(&self) -> &Value { &self.0 }
    pub fn into_value(self) -> Value { self.0 }
}

/// A transaction as requested by the host. A missing `signer_id` means the
/// first account of the current session; a missing `receiver_id` means the
/// configured contract id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    pub actions: Vec<Action>,
}

impl Transaction {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { signer_id: None, receiver_id: None, actions }
    }
    pub fn with_signer(mut self, signer_id: impl Into<String>) -> Self { self.signer_id = Some(signer_id.into()); self }
    pub fn with_receiver(mut self, receiver_id: impl Into<String>) -> Self { self.receiver_id = Some(receiver_id.into()); self }
}

/// Parameters of `sign_and_send_transaction`; same shape as a transaction.
pub type SignAndSendTransactionParams = Transaction;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignAndSendTransactionsParams {
    pub transactions: Vec<Transaction>,
}

impl SignAndSendTransactionsParams {
    pub fn new(transactions: Vec<Transaction>) -> Self { Self { transactions } }
}

/// A transaction whose signer and receiver have been filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTransaction {
    pub signer_id: String,
    pub receiver_id: String,
    pub actions: Vec<Action>,
}

impl ResolvedTransaction {
    /// Bytes handed to a signer.
    pub fn signing_payload(&self) -> Vec<u8> {
        // Serializing strings and JSON values into a Vec cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Hex sha256 of the signing payload.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.signing_payload()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub transaction: ResolvedTransaction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    /// Hex-encoded signature bytes.
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExecutionStatus {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Value>,
    },
    Failure { message: String },
}

/// The ledger's answer to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub transaction_hash: String,
    pub signer_id: String,
    pub receiver_id: String,
    pub status: ExecutionStatus,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool { matches!(self.status, ExecutionStatus::Success { .. }) }
}

/// Sign-in parameters for every variant except hardware.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub method_names: Vec<String>,
}

/// Hardware sign-in: the device is only touched once these are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareConnectParams {
    pub account_id: String,
    pub derivation_path: String,
}

impl HardwareConnectParams {
    pub fn new(account_id: impl Into<String>, derivation_path: impl Into<String>) -> Self {
        Self { account_id: account_id.into(), derivation_path: derivation_path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_omits_absent_ids() {
        let tx = Transaction::new(vec![Action::transfer(1)]).with_receiver("bob.near");
        let value = serde_json::to_value(&tx).unwrap();
        assert!(value.get("signerId").is_none());
        assert_eq!(value["receiverId"], "bob.near");
        assert_eq!(value["actions"][0]["params"]["deposit"], "1");
    }

    #[test]
    fn actions_pass_through_verbatim() {
        let raw = json!({"type": "Stake", "params": {"stake": "10", "publicKey": "ed25519:abc"}});
        let action = Action::new(raw.clone());
        let encoded = serde_json::to_value(&action).unwrap();
        assert_eq!(encoded, raw);
        let decoded: Action = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.into_value(), raw);
    }

    #[test]
    fn resolved_hash_is_stable() {
        let tx = ResolvedTransaction {
            signer_id: "alice.near".into(),
            receiver_id: "bob.near".into(),
            actions: vec![Action::transfer(5)],
        };
        assert_eq!(tx.hash(), tx.clone().hash());
        assert_eq!(tx.hash().len(), 64);
    }

    #[test]
    fn execution_status_is_tagged() {
        let outcome = ExecutionOutcome {
            transaction_hash: "h".into(),
            signer_id: "alice.near".into(),
            receiver_id: "bob.near".into(),
            status: ExecutionStatus::Failure { message: "out of gas".into() },
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"]["type"], "failure");
        assert!(!outcome.is_success());
    }
}
