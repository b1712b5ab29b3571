//! Nullable hardware device - counts every interaction.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::BackendError;
use crate::nullables::{fake_signature, lock};
use crate::wallets::{DerivationPath, DeviceHandle, DeviceTransport};

#[derive(Debug, Default)]
struct DeviceLog {
    opens: usize,
    closes: usize,
    key_requests: usize,
    signed_paths: Vec<String>,
    sign_requests: usize,
    unplug_next: bool,
}

/// A device transport whose handles share one interaction log.
pub struct NullDevice {
    public_key: String,
    supported: bool,
    reject_key: bool,
    reject_signing: bool,
    reject_sign_at: Option<usize>,
    log: Arc<Mutex<DeviceLog>>,
}

impl NullDevice {
    pub fn new(public_key: &str) -> Self {
        Self {
            public_key: public_key.to_string(),
            supported: true,
            reject_key: false,
            reject_signing: false,
            reject_sign_at: None,
            log: Arc::new(Mutex::new(DeviceLog::default())),
        }
    }

    pub fn unsupported(mut self) -> Self { self.supported = false; self }
    pub fn rejecting_public_key(mut self) -> Self { self.reject_key = true; self }
    pub fn rejecting_signatures(mut self) -> Self { self.reject_signing = true; self }

    /// Reject only the `index`-th signature request (counting from zero).
    pub fn rejecting_signature(mut self, index: usize) -> Self { self.reject_sign_at = Some(index); self }

    /// The next device operation fails as if the cable was pulled.
    pub fn unplug_once(&self) { lock(&self.log).unplug_next = true; }

    pub fn opens(&self) -> usize { lock(&self.log).opens }
    pub fn closes(&self) -> usize { lock(&self.log).closes }
    pub fn signed_paths(&self) -> Vec<String> { lock(&self.log).signed_paths.clone() }

    /// Signature requests that reached the device, rejected ones included.
    pub fn sign_requests(&self) -> usize { lock(&self.log).sign_requests }

    /// Opens, key requests and signatures; closing is not an interaction.
    pub fn interactions(&self) -> usize {
        let log = lock(&self.log);
        log.opens + log.key_requests + log.signed_paths.len()
    }
}

#[async_trait]
impl DeviceTransport for NullDevice {
    fn is_supported(&self) -> bool { self.supported }

    async fn open(&self) -> Result<Box<dyn DeviceHandle>, BackendError> {
        lock(&self.log).opens += 1;
        Ok(Box::new(NullDeviceHandle {
            public_key: self.public_key.clone(),
            reject_key: self.reject_key,
            reject_signing: self.reject_signing,
            reject_sign_at: self.reject_sign_at,
            log: self.log.clone(),
        }))
    }
}

struct NullDeviceHandle {
    public_key: String,
    reject_key: bool,
    reject_signing: bool,
    reject_sign_at: Option<usize>,
    log: Arc<Mutex<DeviceLog>>,
}

impl NullDeviceHandle {
    fn unplugged(&self) -> bool { std::mem::take(&mut lock(&self.log).unplug_next) }
}

#[async_trait]
impl DeviceHandle for NullDeviceHandle {
    async fn get_public_key(&mut self, _path: &DerivationPath) -> Result<String, BackendError> {
        if self.unplugged() {
            return Err(BackendError::Unavailable("device disconnected".into()));
        }
        lock(&self.log).key_requests += 1;
        if self.reject_key {
            return Err(BackendError::Rejected("user denied key export".into()));
        }
        Ok(self.public_key.clone())
    }

    async fn sign(&mut self, path: &DerivationPath, payload: &[u8]) -> Result<Vec<u8>, BackendError> {
        if self.unplugged() {
            return Err(BackendError::Unavailable("device disconnected".into()));
        }
        let request = {
            let mut log = lock(&self.log);
            log.sign_requests += 1;
            log.sign_requests - 1
        };
        if self.reject_signing || self.reject_sign_at == Some(request) {
            return Err(BackendError::Rejected("user denied signature".into()));
        }
        lock(&self.log).signed_paths.push(path.to_string());
        Ok(fake_signature(path.as_str(), payload))
    }

    async fn close(&mut self) { lock(&self.log).closes += 1; }
}
