use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use data_model::Credential;
use parking_lot::Mutex;

/// Connectivity shared between the supervisor and everything that depends on the link
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupervisorState {
    pub is_connected: bool,
    /// Credential stored at association time and reused by every reconnect
    pub active: Option<Credential>,
}

/// Handle to the single lock guarding `SupervisorState`. Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct LinkState {
    inner: Arc<Mutex<SupervisorState>>,
}

impl LinkState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.lock().is_connected
    }

    pub fn set_connected(&self, connected: bool) {
        self.inner.lock().is_connected = connected;
    }

    pub fn active(&self) -> Option<Credential> {
        self.inner.lock().active.clone()
    }

    pub fn set_active(&self, credential: Credential) {
        self.inner.lock().active = Some(credential);
    }

    pub fn snapshot(&self) -> SupervisorState {
        self.inner.lock().clone()
    }
}

/// Aborts a blocking connect loop when tripped, possibly from another thread
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
