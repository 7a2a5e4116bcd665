//! In-memory state and token stores.

use parking_lot::Mutex;

use crate::domain::{ClusterToken, DeploymentState};
use crate::error::Result;
use crate::port::outbound::store::{StateStore, TokenStore};

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<DeploymentState>>,
    persists: Mutex<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(state: DeploymentState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            persists: Mutex::new(0),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<DeploymentState> {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn persist_count(&self) -> usize {
        *self.persists.lock()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<DeploymentState> {
        Ok(self.state.lock().clone().unwrap_or_default())
    }

    fn persist(&self, state: &DeploymentState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        *self.persists.lock() += 1;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.state.lock().is_some()
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<ClusterToken>>,
    saves: Mutex<usize>,
    loads: Mutex<usize>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    #[must_use]
    pub fn load_count(&self) -> usize {
        *self.loads.lock()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<ClusterToken>> {
        *self.loads.lock() += 1;
        Ok(self.token.lock().clone())
    }

    fn save(&self, token: &ClusterToken) -> Result<()> {
        *self.token.lock() = Some(token.clone());
        *self.saves.lock() += 1;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}
