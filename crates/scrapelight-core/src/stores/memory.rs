//! In-memory token store.

use std::sync::{Arc, RwLock};

use crate::{CredentialPair, Result, TokenStore};

/// Process-local token store.
///
/// Clones share the same slot, which lets a test simulate a restart by
/// handing a second client a clone of the first client's store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<RwLock<Option<CredentialPair>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding `pair`.
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(pair))),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<CredentialPair>> {
        let slot = self.slot.read().unwrap_or_else(|e| e.into_inner());
        Ok(slot.clone())
    }

    fn set(&self, pair: &CredentialPair) -> Result<()> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(pair.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = None;
        Ok(())
    }
}
