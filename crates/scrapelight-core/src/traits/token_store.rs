//! Token store trait.

use crate::{CredentialPair, Result};

/// Durable holder of the current credential pair.
///
/// Implementations are pure persistence: no network calls, no validation.
/// The pair is stored and cleared as a unit; a store never reports one
/// token without the other.
pub trait TokenStore: Send + Sync {
    /// Returns the stored pair, or `None` when logged out.
    fn get(&self) -> Result<Option<CredentialPair>>;

    /// Replace the stored pair.
    fn set(&self, pair: &CredentialPair) -> Result<()>;

    /// Remove the stored pair. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}
