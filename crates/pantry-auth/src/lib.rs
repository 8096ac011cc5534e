pub mod identity;
pub mod session;

use pantry_core::error::PantryError;

pub use identity::{IdentityObserver, IdentitySignal};
pub use session::Session;

/// Trait for bearer-token storage backends.
pub trait CredentialStore: Send + Sync {
    /// Store a token under the given key.
    fn store(&self, key: &str, token: &str) -> Result<(), PantryError>;

    /// Retrieve a token by key.
    fn get(&self, key: &str) -> Result<Option<String>, PantryError>;

    /// Delete a stored token.
    fn delete(&self, key: &str) -> Result<(), PantryError>;
}

fn credential_error(e: keyring::Error) -> PantryError {
    PantryError::CredentialError {
        message: e.to_string(),
    }
}

/// OS keychain-backed credential store using the `keyring` crate.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: "pantry".to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, PantryError> {
        keyring::Entry::new(&self.service, key).map_err(credential_error)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn store(&self, key: &str, token: &str) -> Result<(), PantryError> {
        self.entry(key)?.set_password(token).map_err(credential_error)
    }

    fn get(&self, key: &str) -> Result<Option<String>, PantryError> {
        match self.entry(key)?.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(credential_error(e)),
        }
    }

    fn delete(&self, key: &str) -> Result<(), PantryError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(credential_error(e)),
        }
    }
}

/// In-memory credential store for testing.
pub struct MemoryStore {
    store: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            store: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, std::collections::HashMap<String, String>>, PantryError>
    {
        self.store.lock().map_err(|_| PantryError::CredentialError {
            message: "memory store poisoned".into(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for MemoryStore {
    fn store(&self, key: &str, token: &str) -> Result<(), PantryError> {
        self.lock()?.insert(key.to_string(), token.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, PantryError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<(), PantryError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_crud() {
        let store = MemoryStore::new();
        assert_eq!(store.get("pantry:session").unwrap(), None);
        store.store("pantry:session", "jwt-token").unwrap();
        assert_eq!(
            store.get("pantry:session").unwrap(),
            Some("jwt-token".to_string())
        );
        store.delete("pantry:session").unwrap();
        assert_eq!(store.get("pantry:session").unwrap(), None);
    }

    #[test]
    fn test_memory_store_delete_nonexistent() {
        let store = MemoryStore::new();
        store.delete("no-such-key").unwrap();
    }
}
