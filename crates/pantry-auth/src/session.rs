use std::sync::Arc;

use pantry_core::error::PantryError;
use pantry_core::models::identity::Identity;

use crate::identity::IdentitySignal;
use crate::CredentialStore;

/// A bearer credential paired with the identity it authenticates.
pub struct Session {
    credentials: Arc<dyn CredentialStore>,
    credential_key: String,
    identity: IdentitySignal,
}

impl Session {
    pub fn new(credentials: Arc<dyn CredentialStore>, credential_key: impl Into<String>) -> Self {
        Self {
            credentials,
            credential_key: credential_key.into(),
            identity: IdentitySignal::new(),
        }
    }

    pub fn identity(&self) -> &IdentitySignal {
        &self.identity
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }

    /// The stored bearer token, if any.
    pub fn bearer_token(&self) -> Result<Option<String>, PantryError> {
        self.credentials.get(&self.credential_key)
    }

    /// Persist `token` and sign `identity` in.
    ///
    /// The token is written first so that anything reacting to the sign-in
    /// can already authenticate its requests.
    pub fn begin(&self, token: &str, identity: Identity) -> Result<(), PantryError> {
        if token.is_empty() {
            return Err(PantryError::CredentialError {
                message: "empty bearer token".into(),
            });
        }
        self.credentials.store(&self.credential_key, token)?;
        self.identity.sign_in(identity);
        Ok(())
    }

    /// Sign in with a token that is already stored.
    pub fn resume(&self, identity: Identity) {
        self.identity.sign_in(identity);
    }

    /// Sign out, then forget the token.
    pub fn end(&self) -> Result<(), PantryError> {
        self.identity.sign_out();
        self.credentials.delete(&self.credential_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_begin_and_end() {
        let store = Arc::new(MemoryStore::new());
        let session = Session::new(store.clone(), "pantry:session");

        session
            .begin("jwt", Identity::new("u1", "Asha", "asha@example.com"))
            .unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.bearer_token().unwrap(), Some("jwt".to_string()));

        session.end().unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(store.get("pantry:session").unwrap(), None);
    }

    #[test]
    fn test_empty_token_rejected() {
        let session = Session::new(Arc::new(MemoryStore::new()), "pantry:session");
        let err = session
            .begin("", Identity::new("u1", "Asha", "asha@example.com"))
            .unwrap_err();
        assert!(matches!(err, PantryError::CredentialError { .. }));
        assert!(!session.is_authenticated());
    }
}
