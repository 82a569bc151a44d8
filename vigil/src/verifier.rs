//! Credential verification against stored argon2 digests.

use std::sync::Arc;

use async_trait::async_trait;
use password_auth::{generate_hash, verify_password};
use vigil_core::{repositories::CredentialRepository, services::CredentialVerifier, Error};

/// Hash a password for storage.
pub fn hash_password(password: &str) -> String {
    generate_hash(password)
}

/// [`CredentialVerifier`] backed by the credential repository.
///
/// Unknown users and wrong passwords are indistinguishable from the outside:
/// both come back as a plain `false`.
pub struct Argon2Verifier<R: CredentialRepository> {
    credentials: Arc<R>,
}

impl<R: CredentialRepository> Argon2Verifier<R> {
    pub fn new(credentials: Arc<R>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl<R: CredentialRepository> CredentialVerifier for Argon2Verifier<R> {
    async fn verify(&self, user_id: &str, password: &str) -> Result<bool, Error> {
        let Some(hash) = self.credentials.password_hash(user_id).await? else {
            return Ok(false);
        };

        Ok(verify_password(password, &hash).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockCredentials {
        hashes: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CredentialRepository for MockCredentials {
        async fn create_user(&self, user_id: &str, password_hash: &str) -> Result<(), Error> {
            self.hashes
                .lock()
                .unwrap()
                .insert(user_id.to_string(), password_hash.to_string());
            Ok(())
        }

        async fn password_hash(&self, user_id: &str) -> Result<Option<String>, Error> {
            Ok(self.hashes.lock().unwrap().get(user_id).cloned())
        }
    }

    #[tokio::test]
    async fn test_verify_round_trip() {
        let credentials = Arc::new(MockCredentials::default());
        credentials
            .create_user("alice@example.com", &hash_password("hunter2"))
            .await
            .unwrap();
        let verifier = Argon2Verifier::new(credentials);

        assert!(verifier
            .verify("alice@example.com", "hunter2")
            .await
            .unwrap());
        assert!(!verifier
            .verify("alice@example.com", "wrong")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_verifies_false() {
        let verifier = Argon2Verifier::new(Arc::new(MockCredentials::default()));

        assert!(!verifier
            .verify("ghost@example.com", "anything")
            .await
            .unwrap());
    }
}
