//! Repository trait for stored credential digests.
//!
//! The engine itself never reads digests; verification goes through the
//! opaque [`crate::services::CredentialVerifier`] collaborator. This trait is
//! the storage seam that collaborator implementations (and account
//! provisioning) build on.

use async_trait::async_trait;

use crate::Error;

#[async_trait]
pub trait CredentialRepository: Send + Sync + 'static {
    /// Create a user row with its password digest. The digest is opaque here;
    /// hashing happens in the verifier collaborator.
    async fn create_user(&self, user_id: &str, password_hash: &str) -> Result<(), Error>;

    /// The stored digest for this user, or `None` if no such user.
    async fn password_hash(&self, user_id: &str) -> Result<Option<String>, Error>;
}
