//! Credential-derived profile keys
//!
//! A user's profile is encrypted under a key derived from their credentials
//! (user id, password, pin). Derivation is deterministic so any device with
//! the same credentials arrives at the same key, and slow (Argon2id) so that
//! a leaked profile block does not make the password cheap to brute-force.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

use super::secret::{Secret, SECRET_SIZE};

/// Errors raised while deriving a key from credentials
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// The credentials identifying one user of the network.
///
/// Fixed at saga construction and carried in the saga context; never stored
/// in the DHT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    user_id: String,
    password: String,
    pin: String,
}

impl UserCredentials {
    pub fn new(
        user_id: impl Into<String>,
        password: impl Into<String>,
        pin: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
            pin: pin.into(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Derive the profile encryption key from these credentials.
    ///
    /// Argon2id over `password || pin`, salted with a blake3 digest of the
    /// user id. Deterministic for the same credentials.
    pub fn derive_secret(&self) -> Result<Secret, CredentialError> {
        // Moderate parameters: the derivation runs once per saga construction
        let params = Params::new(19 * 1024, 2, 1, Some(SECRET_SIZE))
            .map_err(|e| CredentialError::Derivation(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut material = Vec::with_capacity(self.password.len() + self.pin.len());
        material.extend_from_slice(self.password.as_bytes());
        material.extend_from_slice(self.pin.as_bytes());

        let salt = blake3::derive_key("peerbox profile salt v1", self.user_id.as_bytes());

        let mut out = [0u8; SECRET_SIZE];
        argon2
            .hash_password_into(&material, &salt, &mut out)
            .map_err(|e| CredentialError::Derivation(e.to_string()))?;

        Ok(Secret::from(out))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let credentials = UserCredentials::new("alice", "hunter2", "0000");
        let a = credentials.derive_secret().unwrap();
        let b = credentials.derive_secret().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derivation_differs_per_user() {
        let alice = UserCredentials::new("alice", "hunter2", "0000");
        let bob = UserCredentials::new("bob", "hunter2", "0000");
        assert_ne!(
            alice.derive_secret().unwrap(),
            bob.derive_secret().unwrap()
        );
    }

    #[test]
    fn test_derivation_differs_per_pin() {
        let a = UserCredentials::new("alice", "hunter2", "0000");
        let b = UserCredentials::new("alice", "hunter2", "0001");
        assert_ne!(a.derive_secret().unwrap(), b.derive_secret().unwrap());
    }
}
