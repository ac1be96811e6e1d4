mod credentials;
mod secret;

pub use credentials::{CredentialError, UserCredentials};
pub use secret::{Secret, SecretError, NONCE_SIZE, SECRET_SIZE};
