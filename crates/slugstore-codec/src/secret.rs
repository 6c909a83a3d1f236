//! Injected secret-provider capability for encrypted slugs.
//!
//! Callers hand the codec a [`SecretProvider`] instead of the codec reaching
//! into ambient process-wide state, so tests and embedders can substitute a
//! deterministic provider.

use crate::encryption::EncryptionKey;

/// Supplies the symmetric key used for encrypted slugs when no per-call
/// password is given. The same logical caller/session must supply the same
/// secret across encode and decode for round-trips to succeed.
pub trait SecretProvider: Send + Sync {
    /// Returns the current secret, or `None` if the provider holds none.
    fn secret(&self) -> Option<EncryptionKey>;
}

/// A provider holding one fixed key. Used in tests and by embedders that
/// manage key material themselves.
#[derive(Clone)]
pub struct FixedSecretProvider {
    key: EncryptionKey,
}

impl FixedSecretProvider {
    /// Creates a provider that always returns `key`.
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }
}

impl SecretProvider for FixedSecretProvider {
    fn secret(&self) -> Option<EncryptionKey> {
        Some(self.key.clone())
    }
}

/// A provider that never has a secret. Decoding an encrypted slug through
/// this provider fails with `MissingCredential`.
#[derive(Clone, Copy, Default)]
pub struct NoSecretProvider;

impl SecretProvider for NoSecretProvider {
    fn secret(&self) -> Option<EncryptionKey> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_provider_returns_its_key() {
        let provider = FixedSecretProvider::new(EncryptionKey([7u8; 32]));
        assert_eq!(provider.secret().unwrap().0, [7u8; 32]);
    }

    #[test]
    fn no_secret_provider_returns_none() {
        assert!(NoSecretProvider.secret().is_none());
    }
}
