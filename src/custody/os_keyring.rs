//! OS Credential Store Backend
//!
//! - macOS / iOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KWallet)
//!
//! Das Betriebssystem sichert den Eintrag pro Benutzer und Anwendung ab und
//! ersetzt ihn beim Schreiben atomar.

use keyring::Entry;
use zeroize::Zeroizing;

use super::store::{SecretStore, StoreError, SECRET_KEY};

/// Secret Seed im Credential Store des Betriebssystems
pub struct KeyringStore {
    service: String,
    entry: Entry,
}

impl KeyringStore {
    /// Öffnet den Eintrag `(service, "privateKey")`
    pub fn new(service: &str) -> Result<Self, StoreError> {
        let entry = Entry::new(service, SECRET_KEY)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            service: service.to_string(),
            entry,
        })
    }
}

impl SecretStore for KeyringStore {
    fn load(&self) -> Result<Option<Zeroizing<String>>, StoreError> {
        match self.entry.get_password() {
            Ok(secret) => Ok(Some(Zeroizing::new(secret))),
            Err(keyring::Error::NoEntry) => Ok(None),
            // Kein UTF-8: an den Decoder weiterreichen, der es als korrupt meldet
            Err(keyring::Error::BadEncoding(bytes)) => {
                let bytes = Zeroizing::new(bytes);
                Ok(Some(Zeroizing::new(
                    String::from_utf8_lossy(&bytes).into_owned(),
                )))
            }
            Err(e) => {
                tracing::error!("Keyring read failed for service '{}': {}", self.service, e);
                Err(StoreError::Unavailable(e.to_string()))
            }
        }
    }

    fn save(&self, secret: &str) -> Result<(), StoreError> {
        self.entry.set_password(secret).map_err(|e| {
            tracing::error!("Keyring write failed for service '{}': {}", self.service, e);
            StoreError::Unavailable(e.to_string())
        })?;

        tracing::debug!("Secret stored in OS keyring (service '{}')", self.service);
        Ok(())
    }
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore")
            .field("service", &self.service)
            .field("key", &SECRET_KEY)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
