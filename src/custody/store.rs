//! SecretStore Trait und In-Memory Backend

use parking_lot::RwLock;
use thiserror::Error;
use zeroize::Zeroizing;

/// Logischer Schlüssel, unter dem der Secret Seed abgelegt wird
pub const SECRET_KEY: &str = "privateKey";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Speicher nicht les- oder beschreibbar
///
/// Darf nie als "kein Secret vorhanden" interpretiert werden.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),

    #[error("Secure storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// SECRET STORE
// ============================================================================

/// Ablage für genau einen Secret Seed
pub trait SecretStore: Send + Sync {
    /// Liefert den gespeicherten Secret Seed, `None` wenn nie einer gespeichert wurde
    fn load(&self) -> Result<Option<Zeroizing<String>>, StoreError>;

    /// Ersetzt den gespeicherten Secret Seed vollständig und atomar
    fn save(&self, secret: &str) -> Result<(), StoreError>;
}

/// Prozesslokaler Store ohne Persistenz
#[derive(Default)]
pub struct MemoryStore {
    secret: RwLock<Option<Zeroizing<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store mit bereits vorhandenem Secret
    pub fn with_secret(secret: &str) -> Self {
        Self {
            secret: RwLock::new(Some(Zeroizing::new(secret.to_string()))),
        }
    }
}

impl SecretStore for MemoryStore {
    fn load(&self) -> Result<Option<Zeroizing<String>>, StoreError> {
        Ok(self.secret.read().clone())
    }

    fn save(&self, secret: &str) -> Result<(), StoreError> {
        *self.secret.write() = Some(Zeroizing::new(secret.to_string()));
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("has_secret", &self.secret.read().is_some())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
