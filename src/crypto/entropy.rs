//! Entropie-Quelle für Schlüsselmaterial
//!
//! Der Seed eines Schlüsselpaars kommt ausschließlich aus dem OS-CSPRNG.
//! Schlägt die Quelle fehl, wird der Fehler propagiert: es gibt keinen
//! Fallback auf einen schwächeren Generator.

use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Länge eines Ed25519 Seeds in Bytes
pub const SEED_LENGTH: usize = 32;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum EntropyError {
    #[error("Secure random source unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// ENTROPY SOURCE
// ============================================================================

/// Liefert 32 kryptographisch sichere Zufallsbytes pro Aufruf
pub trait EntropySource: Send + Sync {
    fn fill_seed(&self, seed: &mut [u8; SEED_LENGTH]) -> Result<(), EntropyError>;
}

/// Betriebssystem-CSPRNG (`getrandom` unter Linux, `BCryptGenRandom` unter Windows, ...)
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_seed(&self, seed: &mut [u8; SEED_LENGTH]) -> Result<(), EntropyError> {
        OsRng
            .try_fill_bytes(seed)
            .map_err(|e| EntropyError::Unavailable(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================
