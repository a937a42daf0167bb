//! Ed25519 Key Pair Management
//!
//! Erzeugt Stellar Schlüsselpaare aus frischer Entropie oder stellt sie aus
//! einem gespeicherten Secret Seed wieder her. Der Public Key wird immer aus
//! dem Seed abgeleitet und nie separat gesetzt.
//!
//! ## Verwendung
//! ```rust
//! use seedkeeper_lib::crypto::KeyPair;
//!
//! let keypair = KeyPair::generate()?;
//! let restored = KeyPair::from_secret(&keypair.secret())?;
//! assert_eq!(keypair.public_key(), restored.public_key());
//! # Ok::<(), seedkeeper_lib::crypto::KeyPairError>(())
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use thiserror::Error;
use zeroize::Zeroizing;

use super::entropy::{EntropyError, EntropySource, OsEntropy, SEED_LENGTH};
use super::strkey::{self, StrKeyError, Version};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum KeyPairError {
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(#[from] EntropyError),

    #[error("Malformed secret seed: {0}")]
    MalformedSecret(#[from] StrKeyError),
}

// ============================================================================
// KEYPAIR STRUCT
// ============================================================================

/// Ed25519 Schlüsselpaar einer Stellar Identität
///
/// `SigningKey` wird beim Drop genullt.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generiert ein neues Schlüsselpaar aus dem OS-CSPRNG
    pub fn generate() -> Result<Self, KeyPairError> {
        Self::generate_with(&OsEntropy)
    }

    /// Generiert ein neues Schlüsselpaar aus der übergebenen Entropie-Quelle
    ///
    /// Pro Aufruf werden 32 frische Bytes angefordert.
    pub fn generate_with(entropy: &dyn EntropySource) -> Result<Self, KeyPairError> {
        let mut seed = Zeroizing::new([0u8; SEED_LENGTH]);
        entropy.fill_seed(&mut seed)?;
        Ok(Self::from_seed(&seed))
    }

    /// Leitet das Schlüsselpaar deterministisch aus einem 32-Byte Seed ab
    pub fn from_seed(seed: &[u8; SEED_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Stellt ein Schlüsselpaar aus einem Secret Seed (`S…`) wieder her
    pub fn from_secret(secret: &str) -> Result<Self, KeyPairError> {
        let seed = strkey::decode(Version::SecretSeed, secret)?;
        Ok(Self::from_seed(&seed))
    }

    /// Secret Seed als StrKey (`S…`)
    pub fn secret(&self) -> Zeroizing<String> {
        let seed = Zeroizing::new(self.signing_key.to_bytes());
        strkey::encode(Version::SecretSeed, &seed)
    }

    /// Account ID als StrKey (`G…`)
    pub fn public_key(&self) -> String {
        strkey::encode(Version::AccountId, &self.public_key_bytes()).to_string()
    }

    /// Gibt den Public Key als raw bytes (32 Bytes) zurück
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key().to_bytes()
    }

    /// Gibt den VerifyingKey (Public Key) zurück
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Signiert Daten mit dem Private Key
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.verifying_key() == other.verifying_key()
    }
}

impl Eq for KeyPair {}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
