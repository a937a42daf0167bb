//! Stellar StrKey Kodierung
//!
//! Format: `base32(version || payload || crc16_xmodem(version || payload))`,
//! die Prüfsumme little-endian. Bei 32 Byte Payload ergibt das genau 56
//! Zeichen aus dem RFC 4648 Alphabet ohne Padding.
//!
//! Dekodierung ist strikt: falsche Länge, Kleinbuchstaben, fremde Zeichen,
//! falsches Versions-Byte und Prüfsummenfehler werden abgelehnt.

use crc::{Crc, CRC_16_XMODEM};
use data_encoding::BASE32_NOPAD;
use thiserror::Error;
use zeroize::Zeroizing;

use super::SEED_LENGTH;

/// Länge eines kodierten 32-Byte StrKeys
pub const ENCODED_LENGTH: usize = 56;

const RAW_LENGTH: usize = 1 + SEED_LENGTH + 2;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Fehler beim Dekodieren. Enthält nie den Eingabe-String selbst.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrKeyError {
    #[error("Invalid strkey length: expected 56 characters, got {0}")]
    InvalidLength(usize),

    #[error("Invalid strkey encoding")]
    InvalidEncoding,

    #[error("Invalid strkey version byte: expected {expected:#04x}, got {found:#04x}")]
    InvalidVersion { expected: u8, found: u8 },

    #[error("Strkey checksum mismatch")]
    ChecksumMismatch,
}

// ============================================================================
// VERSION BYTES
// ============================================================================

/// Schlüsseltyp, bestimmt das Präfix des kodierten Strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Ed25519 Secret Seed, Präfix `S`
    SecretSeed,
    /// Ed25519 Public Key (Account ID), Präfix `G`
    AccountId,
}

impl Version {
    pub const fn byte(self) -> u8 {
        match self {
            Version::SecretSeed => 18 << 3,
            Version::AccountId => 6 << 3,
        }
    }
}

// ============================================================================
// ENCODE / DECODE
// ============================================================================

/// Kodiert 32 Bytes als StrKey
///
/// Der Rückgabewert ist `Zeroizing`, da er für `SecretSeed` Schlüsselmaterial enthält.
pub fn encode(version: Version, payload: &[u8; SEED_LENGTH]) -> Zeroizing<String> {
    let mut raw = Zeroizing::new(Vec::with_capacity(RAW_LENGTH));
    raw.push(version.byte());
    raw.extend_from_slice(payload);
    let checksum = CRC16.checksum(&raw);
    raw.extend_from_slice(&checksum.to_le_bytes());

    Zeroizing::new(BASE32_NOPAD.encode(&raw))
}

/// Dekodiert einen StrKey und prüft Länge, Alphabet, Version und Prüfsumme
pub fn decode(
    version: Version,
    encoded: &str,
) -> Result<Zeroizing<[u8; SEED_LENGTH]>, StrKeyError> {
    if encoded.len() != ENCODED_LENGTH {
        return Err(StrKeyError::InvalidLength(encoded.len()));
    }

    let raw = Zeroizing::new(
        BASE32_NOPAD
            .decode(encoded.as_bytes())
            .map_err(|_| StrKeyError::InvalidEncoding)?,
    );
    if raw.len() != RAW_LENGTH {
        return Err(StrKeyError::InvalidEncoding);
    }

    let (body, checksum) = raw.split_at(RAW_LENGTH - 2);
    if body[0] != version.byte() {
        return Err(StrKeyError::InvalidVersion {
            expected: version.byte(),
            found: body[0],
        });
    }

    let expected = CRC16.checksum(body).to_le_bytes();
    if checksum != expected {
        return Err(StrKeyError::ChecksumMismatch);
    }

    let mut payload = Zeroizing::new([0u8; SEED_LENGTH]);
    payload.copy_from_slice(&body[1..]);
    Ok(payload)
}

/// Prüft, ob `encoded` eine gültige Stellar Account ID (`G…`) ist
pub fn is_valid_account_id(encoded: &str) -> bool {
    decode(Version::AccountId, encoded).is_ok()
}

// ============================================================================
// TESTS
// ============================================================================
