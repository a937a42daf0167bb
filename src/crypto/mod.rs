//! Crypto Module - Ed25519 / Stellar Key Management
//!
//! Dieses Modul verwaltet die kryptographische Identität des Benutzers:
//! - Sichere Entropie aus dem OS-CSPRNG
//! - Deterministische Ableitung des Ed25519 Schlüsselpaars aus dem Seed
//! - Stellar StrKey Kodierung (`S…` Secret Seed, `G…` Account ID)
//!

mod entropy;
mod keypair;
pub mod strkey;

pub use entropy::{EntropyError, EntropySource, OsEntropy, SEED_LENGTH};
pub use keypair::{KeyPair, KeyPairError};
pub use strkey::StrKeyError;
