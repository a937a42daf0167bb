//! Network Module - Stellar Testnet Anbindung
//!
//! Dünne I/O-Schicht um die Account ID:
//! - Friendbot Funding-Request (Testnet)
//! - Block-Explorer URL
//!
//! Fehler bleiben lokal und verändern nie das Schlüsselpaar.

mod friendbot;

pub use friendbot::{explorer_url, friendbot_url, FundingClient, FundingError, FundingOutcome};
