//! Custody Module - Geschützte Ablage des Secret Seeds
//!
//! Genau ein Secret unter einem festen Schlüssel. `save` ersetzt immer
//! vollständig, es gibt keine Versionierung.
//!
//! Backends:
//! - OS Credential Store (Keychain, Credential Manager, Secret Service)
//! - Private Datei im App-Datenverzeichnis (0600, atomarer Rename)
//! - In-Memory (Tests, eingebettete Hosts)

mod file;
mod os_keyring;
mod store;

pub use self::file::FileStore;
pub use self::os_keyring::KeyringStore;
pub use self::store::{MemoryStore, SecretStore, StoreError, SECRET_KEY};
