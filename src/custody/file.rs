//! Datei-Backend für Hosts ohne Credential Store
//!
//! Der Secret Seed liegt im App-Datenverzeichnis:
//! - Windows: `%APPDATA%/seedkeeper/seedkeeper/data/keys/privateKey`
//! - macOS: `~/Library/Application Support/org.seedkeeper.seedkeeper/keys/privateKey`
//! - Linux: `~/.local/share/seedkeeper/keys/privateKey`
//!
//! Neu angelegte Verzeichnisse 0700, Datei 0600. Ein bereits vorhandenes
//! Verzeichnis behält seine Rechte. Geschrieben wird in eine temporäre Datei im
//! selben Verzeichnis, die dann über das Ziel umbenannt wird.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use zeroize::Zeroizing;

use super::store::{SecretStore, StoreError, SECRET_KEY};

/// Secret Seed als private Datei
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store im Standard-Datenverzeichnis der Anwendung
    pub fn in_app_data_dir() -> Result<Self, StoreError> {
        let proj_dirs = directories::ProjectDirs::from("org", "seedkeeper", "seedkeeper")
            .ok_or_else(|| {
                StoreError::Unavailable("Could not determine app data directory".to_string())
            })?;

        let mut path = proj_dirs.data_dir().to_path_buf();
        path.push("keys");
        path.push(SECRET_KEY);
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<&Path, StoreError> {
        let parent = self.path.parent().ok_or_else(|| {
            StoreError::Unavailable(format!("{:?} has no parent directory", self.path))
        })?;

        // Nur selbst angelegte Verzeichnisse bekommen 0700, vorhandene bleiben unverändert
        if !parent.is_dir() {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::DirBuilderExt;
                builder.mode(0o700);
            }
            builder.create(parent)?;
        }

        Ok(parent)
    }
}

impl SecretStore for FileStore {
    fn load(&self) -> Result<Option<Zeroizing<String>>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let bytes = Zeroizing::new(bytes);
                Ok(Some(Zeroizing::new(
                    String::from_utf8_lossy(&bytes).into_owned(),
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                tracing::error!("Failed to read secret from {:?}: {}", self.path, e);
                Err(e.into())
            }
        }
    }

    fn save(&self, secret: &str) -> Result<(), StoreError> {
        let parent = self.ensure_parent()?;

        // NamedTempFile wird unter Unix mit 0600 angelegt
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(secret.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        #[cfg(unix)]
        fs::File::open(parent)?.sync_all()?;

        tracing::debug!("Secret written to {:?}", self.path);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
