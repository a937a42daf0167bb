//! Keypair Controller
//!
//! Zustände: `Uninitialized` → `Ready(KeyPair)`, oder `Corrupt` wenn das
//! gespeicherte Secret nicht dekodiert werden kann. Ein korruptes Secret
//! wird nie still durch ein neues ersetzt.
//!
//! Beim Ersetzen wird zuerst gespeichert und erst danach der Slot im
//! Speicher getauscht. Schlägt das Speichern fehl, bleiben Slot und Store
//! beim alten Schlüsselpaar.

use crate::crypto::{EntropyError, EntropySource, KeyPair, KeyPairError, OsEntropy, StrKeyError};
use crate::custody::{SecretStore, StoreError};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Bestätigungstext beim Ersetzen eines vorhandenen Schlüsselpaars
pub const REGENERATE_PROMPT: &str = "You already have a keypair. Do you want to generate a new one? \
     The current secret will be replaced and cannot be recovered.";

/// Bestätigungstext beim Ersetzen eines korrupten gespeicherten Secrets
pub const RECOVER_PROMPT: &str = "The stored secret is corrupt and cannot be loaded. \
     Do you want to generate a new keypair? The account behind the corrupt secret will be lost.";

/// Synchrone Ja/Nein-Entscheidung der UI
pub type Confirm = Box<dyn Fn(&str) -> bool + Send + Sync>;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Entropy unavailable: {0}")]
    EntropyUnavailable(#[source] EntropyError),

    #[error("Stored secret is corrupt: {0}")]
    MalformedSecret(#[source] StrKeyError),

    #[error("Secure storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    #[error("Another keypair operation is already in progress")]
    Busy,
}

impl From<KeyPairError> for LifecycleError {
    fn from(err: KeyPairError) -> Self {
        match err {
            KeyPairError::EntropyUnavailable(e) => LifecycleError::EntropyUnavailable(e),
            KeyPairError::MalformedSecret(e) => LifecycleError::MalformedSecret(e),
        }
    }
}

// ============================================================================
// STATE & EVENTS
// ============================================================================

/// Aktueller Zustand des Schlüsselpaar-Slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// Start noch nicht abgeschlossen
    Uninitialized,
    /// Schlüsselpaar geladen oder erzeugt
    Ready(KeyPair),
    /// Gespeichertes Secret ist nicht dekodierbar
    Corrupt,
}

/// Ergebnis von `trigger_regenerate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerateOutcome {
    /// Kein Schlüsselpaar vorhanden, nichts zu ersetzen
    NotInitialized,
    /// Benutzer hat abgelehnt
    Declined,
    /// Neues Schlüsselpaar gespeichert und aktiv
    Regenerated { public_key: String },
}

/// Ergebnis von `load_or_create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Gespeichertes Schlüsselpaar geladen (oder bereits aktiv)
    Loaded(KeyPair),
    /// Erstes Schlüsselpaar erzeugt und gespeichert
    Created(KeyPair),
}

impl StartupOutcome {
    pub fn keypair(&self) -> &KeyPair {
        match self {
            StartupOutcome::Loaded(keypair) | StartupOutcome::Created(keypair) => keypair,
        }
    }
}

/// Events für UI-Schichten. Enthalten nie den Secret Seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeypairEvent {
    Ready { public_key: String },
    Regenerated { public_key: String },
    Corrupt,
    Error { message: String },
}

// ============================================================================
// BUSY GUARD
// ============================================================================

/// Hält das Busy-Flag für die Dauer einer Operation
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, LifecycleError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LifecycleError::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Besitzer des Schlüsselpaars im Speicher
pub struct KeypairController {
    state: RwLock<LifecycleState>,
    store: Arc<dyn SecretStore>,
    entropy: Arc<dyn EntropySource>,
    confirm: Confirm,
    busy: AtomicBool,
    event_tx: broadcast::Sender<KeypairEvent>,
}

impl KeypairController {
    /// Erstellt einen Controller mit OS-Entropie
    pub fn new<F>(store: Arc<dyn SecretStore>, confirm: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let (event_tx, _) = broadcast::channel(16);

        Self {
            state: RwLock::new(LifecycleState::Uninitialized),
            store,
            entropy: Arc::new(OsEntropy),
            confirm: Box::new(confirm),
            busy: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Ersetzt die Entropie-Quelle
    pub fn with_entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<KeypairEvent> {
        self.event_tx.subscribe()
    }

    /// Gibt den aktuellen Zustand zurück
    pub fn state(&self) -> LifecycleState {
        self.state.read().clone()
    }

    /// Gibt das aktive Schlüsselpaar zurück (falls vorhanden)
    pub fn keypair(&self) -> Option<KeyPair> {
        match &*self.state.read() {
            LifecycleState::Ready(keypair) => Some(keypair.clone()),
            _ => None,
        }
    }

    /// Account ID des aktiven Schlüsselpaars
    pub fn public_key(&self) -> Option<String> {
        self.keypair().map(|keypair| keypair.public_key())
    }

    /// `true` solange `initialize` oder `trigger_regenerate` läuft
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Lädt das gespeicherte Schlüsselpaar oder erzeugt beim ersten Start ein neues
    ///
    /// Ist das gespeicherte Secret korrupt, wechselt der Zustand auf `Corrupt`
    /// und `MalformedSecret` wird zurückgegeben. Bereits `Ready`: keine Wirkung.
    pub fn initialize(&self) -> Result<LifecycleState, LifecycleError> {
        let outcome = self.load_or_create()?;
        Ok(LifecycleState::Ready(outcome.keypair().clone()))
    }

    /// Wie `initialize`, meldet aber ob das Schlüsselpaar gerade erst erzeugt wurde
    pub fn load_or_create(&self) -> Result<StartupOutcome, LifecycleError> {
        let _guard = BusyGuard::acquire(&self.busy)?;

        if let LifecycleState::Ready(keypair) = &*self.state.read() {
            return Ok(StartupOutcome::Loaded(keypair.clone()));
        }

        let stored = self.store.load().inspect_err(|e| {
            tracing::error!("Failed to load stored secret: {}", e);
            self.emit(KeypairEvent::Error {
                message: e.to_string(),
            });
        })?;

        let outcome = match stored {
            Some(secret) => match KeyPair::from_secret(&secret) {
                Ok(keypair) => {
                    tracing::info!("Loaded existing keypair: {:?}", keypair);
                    StartupOutcome::Loaded(keypair)
                }
                Err(e) => {
                    tracing::error!("Stored secret is corrupt, refusing to replace it: {}", e);
                    *self.state.write() = LifecycleState::Corrupt;
                    self.emit(KeypairEvent::Corrupt);
                    return Err(e.into());
                }
            },
            None => {
                tracing::info!("No stored secret found, generating first keypair");
                let keypair = self.generate_and_persist()?;
                tracing::info!("Created new keypair: {:?}", keypair);
                StartupOutcome::Created(keypair)
            }
        };

        let keypair = outcome.keypair().clone();
        let public_key = keypair.public_key();
        *self.state.write() = LifecycleState::Ready(keypair);
        self.emit(KeypairEvent::Ready { public_key });

        Ok(outcome)
    }

    /// Ersetzt das Schlüsselpaar nach Bestätigung durch den Benutzer
    ///
    /// Ohne vorhandenes Schlüsselpaar (`Uninitialized`) passiert nichts; die
    /// erste Erzeugung läuft über `initialize`.
    pub fn trigger_regenerate(&self) -> Result<RegenerateOutcome, LifecycleError> {
        let _guard = BusyGuard::acquire(&self.busy)?;

        let prompt = match &*self.state.read() {
            LifecycleState::Uninitialized => {
                tracing::debug!("Regenerate requested before initialization, ignoring");
                return Ok(RegenerateOutcome::NotInitialized);
            }
            LifecycleState::Ready(_) => REGENERATE_PROMPT,
            LifecycleState::Corrupt => RECOVER_PROMPT,
        };

        if !(self.confirm)(prompt) {
            tracing::info!("Keypair regeneration declined");
            return Ok(RegenerateOutcome::Declined);
        }

        let keypair = self.generate_and_persist()?;
        let public_key = keypair.public_key();
        *self.state.write() = LifecycleState::Ready(keypair);

        tracing::info!("Keypair regenerated, new account {}", public_key);
        self.emit(KeypairEvent::Regenerated {
            public_key: public_key.clone(),
        });

        Ok(RegenerateOutcome::Regenerated { public_key })
    }

    /// Erzeugt ein Schlüsselpaar und speichert es, bevor es aktiv wird
    fn generate_and_persist(&self) -> Result<KeyPair, LifecycleError> {
        let keypair = KeyPair::generate_with(self.entropy.as_ref()).inspect_err(|e| {
            tracing::error!("Keypair generation failed: {}", e);
            self.emit(KeypairEvent::Error {
                message: e.to_string(),
            });
        })?;

        if let Err(e) = self.store.save(&keypair.secret()) {
            tracing::error!("Failed to persist new secret: {}", e);
            self.emit(KeypairEvent::Error {
                message: e.to_string(),
            });
            return Err(e.into());
        }

        Ok(keypair)
    }

    fn emit(&self, event: KeypairEvent) {
        // Kein Subscriber ist kein Fehler
        let _ = self.event_tx.send(event);
    }
}

impl std::fmt::Debug for KeypairController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeypairController")
            .field("state", &self.state())
            .field("is_busy", &self.is_busy())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::MemoryStore;
    use crate::test_support::{CountingEntropy, FailingEntropy, FlakyStore};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    fn always(answer: bool) -> impl Fn(&str) -> bool + Send + Sync + 'static {
        move |_: &str| answer
    }

    fn ready_keypair(state: LifecycleState) -> KeyPair {
        match state {
            LifecycleState::Ready(keypair) => keypair,
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn test_fresh_device_generates_and_persists() {
        let store = Arc::new(MemoryStore::new());
        let controller = KeypairController::new(store.clone(), always(false));
        assert_eq!(controller.state(), LifecycleState::Uninitialized);

        let keypair = ready_keypair(controller.initialize().unwrap());

        let stored = store.load().unwrap().unwrap();
        assert_eq!(stored, keypair.secret());
        assert_eq!(controller.keypair(), Some(keypair));
    }

    #[test]
    fn test_existing_secret_is_restored() {
        let original = KeyPair::generate().unwrap();
        let store = Arc::new(MemoryStore::with_secret(&original.secret()));
        let controller = KeypairController::new(store.clone(), always(false));

        let keypair = ready_keypair(controller.initialize().unwrap());

        assert_eq!(keypair.secret(), original.secret());
        assert_eq!(controller.public_key(), Some(original.public_key()));
        assert_eq!(store.load().unwrap(), Some(original.secret()));
    }

    #[test]
    fn test_initialize_twice_keeps_keypair() {
        let entropy = Arc::new(CountingEntropy::default());
        let controller = KeypairController::new(Arc::new(MemoryStore::new()), always(false))
            .with_entropy(entropy.clone());

        let first = ready_keypair(controller.initialize().unwrap());
        let second = ready_keypair(controller.initialize().unwrap());

        assert_eq!(first, second);
        assert_eq!(entropy.calls(), 1);
    }

    #[test]
    fn test_load_or_create_reports_first_creation() {
        let store = Arc::new(MemoryStore::new());
        let controller = KeypairController::new(store.clone(), always(false));

        let created = match controller.load_or_create().unwrap() {
            StartupOutcome::Created(keypair) => keypair,
            other => panic!("expected Created, got {other:?}"),
        };
        assert_eq!(
            controller.load_or_create().unwrap(),
            StartupOutcome::Loaded(created.clone())
        );

        let restarted = KeypairController::new(store, always(false));
        assert_eq!(
            restarted.load_or_create().unwrap(),
            StartupOutcome::Loaded(created)
        );
    }

    #[test]
    fn test_corrupt_secret_is_surfaced_not_replaced() {
        let corrupt = "SCOWDMM5576VUYF2QRFPJEXMFTCEISOFNF5TE2IZOA52YAY4VZ7WBQNA";
        let store = Arc::new(MemoryStore::with_secret(corrupt));
        let controller = KeypairController::new(store.clone(), always(true));
        let mut events = controller.subscribe();

        let result = controller.initialize();

        assert!(matches!(result, Err(LifecycleError::MalformedSecret(_))));
        assert_eq!(controller.state(), LifecycleState::Corrupt);
        assert_eq!(store.load().unwrap().unwrap().as_str(), corrupt);
        assert_eq!(events.try_recv().unwrap(), KeypairEvent::Corrupt);
    }

    #[test]
    fn test_corrupt_secret_replaced_only_after_confirmation() {
        let store = Arc::new(MemoryStore::with_secret("garbage"));
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&prompts);
        let controller = KeypairController::new(store.clone(), move |prompt: &str| {
            recorded.lock().push(prompt.to_string());
            true
        });
        assert!(controller.initialize().is_err());

        let outcome = controller.trigger_regenerate().unwrap();

        assert_eq!(prompts.lock().as_slice(), [RECOVER_PROMPT.to_string()]);
        let public_key = match outcome {
            RegenerateOutcome::Regenerated { public_key } => public_key,
            other => panic!("unexpected outcome {other:?}"),
        };
        let keypair = controller.keypair().unwrap();
        assert_eq!(keypair.public_key(), public_key);
        assert_eq!(store.load().unwrap(), Some(keypair.secret()));
    }

    #[test]
    fn test_regenerate_before_initialize_is_noop() {
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&asked);
        let store = Arc::new(MemoryStore::new());
        let controller = KeypairController::new(store.clone(), move |_: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let outcome = controller.trigger_regenerate().unwrap();

        assert_eq!(outcome, RegenerateOutcome::NotInitialized);
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert!(store.load().unwrap().is_none());
        assert_eq!(controller.state(), LifecycleState::Uninitialized);
    }

    #[test]
    fn test_regenerate_declined_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let controller = KeypairController::new(store.clone(), always(false));
        let before = ready_keypair(controller.initialize().unwrap());

        let outcome = controller.trigger_regenerate().unwrap();

        assert_eq!(outcome, RegenerateOutcome::Declined);
        assert_eq!(controller.keypair(), Some(before.clone()));
        assert_eq!(store.load().unwrap(), Some(before.secret()));
    }

    #[test]
    fn test_regenerate_confirmed_replaces_secret() {
        let store = Arc::new(MemoryStore::new());
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&prompts);
        let controller = KeypairController::new(store.clone(), move |prompt: &str| {
            recorded.lock().push(prompt.to_string());
            true
        });
        let old = ready_keypair(controller.initialize().unwrap());
        let mut events = controller.subscribe();

        let outcome = controller.trigger_regenerate().unwrap();

        let new = controller.keypair().unwrap();
        assert_ne!(new, old);
        assert_eq!(
            outcome,
            RegenerateOutcome::Regenerated {
                public_key: new.public_key()
            }
        );
        assert_eq!(prompts.lock().as_slice(), [REGENERATE_PROMPT.to_string()]);

        // Altes Secret ist über den Store nicht mehr erreichbar
        let stored = store.load().unwrap().unwrap();
        assert_eq!(stored, new.secret());
        assert_ne!(stored, old.secret());

        assert_eq!(
            events.try_recv().unwrap(),
            KeypairEvent::Regenerated {
                public_key: new.public_key()
            }
        );
    }

    #[test]
    fn test_failed_save_keeps_old_keypair() {
        let store = Arc::new(FlakyStore::default());
        let controller = KeypairController::new(store.clone(), always(true));
        let old = ready_keypair(controller.initialize().unwrap());

        store.fail_saves(true);
        let result = controller.trigger_regenerate();

        assert!(matches!(result, Err(LifecycleError::StorageUnavailable(_))));
        assert_eq!(controller.keypair(), Some(old.clone()));
        assert_eq!(store.load().unwrap(), Some(old.secret()));
        assert!(!controller.is_busy());
    }

    #[test]
    fn test_failed_first_save_stays_uninitialized() {
        let store = Arc::new(FlakyStore::default());
        store.fail_saves(true);
        let controller = KeypairController::new(store.clone(), always(true));

        let result = controller.initialize();

        assert!(matches!(result, Err(LifecycleError::StorageUnavailable(_))));
        assert_eq!(controller.state(), LifecycleState::Uninitialized);

        // Speicher wieder verfügbar: erneuter Start gelingt
        store.fail_saves(false);
        let keypair = ready_keypair(controller.initialize().unwrap());
        assert_eq!(store.load().unwrap(), Some(keypair.secret()));
    }

    #[test]
    fn test_failed_load_is_not_treated_as_absent() {
        let store = Arc::new(FlakyStore::default());
        store.fail_loads(true);
        let entropy = Arc::new(CountingEntropy::default());
        let controller =
            KeypairController::new(store.clone(), always(true)).with_entropy(entropy.clone());

        let result = controller.initialize();

        assert!(matches!(result, Err(LifecycleError::StorageUnavailable(_))));
        assert_eq!(entropy.calls(), 0);
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn test_entropy_failure_is_propagated() {
        let store = Arc::new(MemoryStore::new());
        let controller = KeypairController::new(store.clone(), always(true))
            .with_entropy(Arc::new(FailingEntropy));
        let mut events = controller.subscribe();

        let result = controller.initialize();

        assert!(matches!(result, Err(LifecycleError::EntropyUnavailable(_))));
        assert!(store.load().unwrap().is_none());
        assert_eq!(controller.state(), LifecycleState::Uninitialized);
        assert!(matches!(
            events.try_recv().unwrap(),
            KeypairEvent::Error { .. }
        ));
    }

    #[test]
    fn test_entropy_failure_on_regenerate_emits_error() {
        let controller = KeypairController::new(Arc::new(MemoryStore::new()), always(true));
        let old = ready_keypair(controller.initialize().unwrap());
        let controller = controller.with_entropy(Arc::new(FailingEntropy));
        let mut events = controller.subscribe();

        let result = controller.trigger_regenerate();

        assert!(matches!(result, Err(LifecycleError::EntropyUnavailable(_))));
        assert_eq!(controller.keypair(), Some(old));
        assert!(matches!(
            events.try_recv().unwrap(),
            KeypairEvent::Error { .. }
        ));
    }

    #[test]
    fn test_overlapping_regenerate_is_rejected() {
        let store = Arc::new(FlakyStore::default());
        let controller = Arc::new(KeypairController::new(store.clone(), always(true)));
        controller.initialize().unwrap();

        // Während `save` läuft, versucht ein zweiter Aufruf zu regenerieren
        let handle: Arc<Mutex<Weak<KeypairController>>> = Arc::new(Mutex::new(Weak::new()));
        let nested = Arc::new(Mutex::new(None));
        {
            let handle = Arc::clone(&handle);
            let nested = Arc::clone(&nested);
            store.on_save(move || {
                if let Some(controller) = handle.lock().upgrade() {
                    let busy = controller.is_busy();
                    let result = controller.trigger_regenerate();
                    *nested.lock() = Some((busy, matches!(result, Err(LifecycleError::Busy))));
                }
            });
        }
        *handle.lock() = Arc::downgrade(&controller);

        controller.trigger_regenerate().unwrap();

        assert_eq!(*nested.lock(), Some((true, true)));
        assert!(!controller.is_busy());
    }

    #[test]
    fn test_events_serialize_without_secret() {
        let controller = KeypairController::new(Arc::new(MemoryStore::new()), always(false));
        let mut events = controller.subscribe();
        let keypair = ready_keypair(controller.initialize().unwrap());

        let event = events.try_recv().unwrap();
        let json = serde_json::to_string(&event).unwrap();

        assert_eq!(
            json,
            format!(r#"{{"type":"ready","public_key":"{}"}}"#, keypair.public_key())
        );
        assert!(!json.contains(keypair.secret().as_str()));
    }
}
