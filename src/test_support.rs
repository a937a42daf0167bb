use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::crypto::{EntropyError, EntropySource, SEED_LENGTH};
use crate::custody::{MemoryStore, SecretStore, StoreError};

/// Deterministische Entropie: jeder Aufruf liefert einen anderen Seed
#[derive(Default)]
pub(crate) struct CountingEntropy {
    calls: AtomicUsize,
}

impl CountingEntropy {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EntropySource for CountingEntropy {
    fn fill_seed(&self, seed: &mut [u8; SEED_LENGTH]) -> Result<(), EntropyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        seed.fill(0x5a);
        seed[..8].copy_from_slice(&call.to_le_bytes());
        Ok(())
    }
}

pub(crate) struct FailingEntropy;

impl EntropySource for FailingEntropy {
    fn fill_seed(&self, _seed: &mut [u8; SEED_LENGTH]) -> Result<(), EntropyError> {
        Err(EntropyError::Unavailable("entropy pool drained".to_string()))
    }
}

type SaveHook = Box<dyn Fn() + Send + Sync>;

/// MemoryStore mit schaltbaren Fehlern und optionalem Hook in `save`
#[derive(Default)]
pub(crate) struct FlakyStore {
    inner: MemoryStore,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
    hook: Mutex<Option<SaveHook>>,
}

impl FlakyStore {
    pub(crate) fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn on_save(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }
}

impl SecretStore for FlakyStore {
    fn load(&self) -> Result<Option<Zeroizing<String>>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("keychain locked".to_string()));
        }
        self.inner.load()
    }

    fn save(&self, secret: &str) -> Result<(), StoreError> {
        if let Some(hook) = self.hook.lock().as_ref() {
            hook();
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("device policy blocks writes".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(secret)
    }
}
