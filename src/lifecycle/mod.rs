//! Lifecycle Module - Laden, Erzeugen und Ersetzen des Schlüsselpaars
//!
//! Der `KeypairController` ist der einzige Besitzer des Schlüsselpaars im
//! Speicher. Beim Start wird ein vorhandenes Secret geladen oder ein neues
//! erzeugt; ein bestehendes Schlüsselpaar wird nur nach Bestätigung ersetzt.

mod controller;

pub use controller::{
    Confirm, KeypairController, KeypairEvent, LifecycleError, LifecycleState, RegenerateOutcome,
    StartupOutcome, RECOVER_PROMPT, REGENERATE_PROMPT,
};
