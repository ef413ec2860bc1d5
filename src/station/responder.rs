//! Conversational responder adapter.
//!
//! The actual language model lives behind [`Responder`]; the station only
//! owns enablement, rate limiting, and the bookkeeping around a reply.
//! `load` and `generate` are allowed to block for seconds, so callers must
//! run them on a blocking-capable worker (`tokio::task::spawn_blocking`),
//! never on the inbound path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Contract for a pluggable text-generation backend.
pub trait Responder: Send + Sync + 'static {
    /// Whether a backend is configured at all.
    fn is_available(&self) -> bool;

    /// Whether the model is resident and ready to generate.
    fn is_loaded(&self) -> bool;

    /// Bring the model into memory. Blocking, may take seconds, may fail.
    fn load(&self) -> bool;

    /// Release the model.
    fn unload(&self);

    /// Generate a reply for `prompt`. Blocking; None on failure.
    fn generate(&self, prompt: &str) -> Option<String>;
}

/// Backend used when no model is configured. Never available, never loads.
#[derive(Debug, Default)]
pub struct NullResponder;

impl Responder for NullResponder {
    fn is_available(&self) -> bool {
        false
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn load(&self) -> bool {
        false
    }

    fn unload(&self) {}

    fn generate(&self, _prompt: &str) -> Option<String> {
        None
    }
}

/// Shared handle pairing a backend with its enablement flag.
///
/// Enablement is what the RESPONDERON/RESPONDEROFF keywords toggle; it is
/// separate from loadedness so that toggling off keeps the model resident
/// until explicitly unloaded.
#[derive(Clone)]
pub struct ResponderHandle {
    backend: Arc<dyn Responder>,
    enabled: Arc<AtomicBool>,
    loading: Arc<AtomicBool>,
}

impl ResponderHandle {
    pub fn new(backend: Arc<dyn Responder>) -> Self {
        Self {
            backend,
            enabled: Arc::new(AtomicBool::new(false)),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the single load slot. Returns false when a load is already in
    /// flight, so concurrent requests cannot start duplicate loads.
    pub fn begin_load(&self) -> bool {
        self.loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the load slot once the load attempt resolved either way.
    pub fn finish_load(&self) {
        self.loading.store(false, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> Arc<dyn Responder> {
        Arc::clone(&self.backend)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Free text is routed to generation only when the backend is both
    /// enabled and loaded.
    pub fn accepts_free_text(&self) -> bool {
        self.is_enabled() && self.backend.is_loaded()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Test backend with a configurable blocking load delay.
    pub struct SlowResponder {
        load_delay: Duration,
        loaded: AtomicBool,
        pub load_calls: AtomicUsize,
    }

    impl SlowResponder {
        pub fn new(load_delay: Duration) -> Self {
            Self {
                load_delay,
                loaded: AtomicBool::new(false),
                load_calls: AtomicUsize::new(0),
            }
        }
    }

    impl Responder for SlowResponder {
        fn is_available(&self) -> bool {
            true
        }

        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }

        fn load(&self) -> bool {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.load_delay);
            self.loaded.store(true, Ordering::SeqCst);
            true
        }

        fn unload(&self) {
            self.loaded.store(false, Ordering::SeqCst);
        }

        fn generate(&self, prompt: &str) -> Option<String> {
            Some(format!("echo: {prompt}"))
        }
    }
}
