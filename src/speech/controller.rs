//! Speech controller
//!
//! Owns the synthesis state for one front-end component and mediates
//! every call to the injected engine. State changes are pushed to
//! subscribers so a UI can re-render from a fresh snapshot.

use crate::speech::engine::{SynthesisEngine, Utterance, UtteranceRequest};
use crate::state::SynthesisState;
use crate::Result;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Callback invoked after each utterance completes naturally
pub type OnEnd = Arc<dyn Fn() + Send + Sync>;

type Listener<V> = Arc<dyn Fn(&SynthesisState<V>) + Send + Sync>;

/// Handle returned by [`SpeechController::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// State shared between the controller and engine callbacks
///
/// Callbacks only hold a `Weak` to this, so once the controller is
/// dropped late completions and voice notifications do nothing.
struct Shared<V> {
    state: Mutex<Tracked<V>>,
    listeners: Mutex<Vec<(SubscriptionId, Listener<V>)>>,
    next_listener: AtomicU64,
    dispatch: Mutex<Dispatch>,
    on_end: OnEnd,
}

/// State plus a counter bumped on every change
struct Tracked<V> {
    state: SynthesisState<V>,
    version: u64,
}

/// Delivery bookkeeping; at most one thread delivers at a time
#[derive(Default)]
struct Dispatch {
    running: bool,
    delivered: u64,
}

impl<V: Clone> Shared<V> {
    fn new(supported: bool, on_end: OnEnd) -> Self {
        Self {
            state: Mutex::new(Tracked {
                state: SynthesisState::new(supported),
                version: 0,
            }),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            dispatch: Mutex::new(Dispatch::default()),
            on_end,
        }
    }

    fn tracked(&self) -> MutexGuard<'_, Tracked<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> SynthesisState<V> {
        self.tracked().state.clone()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener<V>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch_state(&self) -> MutexGuard<'_, Dispatch> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` and notify subscribers if it reports a change
    fn update(&self, change: impl FnOnce(&mut SynthesisState<V>) -> bool) {
        {
            let mut tracked = self.tracked();
            if !change(&mut tracked.state) {
                return;
            }
            tracked.version += 1;
        }
        self.deliver();
    }

    /// Push the current state to subscribers until they have seen the
    /// latest version
    ///
    /// If another thread is already delivering, it picks up this change
    /// on its next pass, so the last snapshot a subscriber receives is
    /// always the current state. Listeners run with no lock held and may
    /// call back into the controller.
    fn deliver(&self) {
        {
            let mut dispatch = self.dispatch_state();
            if dispatch.running {
                return;
            }
            dispatch.running = true;
        }

        loop {
            // Lock order: dispatch, then state
            let snapshot = {
                let mut dispatch = self.dispatch_state();
                let tracked = self.tracked();
                if tracked.version == dispatch.delivered {
                    dispatch.running = false;
                    return;
                }
                dispatch.delivered = tracked.version;
                tracked.state.clone()
            };

            let listeners: Vec<Listener<V>> = self
                .listeners()
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();

            for listener in listeners {
                listener(&snapshot);
            }
        }
    }

    fn set_speaking(&self, speaking: bool) {
        self.update(|state| {
            if state.speaking == speaking {
                return false;
            }
            state.speaking = speaking;
            true
        });
    }

    fn set_voices(&self, voices: Vec<V>) {
        debug!("Storing {} voices", voices.len());
        self.update(|state| {
            state.voices = voices;
            true
        });
    }

    /// Natural completion: state first, then the caller's callback
    fn finish(&self) {
        debug!("Utterance finished");
        self.set_speaking(false);
        (self.on_end)();
    }
}

/// Reactive front end over a [`SynthesisEngine`]
///
/// Built with `None` when the host has no synthesis support; in that
/// case `supported()` is false and every operation is a no-op.
///
/// Overlapping `speak` calls are not sequenced. If an earlier utterance
/// still reports completion after a newer one started, `speaking` drops
/// to false while the newer one plays.
pub struct SpeechController<E: SynthesisEngine> {
    engine: Option<E>,
    shared: Arc<Shared<E::Voice>>,
}

impl<E: SynthesisEngine> SpeechController<E> {
    /// Create a controller and load the engine's voices
    pub fn new<F>(engine: Option<E>, on_end: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let supported = engine.is_some();
        info!("Speech synthesis supported: {}", supported);

        let mut controller = Self {
            engine,
            shared: Arc::new(Shared::new(supported, Arc::new(on_end))),
        };
        controller.load_voices();
        controller
    }

    /// Controller for a host without synthesis support
    pub fn unsupported<F>(on_end: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(None, on_end)
    }

    /// Store voices now if the engine has them, otherwise wait for the
    /// engine's voices-changed notification
    fn load_voices(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        match engine.voices() {
            Ok(voices) if !voices.is_empty() => {
                self.shared.set_voices(voices);
                return;
            }
            Ok(_) => debug!("No voices loaded yet, waiting for notification"),
            Err(e) => warn!("Failed to query voices: {}", e),
        }

        let shared: Weak<Shared<E::Voice>> = Arc::downgrade(&self.shared);
        let listener = Box::new(move |voices: Vec<E::Voice>| {
            if let Some(shared) = shared.upgrade() {
                shared.set_voices(voices);
            }
        });

        if let Err(e) = engine.on_voices_changed(listener) {
            warn!("Failed to register voices listener: {}", e);
        }
    }

    /// Speak an utterance
    ///
    /// Marks the controller as speaking before the engine confirms
    /// anything. Returns as soon as the engine has accepted the
    /// utterance. If the engine rejects it, `speaking` is reset and the
    /// error returned; `on_end` is not called.
    pub fn speak(&mut self, request: UtteranceRequest<E::Voice>) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        self.shared.set_speaking(true);

        let mut utterance = Utterance::new(request);
        let shared = Arc::downgrade(&self.shared);
        utterance.set_on_end(Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.finish();
            }
        }));

        debug!(
            "Submitting utterance {:?} ({} chars)",
            utterance.id(),
            utterance.text.chars().count()
        );

        if let Err(e) = engine.speak(utterance) {
            warn!("Engine rejected utterance: {}", e);
            self.shared.set_speaking(false);
            return Err(e);
        }

        Ok(())
    }

    /// Stop current and queued speech
    ///
    /// `speaking` goes false immediately. `on_end` is not called.
    pub fn cancel(&mut self) -> Result<()> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(());
        };

        debug!("Canceling speech");
        self.shared.set_speaking(false);
        engine.cancel()
    }

    pub fn supported(&self) -> bool {
        self.shared.tracked().state.supported
    }

    pub fn speaking(&self) -> bool {
        self.shared.tracked().state.speaking
    }

    pub fn voices(&self) -> Vec<E::Voice> {
        self.shared.tracked().state.voices.clone()
    }

    /// Snapshot of the whole state
    pub fn state(&self) -> SynthesisState<E::Voice> {
        self.shared.snapshot()
    }

    /// Call `listener` with a fresh snapshot after every state change
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SynthesisState<E::Voice>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.shared.listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// The injected engine, if the host is supported
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }
}
