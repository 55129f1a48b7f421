//! Synthesis engine abstraction
//!
//! The controller never touches a platform API directly. Everything it
//! needs from the host (voice listing, playback, cancellation) goes
//! through [`SynthesisEngine`], so a scripted engine can stand in for the
//! operating system one.

use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh descriptor ids, shared by every engine in the process
static NEXT_UTTERANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Listener fired each time the engine reports a (new) voice list
pub type VoicesChanged<V> = Box<dyn FnMut(Vec<V>) + Send>;

/// One-shot handler run when an utterance finishes playing naturally
pub type CompletionHandler = Box<dyn FnOnce() + Send>;

/// Process-unique identity of an utterance descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(u64);

impl UtteranceId {
    fn next() -> Self {
        Self(NEXT_UTTERANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Parameters for one utterance, as supplied by the caller
///
/// Rate, pitch and volume are multipliers where 1.0 is the engine's
/// normal value. Nothing is clamped here; the engine decides what it
/// accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest<V> {
    pub voice: Option<V>,
    pub text: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl<V> UtteranceRequest<V> {
    /// Request for `text` with default voice and parameters
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_voice(mut self, voice: Option<V>) -> Self {
        self.voice = voice;
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }
}

impl<V> Default for UtteranceRequest<V> {
    fn default() -> Self {
        Self {
            voice: None,
            text: String::new(),
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Utterance descriptor handed to an engine
///
/// A new descriptor is built for every `speak` call. Some engines
/// silently ignore a descriptor they have already played, so they are
/// never reused.
pub struct Utterance<V> {
    id: UtteranceId,
    pub text: String,
    pub voice: Option<V>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    on_end: Option<CompletionHandler>,
}

impl<V> Utterance<V> {
    /// Build a fresh descriptor from a request
    pub fn new(request: UtteranceRequest<V>) -> Self {
        Self {
            id: UtteranceId::next(),
            text: request.text,
            voice: request.voice,
            rate: request.rate,
            pitch: request.pitch,
            volume: request.volume,
            on_end: None,
        }
    }

    pub fn id(&self) -> UtteranceId {
        self.id
    }

    /// Register the completion handler, replacing any previous one
    pub fn set_on_end(&mut self, handler: CompletionHandler) {
        self.on_end = Some(handler);
    }

    /// Take the completion handler out of the descriptor
    ///
    /// Engines call this when they accept the utterance and keep the
    /// handler until playback ends.
    pub fn take_on_end(&mut self) -> Option<CompletionHandler> {
        self.on_end.take()
    }
}

impl<V> std::fmt::Debug for Utterance<V>
where
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Utterance")
            .field("id", &self.id)
            .field("text", &self.text)
            .field("voice", &self.voice)
            .field("rate", &self.rate)
            .field("pitch", &self.pitch)
            .field("volume", &self.volume)
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}

/// Host speech synthesis engine
///
/// Implementations run playback asynchronously: `speak` returns as soon
/// as the utterance is accepted, and the descriptor's completion handler
/// fires later, only when playback ends naturally. Interrupted or
/// cancelled utterances drop their handler without running it.
pub trait SynthesisEngine {
    /// Voice descriptor type; opaque to the controller
    type Voice: Clone + Send + Sync + 'static;

    /// Voices currently loaded by the engine (may be empty while loading)
    fn voices(&self) -> Result<Vec<Self::Voice>>;

    /// Register a listener fired whenever the voice list becomes
    /// available or changes. May fire more than once.
    fn on_voices_changed(&mut self, listener: VoicesChanged<Self::Voice>) -> Result<()>;

    /// Begin asynchronous playback of an utterance
    fn speak(&mut self, utterance: Utterance<Self::Voice>) -> Result<()>;

    /// Stop the current utterance and anything queued behind it
    fn cancel(&mut self) -> Result<()>;
}
