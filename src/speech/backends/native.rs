//! Native TTS backend using the tts crate
//!
//! This backend uses the `tts` crate which provides a unified interface to:
//! - Speech Dispatcher on Linux (via native bindings)
//! - AVFoundation on macOS/iOS (via native bindings)
//! - WinRT on Windows
//!
//! Completion is reported through the crate's utterance callbacks, which
//! may run on a backend thread.

use crate::speech::engine::{CompletionHandler, SynthesisEngine, Utterance, VoicesChanged};
use crate::speech::voice::VoiceSummary;
use crate::{Result, SpeechError};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tts::{Tts as TtsCrate, UtteranceId as BackendId, Voice};

/// Completion handlers waiting on the backend, keyed by backend id
///
/// `finished` holds ids whose end event arrived while `speak` was still
/// waiting for the backend to hand back the id. It is emptied as soon as
/// no submission is in flight, so end events for forgotten utterances
/// (after `cancel`, say) do not accumulate.
struct Pending<I> {
    handlers: Vec<(I, CompletionHandler)>,
    finished: Vec<I>,
    submitting: usize,
}

impl<I> Default for Pending<I> {
    fn default() -> Self {
        Self {
            handlers: Vec::new(),
            finished: Vec::new(),
            submitting: 0,
        }
    }
}

impl<I: Copy + PartialEq> Pending<I> {
    /// A submission is about to reach the backend
    fn begin(&mut self) {
        self.submitting += 1;
    }

    /// The submission produced nothing to wait for
    fn abandon(&mut self) {
        self.submitting = self.submitting.saturating_sub(1);
        if self.submitting == 0 {
            self.finished.clear();
        }
    }

    /// Record the handler for `id`
    ///
    /// Returns the handler instead when the end event already arrived;
    /// the caller runs it outside the lock.
    fn insert(&mut self, id: I, handler: CompletionHandler) -> Option<CompletionHandler> {
        let early = match self.finished.iter().position(|done| *done == id) {
            Some(idx) => {
                self.finished.swap_remove(idx);
                true
            }
            None => false,
        };
        self.abandon();

        if early {
            Some(handler)
        } else {
            self.handlers.push((id, handler));
            None
        }
    }

    /// End event: hand back the handler to run
    fn complete(&mut self, id: I) -> Option<CompletionHandler> {
        let handler = self.take(id);
        if handler.is_none() && self.submitting > 0 {
            self.finished.push(id);
        }
        handler
    }

    /// Stop event or anything else that ends an utterance without
    /// completing it
    fn take(&mut self, id: I) -> Option<CompletionHandler> {
        let idx = self.handlers.iter().position(|(existing, _)| *existing == id)?;
        Some(self.handlers.swap_remove(idx).1)
    }

    fn clear(&mut self) {
        self.handlers.clear();
        self.finished.clear();
    }
}

fn lock<I>(pending: &Mutex<Pending<I>>) -> MutexGuard<'_, Pending<I>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Native TTS engine
pub struct NativeEngine {
    /// The tts crate's TTS instance
    tts: TtsCrate,

    pending: Arc<Mutex<Pending<BackendId>>>,

    /// Listener for voice list changes; fired from `refresh_voices`
    voices_changed: Option<VoicesChanged<Voice>>,

    /// Voice ids from the last query, for change detection
    known_voices: Vec<String>,
}

impl NativeEngine {
    /// Create a new native TTS engine
    ///
    /// Initializes the platform-appropriate TTS backend and hooks its
    /// utterance callbacks when the platform has them.
    pub fn new() -> Result<Self> {
        debug!("Creating native TTS backend");

        let tts = TtsCrate::default()
            .map_err(|e| SpeechError::Speech(format!("Failed to initialize TTS: {}", e)))?;

        let pending = Arc::new(Mutex::new(Pending::default()));

        if tts.supported_features().utterance_callbacks {
            let on_end = Arc::clone(&pending);
            tts.on_utterance_end(Some(Box::new(move |id: BackendId| {
                let handler = lock(&on_end).complete(id);
                if let Some(handler) = handler {
                    handler();
                }
            })))
            .map_err(|e| SpeechError::Speech(format!("Failed to hook utterance end: {}", e)))?;

            // Interrupted utterances never count as completed
            let on_stop = Arc::clone(&pending);
            tts.on_utterance_stop(Some(Box::new(move |id: BackendId| {
                let dropped = lock(&on_stop).take(id);
                if dropped.is_some() {
                    debug!("Utterance {:?} stopped before completion", id);
                }
            })))
            .map_err(|e| SpeechError::Speech(format!("Failed to hook utterance stop: {}", e)))?;
        } else {
            warn!("Utterance callbacks not supported on this platform; completion will not be reported");
        }

        debug!("Native TTS backend created successfully");

        Ok(Self {
            tts,
            pending,
            voices_changed: None,
            known_voices: Vec::new(),
        })
    }

    /// Probe the host; `None` when no engine is available
    pub fn detect() -> Option<Self> {
        info!(
            "Probing native speech synthesis for platform: {}",
            std::env::consts::OS
        );
        match Self::new() {
            Ok(engine) => {
                info!("✓ Native TTS backend available");
                Some(engine)
            }
            Err(e) => {
                info!("✗ Native TTS backend unavailable: {}", e);
                None
            }
        }
    }

    /// Whether natural completion is reported on this platform
    pub fn reports_completion(&self) -> bool {
        self.tts.supported_features().utterance_callbacks
    }

    /// Re-query the backend and notify the listener if the list changed
    ///
    /// The operating system layer has no voices-changed event, so hosts
    /// call this when they expect voices to have been installed.
    pub fn refresh_voices(&mut self) -> Result<()> {
        let voices = self.voices()?;
        let ids: Vec<String> = voices.iter().map(|voice| voice.id()).collect();
        if ids == self.known_voices {
            return Ok(());
        }

        debug!("Voice list changed ({} voices)", voices.len());
        self.known_voices = ids;
        if let Some(listener) = self.voices_changed.as_mut() {
            listener(voices);
        }
        Ok(())
    }

    /// Voices reduced to display fields
    pub fn voice_summaries(&self) -> Result<Vec<VoiceSummary>> {
        Ok(self.voices()?.iter().map(VoiceSummary::from).collect())
    }

    /// Map a rate multiplier (1.0 = normal) onto the backend's scale
    fn convert_rate(&self, rate: f32) -> f32 {
        self.tts.normal_rate() * rate
    }

    /// Map a pitch multiplier (1.0 = normal) onto the backend's scale
    fn convert_pitch(&self, pitch: f32) -> f32 {
        self.tts.normal_pitch() * pitch
    }

    /// Map a volume fraction (0.0-1.0) onto the backend's range
    fn convert_volume(&self, volume: f32) -> f32 {
        let min = self.tts.min_volume();
        let max = self.tts.max_volume();
        min + (max - min) * volume
    }

    /// Apply utterance parameters the platform can honour
    fn configure(&mut self, utterance: &Utterance<Voice>) -> Result<()> {
        let features = self.tts.supported_features();

        if features.rate {
            let rate = self.convert_rate(utterance.rate);
            self.tts
                .set_rate(rate)
                .map_err(|e| SpeechError::Speech(format!("Failed to set rate: {}", e)))?;
        } else if utterance.rate != 1.0 {
            warn!("Rate control not supported on this platform");
        }

        if features.pitch {
            let pitch = self.convert_pitch(utterance.pitch);
            self.tts
                .set_pitch(pitch)
                .map_err(|e| SpeechError::Speech(format!("Failed to set pitch: {}", e)))?;
        } else if utterance.pitch != 1.0 {
            warn!("Pitch control not supported on this platform");
        }

        if features.volume {
            let volume = self.convert_volume(utterance.volume);
            self.tts
                .set_volume(volume)
                .map_err(|e| SpeechError::Speech(format!("Failed to set volume: {}", e)))?;
        } else if utterance.volume != 1.0 {
            warn!("Volume control not supported on this platform");
        }

        if let Some(voice) = &utterance.voice {
            if features.voice {
                debug!("Selecting voice: {}", voice.name());
                self.tts
                    .set_voice(voice)
                    .map_err(|e| SpeechError::Speech(format!("Failed to set voice: {}", e)))?;
            } else {
                warn!("Voice selection not supported on this platform");
            }
        }

        Ok(())
    }
}

impl SynthesisEngine for NativeEngine {
    type Voice = Voice;

    fn voices(&self) -> Result<Vec<Voice>> {
        if !self.tts.supported_features().voice {
            return Ok(Vec::new());
        }
        self.tts
            .voices()
            .map_err(|e| SpeechError::Speech(format!("Failed to get voices: {}", e)))
    }

    fn on_voices_changed(&mut self, listener: VoicesChanged<Voice>) -> Result<()> {
        self.known_voices = self.voices()?.iter().map(|voice| voice.id()).collect();
        self.voices_changed = Some(listener);
        Ok(())
    }

    fn speak(&mut self, mut utterance: Utterance<Voice>) -> Result<()> {
        self.configure(&utterance)?;

        debug!("Speaking utterance {:?}", utterance.id());
        let handler = utterance.take_on_end();
        let text = std::mem::take(&mut utterance.text);

        lock(&self.pending).begin();
        let id = match self.tts.speak(text, true) {
            Ok(id) => id,
            Err(e) => {
                lock(&self.pending).abandon();
                error!("Failed to speak: {}", e);
                return Err(SpeechError::Speech(format!("Speak failed: {}", e)));
            }
        };

        let (Some(id), Some(handler)) = (id, handler) else {
            lock(&self.pending).abandon();
            return Ok(());
        };

        let finished_early = lock(&self.pending).insert(id, handler);
        if let Some(handler) = finished_early {
            handler();
        }
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        debug!("Canceling speech");
        lock(&self.pending).clear();

        if !self.tts.supported_features().stop {
            warn!("Stopping speech not supported on this platform");
            return Ok(());
        }

        self.tts.stop().map_err(|e| {
            error!("Failed to cancel speech: {}", e);
            SpeechError::Speech(format!("Cancel failed: {}", e))
        })?;

        Ok(())
    }
}
