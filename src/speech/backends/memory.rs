//! In-process scripted engine
//!
//! Nothing is played. Submitted utterances are recorded and queued, and
//! the caller decides when voices appear and when playback completes.
//! Handles are cheap clones of one shared engine, so a test can keep one
//! while a controller owns another.

use crate::speech::engine::{
    CompletionHandler, SynthesisEngine, Utterance, UtteranceId, VoicesChanged,
};
use crate::{Result, SpeechError};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Record of one descriptor as the engine received it
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedUtterance<V> {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Option<V>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

struct Inner<V> {
    voices: Vec<V>,
    listeners: Vec<VoicesChanged<V>>,
    submitted: Vec<SubmittedUtterance<V>>,
    pending: VecDeque<(UtteranceId, Option<CompletionHandler>)>,
    cancels: usize,
    fail_next: Option<String>,
}

/// Scripted [`SynthesisEngine`]
pub struct MemoryEngine<V> {
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for MemoryEngine<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone> MemoryEngine<V> {
    /// Engine whose voices are not loaded yet
    pub fn new() -> Self {
        Self::with_voices(Vec::new())
    }

    /// Engine with voices available up front
    pub fn with_voices(voices: Vec<V>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                voices,
                listeners: Vec::new(),
                submitted: Vec::new(),
                pending: VecDeque::new(),
                cancels: 0,
                fail_next: None,
            })),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the voice list and notify every listener
    pub fn publish_voices(&self, voices: Vec<V>) {
        // Listeners run without the lock held
        let mut listeners = {
            let mut inner = self.inner();
            inner.voices = voices.clone();
            std::mem::take(&mut inner.listeners)
        };

        debug!(
            "Publishing {} voices to {} listeners",
            voices.len(),
            listeners.len()
        );
        for listener in listeners.iter_mut() {
            listener(voices.clone());
        }

        let mut inner = self.inner();
        listeners.append(&mut inner.listeners);
        inner.listeners = listeners;
    }

    /// Finish the oldest pending utterance as if playback ended
    ///
    /// Returns false when nothing is pending.
    pub fn complete_next(&self) -> bool {
        let next = self.inner().pending.pop_front();
        match next {
            Some((id, handler)) => {
                debug!("Completing utterance {:?}", id);
                if let Some(handler) = handler {
                    handler();
                }
                true
            }
            None => false,
        }
    }

    /// Make the next `speak` call fail with `message`
    pub fn fail_next_speak(&self, message: impl Into<String>) {
        self.inner().fail_next = Some(message.into());
    }

    /// Every descriptor received so far, in submission order
    pub fn submitted(&self) -> Vec<SubmittedUtterance<V>> {
        self.inner().submitted.clone()
    }

    /// Number of utterances waiting for completion
    pub fn pending(&self) -> usize {
        self.inner().pending.len()
    }

    /// Number of `cancel` calls received
    pub fn cancels(&self) -> usize {
        self.inner().cancels
    }

    /// Number of registered voices-changed listeners
    pub fn listener_count(&self) -> usize {
        self.inner().listeners.len()
    }
}

impl<V: Clone> Default for MemoryEngine<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SynthesisEngine for MemoryEngine<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Voice = V;

    fn voices(&self) -> Result<Vec<V>> {
        Ok(self.inner().voices.clone())
    }

    fn on_voices_changed(&mut self, listener: VoicesChanged<V>) -> Result<()> {
        self.inner().listeners.push(listener);
        Ok(())
    }

    fn speak(&mut self, mut utterance: Utterance<V>) -> Result<()> {
        let mut inner = self.inner();
        if let Some(message) = inner.fail_next.take() {
            return Err(SpeechError::Speech(message));
        }

        let id = utterance.id();
        debug!("Queued utterance {:?}", id);
        let handler = utterance.take_on_end();
        inner.submitted.push(SubmittedUtterance {
            id,
            text: utterance.text,
            voice: utterance.voice,
            rate: utterance.rate,
            pitch: utterance.pitch,
            volume: utterance.volume,
        });
        inner.pending.push_back((id, handler));
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        let mut inner = self.inner();
        debug!("Dropping {} pending utterances", inner.pending.len());
        inner.pending.clear();
        inner.cancels += 1;
        Ok(())
    }
}
