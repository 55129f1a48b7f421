//! Speech synthesis system

pub mod backends;
pub mod controller;
pub mod engine;
pub mod voice;

pub use controller::{OnEnd, SpeechController, SubscriptionId};
pub use engine::{
    CompletionHandler, SynthesisEngine, Utterance, UtteranceId, UtteranceRequest, VoicesChanged,
};
pub use voice::VoiceSummary;

#[cfg(feature = "native")]
pub use backends::native::NativeEngine;

#[cfg(feature = "native")]
impl SpeechController<NativeEngine> {
    /// Controller over the operating system engine
    ///
    /// Hosts without a usable engine get an unsupported controller.
    pub fn detect<F>(on_end: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(NativeEngine::detect(), on_end)
    }
}
