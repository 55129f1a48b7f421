//! Observable synthesis state

pub mod config;

pub use config::SpeechConfig;

/// Snapshot of what the controller knows about the host engine
///
/// `supported` is decided once when the controller is built. `speaking`
/// follows `speak`, completion and `cancel`. `voices` is replaced as a
/// whole whenever the engine reports a list.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisState<V> {
    pub supported: bool,
    pub speaking: bool,
    pub voices: Vec<V>,
}

impl<V> SynthesisState<V> {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            speaking: false,
            voices: Vec::new(),
        }
    }
}

impl<V> Default for SynthesisState<V> {
    fn default() -> Self {
        Self::new(false)
    }
}
