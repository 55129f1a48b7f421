//! speechctl - reactive speech synthesis controller
//!
//! Exposes the host's speech synthesis engine to an interactive front
//! end: available voices, whether speech is playing, and operations to
//! speak and cancel utterances with rate, pitch, volume and voice
//! selection.

pub mod error;
pub mod speech;
pub mod state;

pub use error::{Result, SpeechError};
pub use speech::{SpeechController, SynthesisEngine, UtteranceRequest};
pub use state::SynthesisState;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "speechctl";
