//! Synthesis engine backends

// In-process scripted engine (tests, headless hosts)
pub mod memory;

// Native TTS backend using the tts crate (cross-platform)
#[cfg(feature = "native")]
pub mod native;
