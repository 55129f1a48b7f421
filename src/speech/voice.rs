//! Display form of a synthetic voice

use serde::{Deserialize, Serialize};

/// Plain description of a voice
///
/// Engines keep their own opaque voice handles; this is what gets shown
/// in a voice picker or printed as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSummary {
    pub id: String,
    pub name: String,
    pub language: String,
}

impl VoiceSummary {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
        }
    }
}

#[cfg(feature = "native")]
impl From<&tts::Voice> for VoiceSummary {
    fn from(voice: &tts::Voice) -> Self {
        Self {
            id: voice.id(),
            name: voice.name(),
            language: voice.language().to_string(),
        }
    }
}
