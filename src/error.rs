//! Error types for speechctl

use std::io;
use thiserror::Error;

/// Main error type for speechctl
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Speech synthesis error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("INI parse error: {0}")]
    IniParse(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for speechctl operations
pub type Result<T> = std::result::Result<T, SpeechError>;

impl From<String> for SpeechError {
    fn from(s: String) -> Self {
        SpeechError::Other(s)
    }
}

impl From<&str> for SpeechError {
    fn from(s: &str) -> Self {
        SpeechError::Other(s.to_string())
    }
}

impl From<ini::Error> for SpeechError {
    fn from(e: ini::Error) -> Self {
        match e {
            ini::Error::Io(e) => SpeechError::Io(e),
            ini::Error::Parse(e) => SpeechError::IniParse(e.to_string()),
        }
    }
}
