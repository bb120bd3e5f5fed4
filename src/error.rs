//! Error types for the narration pipeline.
//!
//! Every failure is terminal for the request that hit it; callers map
//! [`NarrateError::kind`] onto their own surface (HTTP status codes in
//! [`crate::server`]).

use thiserror::Error;

/// Errors raised by the narrator library
#[derive(Debug, Error)]
pub enum NarrateError {
    /// Request rejected before any synthesis work began
    #[error("{0}")]
    Validation(String),

    /// A backend could not be brought up (inference server unreachable, model not loaded)
    #[error("Engine '{engine}' is unavailable: {reason}")]
    BackendConstruction { engine: String, reason: String },

    /// A backend failed to produce audio for one fragment (1-based index)
    #[error("Synthesis failed for fragment {index}: {reason}")]
    Synthesis { index: usize, reason: String },

    /// Segments could not be stitched together
    #[error("Audio concatenation error: {0}")]
    Concatenation(String),

    /// Backend-side failure before it is attributed to a fragment
    #[error("Backend error: {0}")]
    Backend(String),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    BackendConstruction,
    Synthesis,
    Concatenation,
    Internal,
}

impl NarrateError {
    pub fn validation(message: impl Into<String>) -> Self {
        NarrateError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NarrateError::Validation(_) => ErrorKind::Validation,
            NarrateError::BackendConstruction { .. } => ErrorKind::BackendConstruction,
            NarrateError::Synthesis { .. } => ErrorKind::Synthesis,
            NarrateError::Concatenation(_) => ErrorKind::Concatenation,
            NarrateError::Backend(_)
            | NarrateError::Http(_)
            | NarrateError::Io(_)
            | NarrateError::Json(_)
            | NarrateError::Configuration(_) => ErrorKind::Internal,
        }
    }
}

impl From<hound::Error> for NarrateError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => NarrateError::Io(e),
            other => NarrateError::Backend(format!("WAV error: {}", other)),
        }
    }
}

/// Тип Result для библиотеки narrator
pub type Result<T> = std::result::Result<T, NarrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(NarrateError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(
            NarrateError::Synthesis { index: 2, reason: "boom".into() }.kind(),
            ErrorKind::Synthesis
        );
        assert_eq!(NarrateError::Backend("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = NarrateError::validation("Text is required.");
        assert_eq!(err.to_string(), "Text is required.");
    }
}
