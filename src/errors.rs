// src/errors.rs

use thiserror::Error;

/// Every failure a session can run into. None of these are fatal; each one is
/// scoped to a single submission or command.
#[derive(Debug, Error)]
pub enum IntellexError {
    /// Empty prompt, oversized image, wrong file type, missing image.
    #[error("{0}")]
    InputValidation(String),

    #[error("a request is already in progress")]
    Busy,

    /// Network failure, remote error or content-policy rejection.
    #[error("generation failed: {0}")]
    Gateway(String),

    #[error("speech recognition error: {0}")]
    Transcription(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("export failed: {0}")]
    Export(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type IntellexResult<T> = Result<T, IntellexError>;

impl IntellexError {
    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn gateway_error(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    pub fn transcription_error(msg: impl Into<String>) -> Self {
        Self::Transcription(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    pub fn export_error(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// True for errors that are reported back to the user without touching
    /// the conversation.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::InputValidation(_) | Self::Busy)
    }
}

impl From<reqwest::Error> for IntellexError {
    fn from(err: reqwest::Error) -> Self {
        // the request URL may carry credentials
        let err = err.without_url();
        if err.is_timeout() {
            Self::Gateway("request timed out".to_string())
        } else if err.is_connect() {
            Self::Gateway(format!("could not connect to API: {}", err))
        } else {
            Self::Gateway(format!("request failed: {}", err))
        }
    }
}

impl From<zip::result::ZipError> for IntellexError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections() {
        assert!(IntellexError::Busy.is_rejection());
        assert!(IntellexError::input_error("empty").is_rejection());
        assert!(!IntellexError::gateway_error("boom").is_rejection());
    }

    #[test]
    fn test_input_error_displays_message_verbatim() {
        let err = IntellexError::input_error("Image size should be less than 5MB");
        assert_eq!(err.to_string(), "Image size should be less than 5MB");
    }
}
