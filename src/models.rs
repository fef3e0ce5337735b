// src/models.rs

use crate::constants::{DEFAULT_MODEL, SUPPORTED_MODELS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Creation-ordered identifier of a message within one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    User,
    Generated,
}

/// An image carried by a message. The bytes are shared read-only so that
/// snapshots of the conversation stay cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Represents a message in the conversation. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub origin: Origin,
    pub attachment: Option<Attachment>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_user(&self) -> bool {
        self.origin == Origin::User
    }
}

/// Model identifier sent to the gateway. Unknown names are kept as
/// `Custom` and left for the remote side to reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModelId {
    Gemini20Flash,
    Gemini20FlashLite,
    Gemini15Flash,
    Gemini15Flash8b,
    Gemini15Pro,
    Custom(String),
}

impl ModelId {
    pub fn supported() -> Vec<ModelId> {
        SUPPORTED_MODELS.iter().map(|name| ModelId::from(*name)).collect()
    }

    pub fn as_str(&self) -> &str {
        match self {
            ModelId::Gemini20Flash => SUPPORTED_MODELS[0],
            ModelId::Gemini20FlashLite => SUPPORTED_MODELS[1],
            ModelId::Gemini15Flash => SUPPORTED_MODELS[2],
            ModelId::Gemini15Flash8b => SUPPORTED_MODELS[3],
            ModelId::Gemini15Pro => SUPPORTED_MODELS[4],
            ModelId::Custom(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ModelId::Custom(_))
    }
}

impl Default for ModelId {
    fn default() -> Self {
        ModelId::from(DEFAULT_MODEL)
    }
}

impl From<&str> for ModelId {
    fn from(name: &str) -> Self {
        match name.trim() {
            "gemini-2.0-flash" => ModelId::Gemini20Flash,
            "gemini-2.0-flash-lite-preview-02-05" => ModelId::Gemini20FlashLite,
            "gemini-1.5-flash" => ModelId::Gemini15Flash,
            "gemini-1.5-flash-8b" => ModelId::Gemini15Flash8b,
            "gemini-1.5-pro" => ModelId::Gemini15Pro,
            other => ModelId::Custom(other.to_string()),
        }
    }
}

impl From<String> for ModelId {
    fn from(name: String) -> Self {
        ModelId::from(name.as_str())
    }
}

impl From<ModelId> for String {
    fn from(model: ModelId) -> Self {
        model.as_str().to_string()
    }
}

impl FromStr for ModelId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ModelId::from(s))
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logs details of each API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCallLog {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub request_summary: String,
    pub response_status: u16,
    pub response_time_ms: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_round_trips_known_names() {
        for name in SUPPORTED_MODELS {
            let model = ModelId::from(name);
            assert!(model.is_supported());
            assert_eq!(model.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_model_is_passed_through() {
        let model: ModelId = "gemini-9.9-ultra".parse().unwrap();
        assert_eq!(model, ModelId::Custom("gemini-9.9-ultra".to_string()));
        assert_eq!(model.to_string(), "gemini-9.9-ultra");
    }

    #[test]
    fn test_default_model() {
        assert_eq!(ModelId::default(), ModelId::Gemini20Flash);
    }

    #[test]
    fn test_model_id_serde_as_string() {
        let json = serde_json::to_string(&ModelId::Gemini15Pro).unwrap();
        assert_eq!(json, "\"gemini-1.5-pro\"");
        let back: ModelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ModelId::Gemini15Pro);
    }
}
