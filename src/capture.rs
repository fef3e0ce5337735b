// src/capture.rs
//
// Input producers. Each screen owns exactly one of them, and whatever it
// produces is the whole prompt for that submission.

pub mod image;
pub mod speech;
pub mod text;

pub use image::{AnalysisFocus, ImageFile, ImageProducer};
pub use speech::{
    CommandRecognizer, ListenState, SpeechCapability, SpeechCapture, SpeechEvent,
    SpeechRecognizer,
};
pub use text::TextProducer;

use crate::errors::IntellexResult;
use crate::models::Attachment;
use std::fmt;

/// What gets sent to the model for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(text: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            text: text.into(),
            attachment: Some(attachment),
        }
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStrategy {
    TextOnly,
    ImageWithFocus,
    SpeechTranscribed,
}

impl InputStrategy {
    pub fn all() -> [InputStrategy; 3] {
        [
            InputStrategy::TextOnly,
            InputStrategy::ImageWithFocus,
            InputStrategy::SpeechTranscribed,
        ]
    }

    /// Screen name shown in menus and headers.
    pub fn title(&self) -> &'static str {
        match self {
            InputStrategy::TextOnly => "IntellexChat",
            InputStrategy::ImageWithFocus => "IntellexVis",
            InputStrategy::SpeechTranscribed => "IntellexAsk",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InputStrategy::TextOnly => "Advanced text-based conversations",
            InputStrategy::ImageWithFocus => "Intelligent image analysis",
            InputStrategy::SpeechTranscribed => "Voice-enabled interactions",
        }
    }

    /// Parses the short command-line name of a screen.
    pub fn from_arg(arg: &str) -> Option<InputStrategy> {
        match arg.trim().to_ascii_lowercase().as_str() {
            "chat" => Some(InputStrategy::TextOnly),
            "vis" | "vision" => Some(InputStrategy::ImageWithFocus),
            "ask" | "voice" => Some(InputStrategy::SpeechTranscribed),
            _ => None,
        }
    }
}

impl fmt::Display for InputStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// The producer active on a screen.
pub enum InputCapture {
    TextOnly(TextProducer),
    ImageWithFocus(ImageProducer),
    SpeechTranscribed(SpeechCapture),
}

impl InputCapture {
    pub fn for_strategy(strategy: InputStrategy, speech: SpeechCapability) -> Self {
        match strategy {
            InputStrategy::TextOnly => InputCapture::TextOnly(TextProducer),
            InputStrategy::ImageWithFocus => InputCapture::ImageWithFocus(ImageProducer::new()),
            InputStrategy::SpeechTranscribed => {
                InputCapture::SpeechTranscribed(SpeechCapture::new(speech))
            }
        }
    }

    pub fn strategy(&self) -> InputStrategy {
        match self {
            InputCapture::TextOnly(_) => InputStrategy::TextOnly,
            InputCapture::ImageWithFocus(_) => InputStrategy::ImageWithFocus,
            InputCapture::SpeechTranscribed(_) => InputStrategy::SpeechTranscribed,
        }
    }

    /// Builds the prompt for one submission from the typed (or transcribed
    /// and possibly edited) text field.
    pub fn prompt(&mut self, typed: &str) -> IntellexResult<Prompt> {
        match self {
            InputCapture::TextOnly(producer) => producer.capture(typed),
            InputCapture::ImageWithFocus(producer) => producer.capture(typed),
            InputCapture::SpeechTranscribed(capture) => capture.capture(typed),
        }
    }

    /// Called once a submission has finished, successfully or not.
    pub fn reset_after_submit(&mut self) {
        if let InputCapture::ImageWithFocus(producer) = self {
            producer.clear();
        }
    }

    pub fn image_mut(&mut self) -> Option<&mut ImageProducer> {
        match self {
            InputCapture::ImageWithFocus(producer) => Some(producer),
            _ => None,
        }
    }

    pub fn speech_mut(&mut self) -> Option<&mut SpeechCapture> {
        match self {
            InputCapture::SpeechTranscribed(capture) => Some(capture),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_arg() {
        assert_eq!(InputStrategy::from_arg("chat"), Some(InputStrategy::TextOnly));
        assert_eq!(InputStrategy::from_arg("VIS"), Some(InputStrategy::ImageWithFocus));
        assert_eq!(InputStrategy::from_arg("ask"), Some(InputStrategy::SpeechTranscribed));
        assert_eq!(InputStrategy::from_arg("dashboard"), None);
    }

    #[test]
    fn test_capture_matches_strategy() {
        for strategy in InputStrategy::all() {
            let capture = InputCapture::for_strategy(strategy, SpeechCapability::Unavailable);
            assert_eq!(capture.strategy(), strategy);
        }
    }

    #[test]
    fn test_text_capture_passes_text_unchanged() {
        let mut capture = InputCapture::for_strategy(InputStrategy::TextOnly, SpeechCapability::Unavailable);
        let prompt = capture.prompt("  Hello  ").unwrap();
        assert_eq!(prompt, Prompt::text("  Hello  "));
    }

    #[test]
    fn test_image_capture_requires_an_image() {
        let mut capture =
            InputCapture::for_strategy(InputStrategy::ImageWithFocus, SpeechCapability::Unavailable);
        assert!(capture.prompt("what is this?").is_err());
    }
}
