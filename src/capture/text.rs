use super::Prompt;
use crate::errors::{IntellexError, IntellexResult};

/// Typed text, passed through as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextProducer;

impl TextProducer {
    pub fn capture(&self, input: &str) -> IntellexResult<Prompt> {
        if input.trim().is_empty() {
            return Err(IntellexError::input_error("Please enter a message"));
        }
        Ok(Prompt::text(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(TextProducer.capture("").is_err());
        assert!(TextProducer.capture(" \t\n ").is_err());
    }

    #[test]
    fn test_keeps_surrounding_whitespace() {
        let prompt = TextProducer.capture(" Hello\n").unwrap();
        assert_eq!(prompt.text, " Hello\n");
        assert!(prompt.attachment.is_none());
    }
}
