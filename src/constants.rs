// src/constants.rs

// API Constants
pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const GEMINI_API_VERSION: &str = "v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const SUPPORTED_MODELS: [&str; 5] = [
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite-preview-02-05",
    "gemini-1.5-flash",
    "gemini-1.5-flash-8b",
    "gemini-1.5-pro",
];

// Input Constants
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_IMAGE_QUESTION: &str = "Analyze this image";

// Conversation Constants
pub const USER_LABEL: &str = "You";
pub const MODEL_LABEL: &str = "Intellex";
pub const GATEWAY_ERROR_REPLY: &str =
    "Sorry, there was an error generating a response. Please try again.";

// Export Constants
pub const EXPORT_BASENAME: &str = "chat-history";
pub const EXPORT_WRAP_WIDTH: usize = 80;
pub const EXPORT_LINES_PER_PAGE: usize = 38;
