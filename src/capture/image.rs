// src/capture/image.rs

use super::Prompt;
use crate::constants::{DEFAULT_IMAGE_QUESTION, MAX_IMAGE_BYTES};
use crate::errors::{IntellexError, IntellexResult};
use crate::models::Attachment;
use crate::utils::detect_image_mime;
use log::debug;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const IMAGE_TOO_LARGE: &str = "Image size should be less than 5MB";

/// What the model should concentrate on when analysing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalysisFocus {
    #[default]
    General,
    Objects,
    Text,
    Colors,
    Faces,
    Safety,
}

impl AnalysisFocus {
    pub const ALL: [AnalysisFocus; 6] = [
        AnalysisFocus::General,
        AnalysisFocus::Objects,
        AnalysisFocus::Text,
        AnalysisFocus::Colors,
        AnalysisFocus::Faces,
        AnalysisFocus::Safety,
    ];

    /// Tag concatenated into the prompt text.
    pub fn tag(&self) -> &'static str {
        match self {
            AnalysisFocus::General => "general",
            AnalysisFocus::Objects => "objects",
            AnalysisFocus::Text => "text",
            AnalysisFocus::Colors => "colors",
            AnalysisFocus::Faces => "faces",
            AnalysisFocus::Safety => "safety",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisFocus::General => "General Analysis",
            AnalysisFocus::Objects => "Object Detection",
            AnalysisFocus::Text => "Text Recognition",
            AnalysisFocus::Colors => "Color Analysis",
            AnalysisFocus::Faces => "Face Detection",
            AnalysisFocus::Safety => "Safety Check",
        }
    }

    pub fn parse(tag: &str) -> Option<AnalysisFocus> {
        let tag = tag.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|focus| focus.tag() == tag)
    }
}

impl fmt::Display for AnalysisFocus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A file picked by the user, before validation.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk. The MIME type comes from the file's magic
    /// bytes, falling back to its extension.
    pub fn from_path(path: &Path) -> IntellexResult<Self> {
        let unreadable =
            |e: std::io::Error| IntellexError::input_error(format!("Could not read {}: {}", path.display(), e));

        // refuse oversized files before pulling them into memory
        let file = File::open(path).map_err(unreadable)?;
        if file.metadata().map_err(unreadable)?.len() > MAX_IMAGE_BYTES as u64 {
            return Err(IntellexError::input_error(IMAGE_TOO_LARGE));
        }
        let mut bytes = Vec::new();
        file.take(MAX_IMAGE_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(unreadable)?;

        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type().to_string())
            .ok()
            .or_else(|| detect_image_mime(path).map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Loaded {} ({} bytes, {})", name, bytes.len(), mime_type);
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Holds the currently selected image and analysis focus for the vision
/// screen.
#[derive(Debug, Clone, Default)]
pub struct ImageProducer {
    selected: Option<(String, Attachment)>,
    focus: AnalysisFocus,
}

impl ImageProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and selects `file`. A rejected file leaves the previous
    /// selection in place.
    pub fn select(&mut self, file: ImageFile) -> IntellexResult<()> {
        validate_image(&file)?;
        let attachment = Attachment::new(file.mime_type, file.bytes);
        if attachment.is_empty() {
            return Err(IntellexError::input_error(format!("{} is empty", file.name)));
        }
        self.selected = Some((file.name, attachment));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Attachment> {
        self.selected.as_ref().map(|(_, attachment)| attachment)
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_ref().map(|(name, _)| name.as_str())
    }

    pub fn focus(&self) -> AnalysisFocus {
        self.focus
    }

    pub fn set_focus(&mut self, focus: AnalysisFocus) {
        self.focus = focus;
    }

    /// Pairs the selected image with the optional question and focus tag.
    pub fn capture(&self, question: &str) -> IntellexResult<Prompt> {
        let (_, attachment) = self
            .selected
            .as_ref()
            .ok_or_else(|| IntellexError::input_error("Please select an image first (/image <path>)"))?;

        Ok(Prompt::with_attachment(
            image_prompt_text(question, self.focus),
            attachment.clone(),
        ))
    }
}

pub fn image_prompt_text(question: &str, focus: AnalysisFocus) -> String {
    let question = question.trim();
    let question = if question.is_empty() {
        DEFAULT_IMAGE_QUESTION
    } else {
        question
    };
    format!("{} with focus on {} analysis.", question, focus.tag())
}

fn validate_image(file: &ImageFile) -> IntellexResult<()> {
    if file.size() > MAX_IMAGE_BYTES {
        return Err(IntellexError::input_error(IMAGE_TOO_LARGE));
    }
    if !file.mime_type.starts_with("image/") {
        return Err(IntellexError::input_error(format!(
            "{} is not an image ({})",
            file.name, file.mime_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MIB: usize = 1024 * 1024;

    fn png(size: usize) -> ImageFile {
        ImageFile::new("photo.png", "image/png", vec![0u8; size])
    }

    #[test]
    fn test_rejects_six_mib() {
        let mut producer = ImageProducer::new();
        let err = producer.select(png(6 * MIB)).unwrap_err();
        assert!(matches!(err, IntellexError::InputValidation(_)));
        assert!(producer.selected().is_none());
    }

    #[test]
    fn test_accepts_four_mib() {
        let mut producer = ImageProducer::new();
        producer.select(png(4 * MIB)).unwrap();
        assert_eq!(producer.selected().map(|a| a.len()), Some(4 * MIB));
        assert_eq!(producer.selected_name(), Some("photo.png"));
    }

    #[test]
    fn test_limit_is_inclusive() {
        let mut producer = ImageProducer::new();
        assert!(producer.select(png(MAX_IMAGE_BYTES)).is_ok());
        assert!(producer.select(png(MAX_IMAGE_BYTES + 1)).is_err());
    }

    #[test]
    fn test_rejects_non_image_and_keeps_previous_selection() {
        let mut producer = ImageProducer::new();
        producer.select(png(10)).unwrap();

        let pdf = ImageFile::new("doc.pdf", "application/pdf", vec![1, 2, 3]);
        assert!(producer.select(pdf).is_err());
        assert_eq!(producer.selected_name(), Some("photo.png"));
    }

    #[test]
    fn test_rejects_empty_file_and_keeps_previous_selection() {
        let mut producer = ImageProducer::new();
        producer.select(png(16)).unwrap();

        let err = producer.select(png(0)).unwrap_err();
        assert_eq!(err.to_string(), "photo.png is empty");
        assert_eq!(producer.selected().map(Attachment::len), Some(16));
    }

    #[test]
    fn test_prompt_includes_focus() {
        let mut producer = ImageProducer::new();
        producer.select(png(10)).unwrap();
        producer.set_focus(AnalysisFocus::Colors);

        let prompt = producer.capture("What is in the picture?").unwrap();
        assert_eq!(
            prompt.text,
            "What is in the picture? with focus on colors analysis."
        );
        assert_eq!(prompt.attachment.unwrap().mime_type, "image/png");
    }

    #[test]
    fn test_prompt_defaults_question() {
        let mut producer = ImageProducer::new();
        producer.select(png(10)).unwrap();

        let prompt = producer.capture("   ").unwrap();
        assert_eq!(prompt.text, "Analyze this image with focus on general analysis.");
    }

    #[test]
    fn test_focus_parse() {
        assert_eq!(AnalysisFocus::parse("Faces"), Some(AnalysisFocus::Faces));
        assert_eq!(AnalysisFocus::parse("landscape"), None);
        assert_eq!(AnalysisFocus::Safety.label(), "Safety Check");
    }

    #[test]
    fn test_from_path_sniffs_png() {
        let mut file = tempfile::Builder::new().suffix(".bin").tempfile().unwrap();
        file.write_all(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR").unwrap();

        let image = ImageFile::from_path(file.path()).unwrap();
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_from_path_refuses_oversized_file_without_reading() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.as_file().set_len(64 * MIB as u64).unwrap();

        let err = ImageFile::from_path(file.path()).unwrap_err();
        assert_eq!(err.to_string(), "Image size should be less than 5MB");
    }

    #[test]
    fn test_from_path_accepts_file_at_limit() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.as_file().set_len(MAX_IMAGE_BYTES as u64).unwrap();

        let image = ImageFile::from_path(file.path()).unwrap();
        assert_eq!(image.size(), MAX_IMAGE_BYTES);
    }

    #[test]
    fn test_from_path_falls_back_to_extension() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(b"not really a jpeg").unwrap();

        let image = ImageFile::from_path(file.path()).unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }
}
