// src/export.rs

use crate::{
    constants::{EXPORT_BASENAME, EXPORT_LINES_PER_PAGE, EXPORT_WRAP_WIDTH, MODEL_LABEL, USER_LABEL},
    errors::{IntellexError, IntellexResult},
    models::Message,
};
use log::info;
use quick_xml::escape::escape;
use std::fmt;
use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const PAGE_BREAK: char = '\u{0c}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Docx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Docx => "docx",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", EXPORT_BASENAME, self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = IntellexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" | "pdf" => Ok(ExportFormat::Text),
            "docx" | "word" => Ok(ExportFormat::Docx),
            other => Err(IntellexError::export_error(format!(
                "Unknown export format '{}' (expected text or docx)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn speaker(message: &Message) -> &'static str {
    if message.is_user() {
        USER_LABEL
    } else {
        MODEL_LABEL
    }
}

/// Lays the conversation out as paginated plain text. Pages hold at most
/// `lines_per_page` lines and are separated by a form feed.
pub fn export_text(messages: &[Message], width: usize, lines_per_page: usize) -> String {
    let width = width.max(20);
    let lines_per_page = lines_per_page.max(1);

    let mut lines: Vec<String> = Vec::new();
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        let labelled = format!("{}: {}", speaker(message), message.text);
        for paragraph in labelled.lines() {
            if paragraph.trim().is_empty() {
                lines.push(String::new());
                continue;
            }
            lines.extend(textwrap::wrap(paragraph, width).into_iter().map(|l| l.into_owned()));
        }
    }

    let mut pages: Vec<Vec<String>> = Vec::new();
    for line in lines {
        match pages.last_mut() {
            Some(page) if page.len() < lines_per_page => page.push(line),
            // never open a page with a separator line
            _ if line.is_empty() => {}
            _ => pages.push(vec![line]),
        }
    }

    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push(PAGE_BREAK);
        }
        for line in page {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn document_xml(messages: &[Message]) -> String {
    let mut body = String::new();
    for message in messages {
        let text = format!("{}: {}", speaker(message), message.text);
        body.push_str("<w:p>");
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                body.push_str("<w:r><w:br/></w:r>");
            }
            body.push_str(r#"<w:r><w:t xml:space="preserve">"#);
            body.push_str(&escape(line));
            body.push_str("</w:t></w:r>");
        }
        body.push_str("</w:p>");
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    )
}

/// Writes the conversation as a minimal `.docx` package, one paragraph per
/// message.
pub fn export_docx<W: Write + Seek>(messages: &[Message], writer: W) -> IntellexResult<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES.as_bytes())?;
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS.as_bytes())?;
    zip.start_file("word/document.xml", options)?;
    zip.write_all(document_xml(messages).as_bytes())?;

    Ok(zip.finish()?)
}

/// Exports into `dir` (created if missing) and returns the written file.
pub fn save_export(
    format: ExportFormat,
    messages: &[Message],
    dir: &Path,
) -> IntellexResult<PathBuf> {
    if messages.is_empty() {
        return Err(IntellexError::export_error("Nothing to export yet"));
    }

    fs::create_dir_all(dir)?;
    let path = dir.join(format.file_name());

    match format {
        ExportFormat::Text => {
            let text = export_text(messages, EXPORT_WRAP_WIDTH, EXPORT_LINES_PER_PAGE);
            fs::write(&path, text)?;
        }
        ExportFormat::Docx => {
            let file = File::create(&path)?;
            export_docx(messages, file)?.flush()?;
        }
    }

    info!("Exported {} messages to {}", messages.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationStore;
    use crate::models::Origin;
    use std::io::{Cursor, Read};

    fn sample() -> Vec<Message> {
        let mut store = ConversationStore::new();
        store.append(Origin::User, "Hello", None);
        store.append(Origin::Generated, "Hi there <friend> & co", None);
        store.snapshot().to_vec()
    }

    #[test]
    fn test_text_export_labels_and_separates() {
        let text = export_text(&sample(), 80, 38);
        assert_eq!(text, "You: Hello\n\nIntellex: Hi there <friend> & co\n");
    }

    #[test]
    fn test_text_export_wraps_long_lines() {
        let mut store = ConversationStore::new();
        store.append(Origin::User, "word ".repeat(30), None);
        let text = export_text(store.snapshot(), 40, 38);

        assert!(text.lines().count() > 1);
        assert!(text.lines().all(|l| l.chars().count() <= 40));
        assert!(text.starts_with("You: word"));
    }

    #[test]
    fn test_text_export_paginates() {
        let mut store = ConversationStore::new();
        for i in 0..10 {
            store.append(Origin::User, format!("line {}", i), None);
        }
        let text = export_text(store.snapshot(), 80, 5);
        let pages: Vec<&str> = text.split(PAGE_BREAK).collect();

        // 10 messages + 9 separators = 19 lines; leading separators are dropped
        assert_eq!(pages.len(), 4);
        assert!(pages.iter().all(|p| p.lines().count() <= 5));
        assert!(pages.iter().all(|p| !p.starts_with('\n')));
        assert!(pages[3].contains("line 9"));
    }

    #[test]
    fn test_docx_contains_escaped_messages() {
        let cursor = export_docx(&sample(), Cursor::new(Vec::new())).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();

        assert!(archive.by_name("[Content_Types].xml").is_ok());
        assert!(archive.by_name("_rels/.rels").is_ok());

        let mut document = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut document)
            .unwrap();
        assert!(document.contains("You: Hello"));
        assert!(document.contains("Intellex: Hi there &lt;friend&gt; &amp; co"));
        assert_eq!(document.matches("<w:p>").count(), 2);
    }

    #[test]
    fn test_save_export_writes_named_files() {
        let dir = tempfile::tempdir().unwrap();
        let messages = sample();

        let txt = save_export(ExportFormat::Text, &messages, dir.path()).unwrap();
        let docx = save_export(ExportFormat::Docx, &messages, &dir.path().join("nested")).unwrap();

        assert_eq!(txt.file_name().unwrap(), "chat-history.txt");
        assert_eq!(docx.file_name().unwrap(), "chat-history.docx");
        assert!(fs::read_to_string(txt).unwrap().starts_with("You: Hello"));
        assert!(fs::metadata(docx).unwrap().len() > 0);
    }

    #[test]
    fn test_empty_conversation_is_not_exported() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_export(ExportFormat::Text, &[], dir.path()).unwrap_err();
        assert!(matches!(err, IntellexError::Export(_)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("docx".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert_eq!("TEXT".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("rtf".parse::<ExportFormat>().is_err());
    }
}
