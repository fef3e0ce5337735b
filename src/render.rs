// src/render.rs
//
// Splits message text into markdown spans and fenced code spans. Everything
// here is a pure function of the text; terminal styling lives in
// `highlight` and `ui::chat`.

use crate::errors::{IntellexError, IntellexResult};
use crate::models::{Attachment, MessageId};
use crate::utils::format_size;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;
use std::path::PathBuf;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(`{3,}|~{3,})\s*([A-Za-z0-9_+#.\-]+)?").expect("fence pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    pub language: Option<&'a str>,
    pub body: &'a str,
    /// False when the text ended before a closing fence.
    pub closed: bool,
}

impl CodeBlock<'_> {
    /// Only closed fences that name a language get syntax colouring.
    pub fn is_highlighted(&self) -> bool {
        self.closed && self.language.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderBlock<'a> {
    Markdown(&'a str),
    Code(CodeBlock<'a>),
}

/// Lazily yields the render blocks of `text`. Clone it, or call `blocks`
/// again, to start over.
pub fn blocks(text: &str) -> Blocks<'_> {
    Blocks { rest: text }
}

#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = RenderBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let (first, after_first) = split_line(self.rest);

            if let Some(fence) = parse_fence(first) {
                let (block, rest) = read_code(fence, after_first);
                self.rest = rest;
                return Some(RenderBlock::Code(block));
            }

            let (span, rest) = read_markdown(self.rest);
            self.rest = rest;
            if !span.trim().is_empty() {
                return Some(RenderBlock::Markdown(span));
            }
        }
        None
    }
}

struct Fence<'a> {
    marker: char,
    len: usize,
    language: Option<&'a str>,
}

fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let caps = FENCE.captures(line)?;
    let run = caps.get(1)?.as_str();
    let marker = run.chars().next()?;
    let language = caps.get(2).map(|m| m.as_str());
    Some(Fence {
        marker,
        len: run.len(),
        language,
    })
}

/// A closing fence is a bare run of the opening character, at least as long
/// as the opening run.
fn is_closing_fence(line: &str, fence: &Fence<'_>) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= fence.len && trimmed.chars().all(|c| c == fence.marker)
}

/// Returns the first line (without its newline) and the text after it.
fn split_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(idx) => (&text[..idx], &text[idx + 1..]),
        None => (text, ""),
    }
}

fn read_code<'a>(fence: Fence<'a>, text: &'a str) -> (CodeBlock<'a>, &'a str) {
    let mut offset = 0;
    let mut rest = text;

    while !rest.is_empty() {
        let (line, after) = split_line(rest);
        if is_closing_fence(line, &fence) {
            let body = text[..offset].strip_suffix('\n').unwrap_or(&text[..offset]);
            let block = CodeBlock {
                language: fence.language,
                body,
                closed: true,
            };
            return (block, after);
        }
        offset = text.len() - after.len();
        rest = after;
    }

    let block = CodeBlock {
        language: fence.language,
        body: text.strip_suffix('\n').unwrap_or(text),
        closed: false,
    };
    (block, "")
}

fn read_markdown(text: &str) -> (&str, &str) {
    let mut offset = 0;
    let mut rest = text;

    while !rest.is_empty() {
        let (line, after) = split_line(rest);
        if parse_fence(line).is_some() {
            break;
        }
        offset = text.len() - after.len();
        rest = after;
    }
    (&text[..offset], rest)
}

/// Which attachment, if any, is shown at full size. At most one is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageViewer {
    expanded: Option<MessageId>,
}

impl ImageViewer {
    /// Expands `id`, collapsing whatever was expanded before.
    pub fn expand(&mut self, id: MessageId) {
        self.expanded = Some(id);
    }

    pub fn collapse(&mut self) {
        self.expanded = None;
    }

    /// Returns true if `id` is expanded afterwards.
    pub fn toggle(&mut self, id: MessageId) -> bool {
        if self.expanded == Some(id) {
            self.expanded = None;
            false
        } else {
            self.expanded = Some(id);
            true
        }
    }

    pub fn expanded(&self) -> Option<MessageId> {
        self.expanded
    }

    pub fn is_expanded(&self, id: MessageId) -> bool {
        self.expanded == Some(id)
    }
}

/// Pixel dimensions of the attachment, if its bytes decode as an image.
pub fn image_dimensions(attachment: &Attachment) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(&attachment.data[..]))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// One-line placeholder shown in place of an image in the transcript.
pub fn thumbnail_line(attachment: &Attachment) -> String {
    match image_dimensions(attachment) {
        Some((w, h)) => format!(
            "[image: {}, {}, {}x{}]",
            attachment.mime_type,
            format_size(attachment.len()),
            w,
            h
        ),
        None => format!(
            "[image: {}, {}]",
            attachment.mime_type,
            format_size(attachment.len())
        ),
    }
}

/// Writes the attachment to the temp directory and hands it to the system
/// image viewer. Returns the written path.
pub fn open_full_size(id: MessageId, attachment: &Attachment) -> IntellexResult<PathBuf> {
    let extension = attachment
        .mime_type
        .strip_prefix("image/")
        .map(|sub| if sub == "jpeg" { "jpg" } else { sub })
        .unwrap_or("bin");
    let path = std::env::temp_dir().join(format!("intellex-{}.{}", id, extension));

    std::fs::write(&path, &attachment.data[..])?;
    debug!("Opening {} in the system viewer", path.display());
    open::that(&path).map_err(|e| {
        IntellexError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open {}: {}", path.display(), e),
        ))
    })?;
    Ok(path)
}
