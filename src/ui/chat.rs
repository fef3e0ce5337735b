// src/ui/chat.rs

use crate::{
    constants::{MODEL_LABEL, USER_LABEL},
    highlight::{highlight_code, is_known_language, plain_lines},
    models::Message,
    render::{blocks, thumbnail_line, CodeBlock, RenderBlock},
};
use chrono::Local;
use colored::{ColoredString, Colorize};
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use textwrap::{core::display_width, Options};

const GUTTER: &str = "│ ";
const CODE_BAR: &str = "▎";

/// Renders one message as terminal lines: a header, the body and, for
/// messages carrying an image, a thumbnail line.
pub fn render_message(message: &Message, width: usize, expanded: bool) -> Vec<String> {
    let width = width.max(24);
    let mut lines = vec![render_header(message)];

    if let Some(attachment) = &message.attachment {
        let marker = if expanded { " (open)" } else { "" };
        lines.push(format!(
            "{}{}{}",
            GUTTER.dimmed(),
            thumbnail_line(attachment).magenta(),
            marker.dimmed()
        ));
    }

    for block in blocks(&message.text) {
        match block {
            RenderBlock::Markdown(text) => {
                for line in render_markdown(text, width.saturating_sub(display_width(GUTTER))) {
                    lines.push(format!("{}{}", GUTTER.dimmed(), line));
                }
            }
            RenderBlock::Code(code) => lines.extend(render_code(&code)),
        }
    }

    lines
}

fn render_header(message: &Message) -> String {
    let time = message.created_at.with_timezone(&Local).format("%H:%M");
    let label = if message.is_user() {
        USER_LABEL.green().bold()
    } else {
        MODEL_LABEL.cyan().bold()
    };
    format!("{} {} {}", label, format!("#{}", message.id).dimmed(), time.to_string().dimmed())
}

fn render_code(code: &CodeBlock<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let label = code.language.unwrap_or("code");
    lines.push(format!("{}{}", GUTTER.dimmed(), format!("┌ {}", label).dimmed()));

    let body = match code.language {
        Some(language) if code.is_highlighted() && is_known_language(language) => {
            highlight_code(code.body, language)
        }
        _ => plain_lines(code.body),
    };
    for line in body {
        lines.push(format!("{}{} {}", GUTTER.dimmed(), CODE_BAR.bright_black(), line));
    }

    if !code.closed {
        lines.push(format!("{}{}", GUTTER.dimmed(), "└ (unterminated)".dimmed()));
    }
    lines
}

#[derive(Default)]
struct Style {
    strong: usize,
    emphasis: usize,
    heading: Option<HeadingLevel>,
    link: bool,
}

impl Style {
    fn apply(&self, text: &str) -> ColoredString {
        let mut styled = text.normal();
        if let Some(level) = self.heading {
            styled = styled.bold();
            if level == HeadingLevel::H1 {
                styled = styled.underline();
            }
        }
        if self.strong > 0 {
            styled = styled.bold();
        }
        if self.emphasis > 0 {
            styled = styled.italic();
        }
        if self.link {
            styled = styled.blue().underline();
        }
        styled
    }
}

/// Wraps a markdown span into styled lines no wider than `width` columns.
pub fn render_markdown(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut style = Style::default();
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut prefix = String::new();
    let mut quote_depth = 0usize;

    let flush = |current: &mut String, prefix: &mut String, lines: &mut Vec<String>, quote: usize| {
        if current.trim().is_empty() {
            current.clear();
            return;
        }
        let quote_bar = "┃ ".repeat(quote);
        let initial = format!("{}{}", quote_bar, prefix);
        let subsequent = format!("{}{}", quote_bar, " ".repeat(prefix.chars().count()));
        let options = Options::new(width.max(8))
            .initial_indent(&initial)
            .subsequent_indent(&subsequent);
        lines.extend(textwrap::wrap(current.trim(), options).into_iter().map(|l| l.into_owned()));
        current.clear();
        prefix.clear();
    };

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => style.heading = Some(level),
            Event::End(TagEnd::Heading(_)) => {
                flush(&mut current, &mut prefix, &mut lines, quote_depth);
                style.heading = None;
                lines.push(String::new());
            }
            Event::End(TagEnd::Paragraph) => {
                flush(&mut current, &mut prefix, &mut lines, quote_depth);
                if lists.is_empty() {
                    lines.push(String::new());
                }
            }
            Event::Start(Tag::Strong) => style.strong += 1,
            Event::End(TagEnd::Strong) => style.strong = style.strong.saturating_sub(1),
            Event::Start(Tag::Emphasis) => style.emphasis += 1,
            Event::End(TagEnd::Emphasis) => style.emphasis = style.emphasis.saturating_sub(1),
            Event::Start(Tag::Link { .. }) => style.link = true,
            Event::End(TagEnd::Link) => style.link = false,
            Event::Start(Tag::BlockQuote(_)) => quote_depth += 1,
            Event::End(TagEnd::BlockQuote(_)) => {
                flush(&mut current, &mut prefix, &mut lines, quote_depth);
                quote_depth = quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::List(start)) => {
                flush(&mut current, &mut prefix, &mut lines, quote_depth);
                lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
                if lists.is_empty() {
                    lines.push(String::new());
                }
            }
            Event::Start(Tag::Item) => {
                flush(&mut current, &mut prefix, &mut lines, quote_depth);
                let indent = "  ".repeat(lists.len().saturating_sub(1));
                let marker = match lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                prefix = format!("{}{}", indent, marker);
            }
            Event::End(TagEnd::Item) => flush(&mut current, &mut prefix, &mut lines, quote_depth),
            Event::Text(t) => current.push_str(&style.apply(&t).to_string()),
            Event::Code(t) => current.push_str(&t.yellow().to_string()),
            Event::SoftBreak => current.push(' '),
            Event::HardBreak => flush(&mut current, &mut prefix, &mut lines, quote_depth),
            Event::Rule => {
                flush(&mut current, &mut prefix, &mut lines, quote_depth);
                lines.push("─".repeat(width.min(40)).dimmed().to_string());
            }
            _ => {}
        }
    }
    flush(&mut current, &mut prefix, &mut lines, quote_depth);

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ConversationStore;
    use crate::models::{Attachment, Origin};

    fn strip_ansi(s: &str) -> String {
        let re = regex::Regex::new(r"\x1b\[[0-9;]*m").unwrap();
        re.replace_all(s, "").into_owned()
    }

    fn plain(lines: &[String]) -> Vec<String> {
        lines.iter().map(|l| strip_ansi(l)).collect()
    }

    #[test]
    fn test_markdown_strips_markers() {
        let lines = plain(&render_markdown("Some **bold** and *italic* and `code`.", 80));
        assert_eq!(lines, vec!["Some bold and italic and code.".to_string()]);
    }

    #[test]
    fn test_markdown_lists() {
        let lines = plain(&render_markdown("- one\n- two\n\n1. first\n2. second", 80));
        assert_eq!(lines, vec!["• one", "• two", "", "1. first", "2. second"]);
    }

    #[test]
    fn test_markdown_wraps() {
        let lines = plain(&render_markdown(&"lorem ipsum ".repeat(20), 30));
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 30));
    }

    #[test]
    fn test_wrapped_message_fits_width_with_gutter() {
        let mut store = ConversationStore::new();
        let message = store
            .append(Origin::Generated, "abcdefghijklmnopqr ".repeat(8), None)
            .clone();

        let lines = plain(&render_message(&message, 40, false));
        let body = &lines[1..];
        assert!(body.len() > 1);
        assert!(body.iter().all(|l| l.starts_with("│ ")));
        assert!(body.iter().all(|l| display_width(l) <= 40));
        // two 18-column words share a line only when the gutter is counted in columns
        assert!(body.iter().all(|l| display_width(l) == 39));
    }

    #[test]
    fn test_message_with_code_block() {
        let mut store = ConversationStore::new();
        let message = store
            .append(Origin::Generated, "Try this:\n```text\nhello\n```", None)
            .clone();

        let lines = plain(&render_message(&message, 80, false));
        assert!(lines[0].starts_with("Intellex #0"));
        assert!(lines.iter().any(|l| l == "│ Try this:"));
        assert!(lines.iter().any(|l| l == "│ ┌ text"));
        assert!(lines.iter().any(|l| l.ends_with("hello")));
    }

    #[test]
    fn test_message_with_attachment_shows_thumbnail() {
        let mut store = ConversationStore::new();
        let attachment = Attachment::new("image/png", vec![0u8; 10]);
        let message = store
            .append(Origin::User, "What is this?", Some(attachment))
            .clone();

        let collapsed = plain(&render_message(&message, 80, false));
        assert!(collapsed[0].starts_with("You #0"));
        assert_eq!(collapsed[1], "│ [image: image/png, 10 B]");

        let expanded = plain(&render_message(&message, 80, true));
        assert_eq!(expanded[1], "│ [image: image/png, 10 B] (open)");
    }

    #[test]
    fn test_only_known_languages_are_coloured() {
        let mut store = ConversationStore::new();
        let known = store
            .append(Origin::Generated, "```rust\nlet x = 1;\n```", None)
            .clone();
        let unknown = store
            .append(Origin::Generated, "```nonsense-lang\nlet x = 1;\n```", None)
            .clone();

        let coloured = render_message(&known, 80, false);
        assert!(coloured.iter().any(|l| l.contains("\x1b[38;2;")));

        let plain_body = plain(&render_message(&unknown, 80, false));
        assert!(plain_body.iter().any(|l| l == "│ ┌ nonsense-lang"));
        assert!(plain_body.iter().any(|l| l.ends_with("▎ let x = 1;")));
    }

    #[test]
    fn test_unclosed_fence_is_marked() {
        let mut store = ConversationStore::new();
        let message = store
            .append(Origin::Generated, "```rust\nfn main() {", None)
            .clone();

        let lines = plain(&render_message(&message, 80, false));
        assert_eq!(lines.last().map(String::as_str), Some("│ └ (unterminated)"));
    }
}
