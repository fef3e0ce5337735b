// src/highlight.rs

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::as_24_bit_terminal_escaped;

const THEME_NAME: &str = "base16-ocean.dark";
const RESET: &str = "\x1b[0m";

struct HighlightAssets {
    syntax_set: SyntaxSet,
    theme: Theme,
}

// Loaded once per process; loading the default sets is slow.
static ASSETS: Lazy<Option<HighlightAssets>> = Lazy::new(|| {
    let syntax_set = SyntaxSet::load_defaults_newlines();
    let mut theme_set = ThemeSet::load_defaults();
    let theme = theme_set
        .themes
        .remove(THEME_NAME)
        .or_else(|| theme_set.themes.into_values().next())?;
    Some(HighlightAssets { syntax_set, theme })
});

fn aliases(token: &str) -> Vec<String> {
    let lower = token.trim().to_ascii_lowercase();
    let extra: &[&str] = match lower.as_str() {
        "ts" | "typescript" | "tsx" => &["typescript", "ts", "javascript", "js"],
        "js" | "javascript" | "jsx" | "mjs" | "cjs" => &["javascript", "js"],
        "py" | "python" | "python3" => &["python", "py"],
        "rs" | "rust" => &["rust", "rs"],
        "sh" | "bash" | "shell" | "zsh" | "console" => &["bash", "sh"],
        "c++" | "cpp" | "cxx" => &["cpp", "c++"],
        "c#" | "csharp" | "cs" => &["cs", "c#"],
        "golang" | "go" => &["go"],
        "yml" | "yaml" => &["yaml", "yml"],
        "md" | "markdown" => &["markdown", "md"],
        "kt" | "kotlin" => &["java"],
        _ => &[],
    };

    let mut out: Vec<String> = extra.iter().map(|s| s.to_string()).collect();
    if !out.contains(&lower) {
        out.push(lower);
    }
    out
}

fn is_plain_text(syntax: &SyntaxReference) -> bool {
    syntax.name.eq_ignore_ascii_case("Plain Text")
}

fn syntax_for<'a>(syntax_set: &'a SyntaxSet, language: &str) -> Option<&'a SyntaxReference> {
    let candidates = aliases(language);

    candidates
        .iter()
        .find_map(|c| syntax_set.find_syntax_by_token(c).filter(|s| !is_plain_text(s)))
        .or_else(|| {
            candidates.iter().find_map(|c| {
                syntax_set
                    .syntaxes()
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(c))
                    .filter(|s| !is_plain_text(s))
            })
        })
}

/// True if `language` maps to a known syntax definition.
pub fn is_known_language(language: &str) -> bool {
    ASSETS
        .as_ref()
        .and_then(|assets| syntax_for(&assets.syntax_set, language))
        .is_some()
}

/// Colours `body` for a 24-bit terminal, one string per line. Unknown
/// languages, or a highlighting failure, fall back to the plain lines.
pub fn highlight_code(body: &str, language: &str) -> Vec<String> {
    highlighted_lines(body, language).unwrap_or_else(|| plain_lines(body))
}

pub fn plain_lines(body: &str) -> Vec<String> {
    body.lines().map(str::to_string).collect()
}

fn highlighted_lines(body: &str, language: &str) -> Option<Vec<String>> {
    let assets = ASSETS.as_ref()?;
    let syntax = syntax_for(&assets.syntax_set, language)?;
    let mut highlighter = HighlightLines::new(syntax, &assets.theme);

    let mut out = Vec::new();
    for line in body.lines() {
        let with_newline = format!("{}\n", line);
        let ranges = highlighter
            .highlight_line(&with_newline, &assets.syntax_set)
            .ok()?;
        let escaped = as_24_bit_terminal_escaped(&ranges, false);
        out.push(format!("{}{}", escaped.trim_end_matches('\n'), RESET));
    }
    Some(out)
}
