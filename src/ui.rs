// src/ui.rs
//
// Terminal front end: message rendering and the interactive prompt loop.

pub mod chat;
pub mod screen;

pub use chat::{render_markdown, render_message};
pub use screen::{parse_command, pick_strategy, run, Command, ScreenExit, ScreenSettings};
