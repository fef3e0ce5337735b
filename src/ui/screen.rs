// src/ui/screen.rs

use crate::{
    api::ModelGateway,
    capture::{AnalysisFocus, ImageFile, InputStrategy, ListenState, SpeechEvent},
    config::{get_config, update_config},
    errors::IntellexError,
    export::{save_export, ExportFormat},
    models::{MessageId, ModelId},
    render::open_full_size,
    session::SessionScreen,
    ui::chat::render_message,
};
use anyhow::Result;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, FuzzySelect, Select};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use std::borrow::Cow::{self, Borrowed, Owned};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

const COMMANDS: [&str; 12] = [
    "/help", "/new", "/model", "/export", "/image", "/focus", "/drop", "/view", "/listen",
    "/screen", "/clear", "/quit",
];

/// A slash command typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    New,
    Model(Option<String>),
    Export(ExportFormat),
    Image(PathBuf),
    Focus(Option<AnalysisFocus>),
    Drop,
    View(MessageId),
    Listen,
    Screen(Option<InputStrategy>),
    Quit,
}

/// Parses a line starting with `/`. Returns `None` for ordinary prompts.
pub fn parse_command(line: &str) -> Option<Result<Command, String>> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "help" | "?" => Ok(Command::Help),
        "new" | "clear" => Ok(Command::New),
        "model" => Ok(Command::Model((!arg.is_empty()).then(|| arg.to_string()))),
        "export" => {
            let arg = if arg.is_empty() { "text" } else { arg };
            arg.parse::<ExportFormat>()
                .map(Command::Export)
                .map_err(|e| e.to_string())
        }
        "image" if arg.is_empty() => Err("Usage: /image <path>".to_string()),
        "image" => Ok(Command::Image(PathBuf::from(arg))),
        "focus" if arg.is_empty() => Ok(Command::Focus(None)),
        "focus" => AnalysisFocus::parse(arg)
            .map(|f| Command::Focus(Some(f)))
            .ok_or_else(|| format!("Unknown focus '{}'", arg)),
        "drop" => Ok(Command::Drop),
        "view" => arg
            .trim_start_matches('#')
            .parse::<u64>()
            .map(|id| Command::View(MessageId(id)))
            .map_err(|_| "Usage: /view <message number>".to_string()),
        "listen" => Ok(Command::Listen),
        "screen" if arg.is_empty() => Ok(Command::Screen(None)),
        "screen" => InputStrategy::from_arg(arg)
            .map(|s| Command::Screen(Some(s)))
            .ok_or_else(|| format!("Unknown screen '{}' (expected chat, vis or ask)", arg)),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command '/{}'. Type /help for a list.", other)),
    };
    Some(command)
}

#[derive(Clone)]
struct CommandHelper {
    commands: Vec<String>,
}

impl CommandHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CommandHelper {}

impl Completer for CommandHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CommandHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CommandHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CommandHelper {}

pub struct ScreenSettings {
    pub export_dir: PathBuf,
    pub width: usize,
}

impl ScreenSettings {
    /// Width from `$COLUMNS`, falling back to 100 columns.
    pub fn terminal_width() -> usize {
        std::env::var("COLUMNS")
            .ok()
            .and_then(|c| c.parse().ok())
            .unwrap_or(100)
    }
}

/// How a screen was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenExit {
    Quit,
    Switch(InputStrategy),
}

enum Flow {
    Continue,
    Exit(ScreenExit),
}

/// Runs the interactive loop for one screen until the user quits or asks
/// for another screen.
pub async fn run<G: ModelGateway>(
    mut screen: SessionScreen<G>,
    settings: &ScreenSettings,
) -> Result<ScreenExit> {
    let mut rl: Editor<CommandHelper, DefaultHistory> = Editor::new()?;
    rl.set_helper(Some(CommandHelper::new()));

    print_banner(&screen);
    let mut exit = ScreenExit::Quit;
    let mut printed: Option<MessageId> = None;
    let mut prefill = String::new();

    loop {
        let prompt = prompt_for(&mut screen);
        let readline = if prefill.is_empty() {
            rl.readline(&prompt)
        } else {
            let initial = std::mem::take(&mut prefill);
            rl.readline_with_initial(&prompt, (initial.as_str(), ""))
        };

        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type /quit to exit.".yellow());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        };

        // an empty question is fine once an image is selected
        let has_image = screen
            .capture_mut()
            .image_mut()
            .is_some_and(|producer| producer.selected().is_some());
        if line.trim().is_empty() && !has_image {
            continue;
        }
        let _ = rl.add_history_entry(line.as_str());

        match parse_command(&line) {
            Some(Ok(command)) => {
                match handle_command(&mut screen, settings, command, &mut prefill).await {
                    Ok(Flow::Exit(how)) => {
                        exit = how;
                        break;
                    }
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("{}", e.to_string().red()),
                }
            }
            Some(Err(message)) => println!("{}", message.yellow()),
            None => submit(&mut screen, &line).await,
        }

        print_new_messages(&screen, settings, &mut printed);
    }

    if exit == ScreenExit::Quit {
        println!("{}", "Goodbye!".bright_green());
    }
    Ok(exit)
}

fn print_banner<G: ModelGateway>(screen: &SessionScreen<G>) {
    let strategy = screen.strategy();
    println!("{}", format!("=== {} ===", strategy.title()).bright_magenta().bold());
    println!("{}", strategy.description().bright_black());
    println!(
        "{}",
        format!("Model: {}. Type /help for commands.", screen.manager().model()).bright_black()
    );
    println!();
}

fn prompt_for<G: ModelGateway>(screen: &mut SessionScreen<G>) -> String {
    match screen.capture_mut().image_mut() {
        Some(producer) => match producer.selected_name() {
            Some(name) => format!("[{} · {}] > ", name, producer.focus()),
            None => format!("[no image · {}] > ", producer.focus()),
        },
        None => ">> ".to_string(),
    }
}

fn print_help(strategy: InputStrategy) {
    println!("{}", "Commands:".bold());
    println!("  /new              start a new conversation");
    println!("  /model [name]     switch the model");
    println!("  /export [text|docx]  save the conversation");
    println!("  /view <n>         open or close the image of message #n");
    if strategy == InputStrategy::ImageWithFocus {
        println!("  /image <path>     select an image to analyse");
        println!("  /focus [name]     choose the analysis focus");
        println!("  /drop             discard the selected image");
    }
    if strategy == InputStrategy::SpeechTranscribed {
        println!("  /listen           dictate a prompt (Ctrl-C stops)");
    }
    println!("  /screen [name]    switch to the chat, vis or ask screen");
    println!("  /quit             leave");
}

fn print_new_messages<G: ModelGateway>(
    screen: &SessionScreen<G>,
    settings: &ScreenSettings,
    printed: &mut Option<MessageId>,
) {
    for message in screen.manager().snapshot() {
        if printed.is_some_and(|last| message.id <= last) {
            continue;
        }
        let expanded = screen.viewer().is_expanded(message.id);
        for line in render_message(&message, settings.width, expanded) {
            println!("{}", line);
        }
        println!();
        *printed = Some(message.id);
    }
}

async fn submit<G: ModelGateway>(screen: &mut SessionScreen<G>, line: &str) {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Generating response...");
    pb.enable_steady_tick(Duration::from_millis(120));

    let result = screen.submit(line).await;
    pb.finish_and_clear();

    match result {
        Ok(reply) => debug!("Received reply #{} ({} chars)", reply.id, reply.text.len()),
        Err(IntellexError::InputValidation(msg)) => println!("{}", msg.yellow()),
        Err(IntellexError::Busy) => println!("{}", "Still waiting for the previous reply.".yellow()),
        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
    }
}

async fn handle_command<G: ModelGateway>(
    screen: &mut SessionScreen<G>,
    settings: &ScreenSettings,
    command: Command,
    prefill: &mut String,
) -> Result<Flow> {
    let strategy = screen.strategy();
    match command {
        Command::Help => print_help(strategy),
        Command::Quit => return Ok(Flow::Exit(ScreenExit::Quit)),
        Command::Screen(next) => {
            let next = match next {
                Some(next) => next,
                None => pick_strategy()?,
            };
            return Ok(Flow::Exit(ScreenExit::Switch(next)));
        }
        Command::New => {
            screen.new_conversation()?;
            println!("{}", "Started a new conversation.".bright_green());
        }
        Command::Model(name) => {
            let model = match name {
                Some(name) => ModelId::from(name),
                None => pick_model(&screen.manager().model())?,
            };
            if !model.is_supported() {
                warn!("Switching to unlisted model {}", model);
            }
            screen.manager().set_model(model.clone());
            println!("{}", format!("Using {} from the next message.", model).bright_green());

            let mut config = get_config();
            config.model = model;
            if let Err(e) = update_config(config) {
                warn!("Could not save the model choice: {}", e);
            }
        }
        Command::Export(format) => {
            let messages = screen.manager().snapshot();
            let path = save_export(format, &messages, &settings.export_dir)?;
            println!("{}", format!("Saved {}", path.display()).bright_green());
        }
        Command::View(id) => {
            let message = screen
                .manager()
                .message(id)
                .ok_or_else(|| anyhow::anyhow!("No message #{}", id))?;
            let attachment = message
                .attachment
                .ok_or_else(|| anyhow::anyhow!("Message #{} has no image", id))?;
            if screen.viewer_mut().toggle(id) {
                let path = open_full_size(id, &attachment)?;
                println!("{}", format!("Opened {}", path.display()).bright_green());
            } else {
                println!("{}", format!("Closed image #{}", id).bright_black());
            }
        }
        Command::Image(path) => {
            let producer = screen
                .capture_mut()
                .image_mut()
                .ok_or_else(|| anyhow::anyhow!("Images can only be attached on the vision screen"))?;
            let file = ImageFile::from_path(&path)?;
            producer.select(file)?;
            if let Some(name) = producer.selected_name() {
                println!("{}", format!("Selected {}", name).bright_green());
            }
        }
        Command::Focus(focus) => {
            let producer = screen
                .capture_mut()
                .image_mut()
                .ok_or_else(|| anyhow::anyhow!("Focus only applies on the vision screen"))?;
            let focus = match focus {
                Some(focus) => focus,
                None => pick_focus(producer.focus())?,
            };
            producer.set_focus(focus);
            println!("{}", format!("Focus: {}", focus.label()).bright_green());
        }
        Command::Drop => {
            if let Some(producer) = screen.capture_mut().image_mut() {
                producer.clear();
            }
        }
        Command::Listen => {
            if let Some(transcript) = listen(screen).await? {
                *prefill = transcript;
            }
        }
    }
    Ok(Flow::Continue)
}

fn pick_model(current: &ModelId) -> Result<ModelId> {
    let models = ModelId::supported();
    let names: Vec<&str> = models.iter().map(ModelId::as_str).collect();
    let default = models.iter().position(|m| m == current).unwrap_or(0);

    let selection = FuzzySelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a model")
        .default(default)
        .items(&names)
        .interact()?;
    Ok(models[selection].clone())
}

fn pick_focus(current: AnalysisFocus) -> Result<AnalysisFocus> {
    let labels: Vec<&str> = AnalysisFocus::ALL.iter().map(AnalysisFocus::label).collect();
    let default = AnalysisFocus::ALL
        .iter()
        .position(|f| *f == current)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Analysis focus")
        .default(default)
        .items(&labels)
        .interact()?;
    Ok(AnalysisFocus::ALL[selection])
}

/// Streams a transcription into the terminal until the recognizer ends or
/// Ctrl-C is pressed. Returns the text to place in the input field.
async fn listen<G: ModelGateway>(screen: &mut SessionScreen<G>) -> Result<Option<String>> {
    let speech = screen
        .capture_mut()
        .speech_mut()
        .ok_or_else(|| anyhow::anyhow!("Dictation is only available on the voice screen"))?;
    speech.start()?;
    println!("{}", "Listening... press Ctrl-C to stop.".bright_black());

    loop {
        tokio::select! {
            event = speech.next_event() => {
                let Some(event) = event else {
                    speech.stop();
                    break;
                };
                let is_transcript = matches!(event, SpeechEvent::Transcript(_));
                if speech.apply(event) == ListenState::Idle {
                    break;
                }
                if is_transcript {
                    print!("\r{} {}", "…".bright_black(), speech.field());
                    let _ = std::io::stdout().flush();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                speech.stop();
                break;
            }
        }
    }
    println!();

    if let Some(error) = speech.last_error() {
        println!("{}", format!("Speech recognition stopped: {}", error).dimmed());
    }
    let transcript = speech.field().to_string();
    Ok((!transcript.trim().is_empty()).then_some(transcript))
}

pub fn pick_strategy() -> Result<InputStrategy> {
    let strategies = InputStrategy::all();
    let items: Vec<String> = strategies
        .iter()
        .map(|s| format!("{} - {}", s.title(), s.description()))
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose a screen")
        .default(0)
        .items(&items)
        .interact()?;
    Ok(strategies[selection])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, String> {
        parse_command(line).expect("line is a command")
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(parse_command("hello there").is_none());
        assert!(parse_command("  what is /etc?").is_none());
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse("/new"), Ok(Command::New));
        assert_eq!(parse("/clear"), Ok(Command::New));
        assert_eq!(parse("/QUIT"), Ok(Command::Quit));
        assert_eq!(parse("/listen"), Ok(Command::Listen));
        assert_eq!(parse("/drop"), Ok(Command::Drop));
    }

    #[test]
    fn test_model_argument_is_optional() {
        assert_eq!(parse("/model"), Ok(Command::Model(None)));
        assert_eq!(
            parse("/model gemini-1.5-pro"),
            Ok(Command::Model(Some("gemini-1.5-pro".to_string())))
        );
    }

    #[test]
    fn test_export_formats() {
        assert_eq!(parse("/export"), Ok(Command::Export(ExportFormat::Text)));
        assert_eq!(parse("/export docx"), Ok(Command::Export(ExportFormat::Docx)));
        assert!(parse("/export rtf").is_err());
    }

    #[test]
    fn test_image_and_focus() {
        assert_eq!(
            parse("/image ~/pics/cat one.png"),
            Ok(Command::Image(PathBuf::from("~/pics/cat one.png")))
        );
        assert!(parse("/image").is_err());
        assert_eq!(parse("/focus"), Ok(Command::Focus(None)));
        assert_eq!(parse("/focus Text"), Ok(Command::Focus(Some(AnalysisFocus::Text))));
        assert!(parse("/focus vibes").is_err());
    }

    #[test]
    fn test_view_takes_message_number() {
        assert_eq!(parse("/view 3"), Ok(Command::View(MessageId(3))));
        assert_eq!(parse("/view #7"), Ok(Command::View(MessageId(7))));
        assert!(parse("/view abc").is_err());
    }

    #[test]
    fn test_screen_switch() {
        assert_eq!(parse("/screen"), Ok(Command::Screen(None)));
        assert_eq!(
            parse("/screen vis"),
            Ok(Command::Screen(Some(InputStrategy::ImageWithFocus)))
        );
        assert_eq!(
            parse("/screen ask"),
            Ok(Command::Screen(Some(InputStrategy::SpeechTranscribed)))
        );
        assert!(parse("/screen dashboard").is_err());
    }

    #[test]
    fn test_unknown_command() {
        assert!(parse("/dance").unwrap_err().contains("/dance"));
    }
}
