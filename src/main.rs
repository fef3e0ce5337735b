// src/main.rs

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use intellex::{
    api::GeminiClient,
    auth::{Authenticator, CapabilityToken, StaticAuthenticator},
    capture::{InputCapture, InputStrategy, SpeechCapability},
    config::{config_dir, get_config, initialize_config, Config},
    logging::init_logging,
    session::{ConversationManager, SessionScreen},
    speaker::CommandSynthesizer,
    ui::{self, ScreenExit, ScreenSettings},
};
use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

const MAX_SIGN_IN_ATTEMPTS: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    initialize_config().context("Failed to load configuration")?;
    let config = get_config();
    let _logger = init_logging(&config.log_level, &config_dir()?.join("logs"))?;
    info!("Starting intellex with model {}", config.model);

    if let Some(authenticator) = StaticAuthenticator::from_config(config.login.as_ref()) {
        let token = sign_in(&authenticator).await?;
        info!("Session {} opened for {}", token.id, token.email);
    }

    let mut strategy = match env::args().nth(1) {
        Some(arg) => InputStrategy::from_arg(&arg)
            .ok_or_else(|| anyhow!("Unknown screen '{}' (expected chat, vis or ask)", arg))?,
        None => ui::pick_strategy()?,
    };
    let settings = ScreenSettings {
        export_dir: export_dir(&config),
        width: ScreenSettings::terminal_width(),
    };

    loop {
        let screen = open_screen(strategy)?;
        match ui::run(screen, &settings).await? {
            ScreenExit::Quit => break,
            ScreenExit::Switch(next) => {
                info!("Switching from {} to {}", strategy, next);
                strategy = next;
            }
        }
    }
    Ok(())
}

/// Builds a fresh screen, with its own empty conversation, from the active
/// config.
fn open_screen(strategy: InputStrategy) -> Result<SessionScreen<GeminiClient>> {
    let config = get_config();
    let gateway = GeminiClient::from_config(&config)?;
    let speech = SpeechCapability::from_command(config.transcriber_command.as_deref());
    if strategy == InputStrategy::SpeechTranscribed && !matches!(speech, SpeechCapability::Available(_)) {
        warn!("No transcriber configured; dictation is disabled");
        println!(
            "{}",
            "Speech recognition is not configured; type your prompts instead.".yellow()
        );
    }

    let mut manager = ConversationManager::new(gateway, strategy, config.model.clone());
    if config.speak_responses {
        if let Some(synth) = CommandSynthesizer::from_config(config.speech_command.as_deref()) {
            manager = manager.with_speaker(Arc::new(synth));
        }
    }

    let capture = InputCapture::for_strategy(strategy, speech);
    Ok(SessionScreen::with_manager(Arc::new(manager), capture))
}

async fn sign_in(authenticator: &impl Authenticator) -> Result<CapabilityToken> {
    let theme = ColorfulTheme::default();
    for attempt in 1..=MAX_SIGN_IN_ATTEMPTS {
        let email: String = Input::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()?;
        let password = Password::with_theme(&theme)
            .with_prompt("Password")
            .interact()?;

        match authenticator.authenticate(&email, &password).await {
            Ok(token) => return Ok(token),
            Err(e) => {
                println!("{}", e.to_string().red());
                warn!("Sign-in attempt {} failed", attempt);
            }
        }
    }
    Err(anyhow!("Too many failed sign-in attempts"))
}

fn export_dir(config: &Config) -> PathBuf {
    config
        .export_dir
        .clone()
        .or_else(dirs::document_dir)
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}
