// src/speaker.rs

use log::{debug, warn};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Reads text aloud. Fire-and-forget: callers never learn whether or when
/// playback finished.
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str);
}

/// Pipes the text into a shell command such as `espeak` or `say`.
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    command: String,
}

impl CommandSynthesizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(command: Option<&str>) -> Option<Self> {
        command
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
            .map(Self::new)
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str) {
        let command = self.command.clone();
        let text = text.to_string();

        tokio::spawn(async move {
            let child = Command::new("sh")
                .arg("-c")
                .arg(&command)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();

            let mut child = match child {
                Ok(child) => child,
                Err(e) => {
                    warn!("Failed to start speech command '{}': {}", command, e);
                    return;
                }
            };

            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    warn!("Failed to pipe text to speech command: {}", e);
                }
            }

            match child.wait().await {
                Ok(status) if !status.success() => {
                    warn!("Speech command exited with {}", status)
                }
                Ok(_) => debug!("Finished speaking {} chars", text.len()),
                Err(e) => warn!("Speech command failed: {}", e),
            }
        });
    }
}
