// src/capture/speech.rs

use super::{Prompt, TextProducer};
use crate::errors::{IntellexError, IntellexResult};
use log::{debug, warn};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

/// Signals emitted by a running transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// The full transcript so far. Replaces the previous one.
    Transcript(String),
    /// The host stopped listening on its own.
    End,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenState {
    #[default]
    Idle,
    Listening,
}

/// A host speech-to-text service.
pub trait SpeechRecognizer: Send {
    /// Begins a continuous transcription that reports through `events`.
    fn start(&mut self, events: mpsc::UnboundedSender<SpeechEvent>) -> IntellexResult<()>;

    /// Cancels the transcription. Must be safe to call when not started.
    fn stop(&mut self);
}

pub enum SpeechCapability {
    Available(Box<dyn SpeechRecognizer>),
    Unavailable,
}

impl SpeechCapability {
    /// A command-backed recognizer when a transcriber is configured.
    pub fn from_command(command: Option<&str>) -> Self {
        match command.map(str::trim).filter(|cmd| !cmd.is_empty()) {
            Some(cmd) => SpeechCapability::Available(Box::new(CommandRecognizer::new(cmd))),
            None => SpeechCapability::Unavailable,
        }
    }
}

/// Voice producer: `Idle -> Listening -> Idle`, with the transcript written
/// into a text field the user can still edit before submitting.
pub struct SpeechCapture {
    capability: SpeechCapability,
    state: ListenState,
    field: String,
    last_error: Option<String>,
    events: Option<mpsc::UnboundedReceiver<SpeechEvent>>,
}

impl SpeechCapture {
    pub fn new(capability: SpeechCapability) -> Self {
        Self {
            capability,
            state: ListenState::Idle,
            field: String::new(),
            last_error: None,
            events: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self.capability, SpeechCapability::Available(_))
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == ListenState::Listening
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn start(&mut self) -> IntellexResult<()> {
        if self.is_listening() {
            return Ok(());
        }
        let SpeechCapability::Available(recognizer) = &mut self.capability else {
            return Err(IntellexError::transcription_error(
                "speech recognition is not available (set transcriber_command in the config)",
            ));
        };

        let (tx, rx) = mpsc::unbounded_channel();
        recognizer.start(tx)?;

        self.field.clear();
        self.last_error = None;
        self.events = Some(rx);
        self.state = ListenState::Listening;
        debug!("Speech capture started");
        Ok(())
    }

    /// Stops the transcription stream only; an in-flight generation request
    /// is not affected.
    pub fn stop(&mut self) {
        if !self.is_listening() {
            return;
        }
        self.halt_recognizer();
        debug!("Speech capture stopped");
    }

    pub fn toggle(&mut self) -> IntellexResult<ListenState> {
        if self.is_listening() {
            self.stop();
        } else {
            self.start()?;
        }
        Ok(self.state)
    }

    /// Waits for the next event of the running transcription. Returns `None`
    /// when idle or when the recognizer has gone away.
    pub async fn next_event(&mut self) -> Option<SpeechEvent> {
        match self.events.as_mut() {
            Some(rx) if self.state == ListenState::Listening => rx.recv().await,
            _ => None,
        }
    }

    pub fn apply(&mut self, event: SpeechEvent) -> ListenState {
        if !self.is_listening() {
            return self.state;
        }
        match event {
            SpeechEvent::Transcript(text) => self.field = text,
            SpeechEvent::End => {
                self.halt_recognizer();
                debug!("Speech capture ended by host");
            }
            SpeechEvent::Error(msg) => {
                warn!("Speech recognition error: {}", msg);
                self.last_error = Some(msg);
                self.halt_recognizer();
            }
        }
        self.state
    }

    /// Stops listening if needed and turns the (possibly edited) field text
    /// into a prompt.
    pub fn capture(&mut self, typed: &str) -> IntellexResult<Prompt> {
        self.stop();
        let prompt = TextProducer.capture(typed)?;
        self.field.clear();
        Ok(prompt)
    }

    fn halt_recognizer(&mut self) {
        if let SpeechCapability::Available(recognizer) = &mut self.capability {
            recognizer.stop();
        }
        self.events = None;
        self.state = ListenState::Idle;
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs an external transcriber through `sh -c`. Every non-empty stdout
/// line is a finished segment; the cumulative transcript is reported after
/// each one. Exit status 0 means the input ended normally.
///
/// `start` must be called from within a tokio runtime.
pub struct CommandRecognizer {
    command: String,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl CommandRecognizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            stop_tx: None,
        }
    }
}

impl SpeechRecognizer for CommandRecognizer {
    fn start(&mut self, events: mpsc::UnboundedSender<SpeechEvent>) -> IntellexResult<()> {
        self.stop();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                IntellexError::transcription_error(format!("failed to start transcriber: {}", e))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| IntellexError::transcription_error("transcriber has no stdout"))?;

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        self.stop_tx = Some(stop_tx);

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut transcript = String::new();

            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        let _ = child.kill().await;
                        return;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(segment)) => {
                            let segment = segment.trim();
                            if segment.is_empty() {
                                continue;
                            }
                            if !transcript.is_empty() {
                                transcript.push(' ');
                            }
                            transcript.push_str(segment);
                            if events.send(SpeechEvent::Transcript(transcript.clone())).is_err() {
                                let _ = child.kill().await;
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = events.send(SpeechEvent::Error(e.to_string()));
                            let _ = child.kill().await;
                            return;
                        }
                    }
                }
            }

            let last = match child.wait().await {
                Ok(status) if status.success() => SpeechEvent::End,
                Ok(status) => SpeechEvent::Error(format!("transcriber exited with {}", status)),
                Err(e) => SpeechEvent::Error(e.to_string()),
            };
            let _ = events.send(last);
        });

        Ok(())
    }

    fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
