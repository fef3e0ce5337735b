// src/session.rs

use crate::{
    api::ModelGateway,
    capture::{InputCapture, InputStrategy, Prompt},
    constants::GATEWAY_ERROR_REPLY,
    conversation::ConversationStore,
    errors::{IntellexError, IntellexResult},
    models::{Message, MessageId, ModelId, Origin},
    render::ImageViewer,
    speaker::SpeechSynthesizer,
};
use log::{debug, error, info};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// The single request a conversation may have in flight.
#[derive(Debug, Default)]
pub struct PendingRequest {
    in_flight: Mutex<Option<Prompt>>,
}

impl PendingRequest {
    /// Marks `prompt` as in flight, or fails with `Busy` if another one
    /// already is. The slot is released when the guard drops.
    pub fn try_begin(&self, prompt: &Prompt) -> IntellexResult<PendingGuard<'_>> {
        let mut slot = self.lock();
        if let Some(current) = slot.as_ref() {
            debug!(
                "Refusing a new request; {} characters still in flight",
                current.text.chars().count()
            );
            return Err(IntellexError::Busy);
        }
        *slot = Some(prompt.clone());
        Ok(PendingGuard { pending: self })
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Prompt>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct PendingGuard<'a> {
    pending: &'a PendingRequest,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        *self.pending.lock() = None;
    }
}

/// One conversation: a store, the single-flight slot and the gateway it
/// talks to. The same manager serves every screen; only the strategy tag
/// differs.
pub struct ConversationManager<G> {
    gateway: G,
    strategy: InputStrategy,
    model: RwLock<ModelId>,
    store: Mutex<ConversationStore>,
    pending: PendingRequest,
    speaker: Option<Arc<dyn SpeechSynthesizer>>,
}

impl<G: ModelGateway> ConversationManager<G> {
    pub fn new(gateway: G, strategy: InputStrategy, model: ModelId) -> Self {
        Self {
            gateway,
            strategy,
            model: RwLock::new(model),
            store: Mutex::new(ConversationStore::new()),
            pending: PendingRequest::default(),
            speaker: None,
        }
    }

    /// Replies are read aloud on the voice screen when a speaker is set.
    pub fn with_speaker(mut self, speaker: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn strategy(&self) -> InputStrategy {
        self.strategy
    }

    pub fn model(&self) -> ModelId {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Takes effect from the next submission.
    pub fn set_model(&self, model: ModelId) {
        *self.model.write().unwrap_or_else(PoisonError::into_inner) = model;
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_busy()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.lock_store().snapshot().to_vec()
    }

    pub fn message(&self, id: MessageId) -> Option<Message> {
        self.lock_store().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_store().is_empty()
    }

    /// Starts a new conversation. Refused while a request is in flight so
    /// its reply cannot land in the fresh conversation.
    pub fn clear(&self) -> IntellexResult<()> {
        if self.is_busy() {
            return Err(IntellexError::Busy);
        }
        self.lock_store().clear();
        info!("Started a new {} conversation", self.strategy);
        Ok(())
    }

    /// Sends `prompt` and records the exchange.
    ///
    /// The user message is appended before the call. On success the reply is
    /// appended and returned. On gateway failure a generated placeholder is
    /// appended instead and the error is returned. Rejected submissions
    /// (`InputValidation`, `Busy`) leave the conversation untouched and never
    /// reach the gateway.
    pub async fn submit(&self, prompt: Prompt) -> IntellexResult<Message> {
        if prompt.text.trim().is_empty() {
            return Err(IntellexError::input_error("Please enter a message"));
        }

        let _pending = self.pending.try_begin(&prompt)?;
        let model = self.model();

        self.lock_store().append(
            Origin::User,
            prompt.text.clone(),
            prompt.attachment.clone(),
        );
        info!(
            "Submitting {} prompt to {} ({} chars{})",
            self.strategy,
            model,
            prompt.text.len(),
            if prompt.has_attachment() { ", with image" } else { "" }
        );

        match self.gateway.generate(&model, &prompt).await {
            Ok(text) => {
                let reply = self.lock_store().append(Origin::Generated, text, None).clone();
                self.speak(&reply);
                Ok(reply)
            }
            Err(e) => {
                error!("Error generating response: {}", e);
                self.lock_store()
                    .append(Origin::Generated, GATEWAY_ERROR_REPLY, None);
                Err(e)
            }
        }
    }

    fn speak(&self, reply: &Message) {
        if self.strategy != InputStrategy::SpeechTranscribed {
            return;
        }
        if let Some(speaker) = &self.speaker {
            speaker.speak(&reply.text);
        }
    }

    fn lock_store(&self) -> MutexGuard<'_, ConversationStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A feature screen: capture, then gateway call, then store append, then
/// render.
pub struct SessionScreen<G> {
    manager: Arc<ConversationManager<G>>,
    capture: InputCapture,
    viewer: ImageViewer,
}

impl<G: ModelGateway> SessionScreen<G> {
    pub fn new(gateway: G, model: ModelId, capture: InputCapture) -> Self {
        let manager = ConversationManager::new(gateway, capture.strategy(), model);
        Self::with_manager(Arc::new(manager), capture)
    }

    pub fn with_manager(manager: Arc<ConversationManager<G>>, capture: InputCapture) -> Self {
        Self {
            manager,
            capture,
            viewer: ImageViewer::default(),
        }
    }

    pub fn manager(&self) -> &Arc<ConversationManager<G>> {
        &self.manager
    }

    pub fn strategy(&self) -> InputStrategy {
        self.capture.strategy()
    }

    pub fn capture(&self) -> &InputCapture {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut InputCapture {
        &mut self.capture
    }

    pub fn viewer(&self) -> &ImageViewer {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut ImageViewer {
        &mut self.viewer
    }

    /// Captures a prompt from `typed` and submits it.
    pub async fn submit(&mut self, typed: &str) -> IntellexResult<Message> {
        if self.manager.is_busy() {
            return Err(IntellexError::Busy);
        }

        let prompt = self.capture.prompt(typed)?;
        let result = self.manager.submit(prompt).await;

        let rejected = matches!(&result, Err(e) if e.is_rejection());
        if !rejected {
            self.capture.reset_after_submit();
        }
        result
    }

    pub fn new_conversation(&mut self) -> IntellexResult<()> {
        self.manager.clear()?;
        self.viewer.collapse();
        Ok(())
    }
}
