// src/conversation.rs

use crate::models::{Attachment, Message, MessageId, Origin};
use chrono::Utc;

/// Ordered, append-only list of messages for one screen. Nothing is ever
/// edited in place; the only other mutation is clearing everything.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    next_id: u64,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new message and returns it. Ids keep increasing across
    /// `clear()` so they are never reused within a session.
    pub fn append(
        &mut self,
        origin: Origin,
        text: impl Into<String>,
        attachment: Option<Attachment>,
    ) -> &Message {
        let id = MessageId(self.next_id);
        self.next_id += 1;

        self.messages.push(Message {
            id,
            text: text.into(),
            origin,
            attachment,
            created_at: Utc::now(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Messages in display (and creation) order.
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        // ids are increasing, so binary search on them is valid
        self.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|idx| &self.messages[idx])
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut store = ConversationStore::new();
        store.append(Origin::User, "Hello", None);
        store.append(Origin::Generated, "Hi there", None);

        let texts: Vec<_> = store.snapshot().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["Hello", "Hi there"]);
        assert!(store.snapshot()[0].is_user());
        assert!(!store.snapshot()[1].is_user());
    }

    #[test]
    fn test_ids_are_monotonic_across_clear() {
        let mut store = ConversationStore::new();
        let first = store.append(Origin::User, "a", None).id;
        let second = store.append(Origin::Generated, "b", None).id;
        store.clear();
        let third = store.append(Origin::User, "c", None).id;

        assert!(first < second);
        assert!(second < third);
    }

    #[test]
    fn test_clear_then_snapshot_is_empty() {
        let mut store = ConversationStore::new();
        for i in 0..5 {
            store.append(Origin::User, format!("msg {}", i), None);
        }
        store.clear();

        assert!(store.snapshot().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_by_id() {
        let mut store = ConversationStore::new();
        store.append(Origin::User, "gone", None);
        store.clear();
        let kept = store.append(Origin::User, "kept", None).id;
        store.append(Origin::Generated, "reply", None);

        assert_eq!(store.get(kept).map(|m| m.text.as_str()), Some("kept"));
        assert!(store.get(MessageId(0)).is_none());
    }

    #[test]
    fn test_attachment_is_kept() {
        let mut store = ConversationStore::new();
        let attachment = Attachment::new("image/jpeg", vec![0xff, 0xd8]);
        store.append(Origin::User, "look", Some(attachment.clone()));

        assert_eq!(store.snapshot()[0].attachment, Some(attachment));
    }
}
