use super::types::Message;
use parking_lot::RwLock;
use std::sync::Arc;

/// Ordered, append-only conversation history for the current session.
///
/// Messages are never reordered or mutated; the only destructive operation
/// is a full clear. Clones share the same underlying sequence.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a message, preserving insertion order.
    ///
    /// Timestamps are clamped so the sequence stays non-decreasing even if
    /// the wall clock steps backwards between appends.
    pub fn append(&self, mut message: Message) -> Message {
        let mut messages = self.messages.write();
        if let Some(last) = messages.last() {
            if message.timestamp < last.timestamp {
                message.timestamp = last.timestamp;
            }
        }
        messages.push(message.clone());
        message
    }

    /// A read-only snapshot of the conversation
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    pub fn clear(&self) {
        self.messages.write().clear();
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{Message, Role};
    use chrono::Duration;

    #[test]
    fn test_append_preserves_order() {
        let store = ConversationStore::new();
        store.append(Message::user("one"));
        store.append(Message::assistant("two"));
        store.append(Message::user("three"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].content, "one");
        assert_eq!(snapshot[1].content, "two");
        assert_eq!(snapshot[2].content, "three");
    }

    #[test]
    fn test_clear() {
        let store = ConversationStore::new();
        store.append(Message::user("hello"));
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = ConversationStore::new();
        store.append(Message::user("hello"));

        let mut snapshot = store.snapshot();
        snapshot.clear();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_timestamps_never_decrease() {
        let store = ConversationStore::new();
        let first = Message::user("first");
        let anchor = first.timestamp;
        store.append(first);

        // Simulate a clock regression on the next message
        let mut second = Message::assistant("second");
        second.timestamp = anchor - Duration::seconds(5);
        store.append(second);

        let snapshot = store.snapshot();
        assert!(snapshot[1].timestamp >= snapshot[0].timestamp);
    }

    #[test]
    fn test_clones_share_history() {
        let store = ConversationStore::new();
        let view = store.clone();
        store.append(Message::user("hello"));
        assert_eq!(view.len(), 1);
    }
}
