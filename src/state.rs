//! Conversation state: chat history plus a key/value scratchpad.
//!
//! The state owns a [`ChatMemory`] and delegates the memory contract to it, so any
//! agent service can be bound to a state exactly like to a plain memory. Hooks use
//! the scratchpad to remember decisions across invocations of the same session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::items::Message;
use crate::memory::{lock, ChatMemory, MemoryId, MessageWindowChatMemory};

/// A chat memory that also carries arbitrary per-session values.
pub trait ConversationState: ChatMemory {
    /// Inserts or overwrites a value.
    fn write_state(&self, key: &str, value: Value);

    fn has_state(&self, key: &str) -> bool;

    /// `None` when the key was never written.
    fn read_state(&self, key: &str) -> Option<Value>;
}

/// [`ConversationState`] over any chat memory.
#[derive(Debug)]
pub struct DefaultConversationState {
    memory: Arc<dyn ChatMemory>,
    states: Mutex<HashMap<String, Value>>,
}

impl DefaultConversationState {
    pub fn new(memory: Arc<dyn ChatMemory>) -> Self {
        Self {
            memory,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// State over a fresh [`MessageWindowChatMemory`].
    pub fn with_max_messages(max_messages: usize) -> Self {
        Self::new(Arc::new(MessageWindowChatMemory::with_max_messages(
            max_messages,
        )))
    }
}

impl ChatMemory for DefaultConversationState {
    fn id(&self) -> MemoryId {
        self.memory.id()
    }

    fn add(&self, message: Message) {
        self.memory.add(message);
    }

    fn messages(&self) -> Vec<Message> {
        self.memory.messages()
    }

    fn clear(&self) {
        self.memory.clear();
    }

    fn into_conversation_state(self: Arc<Self>) -> Option<Arc<dyn ConversationState>> {
        Some(self)
    }
}

impl ConversationState for DefaultConversationState {
    fn write_state(&self, key: &str, value: Value) {
        lock(&self.states).insert(key.to_string(), value);
    }

    fn has_state(&self, key: &str) -> bool {
        lock(&self.states).contains_key(key)
    }

    fn read_state(&self, key: &str) -> Option<Value> {
        lock(&self.states).get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_scratchpad_and_history_are_independent() {
        let state = DefaultConversationState::with_max_messages(10);
        state.add(Message::user("I broke my leg"));
        state.write_state("expertType", json!("medical"));

        state.clear();
        assert!(state.messages().is_empty());
        assert_eq!(state.read_state("expertType"), Some(json!("medical")));

        state.write_state("turns", json!(2));
        state.add(Message::assistant("ok"));
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn test_read_absent_key() {
        let state = DefaultConversationState::with_max_messages(10);
        assert!(!state.has_state("missing"));
        assert_eq!(state.read_state("missing"), None);
    }

    #[test]
    fn test_id_is_delegated_and_stable() {
        let memory = Arc::new(MessageWindowChatMemory::with_id("session-7", 10));
        let state = DefaultConversationState::new(memory);
        assert_eq!(state.id(), MemoryId::from("session-7"));
        state.write_state("k", json!(1));
        state.clear();
        assert_eq!(state.id(), MemoryId::from("session-7"));
    }

    #[test]
    fn test_surfaces_as_conversation_state() {
        let memory: Arc<dyn ChatMemory> = Arc::new(DefaultConversationState::with_max_messages(4));
        let state = memory.clone().into_conversation_state().expect("state");
        state.write_state("k", json!(true));
        state.add(Message::user("hello"));
        assert_eq!(memory.messages().len(), 1);
    }

    proptest! {
        #[test]
        fn last_write_wins(key in "[a-zA-Z]{1,12}", v1 in any::<i64>(), v2 in any::<i64>()) {
            let state = DefaultConversationState::with_max_messages(4);
            state.write_state(&key, json!(v1));
            state.write_state(&key, json!(v2));
            prop_assert!(state.has_state(&key));
            prop_assert_eq!(state.read_state(&key), Some(json!(v2)));
        }

        #[test]
        fn clear_keeps_scratchpad(key in "[a-z]{1,8}", text in ".{0,40}") {
            let state = DefaultConversationState::with_max_messages(4);
            state.write_state(&key, json!(text.clone()));
            state.add(Message::user(text.clone()));
            state.clear();
            prop_assert!(state.messages().is_empty());
            prop_assert_eq!(state.read_state(&key), Some(json!(text)));
        }
    }
}
