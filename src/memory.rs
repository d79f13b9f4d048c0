//! Chat memory: the per-session message store bound to agent services.
//!
//! A [`ChatMemory`] is shared behind an `Arc` and mutated through `&self`, so the
//! same memory can be handed to several agents. [`ChatMemoryService`] keeps one
//! memory per [`MemoryId`], either a single fixed memory or one created on demand
//! by a provider closure.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::items::{Message, Role};
use crate::state::ConversationState;

/// Session key separating independent conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub String);

impl MemoryId {
    /// Key used when a method declares no memory-id parameter.
    pub fn default_id() -> Self {
        Self("default".to_string())
    }

    /// Fresh random key.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::default_id()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MemoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Ordered chat history store.
pub trait ChatMemory: Send + Sync + Debug {
    /// Stable identifier of this memory.
    fn id(&self) -> MemoryId;

    /// Appends a message, applying the memory's retention policy.
    fn add(&self, message: Message);

    /// Snapshot of the current history.
    fn messages(&self) -> Vec<Message>;

    /// Removes every message.
    fn clear(&self);

    /// Exposes this memory as a [`ConversationState`] when it carries one.
    fn into_conversation_state(self: Arc<Self>) -> Option<Arc<dyn ConversationState>> {
        None
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps the most recent `max_messages` messages.
///
/// A system message is pinned at the front and replaced when a different one is
/// added. When the window overflows the oldest non-system message is dropped; if
/// that message requested tool calls, the tool results that answered it go too.
#[derive(Debug)]
pub struct MessageWindowChatMemory {
    id: MemoryId,
    max_messages: usize,
    messages: Mutex<Vec<Message>>,
}

impl MessageWindowChatMemory {
    pub fn with_max_messages(max_messages: usize) -> Self {
        Self::with_id(MemoryId::default_id(), max_messages)
    }

    pub fn with_id(id: impl Into<MemoryId>, max_messages: usize) -> Self {
        Self {
            id: id.into(),
            max_messages,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    fn evict_overflow(&self, messages: &mut Vec<Message>) {
        while messages.len() > self.max_messages {
            let Some(idx) = messages.iter().position(|m| m.role != Role::System) else {
                break;
            };
            let evicted = messages.remove(idx);
            if evicted.has_tool_calls() {
                while messages.get(idx).is_some_and(|m| m.role == Role::Tool) {
                    messages.remove(idx);
                }
            }
        }
    }
}

impl ChatMemory for MessageWindowChatMemory {
    fn id(&self) -> MemoryId {
        self.id.clone()
    }

    fn add(&self, message: Message) {
        let mut messages = lock(&self.messages);
        if message.role == Role::System {
            if let Some(pos) = messages.iter().position(|m| m.role == Role::System) {
                if messages[pos] == message {
                    return;
                }
                messages.remove(pos);
            }
            messages.insert(0, message);
        } else {
            messages.push(message);
        }
        self.evict_overflow(&mut messages);
    }

    fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    fn clear(&self) {
        lock(&self.messages).clear();
    }
}

/// Creates the memory for a session key on first use.
pub type ChatMemoryProvider = Arc<dyn Fn(&MemoryId) -> Arc<dyn ChatMemory> + Send + Sync>;

#[derive(Clone)]
enum MemorySource {
    Fixed(Arc<dyn ChatMemory>),
    Provider(ChatMemoryProvider),
}

/// Resolves, caches and evicts chat memories per session key.
pub struct ChatMemoryService {
    source: MemorySource,
    memories: Mutex<HashMap<MemoryId, Arc<dyn ChatMemory>>>,
}

impl ChatMemoryService {
    /// Every session key resolves to the same memory.
    pub fn fixed(memory: Arc<dyn ChatMemory>) -> Self {
        Self {
            source: MemorySource::Fixed(memory),
            memories: Mutex::new(HashMap::new()),
        }
    }

    /// One memory per session key, created by `provider`.
    pub fn with_provider(provider: ChatMemoryProvider) -> Self {
        Self {
            source: MemorySource::Provider(provider),
            memories: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, id: &MemoryId) -> Arc<dyn ChatMemory> {
        match &self.source {
            MemorySource::Fixed(memory) => memory.clone(),
            MemorySource::Provider(provider) => lock(&self.memories)
                .entry(id.clone())
                .or_insert_with(|| provider(id))
                .clone(),
        }
    }

    pub fn get(&self, id: &MemoryId) -> Option<Arc<dyn ChatMemory>> {
        match &self.source {
            MemorySource::Fixed(memory) => Some(memory.clone()),
            MemorySource::Provider(_) => lock(&self.memories).get(id).cloned(),
        }
    }

    /// Drops the memory of a session. A fixed memory is cleared instead.
    pub fn evict(&self, id: &MemoryId) -> bool {
        match &self.source {
            MemorySource::Fixed(memory) => {
                memory.clear();
                true
            }
            MemorySource::Provider(_) => lock(&self.memories).remove(id).is_some(),
        }
    }

    /// Number of live provider-created memories.
    pub fn len(&self) -> usize {
        lock(&self.memories).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Debug for ChatMemoryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            MemorySource::Fixed(_) => "fixed",
            MemorySource::Provider(_) => "provider",
        };
        f.debug_struct("ChatMemoryService")
            .field("source", &kind)
            .field("sessions", &self.len())
            .finish()
    }
}
