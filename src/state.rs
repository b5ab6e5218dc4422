//! Per-chat conversation state.
//!
//! A chat is either idle (plain chatting) or waiting for the prompt of an
//! image request. The state lives in a [`StateStore`], the in-memory one is
//! [`InMemStateStore`]. [`ConversationTracker`] wraps a store and also hands
//! out per-chat locks so updates of the same chat are handled one at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use teloxide::types::ChatId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Idle,
    AwaitingImagePrompt,
}

/// Storage backend for the chat modes. A missing entry means [`Mode::Idle`].
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, chat_id: ChatId) -> Option<Mode>;

    async fn set(&self, chat_id: ChatId, mode: Mode);

    async fn remove(&self, chat_id: ChatId);
}

#[derive(Default)]
pub struct InMemStateStore {
    modes: Mutex<HashMap<ChatId, Mode>>,
}

impl InMemStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_modes<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut HashMap<ChatId, Mode>) -> R,
    {
        let mut modes = self.modes.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut modes)
    }
}

#[async_trait]
impl StateStore for InMemStateStore {
    async fn get(&self, chat_id: ChatId) -> Option<Mode> {
        self.with_modes(|modes| modes.get(&chat_id).copied())
    }

    async fn set(&self, chat_id: ChatId, mode: Mode) {
        self.with_modes(|modes| {
            if mode == Mode::Idle {
                modes.remove(&chat_id);
            } else {
                modes.insert(chat_id, mode);
            }
        });
    }

    async fn remove(&self, chat_id: ChatId) {
        self.with_modes(|modes| {
            modes.remove(&chat_id);
        });
    }
}

/// Keeps one async mutex per chat that currently has work in flight.
#[derive(Default)]
struct ChatLocks {
    locks: Mutex<HashMap<ChatId, Arc<AsyncMutex<()>>>>,
}

impl ChatLocks {
    async fn lock(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        let chat_lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Nobody but the map holds these anymore.
            locks.retain(|id, lock| *id == chat_id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(chat_id).or_default())
        };
        chat_lock.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Tracks the [`Mode`] of every chat on top of a [`StateStore`].
#[derive(Clone)]
pub struct ConversationTracker {
    store: Arc<dyn StateStore>,
    locks: Arc<ChatLocks>,
}

impl ConversationTracker {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: Arc::new(ChatLocks::default()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemStateStore::new()))
    }

    pub async fn get_mode(&self, chat_id: ChatId) -> Mode {
        self.store.get(chat_id).await.unwrap_or_default()
    }

    pub async fn set_awaiting(&self, chat_id: ChatId) {
        self.store.set(chat_id, Mode::AwaitingImagePrompt).await;
    }

    pub async fn clear(&self, chat_id: ChatId) {
        self.store.remove(chat_id).await;
    }

    /// Waits until no other update of `chat_id` is being handled. The chat
    /// stays locked until the returned guard is dropped.
    pub async fn lock(&self, chat_id: ChatId) -> OwnedMutexGuard<()> {
        self.locks.lock(chat_id).await
    }
}
