//! Per-chat session state between the URL probe and the format choice.

use dashmap::DashMap;
use teloxide::types::ChatId;
use url::Url;

use crate::download::MediaInfo;

/// What we remember about a chat's last URL. Replaced wholesale when a new
/// URL arrives; a job already running off the old session is unaffected.
#[derive(Debug, Clone)]
pub struct Session {
    pub url: Url,
    pub info: MediaInfo,
    /// The status message carrying the format keyboard; edited in place as
    /// the job progresses.
    pub status_message: teloxide::types::MessageId,
    /// True when the status message is a photo (thumbnail) whose caption is
    /// edited instead of its text.
    pub status_is_caption: bool,
}

/// Process-wide session store keyed by chat. Each chat's entry is written
/// only from that chat's own update handlers.
#[derive(Default)]
pub struct SessionStore {
    inner: DashMap<ChatId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }

    /// Stores a session, replacing any previous one for this chat.
    pub fn put(&self, chat_id: ChatId, session: Session) {
        self.inner.insert(chat_id, session);
    }

    pub fn get(&self, chat_id: ChatId) -> Option<Session> {
        self.inner.get(&chat_id).map(|s| s.value().clone())
    }

    pub fn remove(&self, chat_id: ChatId) {
        self.inner.remove(&chat_id);
    }
}
