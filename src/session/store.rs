use std::collections::{hash_map::Entry, HashMap};

use tokio::sync::{Mutex, MutexGuard};

use super::{Session, SessionId, SessionKey};
use crate::error::QuizError;

/// Active sessions, at most one per key. Lives only in memory: a restart
/// drops every running quiz.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionKey, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses to replace a running session.
    pub async fn begin(&self, key: SessionKey, session: Session) -> Result<SessionId, QuizError> {
        match self.sessions.lock().await.entry(key) {
            Entry::Occupied(existing) => Err(QuizError::AlreadyInProgress(
                existing.get().quiz().name().to_owned(),
            )),
            Entry::Vacant(slot) => Ok(slot.insert(session).id()),
        }
    }

    /// Runs `f` on the session with the given key and id, if it is still there.
    pub async fn with_session<R>(
        &self,
        key: SessionKey,
        id: SessionId,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.lock().await;
        sessions.get_mut(&key).filter(|s| s.id() == id).map(f)
    }

    pub async fn remove(&self, key: SessionKey) -> Option<Session> {
        self.sessions.lock().await.remove(&key)
    }

    pub async fn active_quiz(&self, key: SessionKey) -> Option<String> {
        self.sessions
            .lock()
            .await
            .get(&key)
            .map(|s| s.quiz().name().to_owned())
    }

    pub async fn contains(&self, key: SessionKey) -> bool {
        self.sessions.lock().await.contains_key(&key)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<SessionKey, Session>> {
        self.sessions.lock().await
    }
}
