//! Per-client conversation sessions for the HTTP server.
//!
//! Each session id maps to its own [`Conversation`] behind a
//! `tokio::sync::Mutex`, so two requests on the same session are answered
//! one after the other while different sessions proceed in parallel.
//!
//! The registry holds at most `max_sessions` conversations. Creating one
//! more evicts the least recently used session; a client that comes back
//! with an evicted id starts over with an empty history.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use docqa_core::conversation::Conversation;

type Factory = Box<dyn Fn() -> Conversation + Send + Sync>;

struct Session {
    conversation: Arc<Mutex<Conversation>>,
    last_used: AtomicU64,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    max_sessions: usize,
    clock: AtomicU64,
    factory: Factory,
}

impl SessionRegistry {
    pub fn new(
        max_sessions: usize,
        factory: impl Fn() -> Conversation + Send + Sync + 'static,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            clock: AtomicU64::new(0),
            factory: Box::new(factory),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Return the session for `id`, creating it (under a fresh UUID when
    /// `id` is `None`).
    pub async fn get_or_create(&self, id: Option<&str>) -> (String, Arc<Mutex<Conversation>>) {
        if let Some(id) = id {
            if let Some(session) = self.sessions.read().await.get(id) {
                session.last_used.store(self.tick(), Ordering::Relaxed);
                return (id.to_string(), session.conversation.clone());
            }
        }

        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(&id) {
            session.last_used.store(self.tick(), Ordering::Relaxed);
            return (id, session.conversation.clone());
        }

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    debug!(session = %key, "evicting least recently used session");
                    sessions.remove(&key);
                }
                None => break,
            }
        }

        debug!(session = %id, "new session");
        let conversation = Arc::new(Mutex::new((self.factory)()));
        sessions.insert(
            id.clone(),
            Session {
                conversation: conversation.clone(),
                last_used: AtomicU64::new(self.tick()),
            },
        );
        (id, conversation)
    }

    /// Clear the history of session `id`. Returns false if it does not exist.
    pub async fn clear(&self, id: &str) -> bool {
        let conv = self
            .sessions
            .read()
            .await
            .get(id)
            .map(|s| s.conversation.clone());
        match conv {
            Some(conv) => {
                conv.lock().await.clear();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
