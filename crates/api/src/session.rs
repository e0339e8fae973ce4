//! Per-caller session state.
//!
//! A session owns its variable store and at most one job binding. Each
//! record sits behind its own async mutex so that a caller's
//! read-decide-write of the binding is atomic with respect to that caller's
//! concurrent requests, while different sessions only share the map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use reina_core::types::{JobId, SessionId, Timestamp};
use reina_core::variables::VariableStore;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub variables: VariableStore,
    /// Job this session is allowed to poll.
    pub job_id: Option<JobId>,
    pub last_seen: Timestamp,
}

impl SessionRecord {
    fn new(variables: VariableStore) -> Self {
        Self {
            variables,
            job_id: None,
            last_seen: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
    }
}

pub type SharedSession = Arc<Mutex<SessionRecord>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SharedSession>>,
    defaults: VariableStore,
}

impl SessionStore {
    /// Create an empty store whose new sessions start with `defaults`.
    pub fn new(defaults: VariableStore) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            defaults,
        }
    }

    pub fn defaults(&self) -> &VariableStore {
        &self.defaults
    }

    /// Mint a fresh session.
    pub async fn create(&self) -> (SessionId, SharedSession) {
        let id = SessionId::new();
        let record = Arc::new(Mutex::new(SessionRecord::new(self.defaults.clone())));
        self.sessions.write().await.insert(id, Arc::clone(&record));
        (id, record)
    }

    /// Look up `id`, creating a session with default variables on first use.
    pub async fn entry(&self, id: SessionId) -> SharedSession {
        if let Some(record) = self.sessions.read().await.get(&id) {
            return Arc::clone(record);
        }
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(SessionRecord::new(self.defaults.clone()))));
        Arc::clone(record)
    }

    pub async fn get(&self, id: SessionId) -> Option<SharedSession> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drop sessions not seen for longer than `max_idle`, returning the job
    /// binding of each dropped session.
    ///
    /// Sessions currently locked by a request are in use and always kept.
    pub async fn remove_idle(&self, max_idle: chrono::Duration) -> Vec<Option<JobId>> {
        let cutoff = Utc::now() - max_idle;
        let mut dropped = Vec::new();
        self.sessions.write().await.retain(|_, record| match record.try_lock() {
            Ok(record) if record.last_seen < cutoff => {
                dropped.push(record.job_id);
                false
            }
            _ => true,
        });
        dropped
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
