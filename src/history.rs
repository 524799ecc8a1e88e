//! Per-person conversation history.
//!
//! One JSON array of entries per person, rewritten in full on every append.
//! Appends for the same person are serialised by a per-key lock.

use crate::error::{FacetrailError, Result};
use crate::storage::{KeyValueStore, normalize_key};
use crate::transcript::ConversationTurn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Unix seconds.
    pub timestamp: i64,
    pub conversation: Vec<ConversationTurn>,
}

pub struct ConversationLog {
    store: Arc<dyn KeyValueStore>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn key(person: &str) -> String {
        format!("{}.json", normalize_key(person))
    }

    fn lock_for(&self, key: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|e| FacetrailError::Storage {
            message: format!("history lock table poisoned: {e}"),
        })?;
        Ok(locks.entry(key.to_string()).or_default().clone())
    }

    /// Forget locks nobody holds so the table only tracks people being written.
    fn release_idle_locks(&self) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }

    /// Append `conversation` to `person`'s history, stamped with the current
    /// time. Returns the number of entries after the append.
    ///
    /// An unreadable or corrupt history is replaced, not an error.
    pub fn append(&self, person: &str, conversation: &[ConversationTurn]) -> Result<usize> {
        let key = Self::key(person);
        let lock = self.lock_for(&key)?;
        let appended = match lock.lock() {
            Ok(_guard) => self.write_entry(person, &key, conversation),
            Err(e) => Err(FacetrailError::Storage {
                message: format!("history lock poisoned: {e}"),
            }),
        };
        drop(lock);
        self.release_idle_locks();
        appended
    }

    fn write_entry(
        &self,
        person: &str,
        key: &str,
        conversation: &[ConversationTurn],
    ) -> Result<usize> {
        let mut entries = match self.read(key) {
            Ok(entries) => entries.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(person, error = %e, "could not read history, starting a new one");
                Vec::new()
            }
        };
        entries.push(ConversationEntry {
            timestamp: chrono::Utc::now().timestamp(),
            conversation: conversation.to_vec(),
        });

        self.store.put(key, &serde_json::to_vec_pretty(&entries)?)?;
        tracing::info!(person, entries = entries.len(), "conversation history updated");
        Ok(entries.len())
    }

    /// Full history of `person`, `None` when there is none.
    pub fn history(&self, person: &str) -> Result<Option<Vec<ConversationEntry>>> {
        self.read(&Self::key(person))
    }

    fn read(&self, key: &str) -> Result<Option<Vec<ConversationEntry>>> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
