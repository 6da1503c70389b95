use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::storage::document::Query;

struct ActiveListener {
    id: u64,
    query: Query,
}

/// Registry of active snapshot listeners, at most one per collection
///
/// Registering a second listener on the same collection replaces the first.
/// Unsubscribing a replaced listener leaves the newer one in place.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<Mutex<HashMap<String, ActiveListener>>>,
    next_id: Arc<AtomicU64>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its id
    pub fn register(&self, query: &Query) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = listeners.insert(
            query.collection.clone(),
            ActiveListener { id, query: query.clone() },
        ) {
            debug!(
                "Listener {} on '{}' replaced by listener {}",
                previous.id, query.collection, id
            );
        }

        id
    }

    /// Remove a listener if it is still the active one for its collection
    pub fn unregister(&self, collection: &str, id: u64) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        match listeners.get(collection) {
            Some(active) if active.id == id => {
                listeners.remove(collection);
                debug!("Listener {} on '{}' removed", id, collection);
                true
            }
            _ => false,
        }
    }

    /// Query of the active listener on a collection
    pub fn active_query(&self, collection: &str) -> Option<Query> {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.get(collection).map(|l| l.query.clone())
    }

    pub fn is_active(&self, collection: &str) -> bool {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.contains_key(collection)
    }

    pub fn active_count(&self) -> usize {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.len()
    }
}
