//! Local session record: the signed-in identity mirrored into the key/value
//! store under `jersey_session`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use shared::SessionInfo;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::clock::SharedClock;
use crate::backend::storage::traits::KeyValueStorage;

pub const SESSION_KEY: &str = "jersey_session";

/// Reads and writes the session record, expiring it after `timeout`
#[derive(Clone)]
pub struct SessionManager {
    storage: Arc<dyn KeyValueStorage>,
    clock: SharedClock,
    timeout: Duration,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: SharedClock, timeout: Duration) -> Self {
        Self { storage, clock, timeout }
    }

    /// Record a fresh session for a signed-in user
    pub fn start(&self, username: &str, uid: &str, role: &str) -> Result<SessionInfo> {
        let login_time = DateTime::<Utc>::from_timestamp_millis(self.clock.now_millis())
            .unwrap_or_else(Utc::now)
            .to_rfc3339();

        let session = SessionInfo {
            username: username.to_string(),
            uid: uid.to_string(),
            role: role.to_string(),
            login_time,
        };

        let serialized = serde_json::to_string(&session)?;
        self.storage
            .set_item(SESSION_KEY, &serialized)
            .context("Failed to store session")?;

        info!("🔑 Session started for {} ({})", session.username, session.role);
        Ok(session)
    }

    /// The active session, if any; stale or unreadable records are cleared
    pub fn current(&self) -> Option<SessionInfo> {
        let raw = match self.storage.get_item(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read session: {}", e);
                return None;
            }
        };

        let session: SessionInfo = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(e) => {
                warn!("Session record is corrupted ({}); clearing it", e);
                self.clear();
                return None;
            }
        };

        if self.is_expired(&session) {
            debug!("Session for {} expired", session.username);
            self.clear();
            return None;
        }

        Some(session)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(SESSION_KEY) {
            warn!("Could not clear session: {}", e);
        }
    }

    fn is_expired(&self, session: &SessionInfo) -> bool {
        let Ok(login_time) = DateTime::parse_from_rfc3339(&session.login_time) else {
            return true;
        };
        let age = self.clock.now_millis() - login_time.timestamp_millis();
        age < 0 || age as u128 >= self.timeout.as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::clock::ManualClock;
    use crate::backend::storage::kv::MemoryStorage;

    const HOUR: i64 = 60 * 60 * 1000;

    fn manager() -> (SessionManager, Arc<ManualClock>, Arc<MemoryStorage>) {
        let clock = ManualClock::new(1_700_000_000_000);
        let storage = Arc::new(MemoryStorage::new());
        let manager = SessionManager::new(storage.clone(), clock.clone(), Duration::from_secs(8 * 3600));
        (manager, clock, storage)
    }

    #[test]
    fn test_session_round_trip_uses_fixed_key_and_shape() {
        let (manager, _clock, storage) = manager();
        let session = manager.start("alice@example.com", "uid-1", "admin").unwrap();
        assert_eq!(session.login_time, "2023-11-14T22:13:20+00:00");

        let raw = storage.get_item(SESSION_KEY).unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored["username"], "alice@example.com");
        assert_eq!(stored["uid"], "uid-1");
        assert_eq!(stored["role"], "admin");
        assert!(stored.get("loginTime").is_some());

        assert_eq!(manager.current(), Some(session));
    }

    #[test]
    fn test_session_expires_after_timeout() {
        let (manager, clock, storage) = manager();
        manager.start("alice@example.com", "uid-1", "staff").unwrap();

        clock.advance(8 * HOUR - 1);
        assert!(manager.is_authenticated());

        clock.advance(1);
        assert!(manager.current().is_none());
        assert!(storage.get_item(SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupted_session_is_cleared() {
        let (manager, _clock, storage) = manager();
        storage.set_item(SESSION_KEY, "{{{").unwrap();
        assert!(manager.current().is_none());
        assert!(storage.get_item(SESSION_KEY).unwrap().is_none());
    }

    #[test]
    fn test_clear_signs_out() {
        let (manager, _clock, _) = manager();
        manager.start("bob@example.com", "uid-2", "staff").unwrap();
        manager.clear();
        assert!(!manager.is_authenticated());
    }
}
