//! # Security Helpers
//!
//! Password hashing, HTML-escaping of free-text input and login attempt
//! bookkeeping.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::backend::clock::SharedClock;
use crate::backend::storage::traits::{KeyValueStorage, StorageError};

/// Key holding login attempt bookkeeping
pub const LOGIN_ATTEMPTS_KEY: &str = "login_attempts";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Lowercase hex SHA-256 of `salt + password`
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    hash_password(password, salt).eq_ignore_ascii_case(expected_hash)
}

/// Random salt for a new account
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Escape HTML-significant characters and trim surrounding whitespace
pub fn sanitize_input(text: &str) -> String {
    let trimmed = text.trim();
    let mut escaped = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn sanitize_optional(text: Option<&str>) -> Option<String> {
    text.map(sanitize_input).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptRecord {
    count: u32,
    first_attempt: i64,
    #[serde(default)]
    locked_until: Option<i64>,
}

/// Counts failed logins per account and locks it after too many
///
/// Failures are counted within a window starting at the first failure. Once
/// `max_attempts` is reached the account is locked for one window. A
/// successful login clears the record. State lives in the key/value store so
/// it survives restarts when that store is file-backed.
#[derive(Clone)]
pub struct LoginRateLimiter {
    storage: Arc<dyn KeyValueStorage>,
    clock: SharedClock,
    max_attempts: u32,
    window: Duration,
    lock: Arc<Mutex<()>>,
}

impl LoginRateLimiter {
    pub fn new(storage: Arc<dyn KeyValueStorage>, clock: SharedClock) -> Self {
        Self::with_limits(storage, clock, DEFAULT_MAX_ATTEMPTS, DEFAULT_LOCKOUT_WINDOW)
    }

    pub fn with_limits(
        storage: Arc<dyn KeyValueStorage>,
        clock: SharedClock,
        max_attempts: u32,
        window: Duration,
    ) -> Self {
        Self {
            storage,
            clock,
            max_attempts: max_attempts.max(1),
            window,
            lock: Arc::new(Mutex::new(())),
        }
    }

    fn window_millis(&self) -> i64 {
        self.window.as_millis() as i64
    }

    fn load(&self) -> HashMap<String, AttemptRecord> {
        match self.storage.get_item(LOGIN_ATTEMPTS_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Login attempt records are corrupted ({}); starting fresh", e);
                HashMap::new()
            }),
            Ok(None) => HashMap::new(),
            Err(e) => {
                warn!("Could not read login attempt records: {}", e);
                HashMap::new()
            }
        }
    }

    fn save(&self, records: &HashMap<String, AttemptRecord>) {
        let result = serde_json::to_string(records)
            .map_err(StorageError::from)
            .and_then(|raw| self.storage.set_item(LOGIN_ATTEMPTS_KEY, &raw));
        if let Err(e) = result {
            warn!("Could not persist login attempt records: {}", e);
        }
    }

    fn normalize(account: &str) -> String {
        account.trim().to_lowercase()
    }

    /// Drop a record whose window or lock has fully elapsed
    fn current(&self, record: Option<&AttemptRecord>, now: i64) -> Option<AttemptRecord> {
        let record = record?;
        if let Some(until) = record.locked_until {
            return (now < until).then(|| record.clone());
        }
        (now - record.first_attempt < self.window_millis()).then(|| record.clone())
    }

    pub fn is_locked(&self, account: &str) -> bool {
        self.lockout_remaining(account).is_some()
    }

    /// Time left on an active lockout
    pub fn lockout_remaining(&self, account: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        let records = self.load();
        let record = self.current(records.get(&Self::normalize(account)), now)?;
        let until = record.locked_until?;
        Some(Duration::from_millis((until - now).max(0) as u64))
    }

    pub fn remaining_attempts(&self, account: &str) -> u32 {
        let now = self.clock.now_millis();
        let records = self.load();
        match self.current(records.get(&Self::normalize(account)), now) {
            Some(record) if record.locked_until.is_some() => 0,
            Some(record) => self.max_attempts.saturating_sub(record.count),
            None => self.max_attempts,
        }
    }

    /// Count a failed login; returns true when this failure locked the account
    pub fn record_failure(&self, account: &str) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let now = self.clock.now_millis();
        let key = Self::normalize(account);
        let mut records = self.load();

        let mut record = self
            .current(records.get(&key), now)
            .unwrap_or(AttemptRecord { count: 0, first_attempt: now, locked_until: None });
        if record.locked_until.is_some() {
            return false;
        }

        record.count += 1;
        let locked = record.count >= self.max_attempts;
        if locked {
            record.locked_until = Some(now + self.window_millis());
            warn!("🔒 Account '{}' locked after {} failed logins", key, record.count);
        }

        records.insert(key, record);
        records.retain(|_, r| self.current(Some(r), now).is_some());
        self.save(&records);
        locked
    }

    /// Clear the record after a successful login
    pub fn record_success(&self, account: &str) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let key = Self::normalize(account);
        let mut records = self.load();
        if records.remove(&key).is_some() {
            info!("Cleared failed login count for '{}'", key);
            self.save(&records);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::clock::ManualClock;
    use crate::backend::storage::kv::MemoryStorage;

    fn limiter(max: u32) -> (LoginRateLimiter, Arc<ManualClock>, Arc<MemoryStorage>) {
        let clock = ManualClock::new(1_000_000);
        let storage = Arc::new(MemoryStorage::new());
        let limiter = LoginRateLimiter::with_limits(storage.clone(), clock.clone(), max, Duration::from_secs(60));
        (limiter, clock, storage)
    }

    #[test]
    fn test_hash_password_is_salted_sha256_hex() {
        // sha256("saltpassword")
        assert_eq!(
            hash_password("password", "salt"),
            "13601bda4ea78e55a07b98866d2be6be0744e3866f13c00c811cab608a28f322"
        );
        assert_ne!(hash_password("password", "salt"), hash_password("password", "pepper"));
        assert!(verify_password("password", "salt", &hash_password("password", "salt")));
        assert!(!verify_password("Password", "salt", &hash_password("password", "salt")));
    }

    #[test]
    fn test_sanitize_input_escapes_html() {
        assert_eq!(
            sanitize_input("  <script>alert('x') & \"y\"</script> "),
            "&lt;script&gt;alert(&#x27;x&#x27;) &amp; &quot;y&quot;&lt;&#x2F;script&gt;"
        );
        assert_eq!(sanitize_input("Owls FC"), "Owls FC");
        assert_eq!(sanitize_optional(Some("   ")), None);
    }

    #[test]
    fn test_locks_after_max_failures() {
        let (limiter, _clock, _) = limiter(3);
        assert_eq!(limiter.remaining_attempts("a@b.com"), 3);

        assert!(!limiter.record_failure("a@b.com"));
        assert!(!limiter.record_failure("A@B.com "));
        assert_eq!(limiter.remaining_attempts("a@b.com"), 1);
        assert!(limiter.record_failure("a@b.com"));

        assert!(limiter.is_locked("a@b.com"));
        assert_eq!(limiter.remaining_attempts("a@b.com"), 0);
        assert!(!limiter.is_locked("other@b.com"));
    }

    #[test]
    fn test_lock_expires_after_window() {
        let (limiter, clock, _) = limiter(2);
        limiter.record_failure("a@b.com");
        limiter.record_failure("a@b.com");
        assert_eq!(limiter.lockout_remaining("a@b.com"), Some(Duration::from_secs(60)));

        clock.advance(59_000);
        assert!(limiter.is_locked("a@b.com"));
        clock.advance(1_000);
        assert!(!limiter.is_locked("a@b.com"));
        assert_eq!(limiter.remaining_attempts("a@b.com"), 2);
    }

    #[test]
    fn test_failures_outside_window_start_over() {
        let (limiter, clock, _) = limiter(3);
        limiter.record_failure("a@b.com");
        limiter.record_failure("a@b.com");
        clock.advance(61_000);
        assert_eq!(limiter.remaining_attempts("a@b.com"), 3);
        assert!(!limiter.record_failure("a@b.com"));
        assert_eq!(limiter.remaining_attempts("a@b.com"), 2);
    }

    #[test]
    fn test_success_resets_and_state_is_persisted() {
        let (limiter, clock, storage) = limiter(3);
        limiter.record_failure("a@b.com");
        limiter.record_failure("a@b.com");

        // A second limiter over the same store sees the same counts
        let other = LoginRateLimiter::with_limits(storage.clone(), clock.clone(), 3, Duration::from_secs(60));
        assert_eq!(other.remaining_attempts("a@b.com"), 1);

        limiter.record_success("a@b.com");
        assert_eq!(other.remaining_attempts("a@b.com"), 3);
    }

    #[test]
    fn test_corrupted_records_start_fresh() {
        let (limiter, _clock, storage) = limiter(3);
        storage.set_item(LOGIN_ATTEMPTS_KEY, "{not json").unwrap();
        assert_eq!(limiter.remaining_attempts("a@b.com"), 3);
        limiter.record_failure("a@b.com");
        assert_eq!(limiter.remaining_attempts("a@b.com"), 2);
    }
}
