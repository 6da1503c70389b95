//! # Application Configuration
//!
//! Settings are read once at startup from a YAML file and then overlaid with
//! environment variables. Every field has a default, so an absent file is
//! fine for local development.
//!
//! ```yaml
//! backend: local            # or "firestore"
//! data_dir: ~/jersey-data
//! port: 3000
//! cache:
//!   ttl_secs: 300
//! firebase:
//!   api_key: "..."
//!   project_id: "jersey-orders"
//! ```

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "JERSEY_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "jersey-orders.yaml";

/// Which [`DocumentStore`](crate::backend::storage::DocumentStore) serves the domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Firestore,
}

impl BackendKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "localstorage" => Some(Self::Local),
            "firestore" | "firebase" => Some(Self::Firestore),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub memory_capacity: usize,
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            memory_capacity: 100,
            sweep_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Upper bound on a single sign-in/sign-up call
    pub timeout_secs: u64,
    pub max_login_attempts: u32,
    pub lockout_minutes: u64,
    pub session_timeout_minutes: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_login_attempts: 5,
            lockout_minutes: 15,
            session_timeout_minutes: 8 * 60,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub project_id: String,
    /// Override for the Identity Toolkit endpoint (emulators, tests)
    pub auth_url: Option<String>,
    /// Override for the Firestore endpoint (emulators, tests)
    pub firestore_url: Option<String>,
}

impl FirebaseConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty() && !self.project_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZohoConfig {
    pub client_id: String,
    pub client_secret: String,
    pub organization_id: String,
    pub redirect_uri: String,
    pub accounts_url: String,
    pub api_url: String,
}

impl Default for ZohoConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            organization_id: String::new(),
            redirect_uri: "http://localhost:3000/api/zoho/callback".to_string(),
            accounts_url: "https://accounts.zoho.com".to_string(),
            api_url: "https://www.zohoapis.com/books/v3".to_string(),
        }
    }
}

impl ZohoConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
            && !self.client_secret.trim().is_empty()
            && !self.organization_id.trim().is_empty()
    }
}

/// Settings for the outbound REST client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendKind,
    /// Directory for the file-backed key/value store; platform data dir when unset
    pub data_dir: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    pub allowed_origin: String,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
    pub firebase: FirebaseConfig,
    pub zoho: ZohoConfig,
    pub api: ApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            data_dir: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origin: "http://localhost:8080".to_string(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            firebase: FirebaseConfig::default(),
            zoho: ZohoConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `$JERSEY_CONFIG` (or `jersey-orders.yaml`) plus process environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut config = Self::from_file_or_default(Path::new(&path))?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config file; a missing file yields the defaults
    pub fn from_file_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("📄 No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let yaml_content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&yaml_content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("📄 Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(yaml_content: &str) -> Result<Self> {
        if yaml_content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml_content)?)
    }

    /// Overlay values from the environment, looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(value) = var("JERSEY_BACKEND") {
            self.backend = BackendKind::parse(&value)
                .with_context(|| format!("JERSEY_BACKEND must be 'local' or 'firestore', got '{}'", value))?;
        }
        if let Some(value) = var("JERSEY_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = var("JERSEY_PORT") {
            self.port = value
                .trim()
                .parse()
                .with_context(|| format!("JERSEY_PORT is not a valid port: '{}'", value))?;
        }
        if let Some(value) = var("FIREBASE_API_KEY") {
            self.firebase.api_key = value;
        }
        if let Some(value) = var("FIREBASE_PROJECT_ID") {
            self.firebase.project_id = value;
        }
        if let Some(value) = var("ZOHO_CLIENT_ID") {
            self.zoho.client_id = value;
        }
        if let Some(value) = var("ZOHO_CLIENT_SECRET") {
            self.zoho.client_secret = value;
        }
        if let Some(value) = var("ZOHO_ORGANIZATION_ID") {
            self.zoho.organization_id = value;
        }
        Ok(())
    }

    /// Reject combinations that cannot start
    pub fn validate(&self) -> Result<()> {
        if self.backend == BackendKind::Firestore && !self.firebase.is_configured() {
            bail!("backend 'firestore' requires firebase.api_key and firebase.project_id");
        }
        if self.auth.max_login_attempts == 0 {
            bail!("auth.max_login_attempts must be at least 1");
        }
        if !self.zoho.is_configured() {
            warn!("Zoho Books credentials are not configured; invoice sync is disabled");
        }
        Ok(())
    }

    /// Data directory with `~` expanded, defaulting to the platform data dir
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => expand_home(dir),
            None => dirs::data_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(std::env::temp_dir)
                .join("jersey-orders"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub(crate) fn expand_home(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    let Some(home) = dirs::home_dir() else {
        return path.to_path_buf();
    };
    if text == "~" {
        home
    } else if let Some(rest) = text.strip_prefix("~/").or_else(|| text.strip_prefix("~\\")) {
        home.join(rest)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_yaml_empty() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.backend, BackendKind::Local);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.auth.max_login_attempts, 5);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
backend: firestore
port: 8088
cache:
  ttl_secs: 30
firebase:
  api_key: abc
  project_id: jerseys
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.backend, BackendKind::Firestore);
        assert_eq!(config.port, 8088);
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.memory_capacity, 100);
        assert!(config.firebase.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(env(&[
                ("JERSEY_BACKEND", "Firestore"),
                ("JERSEY_PORT", "9000"),
                ("JERSEY_DATA_DIR", "/srv/jerseys"),
                ("FIREBASE_API_KEY", "key"),
                ("FIREBASE_PROJECT_ID", "proj"),
                ("ZOHO_CLIENT_ID", ""),
            ]))
            .unwrap();

        assert_eq!(config.backend, BackendKind::Firestore);
        assert_eq!(config.port, 9000);
        assert_eq!(config.resolved_data_dir(), PathBuf::from("/srv/jerseys"));
        assert_eq!(config.firebase.api_key, "key");
        // Blank values are ignored
        assert!(config.zoho.client_id.is_empty());
    }

    #[test]
    fn test_invalid_env_values_are_errors() {
        let mut config = AppConfig::default();
        assert!(config.apply_overrides(env(&[("JERSEY_PORT", "eighty")])).is_err());
        assert!(config.apply_overrides(env(&[("JERSEY_BACKEND", "mongo")])).is_err());
    }

    #[test]
    fn test_firestore_without_credentials_fails_validation() {
        let config = AppConfig {
            backend: BackendKind::Firestore,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jersey.yaml");
        std::fs::write(&path, "port: 4100\nallowed_origin: http://example.test\n").unwrap();

        let config = AppConfig::from_file_or_default(&path).unwrap();
        assert_eq!(config.port, 4100);
        assert_eq!(config.allowed_origin, "http://example.test");

        let missing = AppConfig::from_file_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(missing, AppConfig::default());
    }

    #[test]
    fn test_tilde_expansion() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home(Path::new("~/data")), home.join("data"));
        assert_eq!(expand_home(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
