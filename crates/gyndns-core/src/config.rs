//! Configuration types for the GynDNS service
//!
//! The daemon reads a single JSON document into [`ServiceConfig`]. Every
//! section except `users` is optional and falls back to the defaults below.
//!
//! Documents in the older `gyndns.json` layout (`Config` with
//! `HTTPAddress`/`HTTPPort`/`DNSAddress`/`DNSPort`, `Users` with
//! `Username`/`Password`/`Names`) are recognized by their `Users` key and
//! converted; they always use the memory store.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::Error;
use crate::access::pattern::WILDCARD;
use crate::store::{FileKvStore, MemoryKvStore, RedisKvStore};
use crate::traits::KeyValueStore;

/// Environment variable overriding `log_level`
pub const LOG_LEVEL_ENV: &str = "GYNDNS_LOG_LEVEL";

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Update endpoint listener
    #[serde(default = "default_http_listen")]
    pub http: ListenConfig,

    /// Query responder listener
    #[serde(default = "default_dns_listen")]
    pub dns: ListenConfig,

    /// Record store backend
    #[serde(default)]
    pub store: StoreConfig,

    /// Registered users
    pub users: Vec<UserConfig>,

    /// Maximum log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ServiceConfig {
    /// Create a configuration with defaults and the given users
    pub fn new(users: Vec<UserConfig>) -> Self {
        Self {
            http: default_http_listen(),
            dns: default_dns_listen(),
            store: StoreConfig::default(),
            users,
            log_level: default_log_level(),
        }
    }

    /// Parse a JSON document in either layout
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let invalid = |e: serde_json::Error| Error::config(format!("Invalid configuration: {}", e));

        let document: serde_json::Value = serde_json::from_str(json).map_err(invalid)?;
        if document.get(LEGACY_USERS_KEY).is_some() {
            let legacy: LegacyParams = serde_json::from_value(document).map_err(invalid)?;
            return Ok(legacy.into());
        }
        serde_json::from_value(document).map_err(invalid)
    }

    /// Load, apply environment overrides and validate
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_json(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `GYNDNS_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
    }

    /// Parsed maximum log level
    pub fn tracing_level(&self) -> Result<tracing::Level, Error> {
        self.log_level
            .parse()
            .map_err(|_| Error::config(format!("Invalid log level: {}", self.log_level)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.users.is_empty() {
            return Err(Error::config("No users found"));
        }

        let mut seen = HashSet::new();
        for user in &self.users {
            user.validate()?;
            if !seen.insert(user.username.as_str()) {
                return Err(Error::config(format!("Duplicate username: {}", user.username)));
            }
        }

        self.http.socket_addr()?;
        self.dns.socket_addr()?;
        self.store.validate()?;
        self.tracing_level()?;

        Ok(())
    }
}

const LEGACY_USERS_KEY: &str = "Users";

/// `gyndns.json` layout
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyParams {
    #[serde(default)]
    config: Option<LegacyListeners>,
    users: Vec<LegacyUser>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LegacyListeners {
    #[serde(rename = "HTTPAddress")]
    http_address: String,
    #[serde(rename = "HTTPPort")]
    http_port: u16,
    #[serde(rename = "DNSAddress")]
    dns_address: String,
    #[serde(rename = "DNSPort")]
    dns_port: u16,
}

impl Default for LegacyListeners {
    fn default() -> Self {
        let http = default_http_listen();
        let dns = default_dns_listen();
        Self {
            http_address: http.address,
            http_port: http.port,
            dns_address: dns.address,
            dns_port: dns.port,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacyUser {
    username: String,
    password: String,
    #[serde(default)]
    names: Vec<String>,
}

impl From<LegacyParams> for ServiceConfig {
    fn from(legacy: LegacyParams) -> Self {
        let listeners = legacy.config.unwrap_or_default();
        let mut config = ServiceConfig::new(
            legacy
                .users
                .into_iter()
                .map(|user| UserConfig::new(user.username, user.password, user.names))
                .collect(),
        );
        config.http = ListenConfig::new(listeners.http_address, listeners.http_port);
        config.dns = ListenConfig::new(listeners.dns_address, listeners.dns_port);
        config
    }
}

/// Listen address of one front-end
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenConfig {
    /// IP address to bind
    pub address: String,
    /// Port to bind; 0 picks a free port
    pub port: u16,
}

impl ListenConfig {
    /// Create a listen configuration
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Address and port as a socket address
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let ip: std::net::IpAddr = self
            .address
            .parse()
            .map_err(|_| Error::config(format!("Invalid listen address: {}", self.address)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_http_listen() -> ListenConfig {
    ListenConfig::new("127.0.0.1", 8000)
}

fn default_dns_listen() -> ListenConfig {
    ListenConfig::new("127.0.0.1", 5533)
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Record store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// JSON file store
    File {
        /// Path to the store file
        path: String,
    },

    /// External Redis server, shared with other readers of the same keys
    Redis {
        /// Server URL, e.g. `redis://127.0.0.1:6379/0`
        url: String,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), Error> {
        match self {
            StoreConfig::File { path } if path.trim().is_empty() => {
                Err(Error::config("File store path cannot be empty"))
            }
            StoreConfig::Redis { url } => redis::Client::open(url.as_str())
                .map(|_| ())
                .map_err(|e| Error::config(format!("Invalid Redis URL: {}", e))),
            _ => Ok(()),
        }
    }

    /// Short backend name for logs
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::File { .. } => "file",
            StoreConfig::Redis { .. } => "redis",
        }
    }

    /// Build the configured backend
    pub async fn open(&self) -> Result<Arc<dyn KeyValueStore>, Error> {
        self.validate()?;
        Ok(match self {
            StoreConfig::Memory => Arc::new(MemoryKvStore::new()),
            StoreConfig::File { path } => Arc::new(FileKvStore::open(path).await?),
            StoreConfig::Redis { url } => Arc::new(RedisKvStore::connect(url).await?),
        })
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Unique username
    pub username: String,
    /// Password, compared byte for byte
    pub password: String,
    /// Hostname patterns this user may update
    pub names: Vec<String>,
}

impl UserConfig {
    /// Create a user configuration
    pub fn new<I, S>(username: impl Into<String>, password: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            password: password.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate credentials and hostname patterns
    pub fn validate(&self) -> Result<(), Error> {
        if self.username.is_empty() {
            return Err(Error::config("Username cannot be empty"));
        }
        if self.password.is_empty() {
            return Err(Error::config(format!(
                "Password for user {} cannot be empty",
                self.username
            )));
        }
        if self.names.is_empty() {
            return Err(Error::config(format!(
                "User {} has no hostnames",
                self.username
            )));
        }
        for name in &self.names {
            validate_pattern(name).map_err(|reason| {
                Error::config(format!(
                    "Invalid hostname {:?} for user {}: {}",
                    name, self.username, reason
                ))
            })?;
        }
        Ok(())
    }
}

fn validate_pattern(name: &str) -> Result<(), &'static str> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return Err("empty name");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("name longer than 253 bytes");
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err("empty label");
        }
        if label.len() > MAX_LABEL_LEN {
            return Err("label longer than 63 bytes");
        }
        if label != WILDCARD
            && !label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err("label contains invalid characters");
        }
    }
    Ok(())
}
