//! Access control
//!
//! The [`UserTable`] is built once from configuration and never mutated, so
//! handlers share it behind an `Arc` without locking.
//!
//! - [`UserTable::authenticate`]: byte-exact username and password check
//! - [`User::authorize`]: does any of the user's patterns cover a hostname

pub mod pattern;

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::config::UserConfig;
use crate::error::{Error, Result};

pub use pattern::HostnamePattern;

/// Authentication failures
///
/// Both variants deny access; they differ only in the message returned to
/// the client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username is not in the table
    #[error("Username {0} is not registered")]
    UnknownUser(String),

    /// Username is known, password differs
    #[error("Mismatching password for user {0}")]
    PasswordMismatch(String),
}

/// A registered user
#[derive(Debug, Clone)]
pub struct User {
    username: String,
    password: String,
    patterns: Vec<HostnamePattern>,
}

impl User {
    /// Create a user from its credentials and hostname patterns
    pub fn new<I, S>(username: impl Into<String>, password: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            username: username.into(),
            password: password.into(),
            patterns: names
                .into_iter()
                .map(|name| HostnamePattern::new(name.as_ref()))
                .collect(),
        }
    }

    /// The user's unique name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Hostname patterns, in configuration order
    pub fn patterns(&self) -> &[HostnamePattern] {
        &self.patterns
    }

    /// Check whether this user may update `hostname`
    pub fn authorize(&self, hostname: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(hostname))
    }
}

impl From<&UserConfig> for User {
    fn from(config: &UserConfig) -> Self {
        User::new(&config.username, &config.password, &config.names)
    }
}

/// Immutable table of registered users, keyed by username
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: HashMap<String, User>,
}

impl UserTable {
    /// Build the table from a list of users
    ///
    /// Fails if a username appears twice.
    pub fn new(users: impl IntoIterator<Item = User>) -> Result<Self> {
        let mut table = HashMap::new();
        for user in users {
            let username = user.username.clone();
            if table.insert(username.clone(), user).is_some() {
                return Err(Error::config(format!("Duplicate username: {}", username)));
            }
        }
        Ok(Self { users: table })
    }

    /// Build the table from the configured users
    pub fn from_config(users: &[UserConfig]) -> Result<Self> {
        Self::new(users.iter().map(User::from))
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the table has no users
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Look up a user and check the password
    ///
    /// The comparison is exact and case-sensitive. Repeated failures have no
    /// further effect.
    pub fn authenticate(&self, username: &str, password: &str) -> std::result::Result<&User, AuthError> {
        let user = self.users.get(username).ok_or_else(|| {
            debug!(username, "authentication failed: unknown user");
            AuthError::UnknownUser(username.to_string())
        })?;

        if user.password.as_bytes() != password.as_bytes() {
            debug!(username, "authentication failed: password mismatch");
            return Err(AuthError::PasswordMismatch(username.to_string()));
        }

        Ok(user)
    }
}
